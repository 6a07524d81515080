//! Linux hardware adapter — opens the real peripherals.
//!
//! The only module that touches `/dev`. The PCA9685 is reached through
//! an `i2c-dev` node, PIR inputs through the GPIO character device.

use gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::{CdevPin, I2cdev};
use log::info;

use crate::config::{GpioConfig, PirConfig, PwmConfig};
use crate::drivers::pca9685::Pca9685Pwm;
use crate::error::{BusError, Error, Result};

/// Consumer label shown by `gpioinfo` for lines we hold.
const GPIO_CONSUMER: &str = "lightctl-pir";

/// Open the I2C bus and bring up the PCA9685 at the configured address
/// and frequency.
pub fn open_pwm(config: &PwmConfig) -> Result<Pca9685Pwm<I2cdev>> {
    let i2c = I2cdev::new(&config.i2c_bus)
        .map_err(|e| BusError::InitFailed(format!("{}: {e}", config.i2c_bus)))?;
    info!("I2C bus {} opened", config.i2c_bus);
    Ok(Pca9685Pwm::new(i2c, config.address, config.frequency_hz)?)
}

/// Request the PIR's GPIO line as an input.
pub fn open_pir_pin(gpio: &GpioConfig, pir: &PirConfig) -> Result<CdevPin> {
    let setup = |e: gpio_cdev::Error| {
        Error::Setup(format!("pir '{}' on {} line {}: {e}", pir.name, gpio.chip, pir.gpio))
    };
    let mut chip = Chip::new(&gpio.chip).map_err(setup)?;
    let handle = chip
        .get_line(pir.gpio)
        .map_err(setup)?
        .request(LineRequestFlags::INPUT, 0, GPIO_CONSUMER)
        .map_err(setup)?;
    let pin = CdevPin::new(handle).map_err(setup)?;
    info!("GPIO {} line {} opened for '{}'", gpio.chip, pir.gpio, pir.name);
    Ok(pin)
}
