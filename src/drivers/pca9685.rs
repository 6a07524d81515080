//! PCA9685 16-channel, 12-bit PWM controller.
//!
//! Wraps the `pwm-pca9685` driver behind [`PwmPort`]. Generic over any
//! `embedded-hal` I2C bus, so the same code runs against `/dev/i2c-*` on
//! Linux or a mock bus in tests.
//!
//! The output frequency is programmed once at construction:
//!
//! ```text
//! prescale = round(25 MHz / (4096 × f)) − 1      (f = 1 kHz → 5)
//! ```

use embedded_hal::i2c::I2c;
use log::{debug, info};
use pwm_pca9685::{Address, Channel, Pca9685};

use crate::app::ports::PwmPort;
use crate::error::BusError;

/// Internal oscillator frequency.
const OSCILLATOR_HZ: f64 = 25_000_000.0;

/// Lowest output frequency the prescaler can produce (prescale = 255).
pub const MIN_FREQUENCY_HZ: u32 = 24;
/// Highest output frequency the prescaler can produce (prescale = 3).
pub const MAX_FREQUENCY_HZ: u32 = 1526;

/// Default 7-bit I2C address (all address pins low).
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Compute the prescale register value for `frequency_hz`.
pub fn prescale_for(frequency_hz: u32) -> u8 {
    let freq = f64::from(frequency_hz.clamp(MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ));
    let raw = (OSCILLATOR_HZ / (4096.0 * freq)).round() - 1.0;
    raw.clamp(3.0, 255.0) as u8
}

/// A PCA9685 board reachable over `I2C`.
pub struct Pca9685Pwm<I2C> {
    device: Pca9685<I2C>,
}

impl<I2C, E> Pca9685Pwm<I2C>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
{
    /// Take ownership of the bus, program the frequency and enable outputs.
    pub fn new(i2c: I2C, address: u8, frequency_hz: u32) -> Result<Self, BusError> {
        let mut device = Pca9685::new(i2c, Address::from(address))
            .map_err(|e| BusError::InitFailed(format!("{e:?}")))?;

        let prescale = prescale_for(frequency_hz);
        device
            .set_prescale(prescale)
            .map_err(|e| BusError::InitFailed(format!("{e:?}")))?;
        device
            .enable()
            .map_err(|e| BusError::InitFailed(format!("{e:?}")))?;

        info!(
            "PCA9685 at 0x{:02x} ready ({} Hz, prescale={})",
            address, frequency_hz, prescale
        );
        Ok(Self { device })
    }
}

impl<I2C, E> PwmPort for Pca9685Pwm<I2C>
where
    I2C: I2c<Error = E> + Send,
    E: core::fmt::Debug,
{
    fn set_channel(&mut self, channel: u8, value: u16) -> Result<(), BusError> {
        let ch = channel_for(channel)
            .ok_or_else(|| BusError::WriteFailed(format!("no such channel {channel}")))?;
        self.device
            .set_channel_on_off(ch, 0, value)
            .map_err(|e| BusError::WriteFailed(format!("{e:?}")))?;
        debug!("PCA9685 ch{} <- {}", channel, value);
        Ok(())
    }
}

fn channel_for(channel: u8) -> Option<Channel> {
    Some(match channel {
        0 => Channel::C0,
        1 => Channel::C1,
        2 => Channel::C2,
        3 => Channel::C3,
        4 => Channel::C4,
        5 => Channel::C5,
        6 => Channel::C6,
        7 => Channel::C7,
        8 => Channel::C8,
        9 => Channel::C9,
        10 => Channel::C10,
        11 => Channel::C11,
        12 => Channel::C12,
        13 => Channel::C13,
        14 => Channel::C14,
        15 => Channel::C15,
        _ => return None,
    })
}
