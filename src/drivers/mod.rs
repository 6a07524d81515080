//! PWM output drivers.

pub mod pca9685;
pub mod pwm_bus;
