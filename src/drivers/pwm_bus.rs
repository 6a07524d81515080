//! Shared PWM bus.
//!
//! Every device's channels live on one physical controller, so all
//! writes funnel through a single [`PwmBus`] value. The lock is held for
//! exactly one register write, never across fade steps, so fades on
//! different devices interleave fairly.
//!
//! ## Contract
//!
//! - Channel ids are validated against `0..=15`, values against `0..=4095`.
//! - An out-of-range call fails with [`RangeError`] and performs no write.
//! - No caching: every call is a physical write.

use std::sync::Mutex;

use crate::app::ports::PwmPort;
use crate::error::{RangeError, Result};

/// Lowest valid channel id.
pub const CHANNEL_MIN: u8 = 0;
/// Highest valid channel id.
pub const CHANNEL_MAX: u8 = 15;
/// Number of channels on the controller.
pub const CHANNEL_COUNT: usize = (CHANNEL_MAX - CHANNEL_MIN + 1) as usize;

/// Lowest channel value (fully off).
pub const VALUE_MIN: u16 = 0;
/// Highest channel value (fully on, 12-bit resolution).
pub const VALUE_MAX: u16 = 4095;

/// Serialized, range-checked access to a [`PwmPort`].
pub struct PwmBus<P: PwmPort> {
    port: Mutex<P>,
}

impl<P: PwmPort> PwmBus<P> {
    pub fn new(port: P) -> Self {
        Self {
            port: Mutex::new(port),
        }
    }

    /// Write `value` to `channel`.
    ///
    /// Takes wide integer types so that out-of-range requests can be
    /// reported faithfully instead of being truncated by the caller.
    pub fn write_channel(&self, channel: u32, value: i64) -> Result<()> {
        let channel = check_channel(channel)?;
        let value = check_value(value)?;

        let mut port = self.port.lock().unwrap_or_else(|p| p.into_inner());
        port.set_channel(channel, value)?;
        Ok(())
    }

    /// Drive `channel` fully on or fully off.
    pub fn write_bool(&self, channel: u32, active: bool) -> Result<()> {
        let value = if active { VALUE_MAX } else { VALUE_MIN };
        self.write_channel(channel, i64::from(value))
    }

    /// Run `f` against the underlying port while holding the bus lock.
    ///
    /// Used by tests and diagnostics to inspect a recording port.
    pub fn with_port<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        let mut port = self.port.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut port)
    }
}

fn check_channel(channel: u32) -> core::result::Result<u8, RangeError> {
    if channel > u32::from(CHANNEL_MAX) {
        return Err(RangeError::Channel {
            value: channel,
            min: CHANNEL_MIN,
            max: CHANNEL_MAX,
        });
    }
    Ok(channel as u8)
}

fn check_value(value: i64) -> core::result::Result<u16, RangeError> {
    if value < i64::from(VALUE_MIN) || value > i64::from(VALUE_MAX) {
        return Err(RangeError::Value {
            value,
            min: VALUE_MIN,
            max: VALUE_MAX,
        });
    }
    Ok(value as u16)
}
