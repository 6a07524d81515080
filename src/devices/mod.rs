//! Device handlers — the per-device state machines behind the command topics.
//!
//! | Device          | Topics                        | Output          |
//! |-----------------|-------------------------------|-----------------|
//! | [`ColorLight`]  | `power`, `color`, `brightness`| N-channel fade  |
//! | [`DimmableLight`]| `power`, `brightness`        | 1-channel fade  |
//! | [`OnOff`]       | `power`                       | immediate 0/4095|
//!
//! Each handler is shared as `Arc<Self>`: one clone lives in the
//! controller for queries and shutdown, the others inside the router
//! callbacks registered by `attach`.

pub mod color_light;
pub mod dimmable_light;
pub mod on_off;

pub use color_light::ColorLight;
pub use dimmable_light::DimmableLight;
pub use on_off::OnOff;

use core::fmt;

use crate::error::Result;

/// Configured device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    ColorLight,
    DimmableLight,
    OnOff,
    Pir,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ColorLight => "color-light",
            Self::DimmableLight => "dimmable-light",
            Self::OnOff => "on-off",
            Self::Pir => "pir",
        })
    }
}

/// Read-only view and lifecycle hooks shared by every output device.
pub trait Device: Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> DeviceKind;

    /// Logical power state (not whether light is currently visible).
    fn is_on(&self) -> bool;

    /// Whether a fade is still writing. Always `false` for devices that
    /// do not fade.
    fn is_fading(&self) -> bool {
        false
    }

    /// Last value written to each channel, in channel order.
    fn current_output(&self) -> Vec<u16>;

    fn channels(&self) -> &[u8];

    /// Cancel any in-flight transition and wait for it to exit.
    fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Logical state of a fading light. Survives power-off so that the next
/// power-on restores the same look.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LightState {
    pub power_on: bool,
    /// Raw, unscaled level per channel.
    pub last_color: Vec<u32>,
    /// `0.0..=1.0`
    pub last_brightness: f64,
}

impl LightState {
    pub fn new(channels: usize, brightness: f64) -> Self {
        Self {
            power_on: false,
            last_color: vec![0; channels],
            last_brightness: brightness,
        }
    }
}
