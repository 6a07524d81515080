//! Inbound device commands and the topic layout they arrive on.
//!
//! Every light listens on three topics:
//!
//! ```text
//! <base_topic>/<device_id>/power       "ON" | anything else
//! <base_topic>/<device_id>/color       "r;g;b"   (one decimal per channel)
//! <base_topic>/<device_id>/brightness  "0".."value_range"
//! ```
//!
//! Sensors publish on `<base_topic>/<device_id>` with no suffix.

use core::fmt;

use crate::error::ParseError;

/// Payload that switches a device on. Any other payload switches it off.
pub const ON: &[u8] = b"ON";
/// Payload published for an inactive sensor.
pub const OFF: &[u8] = b"OFF";

/// Command topic suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suffix {
    Power,
    Color,
    Brightness,
}

impl Suffix {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Color => "color",
            Self::Brightness => "brightness",
        }
    }
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<base>/<id>/<suffix>`
pub fn command_topic(base_topic: &str, device_id: &str, suffix: Suffix) -> String {
    format!("{base_topic}/{device_id}/{suffix}")
}

/// `<base>/<id>`
pub fn state_topic(base_topic: &str, device_id: &str) -> String {
    format!("{base_topic}/{device_id}")
}

/// A parsed command for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Switch on (`true`) or off.
    Power(bool),
    /// Raw, unscaled color components, one per channel. Values above
    /// `value_range` are kept; scaling clamps the output.
    Color(Vec<u32>),
    /// Raw level in `0..=value_range`.
    Brightness(u32),
}

impl DeviceCommand {
    /// Parse `payload` received on the `suffix` topic of a device with
    /// `channels` outputs and the given `value_range`.
    pub fn parse(
        suffix: Suffix,
        payload: &[u8],
        channels: usize,
        value_range: u32,
    ) -> Result<Self, ParseError> {
        match suffix {
            Suffix::Power => Ok(Self::Power(parse_power(payload))),
            Suffix::Color => parse_color(payload, channels).map(Self::Color),
            Suffix::Brightness => parse_brightness(payload, value_range).map(Self::Brightness),
        }
    }
}

/// `"ON"` is on; everything else, including garbage, is off.
pub fn parse_power(payload: &[u8]) -> bool {
    payload == ON
}

/// Parse `"a;b;c"` into `expected` integer components.
///
/// Each component is read as a float and truncated towards zero, so
/// `"127.9"` becomes 127. Negative components are rejected; there is no
/// upper bound here, `scale` clamps the output.
pub fn parse_color(payload: &[u8], expected: usize) -> Result<Vec<u32>, ParseError> {
    let text = as_text(payload)?;
    let parts: Vec<&str> = text.split(';').map(str::trim).collect();
    if parts.len() != expected {
        return Err(ParseError::ComponentCount {
            expected,
            found: parts.len(),
        });
    }

    parts
        .into_iter()
        .map(|part| {
            let value: f64 = part
                .parse()
                .map_err(|_| ParseError::NotNumeric(part.to_owned()))?;
            if !value.is_finite() {
                return Err(ParseError::NotNumeric(part.to_owned()));
            }
            in_range(value.trunc() as i64, u32::MAX)
        })
        .collect()
}

/// Parse an integer level in `0..=value_range`.
pub fn parse_brightness(payload: &[u8], value_range: u32) -> Result<u32, ParseError> {
    let text = as_text(payload)?;
    let value: i64 = text
        .parse()
        .map_err(|_| ParseError::NotNumeric(text.to_owned()))?;
    in_range(value, value_range)
}

/// Map a raw level to a 12-bit output, scaled by `brightness` (0.0..=1.0).
///
/// ```text
/// out = level / value_range × 4095 × brightness      (truncated)
/// ```
pub fn scale(level: u32, value_range: u32, brightness: f64) -> u16 {
    if value_range == 0 {
        return 0;
    }
    let out = f64::from(level) / f64::from(value_range) * 4095.0 * brightness;
    out.clamp(0.0, 4095.0) as u16
}

fn as_text(payload: &[u8]) -> Result<&str, ParseError> {
    core::str::from_utf8(payload)
        .map(str::trim)
        .map_err(|_| ParseError::NotUtf8)
}

fn in_range(value: i64, max: u32) -> Result<u32, ParseError> {
    if value < 0 || value > i64::from(max) {
        return Err(ParseError::OutOfRange { value, max });
    }
    Ok(value as u32)
}
