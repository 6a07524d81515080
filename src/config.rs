//! Controller configuration.
//!
//! Loaded once at startup from a JSON file and validated before any
//! hardware is touched. Example:
//!
//! ```json
//! {
//!   "mqtt": { "host": "broker.local", "port": 1883, "protocol": "tcp" },
//!   "pwm":  { "i2c_bus": "/dev/i2c-1", "address": 64, "frequency_hz": 1000 },
//!   "devices": [
//!     { "type": "color-light", "name": "Desk", "id": "desk",
//!       "base_topic": "home/lights", "pins": [0, 1, 2], "value_range": 255 },
//!     { "type": "dimmable-light", "name": "Hall", "id": "hall",
//!       "base_topic": "home/lights", "pin": 5, "value_range": 100 },
//!     { "type": "on-off", "name": "Fan", "id": "fan",
//!       "base_topic": "home/switches", "pin": 3 },
//!     { "type": "pir", "name": "Stairs", "id": "stairs",
//!       "base_topic": "home/motion", "gpio": 17 }
//!   ]
//! }
//! ```

use core::fmt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::devices::DeviceKind;
use crate::drivers::pca9685::{DEFAULT_ADDRESS, MAX_FREQUENCY_HZ, MIN_FREQUENCY_HZ};
use crate::drivers::pwm_bus::CHANNEL_MAX;

/// Environment variable consulted when no path is given on the command line.
pub const CONFIG_ENV: &str = "LIGHTCTL_CONFIG";
/// Fallback config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The file could not be read.
    Io(String),
    /// The file is not valid JSON for [`SystemConfig`].
    Parse(String),
    /// The file parsed but describes an unusable setup.
    ValidationFailed(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "cannot read config: {msg}"),
            Self::Parse(msg) => write!(f, "invalid config: {msg}"),
            Self::ValidationFailed(msg) => write!(f, "config rejected: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Complete controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub pwm: PwmConfig,
    #[serde(default)]
    pub gpio: GpioConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    /// MQTT over WebSockets, always with TLS.
    Websockets,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PwmConfig {
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: String,
    /// 7-bit I2C address.
    #[serde(default = "default_address")]
    pub address: u8,
    #[serde(default = "default_frequency")]
    pub frequency_hz: u32,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            i2c_bus: default_i2c_bus(),
            address: default_address(),
            frequency_hz: default_frequency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioConfig {
    #[serde(default = "default_gpio_chip")]
    pub chip: String,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            chip: default_gpio_chip(),
        }
    }
}

fn default_client_id() -> String {
    "lightctl".into()
}

fn default_keep_alive() -> u64 {
    30
}

fn default_i2c_bus() -> String {
    "/dev/i2c-1".into()
}

fn default_address() -> u8 {
    DEFAULT_ADDRESS
}

fn default_frequency() -> u32 {
    1000
}

fn default_gpio_chip() -> String {
    "/dev/gpiochip0".into()
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DeviceConfig {
    ColorLight(ColorLightConfig),
    DimmableLight(DimmableLightConfig),
    OnOff(OnOffConfig),
    Pir(PirConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorLightConfig {
    pub name: String,
    pub id: String,
    pub base_topic: String,
    /// One PWM channel per color component, in payload order.
    pub pins: Vec<u8>,
    pub value_range: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimmableLightConfig {
    pub name: String,
    pub id: String,
    pub base_topic: String,
    pub pin: u8,
    pub value_range: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnOffConfig {
    pub name: String,
    pub id: String,
    pub base_topic: String,
    pub pin: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PirConfig {
    pub name: String,
    pub id: String,
    pub base_topic: String,
    /// GPIO line offset on the configured chip.
    pub gpio: u32,
}

impl DeviceConfig {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::ColorLight(_) => DeviceKind::ColorLight,
            Self::DimmableLight(_) => DeviceKind::DimmableLight,
            Self::OnOff(_) => DeviceKind::OnOff,
            Self::Pir(_) => DeviceKind::Pir,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::ColorLight(c) => &c.name,
            Self::DimmableLight(c) => &c.name,
            Self::OnOff(c) => &c.name,
            Self::Pir(c) => &c.name,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::ColorLight(c) => &c.id,
            Self::DimmableLight(c) => &c.id,
            Self::OnOff(c) => &c.id,
            Self::Pir(c) => &c.id,
        }
    }

    pub fn base_topic(&self) -> &str {
        match self {
            Self::ColorLight(c) => &c.base_topic,
            Self::DimmableLight(c) => &c.base_topic,
            Self::OnOff(c) => &c.base_topic,
            Self::Pir(c) => &c.base_topic,
        }
    }

    /// PWM channels claimed by this device (none for sensors).
    pub fn pwm_channels(&self) -> &[u8] {
        match self {
            Self::ColorLight(c) => &c.pins,
            Self::DimmableLight(c) => core::slice::from_ref(&c.pin),
            Self::OnOff(c) => core::slice::from_ref(&c.pin),
            Self::Pir(_) => &[],
        }
    }

    pub fn value_range(&self) -> Option<u32> {
        match self {
            Self::ColorLight(c) => Some(c.value_range),
            Self::DimmableLight(c) => Some(c.value_range),
            Self::OnOff(_) | Self::Pir(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl SystemConfig {
    /// Read, parse and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would fail or misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::ValidationFailed(msg));

        if self.mqtt.host.trim().is_empty() {
            return fail("mqtt.host is empty".into());
        }
        if self.mqtt.port == 0 {
            return fail("mqtt.port must be non-zero".into());
        }
        if !(MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&self.pwm.frequency_hz) {
            return fail(format!(
                "pwm.frequency_hz {} outside {}..={}",
                self.pwm.frequency_hz, MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ
            ));
        }

        let mut claimed: HashSet<u8> = HashSet::new();
        let mut addresses: HashSet<(&str, &str)> = HashSet::new();

        for device in &self.devices {
            let label = format!("{} '{}'", device.kind(), device.name());

            if device.id().trim().is_empty() {
                return fail(format!("{label}: id is empty"));
            }
            if device.base_topic().trim().is_empty() {
                return fail(format!("{label}: base_topic is empty"));
            }
            if !addresses.insert((device.base_topic(), device.id())) {
                return fail(format!(
                    "{label}: {}/{} is used by another device",
                    device.base_topic(),
                    device.id()
                ));
            }
            if device.value_range() == Some(0) {
                return fail(format!("{label}: value_range must be non-zero"));
            }
            if device.kind() != DeviceKind::Pir && device.pwm_channels().is_empty() {
                return fail(format!("{label}: no PWM channels"));
            }
            for &channel in device.pwm_channels() {
                if channel > CHANNEL_MAX {
                    return fail(format!(
                        "{label}: channel {channel} outside 0..={CHANNEL_MAX}"
                    ));
                }
                if !claimed.insert(channel) {
                    return fail(format!("{label}: channel {channel} is already in use"));
                }
            }
        }
        Ok(())
    }
}

/// Resolve the config path: first CLI argument, then `$LIGHTCTL_CONFIG`,
/// then `config.json`.
pub fn resolve_path(arg: Option<String>, env: Option<String>) -> PathBuf {
    let nonempty = |p: &String| !p.is_empty();
    arg.filter(nonempty)
        .or_else(|| env.filter(nonempty))
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
}
