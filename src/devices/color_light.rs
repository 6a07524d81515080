//! Multi-channel light with color, brightness and power.
//!
//! State machine (initial state OFF):
//!
//! ```text
//!             power "ON"                       color / brightness
//!   ┌─────┐ ─────────────▶ ┌────┐             ┌──────────────────┐
//!   │ OFF │                │ ON │ ◀───────────┘ store + fade     │
//!   └─────┘ ◀───────────── └────┘
//!     │    power (other)     fade to target(last_color, last_brightness)
//!     └─ color / brightness: store only
//! ```
//!
//! Powering off fades to zero but keeps `last_color` and
//! `last_brightness`, so the next power-on restores the previous look.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info, warn};

use super::{Device, DeviceKind, LightState};
use crate::app::commands::{DeviceCommand, Suffix, command_topic, scale};
use crate::app::ports::{PwmPort, Transport};
use crate::app::router::{CommandRouter, callback};
use crate::control::fade::{ChannelList, FadeEngine};
use crate::drivers::pwm_bus::PwmBus;
use crate::error::Result;

pub struct ColorLight<P: PwmPort + 'static> {
    name: String,
    id: String,
    base_topic: String,
    value_range: u32,
    state: Mutex<LightState>,
    fade: FadeEngine<P>,
}

impl<P: PwmPort + 'static> ColorLight<P> {
    pub fn new(
        name: &str,
        id: &str,
        base_topic: &str,
        channels: ChannelList,
        value_range: u32,
        bus: Arc<PwmBus<P>>,
    ) -> Self {
        Self::with_engine(name, id, base_topic, value_range, FadeEngine::new(id, bus, channels))
    }

    /// Build around a preconfigured engine (custom fade pacing).
    pub fn with_engine(
        name: &str,
        id: &str,
        base_topic: &str,
        value_range: u32,
        fade: FadeEngine<P>,
    ) -> Self {
        info!(
            "ColorLight '{}' (id={}) on channels {:?}, topic {}/{}, range {}",
            name,
            id,
            fade.channels(),
            base_topic,
            id,
            value_range
        );
        Self {
            name: name.to_owned(),
            id: id.to_owned(),
            base_topic: base_topic.to_owned(),
            value_range,
            state: Mutex::new(LightState::new(fade.channels().len(), 0.0)),
            fade,
        }
    }

    /// Register the power, color and brightness callbacks.
    pub fn attach<T: Transport>(self: &Arc<Self>, router: &CommandRouter<T>) {
        for suffix in [Suffix::Power, Suffix::Color, Suffix::Brightness] {
            let light = Arc::clone(self);
            router.subscribe(
                &command_topic(&self.base_topic, &self.id, suffix),
                callback(move |payload| light.on_payload(suffix, payload)),
            );
        }
    }

    /// Parse and apply a raw payload. Failures are logged, never raised.
    pub fn on_payload(&self, suffix: Suffix, payload: &[u8]) {
        let cmd = match DeviceCommand::parse(suffix, payload, self.fade.channels().len(), self.value_range) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("ColorLight '{}': ignoring {} command: {}", self.id, suffix, e);
                return;
            }
        };
        if let Err(e) = self.apply(cmd) {
            error!("ColorLight '{}': {}", self.id, e);
        }
    }

    /// Update logical state and start the matching fade.
    pub fn apply(&self, cmd: DeviceCommand) -> Result<()> {
        debug!("ColorLight '{}': {:?}", self.id, cmd);
        let mut state = self.lock_state();
        match cmd {
            DeviceCommand::Power(on) => {
                state.power_on = on;
                if on {
                    self.fade_to(&state.last_color, state.last_brightness)
                } else {
                    self.fade_to(&state.last_color, 0.0)
                }
            }
            DeviceCommand::Color(color) => {
                state.last_color = color;
                self.fade_if_on(&state)
            }
            DeviceCommand::Brightness(level) => {
                state.last_brightness = f64::from(level) / f64::from(self.value_range);
                self.fade_if_on(&state)
            }
        }
    }

    /// Output each channel would settle at for the given state.
    pub fn target(&self, color: &[u32], brightness: f64) -> Vec<u16> {
        color
            .iter()
            .map(|&c| scale(c, self.value_range, brightness))
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_range(&self) -> u32 {
        self.value_range
    }

    pub fn last_color(&self) -> Vec<u32> {
        self.lock_state().last_color.clone()
    }

    pub fn last_brightness(&self) -> f64 {
        self.lock_state().last_brightness
    }

    /// Block until the running fade finishes.
    pub fn wait(&self) {
        self.fade.wait();
    }

    fn fade_if_on(&self, state: &LightState) -> Result<()> {
        if state.power_on {
            self.fade_to(&state.last_color, state.last_brightness)
        } else {
            Ok(())
        }
    }

    fn fade_to(&self, color: &[u32], brightness: f64) -> Result<()> {
        self.fade.start_fade(&self.target(color, brightness))
    }

    fn lock_state(&self) -> MutexGuard<'_, LightState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl<P: PwmPort + 'static> Device for ColorLight<P> {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::ColorLight
    }

    fn is_on(&self) -> bool {
        self.lock_state().power_on
    }

    fn is_fading(&self) -> bool {
        self.fade.is_fading()
    }

    fn current_output(&self) -> Vec<u16> {
        self.fade.current_output()
    }

    fn channels(&self) -> &[u8] {
        self.fade.channels()
    }

    fn stop(&self) -> Result<()> {
        self.fade.stop().map(|_| ())
    }
}
