//! Single-channel dimmable light.
//!
//! Same state machine as [`ColorLight`](super::ColorLight) with one
//! channel and no separate brightness multiplier: the brightness command
//! *is* the stored level.
//!
//! ```text
//! target = level / value_range × 4095
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info, warn};

use super::{Device, DeviceKind, LightState};
use crate::app::commands::{DeviceCommand, Suffix, command_topic, scale};
use crate::app::ports::{PwmPort, Transport};
use crate::app::router::{CommandRouter, callback};
use crate::control::fade::{ChannelList, FadeEngine};
use crate::drivers::pwm_bus::PwmBus;
use crate::error::Result;

pub struct DimmableLight<P: PwmPort + 'static> {
    name: String,
    id: String,
    base_topic: String,
    value_range: u32,
    state: Mutex<LightState>,
    fade: FadeEngine<P>,
}

impl<P: PwmPort + 'static> DimmableLight<P> {
    pub fn new(
        name: &str,
        id: &str,
        base_topic: &str,
        channel: u8,
        value_range: u32,
        bus: Arc<PwmBus<P>>,
    ) -> Self {
        let mut channels = ChannelList::new();
        let _ = channels.push(channel);
        Self::with_engine(name, id, base_topic, value_range, FadeEngine::new(id, bus, channels))
    }

    pub fn with_engine(
        name: &str,
        id: &str,
        base_topic: &str,
        value_range: u32,
        fade: FadeEngine<P>,
    ) -> Self {
        info!(
            "DimmableLight '{}' (id={}) on channel {:?}, topic {}/{}, range {}",
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
            state: Mutex::new(LightState::new(1, 1.0)),
            fade,
        }
    }

    /// Register the power and brightness callbacks.
    pub fn attach<T: Transport>(self: &Arc<Self>, router: &CommandRouter<T>) {
        for suffix in [Suffix::Power, Suffix::Brightness] {
            let light = Arc::clone(self);
            router.subscribe(
                &command_topic(&self.base_topic, &self.id, suffix),
                callback(move |payload| light.on_payload(suffix, payload)),
            );
        }
    }

    pub fn on_payload(&self, suffix: Suffix, payload: &[u8]) {
        let cmd = match DeviceCommand::parse(suffix, payload, 1, self.value_range) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("DimmableLight '{}': ignoring {} command: {}", self.id, suffix, e);
                return;
            }
        };
        if let Err(e) = self.apply(cmd) {
            error!("DimmableLight '{}': {}", self.id, e);
        }
    }

    pub fn apply(&self, cmd: DeviceCommand) -> Result<()> {
        debug!("DimmableLight '{}': {:?}", self.id, cmd);
        let mut state = self.lock_state();
        match cmd {
            DeviceCommand::Power(on) => {
                state.power_on = on;
                let level = if on { state.last_color[0] } else { 0 };
                self.fade_to(level)
            }
            DeviceCommand::Brightness(level) => {
                state.last_color[0] = level;
                if state.power_on {
                    self.fade_to(level)
                } else {
                    Ok(())
                }
            }
            DeviceCommand::Color(_) => {
                warn!("DimmableLight '{}': color commands are not supported", self.id);
                Ok(())
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored raw level, kept across power-off.
    pub fn last_level(&self) -> u32 {
        self.lock_state().last_color[0]
    }

    pub fn wait(&self) {
        self.fade.wait();
    }

    fn fade_to(&self, level: u32) -> Result<()> {
        self.fade.start_fade(&[scale(level, self.value_range, 1.0)])
    }

    fn lock_state(&self) -> MutexGuard<'_, LightState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl<P: PwmPort + 'static> Device for DimmableLight<P> {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::DimmableLight
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
