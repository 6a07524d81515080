//! Binary output. No fade: each power command is one immediate write.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info};

use super::{Device, DeviceKind};
use crate::app::commands::{Suffix, command_topic, parse_power};
use crate::app::ports::{PwmPort, Transport};
use crate::app::router::{CommandRouter, callback};
use crate::drivers::pwm_bus::{PwmBus, VALUE_MAX, VALUE_MIN};
use crate::error::Result;

pub struct OnOff<P: PwmPort + 'static> {
    name: String,
    id: String,
    base_topic: String,
    channel: [u8; 1],
    bus: Arc<PwmBus<P>>,
    on: AtomicBool,
}

impl<P: PwmPort + 'static> OnOff<P> {
    pub fn new(name: &str, id: &str, base_topic: &str, channel: u8, bus: Arc<PwmBus<P>>) -> Self {
        info!(
            "OnOff '{}' (id={}) on channel {}, topic {}/{}",
            name, id, channel, base_topic, id
        );
        Self {
            name: name.to_owned(),
            id: id.to_owned(),
            base_topic: base_topic.to_owned(),
            channel: [channel],
            bus,
            on: AtomicBool::new(false),
        }
    }

    pub fn attach<T: Transport>(self: &Arc<Self>, router: &CommandRouter<T>) {
        let device = Arc::clone(self);
        router.subscribe(
            &command_topic(&self.base_topic, &self.id, Suffix::Power),
            callback(move |payload| device.on_payload(payload)),
        );
    }

    pub fn on_payload(&self, payload: &[u8]) {
        if let Err(e) = self.set(parse_power(payload)) {
            error!("OnOff '{}': {}", self.id, e);
        }
    }

    /// Drive the output. The logical state only changes if the write lands.
    pub fn set(&self, on: bool) -> Result<()> {
        debug!("OnOff '{}': power {}", self.id, if on { "ON" } else { "OFF" });
        self.bus.write_bool(u32::from(self.channel[0]), on)?;
        self.on.store(on, Ordering::Release);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<P: PwmPort + 'static> Device for OnOff<P> {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::OnOff
    }

    fn is_on(&self) -> bool {
        self.on.load(Ordering::Acquire)
    }

    fn current_output(&self) -> Vec<u16> {
        vec![if self.is_on() { VALUE_MAX } else { VALUE_MIN }]
    }

    fn channels(&self) -> &[u8] {
        &self.channel
    }
}
