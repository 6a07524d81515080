//! PIR motion sensor on a digital input.
//!
//! Polled once per second. A reading that differs from the previous one
//! is published as `"ON"` / `"OFF"` on `<base_topic>/<id>` (QoS 0, not
//! retained). The very first poll always publishes, since there is no
//! previous state to compare against.
//!
//! If a publish fails the previous state is left untouched, so the same
//! edge is retried on the next poll.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embedded_hal::digital::InputPin;
use log::{debug, info, warn};

use crate::app::commands::{OFF, ON, state_topic};
use crate::app::ports::{QoS, Transport};
use crate::app::router::CommandRouter;
use crate::signal::{self, Notify};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct PirSensor<I> {
    name: String,
    id: String,
    topic: String,
    pin: I,
    last: Option<bool>,
}

impl<I: InputPin> PirSensor<I> {
    pub fn new(name: &str, id: &str, base_topic: &str, pin: I) -> Self {
        let topic = state_topic(base_topic, id);
        info!("PIR '{}' (id={}) publishing to {}", name, id, topic);
        Self {
            name: name.to_owned(),
            id: id.to_owned(),
            topic,
            pin,
            last: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Last published state (`None` until the first successful publish).
    pub fn last_state(&self) -> Option<bool> {
        self.last
    }

    /// Read the pin once. Returns the new state if it changed.
    ///
    /// Read errors are logged and reported as "no change".
    pub fn poll(&mut self) -> Option<bool> {
        let active = match self.pin.is_high() {
            Ok(level) => level,
            Err(e) => {
                warn!("PIR '{}': input read failed: {:?}", self.id, e);
                return None;
            }
        };
        (self.last != Some(active)).then_some(active)
    }

    /// Poll and publish an edge, if any. Returns `true` if something was
    /// published.
    pub fn poll_and_publish<T: Transport>(&mut self, router: &CommandRouter<T>) -> bool {
        let Some(active) = self.poll() else {
            return false;
        };
        let payload = if active { ON } else { OFF };
        match router.publish(&self.topic, payload, QoS::AtMostOnce, false) {
            Ok(()) => {
                debug!("PIR '{}': state changed to {}", self.id, if active { "ON" } else { "OFF" });
                self.last = Some(active);
                true
            }
            Err(e) => {
                warn!("PIR '{}': publish failed, retrying next poll: {}", self.id, e);
                false
            }
        }
    }
}

impl<I> PirSensor<I>
where
    I: InputPin + Send + 'static,
{
    /// Run the polling loop on its own thread until the returned handle
    /// is stopped.
    pub fn spawn<T: Transport + 'static>(
        mut self,
        router: Arc<CommandRouter<T>>,
        interval: Duration,
    ) -> std::io::Result<SensorHandle> {
        let stop = Arc::new(Notify::new());
        let stopped = Arc::clone(&stop);
        let id = self.id.clone();
        let handle = thread::Builder::new()
            .name(format!("pir-{}", self.id))
            .spawn(move || {
                loop {
                    self.poll_and_publish(&router);
                    // The stop signal doubles as the poll sleep.
                    if signal::wait_for(&stopped, interval).is_some() {
                        break;
                    }
                }
                debug!("PIR '{}': polling stopped", self.id);
            })?;

        Ok(SensorHandle { id, stop, handle })
    }
}

/// Owner of a running sensor thread.
pub struct SensorHandle {
    id: String,
    stop: Arc<Notify<()>>,
    handle: JoinHandle<()>,
}

impl SensorHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Wake the polling thread, tell it to exit and join it.
    pub fn stop(self) {
        self.stop.signal(());
        if self.handle.join().is_err() {
            warn!("PIR '{}': polling thread panicked", self.id);
        }
    }
}
