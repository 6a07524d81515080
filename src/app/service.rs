//! Controller — the composition root of the running system.
//!
//! [`Controller`] turns a [`SystemConfig`] into live device
//! handlers, wires their topics into the [`CommandRouter`], starts one
//! polling thread per sensor and tears everything down again on
//! shutdown. All I/O flows through the port traits, so the whole
//! controller runs against mock adapters in tests.
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!  Transport ◀──▶ │ CommandRouter                │
//!                 │   ├─ ColorLight ─┐           │
//!                 │   ├─ DimmableLight ─ FadeEngine ──▶ PwmBus ──▶ PwmPort
//!                 │   ├─ OnOff ──────┘           │
//!  InputPin ────▶ │   └─ PIR thread (publish)    │
//!                 └──────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use embedded_hal::digital::InputPin;
use log::{error, info, warn};

use crate::config::{DeviceConfig, PirConfig, SystemConfig};
use crate::control::fade::ChannelList;
use crate::devices::{ColorLight, Device, DimmableLight, OnOff};
use crate::drivers::pwm_bus::PwmBus;
use crate::error::{Error, Result};
use crate::sensors::{PirSensor, SensorHandle};

use super::ports::{PwmPort, Transport};
use super::router::CommandRouter;

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

pub struct Controller<P: PwmPort + 'static, T: Transport + 'static> {
    bus: Arc<PwmBus<P>>,
    router: Arc<CommandRouter<T>>,
    devices: Vec<Arc<dyn Device>>,
    sensors: Vec<SensorHandle>,
}

impl<P: PwmPort + 'static, T: Transport + 'static> Controller<P, T> {
    /// Build every configured device and register its topics.
    ///
    /// `open_pin` is called once per PIR entry to obtain its input line.
    /// Sensor threads start immediately and poll every `poll_interval`.
    /// The config is validated first; nothing is registered if it fails.
    pub fn build<I, F>(
        config: &SystemConfig,
        bus: Arc<PwmBus<P>>,
        router: Arc<CommandRouter<T>>,
        mut open_pin: F,
        poll_interval: Duration,
    ) -> Result<Self>
    where
        I: InputPin + Send + 'static,
        F: FnMut(&PirConfig) -> Result<I>,
    {
        config
            .validate()
            .map_err(|e| Error::Setup(e.to_string()))?;

        let mut controller = Self {
            bus,
            router,
            devices: Vec::new(),
            sensors: Vec::new(),
        };

        for entry in &config.devices {
            match entry {
                DeviceConfig::ColorLight(c) => {
                    let channels = ChannelList::from_slice(&c.pins).map_err(|()| {
                        Error::Setup(format!("color-light '{}': too many pins", c.name))
                    })?;
                    let light = Arc::new(ColorLight::new(
                        &c.name,
                        &c.id,
                        &c.base_topic,
                        channels,
                        c.value_range,
                        Arc::clone(&controller.bus),
                    ));
                    light.attach(&controller.router);
                    controller.devices.push(light);
                }
                DeviceConfig::DimmableLight(c) => {
                    let light = Arc::new(DimmableLight::new(
                        &c.name,
                        &c.id,
                        &c.base_topic,
                        c.pin,
                        c.value_range,
                        Arc::clone(&controller.bus),
                    ));
                    light.attach(&controller.router);
                    controller.devices.push(light);
                }
                DeviceConfig::OnOff(c) => {
                    let device = Arc::new(OnOff::new(
                        &c.name,
                        &c.id,
                        &c.base_topic,
                        c.pin,
                        Arc::clone(&controller.bus),
                    ));
                    device.attach(&controller.router);
                    controller.devices.push(device);
                }
                DeviceConfig::Pir(c) => {
                    let pin = open_pin(c)?;
                    let sensor = PirSensor::new(&c.name, &c.id, &c.base_topic, pin);
                    let handle = sensor
                        .spawn(Arc::clone(&controller.router), poll_interval)
                        .map_err(|e| Error::Setup(format!("pir '{}': {e}", c.name)))?;
                    controller.sensors.push(handle);
                }
            }
            info!(
                "Created {} device '{}' (id={}, topic={})",
                entry.kind(),
                entry.name(),
                entry.id(),
                entry.base_topic()
            );
        }

        info!(
            "Controller ready: {} outputs, {} sensors, {} topics",
            controller.devices.len(),
            controller.sensors.len(),
            controller.router.topic_count()
        );
        Ok(controller)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn devices(&self) -> &[Arc<dyn Device>] {
        &self.devices
    }

    /// First output device with the given id.
    pub fn device(&self, id: &str) -> Option<Arc<dyn Device>> {
        self.devices.iter().find(|d| d.id() == id).cloned()
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    pub fn router(&self) -> &Arc<CommandRouter<T>> {
        &self.router
    }

    pub fn bus(&self) -> &Arc<PwmBus<P>> {
        &self.bus
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Cancel every running fade and wait for the threads to exit.
    /// Returns the number of devices that failed to stop.
    pub fn stop_all_fades(&self) -> usize {
        let mut failures = 0;
        for device in &self.devices {
            if let Err(e) = device.stop() {
                error!("Device '{}': stop failed: {}", device.id(), e);
                failures += 1;
            }
        }
        failures
    }

    /// Stop fades, stop sensor threads and close the transport.
    pub fn shutdown(self) {
        info!("Controller shutting down");
        let failures = self.stop_all_fades();
        if failures > 0 {
            warn!("{} device(s) did not stop cleanly", failures);
        }
        for sensor in self.sensors {
            sensor.stop();
        }
        if let Err(e) = self.router.transport().disconnect() {
            warn!("Transport disconnect failed: {}", e);
        }
        info!("Controller stopped");
    }
}
