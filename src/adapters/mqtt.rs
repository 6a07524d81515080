//! MQTT adapter built on `rumqttc`'s blocking client.
//!
//! Split into two halves:
//!
//! - [`MqttTransport`] implements [`Transport`]; handlers publish and the
//!   router subscribes through it.
//! - [`MqttEventLoop`] drives the connection on its own thread and pushes
//!   connect / disconnect / message notifications into the
//!   [`CommandRouter`].
//!
//! Requests use the non-blocking `try_*` calls so the router can
//! resubscribe from inside the event-loop thread without deadlocking on
//! its own request queue.
//!
//! ## Reconnection policy
//!
//! On a connection error the loop waits an exponential backoff
//! (1 s → 2 s → 4 s … capped at 30 s) and then lets `rumqttc` reconnect.
//! A successful CONNACK resets the backoff.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet};

use crate::app::ports::{QoS, Transport};
use crate::app::router::CommandRouter;
use crate::config::{MqttConfig, Protocol};
use crate::error::TransportError;

/// Capacity of the client → event loop request queue.
const REQUEST_CAPACITY: usize = 256;

const INITIAL_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 30;

/// Delay before reconnect attempt `attempt` (0-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = INITIAL_BACKOFF_SECS
        .checked_shl(attempt)
        .unwrap_or(MAX_BACKOFF_SECS)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

/// Build client options for `config`.
///
/// WebSockets always run over TLS with the platform's default roots and
/// the conventional `/mqtt` path.
pub fn options(config: &MqttConfig) -> MqttOptions {
    let mut opts = match config.protocol {
        Protocol::Tcp => MqttOptions::new(&config.client_id, &config.host, config.port),
        Protocol::Websockets => {
            let url = format!("wss://{}:{}/mqtt", config.host, config.port);
            let mut opts = MqttOptions::new(&config.client_id, url, config.port);
            opts.set_transport(rumqttc::Transport::wss_with_default_config());
            opts
        }
    };
    opts.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
    opts
}

/// Create a client for `config`. Nothing touches the network until the
/// returned event loop is run.
pub fn connect(config: &MqttConfig) -> (MqttTransport, MqttEventLoop) {
    let (client, connection) = Client::new(options(config), REQUEST_CAPACITY);
    let stopping = Arc::new(AtomicBool::new(false));
    info!(
        "MQTT: broker {}:{} ({:?}), client id '{}'",
        config.host, config.port, config.protocol, config.client_id
    );
    (
        MqttTransport {
            client,
            stopping: Arc::clone(&stopping),
        },
        MqttEventLoop {
            connection,
            stopping,
            broker: format!("{}:{}", config.host, config.port),
        },
    )
}

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

// ───────────────────────────────────────────────────────────────
// Outbound half
// ───────────────────────────────────────────────────────────────

pub struct MqttTransport {
    client: Client,
    stopping: Arc<AtomicBool>,
}

impl Transport for MqttTransport {
    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.client
            .try_subscribe(topic, rumqttc::QoS::AtMostOnce)
            .map_err(|e| TransportError::SubscribeFailed(e.to_string()))
    }

    fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<(), TransportError> {
        self.client
            .try_publish(topic, to_mqtt_qos(qos), retain, payload.to_vec())
            .map_err(|e| TransportError::PublishFailed(e.to_string()))
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        self.stopping.store(true, Ordering::Release);
        self.client
            .try_disconnect()
            .map_err(|_| TransportError::Disconnected)
    }
}

// ───────────────────────────────────────────────────────────────
// Inbound half
// ───────────────────────────────────────────────────────────────

pub struct MqttEventLoop {
    connection: Connection,
    stopping: Arc<AtomicBool>,
    broker: String,
}

impl MqttEventLoop {
    /// Drive the connection until the transport is disconnected.
    pub fn run<T: Transport>(mut self, router: &CommandRouter<T>) {
        let mut attempt: u32 = 0;

        for notification in self.connection.iter() {
            match notification {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("MQTT: connected to {} ({:?})", self.broker, ack.code);
                    attempt = 0;
                    router.on_connected();
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!("MQTT: message on '{}' ({} bytes)", publish.topic, publish.payload.len());
                    router.on_message(&publish.topic, &publish.payload);
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    router.on_disconnected();
                }
                Ok(_) => {}
                Err(e) => {
                    if self.stopping.load(Ordering::Acquire) {
                        break;
                    }
                    if router.is_connected() {
                        router.on_disconnected();
                    }
                    let delay = backoff_delay(attempt);
                    warn!(
                        "MQTT: connection to {} failed: {} (retry in {:?})",
                        self.broker, e, delay
                    );
                    attempt = attempt.saturating_add(1);
                    thread::sleep(delay);
                }
            }
            if self.stopping.load(Ordering::Acquire) && !router.is_connected() {
                break;
            }
        }
        info!("MQTT: event loop stopped");
    }

    /// Run the event loop on a dedicated thread.
    pub fn spawn<T: Transport + 'static>(
        self,
        router: Arc<CommandRouter<T>>,
    ) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("mqtt-event-loop".into())
            .spawn(move || self.run(&router))
    }
}
