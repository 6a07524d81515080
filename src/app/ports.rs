//! Port traits — the hexagonal boundary between the controller core and
//! the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PwmBus / CommandRouter (domain)
//! ```
//!
//! Driven adapters (PCA9685 board, MQTT client) implement these traits.
//! The core consumes them via generics, so device logic never touches
//! hardware or sockets directly and can be tested with recording mocks.
//!
//! Digital inputs use [`embedded_hal::digital::InputPin`] directly; no
//! extra port is needed there.

use crate::error::{BusError, TransportError};

// ───────────────────────────────────────────────────────────────
// PWM port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Raw register-level write to one PWM output.
///
/// Implementations perform exactly one physical write per call and do
/// no range checking; [`PwmBus`](crate::drivers::pwm_bus::PwmBus) validates
/// and serializes before calling in.
pub trait PwmPort: Send {
    /// Set `channel` (0–15) to `value` (0–4095).
    fn set_channel(&mut self, channel: u8, value: u16) -> Result<(), BusError>;
}

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain ↔ pub/sub broker)
// ───────────────────────────────────────────────────────────────

/// Delivery guarantee requested for a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Outbound half of the pub/sub collaborator.
///
/// The inbound half (connect, disconnect, message) is pushed into
/// [`CommandRouter`](crate::app::router::CommandRouter) by the adapter's
/// event loop.
pub trait Transport: Send + Sync {
    /// Issue a live subscribe on the broker.
    fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Publish `payload` to `topic`.
    fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool)
    -> Result<(), TransportError>;

    /// Close the session. Further calls may fail.
    fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
