//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements / provides   | Connects to                 |
//! |------------|-------------------------|-----------------------------|
//! | `mqtt`     | Transport               | MQTT broker (TCP or WSS)    |
//! | `hardware` | PwmPort, InputPin       | `/dev/i2c-*`, `/dev/gpiochip*` |
//!
//! `hardware` needs the `rpi` feature; everything else builds on any host.

#[cfg(feature = "rpi")]
pub mod hardware;
pub mod mqtt;
