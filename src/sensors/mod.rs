//! Input sensors that publish their state onto the bus.

pub mod pir;

pub use pir::{POLL_INTERVAL, PirSensor, SensorHandle};
