//! lightctl library.
//!
//! Exposes the controller core for integration testing and reuse. The
//! Linux hardware adapter is only built with the `rpi` feature; every
//! other module runs on any host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod devices;
pub mod drivers;
pub mod error;
pub mod sensors;
pub mod shutdown;
pub mod signal;

pub use error::{Error, Result};
