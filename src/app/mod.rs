//! Application core — command routing and device orchestration.
//!
//! Everything here is hardware-agnostic. Interaction with the PWM board
//! and the broker happens through the **port traits** in [`ports`], so
//! the whole layer is testable with recording mocks.

pub mod commands;
pub mod ports;
pub mod router;
pub mod service;
