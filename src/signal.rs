//! One-shot notifications between plain threads.
//!
//! Thin layer over `embassy-sync`'s [`Signal`]: the sending side calls
//! `signal`, the receiving thread blocks in [`wait_for`] with an upper
//! bound supplied by `embassy-time`.

use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

pub type Notify<T> = Signal<CriticalSectionRawMutex, T>;

/// Block until `notify` fires, or `timeout` passes (`None`).
///
/// Takes the value, so a second call waits for the next `signal`.
pub fn wait_for<T: Send>(notify: &Notify<T>, timeout: Duration) -> Option<T> {
    let limit = embassy_time::Duration::from_micros(timeout.as_micros() as u64);
    futures_lite::future::block_on(embassy_time::with_timeout(limit, notify.wait())).ok()
}
