//! Topic → callback dispatch.
//!
//! [`CommandRouter`] owns the subscription table. Device handlers
//! register closures per topic; the transport adapter pushes connection
//! state changes and inbound messages in.
//!
//! ```text
//!  MQTT event loop ──on_message──▶ CommandRouter ──▶ callbacks (devices)
//!                 ──on_connected─▶   resubscribe every topic
//!  devices / sensors ──publish───▶ CommandRouter ──▶ Transport
//! ```
//!
//! The table is the source of truth for subscriptions: on every
//! (re)connect each known topic is subscribed exactly once, so broker-side
//! session state never matters.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};

use super::ports::{QoS, Transport};
use crate::error::Result;

/// A registered message handler. Identity (pointer equality) is used to
/// ignore duplicate registrations.
pub type Callback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Wrap a closure as a [`Callback`].
pub fn callback(f: impl Fn(&[u8]) + Send + Sync + 'static) -> Callback {
    Arc::new(f)
}

pub struct CommandRouter<T: Transport> {
    transport: T,
    topics: Mutex<HashMap<String, Vec<Callback>>>,
    connected: AtomicBool,
}

impl<T: Transport> CommandRouter<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            topics: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(false),
        }
    }

    /// Register `cb` under `topic`.
    ///
    /// Registering the same callback twice is a no-op. When the transport
    /// is connected a live subscribe is issued as well; if that fails the
    /// registration is kept and replayed on the next connect.
    pub fn subscribe(&self, topic: &str, cb: Callback) {
        {
            let mut topics = self.lock_topics();
            let handlers = topics.entry(topic.to_owned()).or_default();
            if !handlers.iter().any(|h| Arc::ptr_eq(h, &cb)) {
                handlers.push(cb);
            }
        }

        if self.is_connected() {
            if let Err(e) = self.transport.subscribe(topic) {
                warn!("Router: live subscribe to '{}' failed: {}", topic, e);
            }
        }
    }

    /// Forward a publish to the transport.
    pub fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<()> {
        self.transport.publish(topic, payload, qos, retain)?;
        Ok(())
    }

    /// Transport reports a (re)established session.
    pub fn on_connected(&self) {
        self.connected.store(true, Ordering::Release);
        info!("Router: connected, resubscribing {} topics", self.topic_count());
        for topic in self.topics() {
            debug!("Router: resubscribing to '{}'", topic);
            if let Err(e) = self.transport.subscribe(&topic) {
                warn!("Router: resubscribe to '{}' failed: {}", topic, e);
            }
        }
    }

    /// Transport reports a lost session.
    pub fn on_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
        warn!("Router: transport disconnected");
    }

    /// Deliver an inbound message to every callback registered for `topic`.
    ///
    /// Callbacks run synchronously on the caller's thread, outside the
    /// table lock. A panicking callback is logged and does not stop
    /// delivery to the others. Returns the number of callbacks invoked.
    pub fn on_message(&self, topic: &str, payload: &[u8]) -> usize {
        let handlers = match self.lock_topics().get(topic) {
            Some(h) => h.clone(),
            None => {
                debug!("Router: no handlers for '{}'", topic);
                return 0;
            }
        };

        for handler in &handlers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| handler(payload)));
            if result.is_err() {
                error!("Router: handler for '{}' panicked", topic);
            }
        }
        handlers.len()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Every registered topic, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.lock_topics().keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn topic_count(&self) -> usize {
        self.lock_topics().len()
    }

    /// Number of distinct callbacks registered under `topic`.
    pub fn handler_count(&self, topic: &str) -> usize {
        self.lock_topics().get(topic).map_or(0, Vec::len)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn lock_topics(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Callback>>> {
        self.topics.lock().unwrap_or_else(|p| p.into_inner())
    }
}
