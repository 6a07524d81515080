//! Mock adapters for integration tests.
//!
//! Every port records what it was asked to do so tests can assert on the
//! full history without touching I2C, GPIO or a broker.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use embedded_hal::digital::{ErrorType, InputPin};
use lightctl::app::ports::{PwmPort, QoS, Transport};
use lightctl::error::{BusError, TransportError};

// ── PWM writes ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PwmWrite {
    pub thread: ThreadId,
    pub channel: u8,
    pub value: u16,
}

/// Shared view of everything a [`MockPwm`] has written.
#[derive(Clone, Default)]
pub struct PwmLog {
    writes: Arc<Mutex<Vec<PwmWrite>>>,
}

#[allow(dead_code)]
impl PwmLog {
    pub fn all(&self) -> Vec<PwmWrite> {
        self.writes.lock().unwrap().clone()
    }

    /// `(channel, value)` pairs in write order.
    pub fn pairs(&self) -> Vec<(u8, u16)> {
        self.all().iter().map(|w| (w.channel, w.value)).collect()
    }

    pub fn for_channel(&self, channel: u8) -> Vec<PwmWrite> {
        self.all().into_iter().filter(|w| w.channel == channel).collect()
    }

    pub fn last_value(&self, channel: u8) -> Option<u16> {
        self.for_channel(channel).last().map(|w| w.value)
    }

    pub fn len(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.writes.lock().unwrap().clear();
    }
}

/// PWM port that records writes and can be told to start failing.
pub struct MockPwm {
    log: PwmLog,
    /// Fail every write once this many have succeeded.
    fail_after: Option<usize>,
}

#[allow(dead_code)]
impl MockPwm {
    pub fn new() -> (Self, PwmLog) {
        let log = PwmLog::default();
        (
            Self {
                log: log.clone(),
                fail_after: None,
            },
            log,
        )
    }

    pub fn failing_after(n: usize) -> (Self, PwmLog) {
        let (mut pwm, log) = Self::new();
        pwm.fail_after = Some(n);
        (pwm, log)
    }
}

impl PwmPort for MockPwm {
    fn set_channel(&mut self, channel: u8, value: u16) -> Result<(), BusError> {
        let mut writes = self.log.writes.lock().unwrap();
        if self.fail_after.is_some_and(|n| writes.len() >= n) {
            return Err(BusError::WriteFailed("simulated NACK".into()));
        }
        writes.push(PwmWrite {
            thread: thread::current().id(),
            channel,
            value,
        });
        Ok(())
    }
}

// ── Transport ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Default)]
pub struct MockTransport {
    pub subscribes: Mutex<Vec<String>>,
    pub published: Mutex<Vec<Published>>,
    pub fail_publish: AtomicBool,
    pub disconnects: AtomicUsize,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn subscribed(&self) -> Vec<String> {
        self.subscribes.lock().unwrap().clone()
    }

    pub fn clear_subscribes(&self) {
        self.subscribes.lock().unwrap().clear();
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    /// Payloads published to `topic`, as strings.
    pub fn payloads_on(&self, topic: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .map(|p| String::from_utf8(p.payload).unwrap())
            .collect()
    }
}

impl Transport for MockTransport {
    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.subscribes.lock().unwrap().push(topic.to_owned());
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<(), TransportError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::PublishFailed("offline".into()));
        }
        self.published.lock().unwrap().push(Published {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
            qos,
            retain,
        });
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Digital input ─────────────────────────────────────────────

/// Input pin whose level the test flips from outside.
#[derive(Clone, Default)]
pub struct MockPin {
    level: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl MockPin {
    pub fn set(&self, high: bool) {
        self.level.store(high, Ordering::SeqCst);
    }
}

impl ErrorType for MockPin {
    type Error = core::convert::Infallible;
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.load(Ordering::SeqCst))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.load(Ordering::SeqCst))
    }
}
