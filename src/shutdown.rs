//! Process-wide stop request.
//!
//! The main thread parks on [`ShutdownSignal::wait`]; the SIGINT/SIGTERM
//! handler (or a test) calls [`ShutdownSignal::trigger`]. Backed by an
//! `embassy-sync` signal, so waiting is a future that can also be
//! polled from async code.

use std::sync::Arc;

use crate::signal::Notify;

#[derive(Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Notify<()>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.inner.signal(());
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.signaled()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn wait(&self) {
        self.inner.wait().await;
    }

    /// Block the current thread until shutdown is requested.
    pub fn block(&self) {
        futures_lite::future::block_on(self.wait());
    }
}
