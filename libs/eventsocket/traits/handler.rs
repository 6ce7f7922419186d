//! Consumer interface
//!
//! A session has exactly one [`SessionHandler`]. Each method is one event
//! category; registering a new handler replaces the previous one wholesale.
//! [`Callbacks`] is a handler made of independent closure slots for callers
//! that want to replace a single category at a time.
//!
//! Every method is called synchronously on the session task, in arrival
//! order. There is no queue in front of slow consumers: handlers must return
//! quickly or they stall the receive path for the whole session.

use crate::core::frame::PushEvent;

/// Receiver of session lifecycle notifications and push events
pub trait SessionHandler: Send + 'static {
    /// About to open a physical connection
    fn on_connecting(&mut self) {}

    /// First successful open since creation or since the last clean reset
    fn on_first_connect(&mut self) {}

    /// Reopened after failures without resumption, or the server lost the
    /// logical session; the consumer should resync everything
    fn on_reconnect(&mut self) {}

    /// Reopened a resumable session with a nonzero sequence; the server is
    /// expected to replay the gap
    fn on_missed_events(&mut self) {}

    /// Decoded, order-validated push event
    fn on_event(&mut self, _event: &PushEvent) {}

    /// Non-fatal transport error
    fn on_error(&mut self, _error: &str) {}

    /// Physical connection closed
    ///
    /// # Arguments
    /// * `failure_count` - Consecutive failures including this one
    /// * `last_disconnect` - Unix millis of the last recorded disconnect
    fn on_close(&mut self, _failure_count: u32, _last_disconnect: i64) {}
}

/// A handler that ignores everything
#[derive(Debug, Default)]
pub struct NoOpHandler;

impl SessionHandler for NoOpHandler {}

pub type NotifyCallback = Box<dyn FnMut() + Send>;
pub type EventCallback = Box<dyn FnMut(&PushEvent) + Send>;
pub type ErrorCallback = Box<dyn FnMut(&str) + Send>;
pub type CloseCallback = Box<dyn FnMut(u32, i64) + Send>;

/// Handler built from optional per-category closures
///
/// Each setter replaces only its own slot and hands back whatever was
/// registered before.
#[derive(Default)]
pub struct Callbacks {
    connecting: Option<NotifyCallback>,
    first_connect: Option<NotifyCallback>,
    reconnect: Option<NotifyCallback>,
    missed_events: Option<NotifyCallback>,
    event: Option<EventCallback>,
    error: Option<ErrorCallback>,
    close: Option<CloseCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connecting(&mut self, f: impl FnMut() + Send + 'static) -> Option<NotifyCallback> {
        self.connecting.replace(Box::new(f))
    }

    pub fn set_first_connect(&mut self, f: impl FnMut() + Send + 'static) -> Option<NotifyCallback> {
        self.first_connect.replace(Box::new(f))
    }

    pub fn set_reconnect(&mut self, f: impl FnMut() + Send + 'static) -> Option<NotifyCallback> {
        self.reconnect.replace(Box::new(f))
    }

    pub fn set_missed_events(&mut self, f: impl FnMut() + Send + 'static) -> Option<NotifyCallback> {
        self.missed_events.replace(Box::new(f))
    }

    pub fn set_event(
        &mut self,
        f: impl FnMut(&PushEvent) + Send + 'static,
    ) -> Option<EventCallback> {
        self.event.replace(Box::new(f))
    }

    pub fn set_error(&mut self, f: impl FnMut(&str) + Send + 'static) -> Option<ErrorCallback> {
        self.error.replace(Box::new(f))
    }

    pub fn set_close(&mut self, f: impl FnMut(u32, i64) + Send + 'static) -> Option<CloseCallback> {
        self.close.replace(Box::new(f))
    }

    /// Builder-style variants
    pub fn with_connecting(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.set_connecting(f);
        self
    }

    pub fn with_event(mut self, f: impl FnMut(&PushEvent) + Send + 'static) -> Self {
        self.set_event(f);
        self
    }

    pub fn with_first_connect(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.set_first_connect(f);
        self
    }

    pub fn with_reconnect(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.set_reconnect(f);
        self
    }

    pub fn with_missed_events(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.set_missed_events(f);
        self
    }

    pub fn with_close(mut self, f: impl FnMut(u32, i64) + Send + 'static) -> Self {
        self.set_close(f);
        self
    }

    pub fn with_error(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.set_error(f);
        self
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("connecting", &self.connecting.is_some())
            .field("first_connect", &self.first_connect.is_some())
            .field("reconnect", &self.reconnect.is_some())
            .field("missed_events", &self.missed_events.is_some())
            .field("event", &self.event.is_some())
            .field("error", &self.error.is_some())
            .field("close", &self.close.is_some())
            .finish()
    }
}

impl SessionHandler for Callbacks {
    fn on_connecting(&mut self) {
        if let Some(f) = self.connecting.as_mut() {
            f();
        }
    }

    fn on_first_connect(&mut self) {
        if let Some(f) = self.first_connect.as_mut() {
            f();
        }
    }

    fn on_reconnect(&mut self) {
        if let Some(f) = self.reconnect.as_mut() {
            f();
        }
    }

    fn on_missed_events(&mut self) {
        if let Some(f) = self.missed_events.as_mut() {
            f();
        }
    }

    fn on_event(&mut self, event: &PushEvent) {
        if let Some(f) = self.event.as_mut() {
            f(event);
        }
    }

    fn on_error(&mut self, error: &str) {
        if let Some(f) = self.error.as_mut() {
            f(error);
        }
    }

    fn on_close(&mut self, failure_count: u32, last_disconnect: i64) {
        if let Some(f) = self.close.as_mut() {
            f(failure_count, last_disconnect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn setter_returns_previous_slot() {
        let mut callbacks = Callbacks::new();
        assert!(callbacks.set_reconnect(|| {}).is_none());
        assert!(callbacks.set_reconnect(|| {}).is_some());
    }

    #[test]
    fn replacement_only_affects_its_category() {
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let closes = Arc::new(AtomicU32::new(0));

        let mut callbacks = Callbacks::new();
        let f = Arc::clone(&first);
        callbacks.set_first_connect(move || {
            f.fetch_add(1, Ordering::Relaxed);
        });
        let c = Arc::clone(&closes);
        callbacks.set_close(move |count, _| {
            c.store(count, Ordering::Relaxed);
        });

        let s = Arc::clone(&second);
        callbacks.set_first_connect(move || {
            s.fetch_add(1, Ordering::Relaxed);
        });

        SessionHandler::on_first_connect(&mut callbacks);
        SessionHandler::on_close(&mut callbacks, 4, 0);

        assert_eq!(first.load(Ordering::Relaxed), 0);
        assert_eq!(second.load(Ordering::Relaxed), 1);
        assert_eq!(closes.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn builder_chain_sets_connecting_and_error() {
        let connecting = Arc::new(AtomicU32::new(0));
        let errors = Arc::new(Mutex::new(Vec::new()));

        let c = Arc::clone(&connecting);
        let e = Arc::clone(&errors);
        let mut callbacks = Callbacks::new()
            .with_connecting(move || {
                c.fetch_add(1, Ordering::Relaxed);
            })
            .with_error(move |message| e.lock().push(message.to_string()));

        SessionHandler::on_connecting(&mut callbacks);
        SessionHandler::on_connecting(&mut callbacks);
        SessionHandler::on_error(&mut callbacks, "connection refused");

        assert_eq!(connecting.load(Ordering::Relaxed), 2);
        assert_eq!(*errors.lock(), vec!["connection refused".to_string()]);
    }
}
