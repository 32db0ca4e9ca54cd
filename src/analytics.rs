//! Best-effort analytics sink.
//!
//! Lifecycle handlers report product events after the business operation
//! commits. Delivery is fire-and-forget: implementations must never fail the
//! caller, and the control plane never awaits durability.

use std::sync::Mutex;

use async_trait::async_trait;

/// One named parameter attached to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventParam {
    pub name: String,
    pub value: String,
}

impl EventParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        EventParam {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Sink for product analytics events. Failures are swallowed inside the
/// implementation.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Report an event with no parameters.
    async fn send_event(&self, user: &str, event: &str);

    /// Report an event with parameters.
    async fn send_event_with_params(&self, user: &str, params: &[EventParam], event: &str);
}

/// Sink that drops every event; the default when analytics are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnalytics;

#[async_trait]
impl AnalyticsSink for NoopAnalytics {
    async fn send_event(&self, _user: &str, _event: &str) {}

    async fn send_event_with_params(&self, _user: &str, _params: &[EventParam], _event: &str) {}
}

/// Sink that records events in memory, for tests.
#[derive(Debug, Default)]
pub struct RecordingAnalytics {
    events: Mutex<Vec<(String, String)>>,
}

impl RecordingAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(user, event)` pairs in arrival order.
    pub fn events(&self) -> Vec<(String, String)> {
        self.events.lock().expect("event log poisoned").clone()
    }
}

#[async_trait]
impl AnalyticsSink for RecordingAnalytics {
    async fn send_event(&self, user: &str, event: &str) {
        self.events
            .lock()
            .expect("event log poisoned")
            .push((user.to_string(), event.to_string()));
    }

    async fn send_event_with_params(&self, user: &str, _params: &[EventParam], event: &str) {
        self.send_event(user, event).await;
    }
}
