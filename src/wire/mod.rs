//! Pub/sub substrate facade.
//!
//! The control plane talks to the outside world over a subject-addressed
//! pub/sub wire: control requests arrive on queue-group subscriptions,
//! replies and notifications go out as plain publishes. This module owns
//! the facade trait, the delivery envelope, and an in-memory substrate used
//! by the test suite and demo embedders.
//!
//! Defining the wire format of the substrate itself is out of scope; the
//! facade only assumes subjects, queue groups, and reply subjects.

pub mod requests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error as ThisError;

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// An opaque substrate failure.
#[derive(Debug, Clone, ThisError)]
#[error("wire error: {0}")]
pub struct WireError(pub String);

/// One message delivered to a subscription.
///
/// The payload buffer may be reused by the substrate after the handler
/// returns; handlers that keep it must copy it first.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Identity of the publishing client, empty when unknown.
    pub caller: String,
    /// Subject the message was published on.
    pub subject: String,
    /// Reply subject, empty when the publisher expects no reply.
    pub reply: String,
    /// Message headers.
    pub headers: HashMap<String, String>,
    /// Message body.
    pub payload: Bytes,
}

/// Callback invoked for each delivery on a subscription.
pub type DeliveryHandler = Arc<dyn Fn(Delivery) + Send + Sync>;

/// Handle for cancelling a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Subject-addressed pub/sub with queue groups and request/reply.
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Deliver every message on `subject` to `handler`.
    async fn subscribe(&self, subject: &str, handler: DeliveryHandler)
        -> WireResult<SubscriptionId>;

    /// Deliver each message on `subject` to exactly one subscriber of
    /// `queue_group`.
    async fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
        handler: DeliveryHandler,
    ) -> WireResult<SubscriptionId>;

    /// Cancel a subscription. Unknown ids are a no-op.
    async fn unsubscribe(&self, sid: SubscriptionId) -> WireResult<()>;

    /// Publish a message.
    async fn publish(&self, subject: &str, payload: Bytes) -> WireResult<()>;

    /// Publish a message with headers.
    async fn publish_with_headers(
        &self,
        subject: &str,
        headers: &HashMap<String, String>,
        payload: Bytes,
    ) -> WireResult<()>;

    /// Publish a request carrying a reply subject and a caller identity.
    async fn request(
        &self,
        subject: &str,
        reply: &str,
        payload: Bytes,
        caller: &str,
    ) -> WireResult<()>;
}

/// Match a subject against a subscription filter.
///
/// Filters use the usual hierarchical wildcards: `*` matches exactly one
/// token, a trailing `>` matches one or more remaining tokens.
pub fn subject_matches(filter: &str, subject: &str) -> bool {
    let mut filter_tokens = filter.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (filter_tokens.next(), subject_tokens.next()) {
            (None, None) => return true,
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => continue,
            (Some(f), Some(s)) if f == s => continue,
            _ => return false,
        }
    }
}

// =============================================================================
// In-memory substrate
// =============================================================================

/// A message observed on the in-memory wire, kept for test assertions.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub caller: String,
    pub subject: String,
    pub reply: String,
    pub headers: HashMap<String, String>,
    pub payload: Bytes,
}

struct SubEntry {
    sid: SubscriptionId,
    subject: String,
    queue_group: Option<String>,
    handler: DeliveryHandler,
}

/// In-process pub/sub substrate.
///
/// Routing is synchronous: publishing invokes matching handlers inline, with
/// queue groups load-balanced round-robin. Every publish is also recorded in
/// a log the test suite asserts against.
#[derive(Default)]
pub struct MemoryPubSub {
    subs: RwLock<Vec<SubEntry>>,
    published: Mutex<Vec<PublishedMessage>>,
    next_sid: AtomicU64,
    rr: AtomicUsize,
}

impl MemoryPubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().expect("publish log poisoned").clone()
    }

    /// Messages published on one subject, in order.
    pub fn published_to(&self, subject: &str) -> Vec<PublishedMessage> {
        self.published()
            .into_iter()
            .filter(|m| m.subject == subject)
            .collect()
    }

    /// Publish a request and await the first reply.
    ///
    /// Test-side counterpart of the dispatcher's reply guarantee.
    pub async fn request_once(
        &self,
        subject: &str,
        payload: Bytes,
        caller: &str,
        timeout: Duration,
    ) -> WireResult<Bytes> {
        let inbox = format!("_inbox.{}", crate::nuid::next());
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Bytes>(1);
        let sid = self
            .subscribe(
                &inbox,
                Arc::new(move |delivery: Delivery| {
                    let _ = tx.try_send(delivery.payload);
                }),
            )
            .await?;

        self.request(subject, &inbox, payload, caller).await?;

        let reply = tokio::time::timeout(timeout, rx.recv()).await;
        let _ = self.unsubscribe(sid).await;

        match reply {
            Ok(Some(payload)) => Ok(payload),
            _ => Err(WireError(format!("no reply on {subject} within {timeout:?}"))),
        }
    }

    /// Route a delivery to the subscribers of `route`, preserving the
    /// delivery's own subject. The in-memory stream engine uses this for
    /// batch deliveries, where the routed subject (the reply inbox) differs
    /// from the message's original subject.
    pub(crate) fn deliver_to(&self, route: &str, delivery: Delivery) {
        let handlers = self.matching_handlers(route);
        for handler in handlers {
            handler(delivery.clone());
        }
    }

    fn matching_handlers(&self, subject: &str) -> Vec<DeliveryHandler> {
        let subs = self.subs.read().expect("subscription table poisoned");

        let mut handlers: Vec<DeliveryHandler> = Vec::new();
        let mut groups: HashMap<&str, Vec<&SubEntry>> = HashMap::new();

        for entry in subs.iter().filter(|e| subject_matches(&e.subject, subject)) {
            match &entry.queue_group {
                None => handlers.push(entry.handler.clone()),
                Some(group) => groups.entry(group.as_str()).or_default().push(entry),
            }
        }

        // Exactly one member of each queue group sees the message.
        for members in groups.into_values() {
            let idx = self.rr.fetch_add(1, Ordering::Relaxed) % members.len();
            handlers.push(members[idx].handler.clone());
        }

        handlers
    }

    fn record(&self, message: PublishedMessage) {
        self.published
            .lock()
            .expect("publish log poisoned")
            .push(message);
    }

    fn dispatch(&self, caller: &str, subject: &str, reply: &str, headers: HashMap<String, String>, payload: Bytes) {
        self.record(PublishedMessage {
            caller: caller.to_string(),
            subject: subject.to_string(),
            reply: reply.to_string(),
            headers: headers.clone(),
            payload: payload.clone(),
        });

        let delivery = Delivery {
            caller: caller.to_string(),
            subject: subject.to_string(),
            reply: reply.to_string(),
            headers,
            payload,
        };
        self.deliver_to(subject, delivery);
    }
}

#[async_trait]
impl PubSub for MemoryPubSub {
    async fn subscribe(
        &self,
        subject: &str,
        handler: DeliveryHandler,
    ) -> WireResult<SubscriptionId> {
        let sid = SubscriptionId(self.next_sid.fetch_add(1, Ordering::Relaxed));
        self.subs
            .write()
            .expect("subscription table poisoned")
            .push(SubEntry {
                sid,
                subject: subject.to_string(),
                queue_group: None,
                handler,
            });
        Ok(sid)
    }

    async fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
        handler: DeliveryHandler,
    ) -> WireResult<SubscriptionId> {
        let sid = SubscriptionId(self.next_sid.fetch_add(1, Ordering::Relaxed));
        self.subs
            .write()
            .expect("subscription table poisoned")
            .push(SubEntry {
                sid,
                subject: subject.to_string(),
                queue_group: Some(queue_group.to_string()),
                handler,
            });
        Ok(sid)
    }

    async fn unsubscribe(&self, sid: SubscriptionId) -> WireResult<()> {
        self.subs
            .write()
            .expect("subscription table poisoned")
            .retain(|e| e.sid != sid);
        Ok(())
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> WireResult<()> {
        self.dispatch("", subject, "", HashMap::new(), payload);
        Ok(())
    }

    async fn publish_with_headers(
        &self,
        subject: &str,
        headers: &HashMap<String, String>,
        payload: Bytes,
    ) -> WireResult<()> {
        self.dispatch("", subject, "", headers.clone(), payload);
        Ok(())
    }

    async fn request(
        &self,
        subject: &str,
        reply: &str,
        payload: Bytes,
        caller: &str,
    ) -> WireResult<()> {
        self.dispatch(caller, subject, reply, HashMap::new(), payload);
        Ok(())
    }
}
