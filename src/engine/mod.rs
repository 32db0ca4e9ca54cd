//! Stream engine adapter.
//!
//! The append-only stream substrate is opaque to the control plane: this
//! module defines the facade it is driven through, the configuration types
//! that cross it, and the ack-reply subject convention batch deliveries
//! carry.
//!
//! # Available Implementations
//!
//! - [`MemoryStreamEngine`](memory::MemoryStreamEngine): in-memory engine
//!   used by the test suite and demo embedders
//!
//! # Batch Delivery Convention
//!
//! [`StreamEngine::request_batch`] delivers up to `batch` messages matching
//! a durable consumer's filter subject to a caller-chosen delivery subject.
//! Each delivery keeps the message's original subject and carries an
//! ack-reply subject of the form
//! `$JS.ACK.<stream>.<consumer>.<delivered>.<sseq>.<cseq>.<ts>.<pending>`;
//! publishing an empty payload to it acknowledges the message. The stream
//! sequence and publish timestamp are recovered from that subject with
//! [`ack_reply_info`].

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error as ThisError;

pub use memory::MemoryStreamEngine;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by the stream engine.
#[derive(Debug, Clone, ThisError)]
pub enum EngineError {
    /// The addressed stream does not exist. Several control paths key off
    /// this variant specifically (DLS bootstrap, destroy).
    #[error("stream {0} not found")]
    StreamNotFound(String),

    /// The addressed durable consumer does not exist.
    #[error("consumer {durable} not found on stream {stream}")]
    ConsumerNotFound { stream: String, durable: String },

    /// The addressed sequence is not (or no longer) in the stream.
    #[error("message {seq} not found in stream {stream}")]
    MessageNotFound { stream: String, seq: u64 },

    /// Any other engine failure.
    #[error("engine failure: {0}")]
    Other(String),
}

impl EngineError {
    /// True for the typed stream-not-found error.
    pub fn is_stream_not_found(&self) -> bool {
        matches!(self, EngineError::StreamNotFound(_))
    }
}

/// Where a stream stores its messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamStorage {
    #[default]
    File,
    Memory,
}

/// Configuration for creating a stream.
///
/// Limits are unbounded when zero; at most one limit is set for station
/// streams, derived from the station's retention policy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamConfig {
    pub name: String,
    /// Subjects captured into the stream.
    pub subjects: Vec<String>,
    /// Discard messages older than this many seconds (0 = unbounded).
    pub max_age_secs: i64,
    /// Keep at most this many messages (0 = unbounded).
    pub max_msgs: i64,
    /// Keep at most this many bytes (0 = unbounded).
    pub max_bytes: i64,
    pub storage: StreamStorage,
    pub replicas: i32,
    /// Publish dedup window (0 = disabled).
    pub duplicate_window_ms: i64,
}

/// How a consumer starts reading a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliverPolicy {
    /// From the first available message.
    #[default]
    All,
    /// Only messages published after the consumer was created.
    New,
}

/// How deliveries are acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPolicy {
    /// Every delivery must be acked explicitly.
    #[default]
    Explicit,
    /// Deliveries are considered acked on send.
    None,
}

/// Configuration for creating a durable consumer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConsumerConfig {
    pub durable_name: String,
    pub deliver_policy: DeliverPolicy,
    pub ack_policy: AckPolicy,
    /// Only messages whose subject matches are delivered. Empty matches all.
    pub filter_subject: String,
}

/// A message read out of a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub subject: String,
    pub sequence: u64,
    pub headers: HashMap<String, String>,
    pub data: Bytes,
    pub time: DateTime<Utc>,
}

impl StoredMessage {
    /// Size accounting used by message views: subject + body + headers.
    pub fn size(&self) -> usize {
        let header_len: usize = self.headers.iter().map(|(k, v)| k.len() + v.len()).sum();
        self.subject.len() + self.data.len() + header_len
    }
}

/// Aggregate state of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamInfo {
    /// Messages currently in the stream.
    pub messages: u64,
}

/// Engine-reported delivery state of one consumer group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsumerGroupInfo {
    /// Messages not yet delivered to the group.
    pub num_pending: u64,
    /// Messages delivered but not yet acked.
    pub num_ack_pending: i64,
}

/// Opaque facade over the append-only stream substrate.
#[async_trait]
pub trait StreamEngine: Send + Sync {
    /// Create a stream. Creating an existing stream is a no-op.
    async fn create_stream(&self, config: StreamConfig) -> EngineResult<()>;

    /// Delete a stream and everything in it.
    async fn delete_stream(&self, name: &str) -> EngineResult<()>;

    /// Aggregate state of a stream.
    async fn stream_info(&self, name: &str) -> EngineResult<StreamInfo>;

    /// Create a durable consumer on a stream.
    async fn add_consumer(&self, stream: &str, config: ConsumerConfig) -> EngineResult<()>;

    /// Remove a durable consumer.
    async fn remove_consumer(&self, stream: &str, durable: &str) -> EngineResult<()>;

    /// Deliver up to `batch` messages for `durable` to `deliver_subject`,
    /// following the ack-reply convention described in the module docs.
    async fn request_batch(
        &self,
        stream: &str,
        durable: &str,
        batch: u64,
        deliver_subject: &str,
    ) -> EngineResult<()>;

    /// Read one message by stream sequence.
    async fn get_message(&self, stream: &str, seq: u64) -> EngineResult<StoredMessage>;

    /// Delete one message by stream sequence.
    async fn delete_message(&self, stream: &str, seq: u64) -> EngineResult<()>;

    /// Engine-reported pending counts for a consumer group on a stream.
    async fn consumer_group_info(
        &self,
        stream: &str,
        group: &str,
    ) -> EngineResult<ConsumerGroupInfo>;
}

// =============================================================================
// Ack-reply subject codec
// =============================================================================

/// Build the ack-reply subject for one batch delivery.
pub fn ack_reply_subject(
    stream: &str,
    durable: &str,
    delivered: u64,
    stream_seq: u64,
    consumer_seq: u64,
    timestamp_nanos: i64,
    pending: u64,
) -> String {
    format!("$JS.ACK.{stream}.{durable}.{delivered}.{stream_seq}.{consumer_seq}.{timestamp_nanos}.{pending}")
}

/// Recover the stream sequence and publish time from an ack-reply subject.
///
/// Returns `None` for subjects that do not follow the convention.
pub fn ack_reply_info(reply: &str) -> Option<(u64, DateTime<Utc>)> {
    let tokens: Vec<&str> = reply.split('.').collect();
    if tokens.len() < 9 || tokens[0] != "$JS" || tokens[1] != "ACK" {
        return None;
    }
    let seq: u64 = tokens[5].parse().ok()?;
    let nanos: i64 = tokens[7].parse().ok()?;
    Some((seq, DateTime::from_timestamp_nanos(nanos)))
}
