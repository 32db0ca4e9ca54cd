//! In-memory stream engine.
//!
//! Streams are maps of sequence-numbered messages; durable consumers are
//! bare filter records. Batch requests deliver synchronously through the
//! paired [`MemoryPubSub`], following the same topology the control plane
//! sees against a real substrate: deliveries land on the caller's reply
//! subject and carry `$JS.ACK…` ack-reply subjects.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::wire::{subject_matches, Delivery, MemoryPubSub};

use super::{
    ack_reply_subject, ConsumerConfig, ConsumerGroupInfo, EngineError, EngineResult, StoredMessage,
    StreamConfig, StreamEngine, StreamInfo,
};

#[derive(Debug)]
struct MemStream {
    config: StreamConfig,
    next_seq: u64,
    messages: BTreeMap<u64, StoredMessage>,
}

/// In-memory [`StreamEngine`] paired with a [`MemoryPubSub`] for deliveries.
pub struct MemoryStreamEngine {
    pubsub: Arc<MemoryPubSub>,
    streams: RwLock<HashMap<String, MemStream>>,
    consumers: RwLock<HashMap<(String, String), ConsumerConfig>>,
    cg_infos: RwLock<HashMap<(String, String), ConsumerGroupInfo>>,
}

impl MemoryStreamEngine {
    pub fn new(pubsub: Arc<MemoryPubSub>) -> Self {
        MemoryStreamEngine {
            pubsub,
            streams: RwLock::new(HashMap::new()),
            consumers: RwLock::new(HashMap::new()),
            cg_infos: RwLock::new(HashMap::new()),
        }
    }

    // ------------------------------------------------------------------
    // Seeding and inspection helpers (used by tests and demo embedders)
    // ------------------------------------------------------------------

    /// Append a message to a stream, returning its sequence.
    pub async fn seed_message(
        &self,
        stream: &str,
        subject: &str,
        headers: HashMap<String, String>,
        data: Bytes,
        time: DateTime<Utc>,
    ) -> EngineResult<u64> {
        let mut streams = self.streams.write().await;
        let entry = streams
            .get_mut(stream)
            .ok_or_else(|| EngineError::StreamNotFound(stream.to_string()))?;
        let seq = entry.next_seq;
        entry.next_seq += 1;
        entry.messages.insert(
            seq,
            StoredMessage {
                subject: subject.to_string(),
                sequence: seq,
                headers,
                data,
                time,
            },
        );
        Ok(seq)
    }

    /// Whether a stream exists.
    pub async fn has_stream(&self, name: &str) -> bool {
        self.streams.read().await.contains_key(name)
    }

    /// Whether a durable consumer exists.
    pub async fn has_consumer(&self, stream: &str, durable: &str) -> bool {
        self.consumers
            .read()
            .await
            .contains_key(&(stream.to_string(), durable.to_string()))
    }

    /// Number of durable consumers on a stream.
    pub async fn consumer_count(&self, stream: &str) -> usize {
        self.consumers
            .read()
            .await
            .keys()
            .filter(|(s, _)| s == stream)
            .count()
    }

    /// Sequences currently held by a stream, in order.
    pub async fn sequences(&self, stream: &str) -> Vec<u64> {
        self.streams
            .read()
            .await
            .get(stream)
            .map(|s| s.messages.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Configuration a stream was created with.
    pub async fn stream_config(&self, name: &str) -> Option<StreamConfig> {
        self.streams.read().await.get(name).map(|s| s.config.clone())
    }

    /// Set the pending counts reported for a consumer group.
    pub async fn set_consumer_group_info(&self, stream: &str, group: &str, info: ConsumerGroupInfo) {
        self.cg_infos
            .write()
            .await
            .insert((stream.to_string(), group.to_string()), info);
    }
}

#[async_trait]
impl StreamEngine for MemoryStreamEngine {
    async fn create_stream(&self, config: StreamConfig) -> EngineResult<()> {
        let mut streams = self.streams.write().await;
        streams.entry(config.name.clone()).or_insert(MemStream {
            config,
            next_seq: 1,
            messages: BTreeMap::new(),
        });
        Ok(())
    }

    async fn delete_stream(&self, name: &str) -> EngineResult<()> {
        let mut streams = self.streams.write().await;
        if streams.remove(name).is_none() {
            return Err(EngineError::StreamNotFound(name.to_string()));
        }
        let mut consumers = self.consumers.write().await;
        consumers.retain(|(stream, _), _| stream != name);
        Ok(())
    }

    async fn stream_info(&self, name: &str) -> EngineResult<StreamInfo> {
        let streams = self.streams.read().await;
        let stream = streams
            .get(name)
            .ok_or_else(|| EngineError::StreamNotFound(name.to_string()))?;
        Ok(StreamInfo {
            messages: stream.messages.len() as u64,
        })
    }

    async fn add_consumer(&self, stream: &str, config: ConsumerConfig) -> EngineResult<()> {
        if !self.streams.read().await.contains_key(stream) {
            return Err(EngineError::StreamNotFound(stream.to_string()));
        }
        self.consumers
            .write()
            .await
            .insert((stream.to_string(), config.durable_name.clone()), config);
        Ok(())
    }

    async fn remove_consumer(&self, stream: &str, durable: &str) -> EngineResult<()> {
        let mut consumers = self.consumers.write().await;
        match consumers.remove(&(stream.to_string(), durable.to_string())) {
            Some(_) => Ok(()),
            None => Err(EngineError::ConsumerNotFound {
                stream: stream.to_string(),
                durable: durable.to_string(),
            }),
        }
    }

    async fn request_batch(
        &self,
        stream: &str,
        durable: &str,
        batch: u64,
        deliver_subject: &str,
    ) -> EngineResult<()> {
        let filter = {
            let consumers = self.consumers.read().await;
            consumers
                .get(&(stream.to_string(), durable.to_string()))
                .map(|c| c.filter_subject.clone())
                .ok_or_else(|| EngineError::ConsumerNotFound {
                    stream: stream.to_string(),
                    durable: durable.to_string(),
                })?
        };

        let matching: Vec<StoredMessage> = {
            let streams = self.streams.read().await;
            let entry = streams
                .get(stream)
                .ok_or_else(|| EngineError::StreamNotFound(stream.to_string()))?;
            entry
                .messages
                .values()
                .filter(|m| filter.is_empty() || subject_matches(&filter, &m.subject))
                .take(batch as usize)
                .cloned()
                .collect()
        };

        let total = matching.len() as u64;
        for (i, msg) in matching.into_iter().enumerate() {
            let delivered = i as u64 + 1;
            let ack_reply = ack_reply_subject(
                stream,
                durable,
                delivered,
                msg.sequence,
                delivered,
                msg.time.timestamp_nanos_opt().unwrap_or_default(),
                total - delivered,
            );
            self.pubsub.deliver_to(
                deliver_subject,
                Delivery {
                    caller: String::new(),
                    subject: msg.subject.clone(),
                    reply: ack_reply,
                    headers: msg.headers.clone(),
                    payload: msg.data.clone(),
                },
            );
        }

        Ok(())
    }

    async fn get_message(&self, stream: &str, seq: u64) -> EngineResult<StoredMessage> {
        let streams = self.streams.read().await;
        let entry = streams
            .get(stream)
            .ok_or_else(|| EngineError::StreamNotFound(stream.to_string()))?;
        entry
            .messages
            .get(&seq)
            .cloned()
            .ok_or(EngineError::MessageNotFound {
                stream: stream.to_string(),
                seq,
            })
    }

    async fn delete_message(&self, stream: &str, seq: u64) -> EngineResult<()> {
        let mut streams = self.streams.write().await;
        let entry = streams
            .get_mut(stream)
            .ok_or_else(|| EngineError::StreamNotFound(stream.to_string()))?;
        entry
            .messages
            .remove(&seq)
            .map(|_| ())
            .ok_or(EngineError::MessageNotFound {
                stream: stream.to_string(),
                seq,
            })
    }

    async fn consumer_group_info(
        &self,
        stream: &str,
        group: &str,
    ) -> EngineResult<ConsumerGroupInfo> {
        Ok(self
            .cg_infos
            .read()
            .await
            .get(&(stream.to_string(), group.to_string()))
            .copied()
            .unwrap_or_default())
    }
}
