//! Dead-letter inspection: fetch-by-filter, ack, resend, and journeys.
//!
//! # Fetch-by-Filter
//!
//! The engine exposes no direct "read all matching a subject" call, so the
//! inspector synthesizes one: create a throwaway durable consumer with a
//! filter subject, request a batch onto a one-shot reply subject, and
//! collect arrivals until the requested amount or a one-second timer, then
//! tear the consumer down. The timer expiring is a normal termination, not
//! an error; consumer cleanup runs on every exit path.
//!
//! The requested amount is the total message count of the DLS stream, not
//! the filtered count. That over-requests on purpose: the filtered count is
//! not cheaply available, and the timer bounds the pass either way.
//!
//! # DLS Entries
//!
//! Each DLS entry records one poisoning of one message by one consumer
//! group (or one schema-validation failure) as a JSON [`DlsMessage`] whose
//! subject embeds its id: `<dlsStream>.<kind>.<internal>~<kind>~<seq>`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::warn;

use crate::constants::{
    dls_resend_subject, dls_stream_name, dls_subject, DLS_FETCH_CONSUMER_PREFIX,
    DLS_FETCH_TIMEOUT, DLS_MSG_SEPARATOR, HEADER_CONNECTION_ID, HEADER_CONNECTION_ID_LEGACY,
    HEADER_PM_ID, HEADER_PM_SEQUENCE, HEADER_PRODUCED_BY, HEADER_PRODUCED_BY_LEGACY,
    INTERNAL_HEADER_PREFIX,
};
use crate::engine::{ack_reply_info, AckPolicy, ConsumerConfig, DeliverPolicy, StoredMessage};
use crate::error::{Error, Result};
use crate::metadata::models::{
    CgMember, DlsMessage, DlsMessageResponse, MessageDetails, MessagePayload, MessageResponse,
    PoisonedCg, ProducerDetails, Station,
};
use crate::station::name::replace_delimiters;
use crate::station::StationName;
use crate::types::{Actor, Id};
use crate::wire::Delivery;

use super::ControlPlane;

// =============================================================================
// DLS message ids
// =============================================================================

/// Which dead-letter bucket an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlsKind {
    /// The message exhausted consumer ack attempts.
    Poison,
    /// The message failed schema validation on produce.
    SchemaverseFailed,
}

impl DlsKind {
    /// Token used in DLS ids and entry subjects.
    pub fn token(&self) -> &'static str {
        match self {
            DlsKind::Poison => "poison",
            DlsKind::SchemaverseFailed => "schemaverse-failed",
        }
    }
}

impl fmt::Display for DlsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl std::str::FromStr for DlsKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "poison" => Ok(DlsKind::Poison),
            "schemaverse-failed" => Ok(DlsKind::SchemaverseFailed),
            other => Err(Error::BadRequest(format!(
                "unknown DLS message kind '{other}'"
            ))),
        }
    }
}

/// Parsed form of a DLS message id:
/// `<internalStation><sep><kind><sep><seq>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlsMessageId {
    pub station_internal: String,
    pub kind: DlsKind,
    pub sequence: u64,
}

impl DlsMessageId {
    pub fn new(station_internal: impl Into<String>, kind: DlsKind, sequence: u64) -> Self {
        DlsMessageId {
            station_internal: station_internal.into(),
            kind,
            sequence,
        }
    }

    pub fn parse(id: &str) -> Result<Self> {
        let parts: Vec<&str> = id.split(DLS_MSG_SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(Error::BadRequest(format!("malformed DLS message id '{id}'")));
        }
        let kind = parts[1].parse()?;
        let sequence = parts[2]
            .parse()
            .map_err(|_| Error::BadRequest(format!("malformed DLS message id '{id}'")))?;
        Ok(DlsMessageId {
            station_internal: parts[0].to_string(),
            kind,
            sequence,
        })
    }
}

impl fmt::Display for DlsMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.station_internal,
            self.kind,
            self.sequence,
            sep = DLS_MSG_SEPARATOR
        )
    }
}

/// Group liveness derived from its members: active iff any member is
/// active, deleted iff every member is deleted.
pub(crate) fn cg_status(members: &[CgMember]) -> (bool, bool) {
    let mut deleted = 0;
    for member in members {
        if member.is_active {
            return (true, false);
        }
        if member.is_deleted {
            deleted += 1;
        }
    }
    if members.len() == deleted {
        return (false, true);
    }
    (false, false)
}

// =============================================================================
// Inspector operations
// =============================================================================

impl ControlPlane {
    /// Acknowledge dead-letter messages: collect every DLS entry matching
    /// each id and delete it from the stream by sequence.
    pub async fn ack_poison_messages(&self, ids: &[String], actor: &Actor) -> Result<()> {
        let Some(first) = ids.first() else {
            return Ok(());
        };
        let station = StationName::from_stream_name(&DlsMessageId::parse(first)?.station_internal);
        let stream = dls_stream_name(station.internal());

        for raw_id in ids {
            let id = DlsMessageId::parse(raw_id)?;
            let filter = dls_subject(id.kind.token(), station.internal(), raw_id);
            let messages = self.fetch_dls_messages(&stream, &filter).await?;

            for message in messages {
                self.engine()
                    .delete_message(&stream, message.sequence)
                    .await?;
            }
        }

        self.analytics()
            .send_event(&actor.username, "user-ack-poison-message")
            .await;

        Ok(())
    }

    /// Re-deliver dead-letter messages: collect every DLS entry matching
    /// each id, decode it, and republish the original payload to the
    /// poisoned consumer group's DLS subject with provenance headers.
    pub async fn resend_poison_messages(&self, ids: &[String], actor: &Actor) -> Result<()> {
        let Some(first) = ids.first() else {
            return Ok(());
        };
        let station = StationName::from_stream_name(&DlsMessageId::parse(first)?.station_internal);
        let stream = dls_stream_name(station.internal());

        for raw_id in ids {
            let id = DlsMessageId::parse(raw_id)?;
            let filter = dls_subject(id.kind.token(), station.internal(), raw_id);
            let messages = self.fetch_dls_messages(&stream, &filter).await?;

            for message in messages {
                let entry: DlsMessage = serde_json::from_slice(&message.data)
                    .map_err(|e| Error::Engine(format!("malformed DLS entry: {e}")))?;

                let station_internal = replace_delimiters(&entry.station_name);
                let cg_internal = replace_delimiters(&entry.poisoned_cg.cg_name);

                let mut headers = entry.message.headers.clone();
                headers.insert(HEADER_PM_ID.to_string(), entry.id.clone());
                headers.insert(HEADER_PM_SEQUENCE.to_string(), message.sequence.to_string());

                let data = hex::decode(&entry.message.data)
                    .map_err(|e| Error::Engine(format!("malformed DLS entry payload: {e}")))?;

                self.wire()
                    .publish_with_headers(
                        &dls_resend_subject(&station_internal, &cg_internal),
                        &headers,
                        data.into(),
                    )
                    .await?;
            }
        }

        self.analytics()
            .send_event(&actor.username, "user-resend-poison-message")
            .await;

        Ok(())
    }

    /// The full journey of one dead-lettered message: the entry itself plus
    /// every consumer group that poisoned it, enriched with live state.
    pub async fn get_dls_message_journey(&self, dls_id: &str) -> Result<DlsMessageResponse> {
        let id = DlsMessageId::parse(dls_id)?;
        let station_name = StationName::from_stream_name(&id.station_internal);
        let station = self
            .store()
            .get_live_station(station_name.external())
            .await?
            .ok_or_else(|| Error::not_found("Station", station_name.external()))?;

        let (poisoned, schema_failed) = self.dls_station_view(&station_name).await?;

        let mut response = poisoned
            .into_iter()
            .find(|m| m.id == dls_id)
            .map(|mut m| {
                m.message
                    .headers
                    .retain(|k, _| !k.starts_with(INTERNAL_HEADER_PREFIX));
                m
            })
            .or_else(|| schema_failed.into_iter().find(|m| m.id == dls_id))
            .ok_or_else(|| Error::not_found("Message", dls_id))?;

        response.poisoned_cgs = self
            .poisoned_cgs_by_message(
                &station_name,
                &station,
                id.sequence,
                &response.producer.name,
                response.message.time_sent,
            )
            .await?;

        Ok(response)
    }

    /// Details of one message, dead-lettered or still in the main stream.
    pub async fn get_message_details(
        &self,
        message_id: &str,
        station_name: &str,
        message_seq: u64,
        is_poison: bool,
    ) -> Result<MessageDetails> {
        if is_poison {
            let journey = self.get_dls_message_journey(message_id).await?;
            return Ok(MessageDetails::Poison(Box::new(journey)));
        }

        let station_name = StationName::from_external(station_name)?;
        let station = self
            .store()
            .get_live_station(station_name.external())
            .await?
            .ok_or_else(|| Error::not_found("Station", station_name.external()))?;

        let stored = self
            .engine()
            .get_message(station_name.internal(), message_seq)
            .await?;

        // Foreign-created stations have no producer bookkeeping to join.
        if !station.is_native {
            return Ok(MessageDetails::Stored(Box::new(MessageResponse {
                message_seq,
                message: MessagePayload {
                    time_sent: stored.time,
                    size: stored.size(),
                    data: hex::encode(&stored.data),
                    headers: HashMap::new(),
                },
                producer: ProducerDetails::default(),
                poisoned_cgs: Vec::new(),
            })));
        }

        let mut headers = stored.headers.clone();
        let (connection_id, produced_by) = required_producer_headers(&headers)?;
        headers.retain(|k, _| !k.starts_with(INTERNAL_HEADER_PREFIX));

        let connection_id = Id::from(connection_id);
        let poisoned_cgs = self
            .poisoned_cgs_by_message(
                &station_name,
                &station,
                stored.sequence,
                &produced_by,
                stored.time,
            )
            .await?;

        let producer = self
            .store()
            .find_producer(&station.id, &produced_by, &connection_id)
            .await?
            .ok_or_else(|| Error::not_found("Producer", produced_by.clone()))?;
        let connection = self
            .store()
            .get_connection(&connection_id)
            .await?
            .ok_or_else(|| Error::not_found("Connection", connection_id.to_string()))?;

        Ok(MessageDetails::Stored(Box::new(MessageResponse {
            message_seq,
            message: MessagePayload {
                time_sent: stored.time,
                size: stored.size(),
                data: hex::encode(&stored.data),
                headers,
            },
            producer: ProducerDetails {
                name: produced_by,
                connection_id,
                client_address: connection.client_address,
                created_by_user: producer.created_by_user,
                is_active: producer.is_active,
                is_deleted: producer.is_deleted,
            },
            poisoned_cgs,
        })))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Synthesized "read all matching a filter subject" over the engine's
    /// batch-request primitive. See the module docs for the protocol.
    pub(crate) async fn fetch_dls_messages(
        &self,
        stream: &str,
        filter_subject: &str,
    ) -> Result<Vec<StoredMessage>> {
        // Conservative upper bound; the fetch timer terminates early.
        let amount = self.engine().stream_info(stream).await?.messages;

        let durable = format!("{DLS_FETCH_CONSUMER_PREFIX}{}", self.nuid().next());
        self.engine()
            .add_consumer(
                stream,
                ConsumerConfig {
                    durable_name: durable.clone(),
                    deliver_policy: DeliverPolicy::All,
                    ack_policy: AckPolicy::Explicit,
                    filter_subject: filter_subject.to_string(),
                },
            )
            .await?;

        let reply = format!("{durable}_reply");
        let (tx, mut rx) = mpsc::channel::<StoredMessage>(amount.max(1) as usize);
        let ack_wire = self.wire();
        let handler = Arc::new(move |delivery: Delivery| {
            // Ack immediately: the engine considers the message consumed
            // only once it is safely buffered here.
            let ack_subject = delivery.reply.clone();
            let wire = ack_wire.clone();
            tokio::spawn(async move {
                let _ = wire.publish(&ack_subject, Bytes::new()).await;
            });

            if let Some((sequence, time)) = ack_reply_info(&delivery.reply) {
                let _ = tx.try_send(StoredMessage {
                    subject: delivery.subject,
                    sequence,
                    headers: delivery.headers,
                    data: delivery.payload,
                    time,
                });
            }
        });

        let sid = match self.wire().subscribe(&reply, handler).await {
            Ok(sid) => sid,
            Err(e) => {
                let _ = self.engine().remove_consumer(stream, &durable).await;
                return Err(e.into());
            }
        };

        let outcome = self
            .collect_batch(stream, &durable, amount, &reply, &mut rx)
            .await;

        // Cleanup runs on success, timeout, and error alike.
        if let Err(e) = self.wire().unsubscribe(sid).await {
            warn!(reply = %reply, error = %e, "failed unsubscribing fetch reply subject");
        }
        self.engine().remove_consumer(stream, &durable).await?;

        outcome
    }

    async fn collect_batch(
        &self,
        stream: &str,
        durable: &str,
        amount: u64,
        reply: &str,
        rx: &mut mpsc::Receiver<StoredMessage>,
    ) -> Result<Vec<StoredMessage>> {
        self.engine()
            .request_batch(stream, durable, amount, reply)
            .await?;

        let mut messages = Vec::new();
        let timeout = tokio::time::sleep(DLS_FETCH_TIMEOUT);
        tokio::pin!(timeout);

        for _ in 0..amount {
            tokio::select! {
                _ = &mut timeout => break,
                received = rx.recv() => match received {
                    Some(message) => messages.push(message),
                    None => break,
                },
            }
        }

        Ok(messages)
    }

    /// Decode every DLS entry of one kind for a station.
    async fn dls_entries(
        &self,
        station_name: &StationName,
        kind: DlsKind,
    ) -> Result<Vec<DlsMessage>> {
        let stream = dls_stream_name(station_name.internal());
        let filter = format!("{stream}.{}.>", kind.token());
        let stored = self.fetch_dls_messages(&stream, &filter).await?;

        let mut entries = Vec::with_capacity(stored.len());
        for message in stored {
            let entry: DlsMessage = serde_json::from_slice(&message.data)
                .map_err(|e| Error::Engine(format!("malformed DLS entry: {e}")))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// The station's DLS content bucketed by kind, with poison entries
    /// joined by message id across the consumer groups that poisoned them.
    pub(crate) async fn dls_station_view(
        &self,
        station_name: &StationName,
    ) -> Result<(Vec<DlsMessageResponse>, Vec<DlsMessageResponse>)> {
        let poison_entries = self.dls_entries(station_name, DlsKind::Poison).await?;
        let schema_entries = self
            .dls_entries(station_name, DlsKind::SchemaverseFailed)
            .await?;

        let mut poisoned: Vec<DlsMessageResponse> = Vec::new();
        for entry in poison_entries {
            match poisoned.iter_mut().find(|m| m.id == entry.id) {
                Some(existing) => existing.poisoned_cgs.push(entry.poisoned_cg),
                None => poisoned.push(response_from_entry(entry)),
            }
        }

        let schema_failed = schema_entries.into_iter().map(response_from_entry).collect();
        Ok((poisoned, schema_failed))
    }

    /// Consumer groups that poisoned one particular message, newest
    /// poisoning first, deduplicated by name and enriched with live state.
    pub(crate) async fn poisoned_cgs_by_message(
        &self,
        station_name: &StationName,
        station: &Station,
        message_seq: u64,
        produced_by: &str,
        time_sent: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<PoisonedCg>> {
        let entries = self.dls_entries(station_name, DlsKind::Poison).await?;

        let mut cgs: Vec<PoisonedCg> = entries
            .iter()
            .filter(|e| {
                e.message_seq == message_seq
                    && e.producer.name == produced_by
                    && e.message.time_sent == time_sent
            })
            .map(|e| e.poisoned_cg.clone())
            .collect();
        cgs.sort_by(|a, b| b.poisoning_time.cmp(&a.poisoning_time));

        let mut seen = HashSet::new();
        let mut enriched = Vec::new();
        for mut cg in cgs {
            if !seen.insert(cg.cg_name.clone()) {
                continue;
            }

            let members = self.consumer_group_members(&station.id, &cg.cg_name).await?;
            let (is_active, is_deleted) = cg_status(&members);
            let info = self
                .engine()
                .consumer_group_info(station_name.internal(), &cg.cg_name)
                .await?;
            let total_poison_messages = entries
                .iter()
                .filter(|e| e.poisoned_cg.cg_name == cg.cg_name)
                .count();

            if let Some(first) = members.first() {
                cg.max_ack_time_ms = first.max_ack_time_ms;
                cg.max_msg_deliveries = first.max_msg_deliveries;
            }
            cg.unprocessed_messages = info.num_pending;
            cg.in_process_messages = info.num_ack_pending;
            cg.total_poison_messages = total_poison_messages;
            cg.cg_members = members;
            cg.is_active = is_active;
            cg.is_deleted = is_deleted;
            enriched.push(cg);
        }

        Ok(enriched)
    }

    /// Members of one consumer group, joined with their connections.
    pub(crate) async fn consumer_group_members(
        &self,
        station_id: &Id,
        group: &str,
    ) -> Result<Vec<CgMember>> {
        let consumers = self.store().consumers_in_group(station_id, group).await?;

        let mut members = Vec::with_capacity(consumers.len());
        for consumer in consumers {
            let client_address = match self.store().get_connection(&consumer.connection_id).await? {
                Some(connection) => connection.client_address,
                None => String::new(),
            };
            members.push(CgMember {
                name: consumer.name,
                client_address,
                is_active: consumer.is_active,
                is_deleted: consumer.is_deleted,
                max_ack_time_ms: consumer.max_ack_time_ms,
                max_msg_deliveries: consumer.max_msg_deliveries,
            });
        }
        Ok(members)
    }
}

/// Required producer headers, with the pre-1.0 fallback names.
fn required_producer_headers(headers: &HashMap<String, String>) -> Result<(String, String)> {
    let mut connection_id = headers.get(HEADER_CONNECTION_ID).cloned().unwrap_or_default();
    let mut produced_by = headers
        .get(HEADER_PRODUCED_BY)
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    if connection_id.is_empty() || produced_by.is_empty() {
        connection_id = headers
            .get(HEADER_CONNECTION_ID_LEGACY)
            .cloned()
            .unwrap_or_default();
        produced_by = headers
            .get(HEADER_PRODUCED_BY_LEGACY)
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        if connection_id.is_empty() || produced_by.is_empty() {
            warn!("message lacks producer headers, SDK too old");
            return Err(Error::HeadersMissing);
        }
    }

    Ok((connection_id, produced_by))
}

fn response_from_entry(entry: DlsMessage) -> DlsMessageResponse {
    DlsMessageResponse {
        id: entry.id,
        station_name: entry.station_name,
        message_seq: entry.message_seq,
        producer: entry.producer,
        message: entry.message,
        creation_date: entry.creation_date,
        poisoned_cgs: vec![entry.poisoned_cg],
    }
}
