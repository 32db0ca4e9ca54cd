//! Shared test harness: a control plane wired to the in-memory facades.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use roundhouse::analytics::RecordingAnalytics;
use roundhouse::constants::{dls_stream_name, dls_subject};
use roundhouse::control::ControlPlane;
use roundhouse::engine::MemoryStreamEngine;
use roundhouse::metadata::models::{
    Connection, DlsMessage, MessagePayload, PoisonedCg, ProducerDetails, Schema, SchemaVersion,
};
use roundhouse::metadata::MemoryMetadataStore;
use roundhouse::types::Id;
use roundhouse::wire::MemoryPubSub;

pub struct Harness {
    pub control: Arc<ControlPlane>,
    pub store: Arc<MemoryMetadataStore>,
    pub engine: Arc<MemoryStreamEngine>,
    pub wire: Arc<MemoryPubSub>,
    pub analytics: Arc<RecordingAnalytics>,
}

pub fn harness() -> Harness {
    let wire = Arc::new(MemoryPubSub::new());
    let store = Arc::new(MemoryMetadataStore::new());
    let engine = Arc::new(MemoryStreamEngine::new(wire.clone()));
    let analytics = Arc::new(RecordingAnalytics::new());
    let control = Arc::new(
        ControlPlane::new(store.clone(), engine.clone(), wire.clone())
            .with_analytics(analytics.clone()),
    );
    Harness {
        control,
        store,
        engine,
        wire,
        analytics,
    }
}

/// Register a schema with one active version and return its name.
pub async fn seed_schema(store: &MemoryMetadataStore, name: &str, active_version: u32) {
    let schema_id = Id::new();
    let schema = Schema {
        id: schema_id.clone(),
        name: name.to_string(),
        schema_type: "protobuf".to_string(),
    };
    let versions = (1..=active_version)
        .map(|n| SchemaVersion {
            id: Id::new(),
            schema_id: schema_id.clone(),
            version_number: n,
            active: n == active_version,
            schema_content: format!("syntax = \"proto3\"; // v{n}"),
            message_struct_name: "Order".to_string(),
            descriptor: String::new(),
            created_by_user: "root".to_string(),
            creation_date: Utc::now(),
        })
        .collect();
    store.seed_schema(schema, versions).await;
}

/// Register a client connection and return its id.
pub async fn seed_connection(store: &MemoryMetadataStore) -> Id {
    let id = Id::new();
    store
        .seed_connection(Connection {
            id: id.clone(),
            created_by_user: "root".to_string(),
            client_address: "127.0.0.1:50000".to_string(),
            is_active: true,
            creation_date: Utc::now(),
        })
        .await;
    id
}

/// Append one poison entry to a station's DLS stream and return the entry's
/// stream sequence.
#[allow(clippy::too_many_arguments)]
pub async fn seed_poison_entry(
    engine: &MemoryStreamEngine,
    station_internal: &str,
    station_external: &str,
    dls_id: &str,
    message_seq: u64,
    produced_by: &str,
    cg_name: &str,
    time_sent: DateTime<Utc>,
    payload: &[u8],
) -> u64 {
    let entry = DlsMessage {
        id: dls_id.to_string(),
        station_name: station_external.to_string(),
        message_seq,
        producer: ProducerDetails {
            name: produced_by.to_string(),
            ..Default::default()
        },
        poisoned_cg: PoisonedCg {
            cg_name: cg_name.to_string(),
            poisoning_time: Utc::now(),
            ..Default::default()
        },
        message: MessagePayload {
            time_sent,
            size: payload.len(),
            data: hex::encode(payload),
            headers: HashMap::new(),
        },
        creation_date: Utc::now(),
    };

    engine
        .seed_message(
            &dls_stream_name(station_internal),
            &dls_subject("poison", station_internal, dls_id),
            HashMap::new(),
            Bytes::from(serde_json::to_vec(&entry).unwrap()),
            Utc::now(),
        )
        .await
        .unwrap()
}
