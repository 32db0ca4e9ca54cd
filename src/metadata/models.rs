//! Persisted records and wire-visible views.
//!
//! Field names on these types are part of the wire contract: they appear
//! both in the metadata store and in management API responses, so serde
//! renames are avoided by naming fields in their wire form directly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::station::{RetentionType, StorageType};
use crate::types::{ActorKind, Id};

// =============================================================================
// Stations
// =============================================================================

/// Dead-letter capture switches for one station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlsConfiguration {
    /// Capture messages that exhausted consumer ack attempts.
    pub poison: bool,
    /// Capture messages that failed schema validation.
    pub schemaverse: bool,
}

impl DlsConfiguration {
    /// Capture everything; applied to stations created before the DLS
    /// subsystem existed and to stations auto-created for producers.
    pub fn all() -> Self {
        DlsConfiguration {
            poison: true,
            schemaverse: true,
        }
    }
}

/// The `(schema, version)` pair bound to a station.
///
/// The zero value (empty `schema_name`) means "no schema attached", matching
/// the store's empty-document form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaBinding {
    #[serde(default)]
    pub schema_name: String,
    #[serde(default)]
    pub version_number: u32,
}

impl SchemaBinding {
    pub fn new(schema_name: impl Into<String>, version_number: u32) -> Self {
        SchemaBinding {
            schema_name: schema_name.into(),
            version_number,
        }
    }

    /// True when a schema is attached.
    pub fn is_bound(&self) -> bool {
        !self.schema_name.is_empty()
    }
}

/// A station: a logical topic with retention, replication, idempotency,
/// schema, and dead-letter policy.
///
/// Stations are tombstoned (`is_deleted = true`), never hard-deleted, so
/// audit history stays joinable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    #[serde(rename = "id")]
    pub id: Id,
    /// External (user-visible) name; unique among non-deleted stations.
    pub name: String,
    pub retention_type: RetentionType,
    pub retention_value: i64,
    pub storage_type: StorageType,
    pub replicas: i32,
    /// Deprecated, still accepted and persisted.
    pub dedup_enabled: bool,
    /// Deprecated, still accepted and persisted.
    pub dedup_window_in_ms: i64,
    pub created_by_user: String,
    pub creation_date: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub is_deleted: bool,
    #[serde(default)]
    pub schema: SchemaBinding,
    pub idempotency_window_in_ms: i64,
    /// True when this control plane created the main stream; false for
    /// stations adopted from foreign stream-engine clients.
    pub is_native: bool,
    #[serde(default)]
    pub dls_configuration: DlsConfiguration,
}

impl Station {
    /// Storage kind as presented by the management API (`file` -> `disk`).
    pub fn storage_type_for_response(&self) -> &'static str {
        self.storage_type.response_name()
    }
}

// =============================================================================
// Producers and Consumers
// =============================================================================

/// A producer registered on a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub id: Id,
    pub name: String,
    pub station_id: Id,
    #[serde(rename = "type")]
    pub producer_type: String,
    pub connection_id: Id,
    pub created_by_user: String,
    pub is_active: bool,
    pub is_deleted: bool,
    pub creation_date: DateTime<Utc>,
}

/// A consumer registered on a station, always a member of a consumer group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumer {
    pub id: Id,
    pub name: String,
    pub station_id: Id,
    #[serde(rename = "type")]
    pub consumer_type: String,
    pub connection_id: Id,
    pub consumers_group: String,
    pub max_ack_time_ms: i64,
    pub max_msg_deliveries: i32,
    pub created_by_user: String,
    pub is_active: bool,
    pub is_deleted: bool,
    pub creation_date: DateTime<Utc>,
}

/// One member of a consumer group, as presented in group views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CgMember {
    pub name: String,
    pub client_address: String,
    pub is_active: bool,
    pub is_deleted: bool,
    pub max_ack_time_ms: i64,
    pub max_msg_deliveries: i32,
}

// =============================================================================
// Schemas
// =============================================================================

/// A named schema; versions live in their own collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub id: Id,
    pub name: String,
    #[serde(rename = "type")]
    pub schema_type: String,
}

/// One version of a schema. At most one version per schema is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub id: Id,
    pub schema_id: Id,
    pub version_number: u32,
    pub active: bool,
    pub schema_content: String,
    pub message_struct_name: String,
    pub descriptor: String,
    pub created_by_user: String,
    pub creation_date: DateTime<Utc>,
}

/// Version payload pushed to producers and returned by the management API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaVersionDetails {
    pub version_number: u32,
    pub descriptor: String,
    pub schema_content: String,
    pub message_struct_name: String,
}

impl From<&SchemaVersion> for SchemaVersionDetails {
    fn from(v: &SchemaVersion) -> Self {
        SchemaVersionDetails {
            version_number: v.version_number,
            descriptor: v.descriptor.clone(),
            schema_content: v.schema_content.clone(),
            message_struct_name: v.message_struct_name.clone(),
        }
    }
}

/// Payload of an `init` schema update: everything a producer needs to start
/// validating locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaUpdateInit {
    pub schema_name: String,
    pub active_version: SchemaVersionDetails,
    #[serde(rename = "type")]
    pub schema_type: String,
}

/// Kind of schema update pushed to producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaUpdateType {
    /// A schema was attached or replaced; `init` carries its content.
    Init,
    /// The schema was detached.
    Drop,
}

/// Live notification published on a station's schema-update subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerSchemaUpdate {
    pub update_type: SchemaUpdateType,
    #[serde(default)]
    pub init: SchemaUpdateInit,
}

impl ProducerSchemaUpdate {
    pub fn init(content: SchemaUpdateInit) -> Self {
        ProducerSchemaUpdate {
            update_type: SchemaUpdateType::Init,
            init: content,
        }
    }

    pub fn drop() -> Self {
        ProducerSchemaUpdate {
            update_type: SchemaUpdateType::Drop,
            init: SchemaUpdateInit::default(),
        }
    }
}

/// Answer to "does the station's bound schema have a newer active version".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSchemaUpdates {
    pub schema_name: String,
    pub active_version: SchemaVersionDetails,
    #[serde(rename = "type")]
    pub schema_type: String,
    pub updates_available: bool,
}

// =============================================================================
// Connections, Tags, Audit
// =============================================================================

/// A client connection record, referenced by producers and consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: Id,
    pub created_by_user: String,
    pub client_address: String,
    pub is_active: bool,
    pub creation_date: DateTime<Utc>,
}

/// A label attachable to stations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub color: String,
}

/// One append-only audit record for a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Id,
    pub station_name: String,
    pub message: String,
    pub created_by_user: String,
    pub creation_date: DateTime<Utc>,
    pub user_type: ActorKind,
}

// =============================================================================
// Dead-Letter Views
// =============================================================================

/// Producer fields embedded in message views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProducerDetails {
    pub name: String,
    pub connection_id: Id,
    pub client_address: String,
    pub created_by_user: String,
    pub is_active: bool,
    pub is_deleted: bool,
}

/// Payload fields of a stored or dead-lettered message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub time_sent: DateTime<Utc>,
    /// Size in bytes: subject + data + headers.
    pub size: usize,
    /// Hex-encoded message body.
    pub data: String,
    pub headers: HashMap<String, String>,
}

/// A consumer group that poisoned a message, enriched with live state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoisonedCg {
    pub cg_name: String,
    pub poisoning_time: DateTime<Utc>,
    #[serde(default)]
    pub cg_members: Vec<CgMember>,
    #[serde(default)]
    pub max_ack_time_ms: i64,
    #[serde(default)]
    pub max_msg_deliveries: i32,
    #[serde(default)]
    pub unprocessed_messages: u64,
    #[serde(default)]
    pub in_process_messages: i64,
    #[serde(default)]
    pub total_poison_messages: usize,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

/// A dead-letter stream entry as the engine persists it: one poisoning of
/// one message by one consumer group (or one schema-validation failure).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DlsMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub station_name: String,
    pub message_seq: u64,
    pub producer: ProducerDetails,
    pub poisoned_cg: PoisonedCg,
    pub message: MessagePayload,
    pub creation_date: DateTime<Utc>,
}

/// A dead-letter entry joined across all consumer groups that poisoned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DlsMessageResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub station_name: String,
    pub message_seq: u64,
    pub producer: ProducerDetails,
    pub message: MessagePayload,
    pub creation_date: DateTime<Utc>,
    pub poisoned_cgs: Vec<PoisonedCg>,
}

/// Details of a message stored in a station's main stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message_seq: u64,
    pub message: MessagePayload,
    pub producer: ProducerDetails,
    pub poisoned_cgs: Vec<PoisonedCg>,
}

/// Either kind of message-details answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageDetails {
    /// A dead-lettered message with its journey.
    Poison(Box<DlsMessageResponse>),
    /// A message still in the main stream.
    Stored(Box<MessageResponse>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_binding_zero_value_is_unbound() {
        let binding = SchemaBinding::default();
        assert!(!binding.is_bound());
        assert!(SchemaBinding::new("orderv1", 3).is_bound());
    }

    #[test]
    fn test_station_wire_field_names() {
        let station = Station {
            id: Id::from("s1"),
            name: "orders".into(),
            retention_type: RetentionType::Messages,
            retention_value: 10_000,
            storage_type: StorageType::File,
            replicas: 3,
            dedup_enabled: false,
            dedup_window_in_ms: 0,
            created_by_user: "root".into(),
            creation_date: Utc::now(),
            last_update: Utc::now(),
            is_deleted: false,
            schema: SchemaBinding::default(),
            idempotency_window_in_ms: 120_000,
            is_native: true,
            dls_configuration: DlsConfiguration::all(),
        };

        let json = serde_json::to_value(&station).unwrap();
        assert_eq!(json["retention_type"], "messages");
        assert_eq!(json["retention_value"], 10_000);
        assert_eq!(json["storage_type"], "file");
        assert_eq!(json["replicas"], 3);
        assert_eq!(json["dedup_enabled"], false);
        assert_eq!(json["dedup_window_in_ms"], 0);
        assert_eq!(json["idempotency_window_in_ms"], 120_000);
        assert_eq!(json["is_native"], true);
        assert_eq!(json["is_deleted"], false);
        assert_eq!(json["dls_configuration"]["poison"], true);
        assert_eq!(json["dls_configuration"]["schemaverse"], true);
    }

    #[test]
    fn test_storage_rename_is_presentation_only() {
        let station = Station {
            id: Id::new(),
            name: "orders".into(),
            retention_type: RetentionType::default(),
            retention_value: 604_800,
            storage_type: StorageType::File,
            replicas: 1,
            dedup_enabled: false,
            dedup_window_in_ms: 0,
            created_by_user: "root".into(),
            creation_date: Utc::now(),
            last_update: Utc::now(),
            is_deleted: false,
            schema: SchemaBinding::default(),
            idempotency_window_in_ms: 120_000,
            is_native: true,
            dls_configuration: DlsConfiguration::default(),
        };

        // The persisted form keeps "file"; only the response helper renames.
        let json = serde_json::to_value(&station).unwrap();
        assert_eq!(json["storage_type"], "file");
        assert_eq!(station.storage_type_for_response(), "disk");
    }

    #[test]
    fn test_producer_schema_update_wire_form() {
        let update = ProducerSchemaUpdate::drop();
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["update_type"], "drop");

        let update = ProducerSchemaUpdate::init(SchemaUpdateInit {
            schema_name: "orderv1".into(),
            active_version: SchemaVersionDetails {
                version_number: 3,
                ..Default::default()
            },
            schema_type: "protobuf".into(),
        });
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["update_type"], "init");
        assert_eq!(json["init"]["schema_name"], "orderv1");
        assert_eq!(json["init"]["active_version"]["version_number"], 3);
        assert_eq!(json["init"]["type"], "protobuf");
    }

    #[test]
    fn test_dls_message_round_trips_through_json() {
        let msg = DlsMessage {
            id: "orders~poison~7".into(),
            station_name: "orders".into(),
            message_seq: 7,
            poisoned_cg: PoisonedCg {
                cg_name: "billing".into(),
                ..Default::default()
            },
            message: MessagePayload {
                data: hex::encode(b"hello"),
                size: 5,
                ..Default::default()
            },
            ..Default::default()
        };
        let json = serde_json::to_vec(&msg).unwrap();
        let back: DlsMessage = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, msg);
        assert_eq!(hex::decode(&back.message.data).unwrap(), b"hello");
    }
}
