//! Control-protocol request and response envelopes.
//!
//! JSON field names here are part of the wire contract with the SDKs; every
//! field is defaulted so older SDKs that omit newer fields keep working.

use serde::{Deserialize, Serialize};

use crate::metadata::models::{DlsConfiguration, SchemaUpdateInit};

/// `$memphis_station_creations` request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateStationRequest {
    pub name: String,
    #[serde(default)]
    pub schema_name: String,
    #[serde(default)]
    pub retention_type: String,
    #[serde(default)]
    pub retention_value: i64,
    #[serde(default)]
    pub storage_type: String,
    #[serde(default)]
    pub replicas: i32,
    /// Deprecated, still accepted.
    #[serde(default)]
    pub dedup_enabled: bool,
    /// Deprecated, still accepted.
    #[serde(default)]
    pub dedup_window_in_ms: i64,
    #[serde(default)]
    pub idempotency_window_in_ms: i64,
    #[serde(default)]
    pub dls_configuration: DlsConfiguration,
}

impl CreateStationRequest {
    /// An all-defaults request, used when a station is created implicitly
    /// for a producer or consumer.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        CreateStationRequest {
            name: name.into(),
            dls_configuration: DlsConfiguration::all(),
            ..Default::default()
        }
    }
}

/// `$memphis_station_destructions` request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestroyStationRequest {
    pub station_name: String,
}

/// `$memphis_producer_creations` request body.
///
/// `req_version` is 0 for pre-1.0 SDKs (absent field) and 1+ for SDKs that
/// expect a typed JSON reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateProducerRequest {
    pub name: String,
    pub station_name: String,
    #[serde(default)]
    pub connection_id: String,
    #[serde(default)]
    pub producer_type: String,
    #[serde(default)]
    pub req_version: u32,
}

/// Typed reply to a v1+ producer creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateProducerResponse {
    pub schema_update: SchemaUpdateInit,
    #[serde(rename = "error")]
    pub error: String,
}

/// `$memphis_producer_destructions` request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestroyProducerRequest {
    pub station_name: String,
    pub name: String,
}

/// `$memphis_consumer_creations` request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateConsumerRequest {
    pub name: String,
    pub station_name: String,
    #[serde(default)]
    pub connection_id: String,
    #[serde(default)]
    pub consumer_type: String,
    #[serde(default)]
    pub consumers_group: String,
    #[serde(default)]
    pub max_ack_time_ms: i64,
    #[serde(default)]
    pub max_msg_deliveries: i32,
}

/// `$memphis_consumer_destructions` request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestroyConsumerRequest {
    pub station_name: String,
    pub name: String,
}

/// `$memphis_schema_attachments` request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachSchemaRequest {
    pub name: String,
    pub station_name: String,
}

/// `$memphis_schema_detachments` request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetachSchemaRequest {
    pub station_name: String,
}
