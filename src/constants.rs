//! Centralized wire and configuration constants.
//!
//! This module consolidates the control-plane subjects, queue groups, subject
//! templates, and policy defaults used throughout the station control plane.
//! Having them in one place makes it easier to:
//!
//! - Understand the wire contract with SDKs and foreign clients
//! - Update values consistently
//! - Document the rationale for each constant
//!
//! Subject and queue-group names are part of the wire contract: SDK clients
//! publish to these subjects verbatim, so they must never change without a
//! protocol version bump.

use std::time::Duration;

// =============================================================================
// Control Subjects (request/reply wire contract)
// =============================================================================

/// Station creation requests from SDK clients.
pub const STATION_CREATIONS_SUBJECT: &str = "$memphis_station_creations";

/// Station destruction requests from SDK clients.
pub const STATION_DESTRUCTIONS_SUBJECT: &str = "$memphis_station_destructions";

/// Producer creation requests from SDK clients.
pub const PRODUCER_CREATIONS_SUBJECT: &str = "$memphis_producer_creations";

/// Producer destruction requests from SDK clients.
pub const PRODUCER_DESTRUCTIONS_SUBJECT: &str = "$memphis_producer_destructions";

/// Consumer creation requests from SDK clients.
pub const CONSUMER_CREATIONS_SUBJECT: &str = "$memphis_consumer_creations";

/// Consumer destruction requests from SDK clients.
pub const CONSUMER_DESTRUCTIONS_SUBJECT: &str = "$memphis_consumer_destructions";

/// Schema attachment requests from SDK clients.
pub const SCHEMA_ATTACHMENTS_SUBJECT: &str = "$memphis_schema_attachments";

/// Schema detachment requests from SDK clients.
pub const SCHEMA_DETACHMENTS_SUBJECT: &str = "$memphis_schema_detachments";

// =============================================================================
// Queue Groups
// =============================================================================
// Each control subject is subscribed under a fixed queue group so that exactly
// one control-plane instance handles each request, with siblings providing
// failover.

pub const STATION_CREATIONS_GROUP: &str = "memphis_station_creations_listeners_group";
pub const STATION_DESTRUCTIONS_GROUP: &str = "memphis_station_destructions_listeners_group";
pub const PRODUCER_CREATIONS_GROUP: &str = "memphis_producer_creations_listeners_group";
pub const PRODUCER_DESTRUCTIONS_GROUP: &str = "memphis_producer_destructions_listeners_group";
pub const CONSUMER_CREATIONS_GROUP: &str = "memphis_consumer_creations_listeners_group";
pub const CONSUMER_DESTRUCTIONS_GROUP: &str = "memphis_consumer_destructions_listeners_group";
pub const SCHEMA_ATTACHMENTS_GROUP: &str = "memphis_schema_attachments_listeners_group";
pub const SCHEMA_DETACHMENTS_GROUP: &str = "memphis_schema_detachments_listeners_group";

// =============================================================================
// Subject Templates
// =============================================================================

/// Prefix of the per-station schema-update broadcast subject.
pub const SCHEMA_UPDATES_SUBJECT_PREFIX: &str = "$memphis_schema_updates_";

/// Prefix of durable consumers allocated for DLS fetch-by-filter.
pub const DLS_FETCH_CONSUMER_PREFIX: &str = "$memphis_fetch_dls_consumer_";

/// Separator between the tokens of a DLS message id
/// (`<internalStation><sep><kind><sep><seq>`).
pub const DLS_MSG_SEPARATOR: &str = "~";

/// Subject for schema-update notifications to producers on a station.
pub fn schema_updates_subject(internal_station: &str) -> String {
    format!("{SCHEMA_UPDATES_SUBJECT_PREFIX}{internal_station}")
}

/// Name of the dead-letter stream backing a station.
pub fn dls_stream_name(internal_station: &str) -> String {
    format!("$memphis-{internal_station}-dls")
}

/// Subject of a single DLS entry inside a station's dead-letter stream.
pub fn dls_subject(kind_token: &str, internal_station: &str, dls_id: &str) -> String {
    format!("{}.{kind_token}.{dls_id}", dls_stream_name(internal_station))
}

/// Subject a poison message is re-published to for one consumer group.
pub fn dls_resend_subject(internal_station: &str, internal_cg: &str) -> String {
    format!("$memphis_dls_{internal_station}_{internal_cg}")
}

/// Subject producers publish station messages to.
pub fn station_subject(internal_station: &str) -> String {
    format!("{internal_station}.final")
}

// =============================================================================
// Message Headers
// =============================================================================

/// Prefix of internal headers, stripped before user-facing presentation.
pub const INTERNAL_HEADER_PREFIX: &str = "$memphis";

/// Connection id stamped on every produced message by current SDKs.
pub const HEADER_CONNECTION_ID: &str = "$memphis_connectionId";

/// Producer name stamped on every produced message by current SDKs.
pub const HEADER_PRODUCED_BY: &str = "$memphis_producedBy";

/// Pre-1.0 SDK fallback for [`HEADER_CONNECTION_ID`].
pub const HEADER_CONNECTION_ID_LEGACY: &str = "connectionId";

/// Pre-1.0 SDK fallback for [`HEADER_PRODUCED_BY`].
pub const HEADER_PRODUCED_BY_LEGACY: &str = "producedBy";

/// DLS id attached to a re-sent poison message.
pub const HEADER_PM_ID: &str = "$memphis_pm_id";

/// DLS stream sequence attached to a re-sent poison message.
pub const HEADER_PM_SEQUENCE: &str = "$memphis_pm_sequence";

// =============================================================================
// Station Policy Defaults and Bounds
// =============================================================================

/// Retention window applied when a create request names no retention: one week
/// of message age.
pub const DEFAULT_RETENTION_VALUE_SECS: i64 = 604_800;

/// Replication factor applied when a create request names none.
pub const DEFAULT_REPLICAS: i32 = 1;

/// Hard ceiling on the replication factor of a single station.
pub const MAX_REPLICAS: i32 = 5;

/// Idempotency window applied when a create request names none (or a
/// non-positive value).
pub const DEFAULT_IDEMPOTENCY_WINDOW_MS: i64 = 120_000;

/// Smallest idempotency window the engine can enforce. Requests below this
/// are clamped up, not rejected.
pub const MIN_IDEMPOTENCY_WINDOW_MS: i64 = 100;

/// Maximum length of a station, producer, or consumer name.
pub const MAX_ENTITY_NAME_LENGTH: usize = 128;

/// Ack wait applied when a consumer create request names none.
pub const DEFAULT_MAX_ACK_TIME_MS: i64 = 30_000;

/// Delivery attempts applied when a consumer create request names none.
pub const DEFAULT_MAX_MSG_DELIVERIES: i32 = 10;

// =============================================================================
// Dead-Letter Fetch
// =============================================================================

/// Wall-clock bound on a single DLS fetch-by-filter pass. Expiry is a normal
/// termination: whatever arrived in time is processed.
pub const DLS_FETCH_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// HTTP Status Codes
// =============================================================================

/// Status code the management API uses for user-correctable ("showable")
/// errors, distinct from 4xx codes the proxies in front of it generate.
pub const SHOWABLE_ERROR_STATUS_CODE: u16 = 666;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_templates() {
        assert_eq!(
            schema_updates_subject("orders"),
            "$memphis_schema_updates_orders"
        );
        assert_eq!(dls_stream_name("orders"), "$memphis-orders-dls");
        assert_eq!(
            dls_subject("poison", "orders", "orders~poison~4"),
            "$memphis-orders-dls.poison.orders~poison~4"
        );
        assert_eq!(
            dls_resend_subject("orders", "billing"),
            "$memphis_dls_orders_billing"
        );
        assert_eq!(station_subject("orders"), "orders.final");
    }

    #[test]
    fn test_policy_bounds_are_consistent() {
        assert!(MIN_IDEMPOTENCY_WINDOW_MS < DEFAULT_IDEMPOTENCY_WINDOW_MS);
        assert!(DEFAULT_REPLICAS <= MAX_REPLICAS);
    }

    #[test]
    fn test_queue_groups_are_derived_from_subjects() {
        // Every control subject has exactly one queue group, named after it.
        for (subject, group) in [
            (STATION_CREATIONS_SUBJECT, STATION_CREATIONS_GROUP),
            (STATION_DESTRUCTIONS_SUBJECT, STATION_DESTRUCTIONS_GROUP),
            (PRODUCER_CREATIONS_SUBJECT, PRODUCER_CREATIONS_GROUP),
            (PRODUCER_DESTRUCTIONS_SUBJECT, PRODUCER_DESTRUCTIONS_GROUP),
            (CONSUMER_CREATIONS_SUBJECT, CONSUMER_CREATIONS_GROUP),
            (CONSUMER_DESTRUCTIONS_SUBJECT, CONSUMER_DESTRUCTIONS_GROUP),
            (SCHEMA_ATTACHMENTS_SUBJECT, SCHEMA_ATTACHMENTS_GROUP),
            (SCHEMA_DETACHMENTS_SUBJECT, SCHEMA_DETACHMENTS_GROUP),
        ] {
            assert_eq!(format!("{}_listeners_group", &subject[1..]), group);
        }
    }
}
