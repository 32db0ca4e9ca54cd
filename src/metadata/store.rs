//! Metadata repository facade.
//!
//! The control plane treats the metadata store as an opaque document store
//! with CRUD and a handful of conditional updates. This trait abstracts it,
//! allowing for:
//! - Different backend implementations
//! - Easier testing with the in-memory store
//! - Clear separation of concerns
//!
//! # Available Implementations
//!
//! - [`MemoryMetadataStore`](super::MemoryMetadataStore): in-memory store
//!   used by the test suite and demo embedders
//!
//! # Consistency Primitives
//!
//! There is no per-station lock anywhere in the control plane. Correctness
//! under concurrent requests rests on two conditional operations this trait
//! must implement atomically:
//!
//! - [`upsert_station_if_absent`](MetadataStore::upsert_station_if_absent):
//!   insert keyed by `(external name, is_deleted = false)`; a matched
//!   live record means the caller lost the race
//! - tombstone/schema/dls updates filtered by `is_deleted = false`, so they
//!   never resurrect a tombstoned station

use async_trait::async_trait;
use thiserror::Error as ThisError;

use crate::types::Id;

use super::models::{
    AuditLog, Connection, Consumer, DlsConfiguration, Producer, Schema, SchemaBinding,
    SchemaVersion, Station, Tag,
};

/// Result type for metadata-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// An opaque metadata-store failure.
///
/// The store applies its own retries; by the time an error surfaces here it
/// is terminal for the current operation.
#[derive(Debug, Clone, ThisError)]
#[error("metadata store error: {0}")]
pub struct StoreError(pub String);

/// CRUD and aggregation facade over the persisted collections.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // ========================================================================
    // Stations
    // ========================================================================

    /// Find the live (non-deleted) station with this external name.
    async fn get_live_station(&self, external_name: &str) -> StoreResult<Option<Station>>;

    /// Insert `station` unless a live station with the same external name
    /// exists. Returns `true` when inserted, `false` when a live record
    /// matched (the station is NOT modified in that case).
    async fn upsert_station_if_absent(&self, station: Station) -> StoreResult<bool>;

    /// Tombstone the live station with this external name. A no-op when no
    /// live record matches.
    async fn tombstone_station(&self, external_name: &str) -> StoreResult<()>;

    /// Replace the schema binding of the live station with this name.
    async fn update_station_schema(
        &self,
        external_name: &str,
        binding: SchemaBinding,
    ) -> StoreResult<()>;

    /// Clear the schema binding of the live station with this name.
    async fn clear_station_schema(&self, external_name: &str) -> StoreResult<()>;

    /// Replace the DLS configuration of the live station with this name.
    async fn update_station_dls_config(
        &self,
        external_name: &str,
        config: DlsConfiguration,
    ) -> StoreResult<()>;

    /// All live stations.
    async fn list_live_stations(&self) -> StoreResult<Vec<Station>>;

    // ========================================================================
    // Producers
    // ========================================================================

    async fn insert_producer(&self, producer: Producer) -> StoreResult<()>;

    /// The active producer with this name on this station, if any.
    async fn get_active_producer(
        &self,
        station_id: &Id,
        name: &str,
    ) -> StoreResult<Option<Producer>>;

    /// The producer matching the full identity triple, active or not.
    async fn find_producer(
        &self,
        station_id: &Id,
        name: &str,
        connection_id: &Id,
    ) -> StoreResult<Option<Producer>>;

    /// Mark the active producer `(station, name)` inactive and deleted.
    /// Returns `false` when no active record matched.
    async fn deactivate_producer(&self, station_id: &Id, name: &str) -> StoreResult<bool>;

    // ========================================================================
    // Consumers
    // ========================================================================

    async fn insert_consumer(&self, consumer: Consumer) -> StoreResult<()>;

    /// The active consumer with this name on this station, if any.
    async fn get_active_consumer(
        &self,
        station_id: &Id,
        name: &str,
    ) -> StoreResult<Option<Consumer>>;

    /// Mark the active consumer `(station, name)` inactive and deleted.
    /// Returns `false` when no active record matched.
    async fn deactivate_consumer(&self, station_id: &Id, name: &str) -> StoreResult<bool>;

    /// All consumers ever registered in this group on this station,
    /// including inactive and deleted ones (group views need them).
    async fn consumers_in_group(&self, station_id: &Id, group: &str)
        -> StoreResult<Vec<Consumer>>;

    /// Mass-mark every producer and consumer of a station inactive and
    /// deleted. Part of station destruction.
    async fn deactivate_station_clients(&self, station_id: &Id) -> StoreResult<()>;

    // ========================================================================
    // Schemas
    // ========================================================================

    async fn get_schema(&self, name: &str) -> StoreResult<Option<Schema>>;

    /// The active version of a schema, if one is marked active.
    async fn get_active_version(&self, schema_id: &Id) -> StoreResult<Option<SchemaVersion>>;

    // ========================================================================
    // Connections and Tags
    // ========================================================================

    async fn get_connection(&self, id: &Id) -> StoreResult<Option<Connection>>;

    /// Tags attached to a station.
    async fn get_tags_by_station(&self, station_id: &Id) -> StoreResult<Vec<Tag>>;

    /// Detach every tag from a station. Part of station destruction.
    async fn remove_tags_from_station(&self, station_id: &Id) -> StoreResult<()>;

    // ========================================================================
    // Audit Logs
    // ========================================================================

    /// Append audit records. Callers treat failures as best-effort.
    async fn create_audit_logs(&self, logs: Vec<AuditLog>) -> StoreResult<()>;

    /// Drop all audit records of a station. Part of station destruction;
    /// best-effort.
    async fn remove_audit_logs_by_station(&self, station_name: &str) -> StoreResult<()>;
}
