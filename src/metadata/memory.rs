//! In-memory metadata store.
//!
//! A full-featured implementation of [`MetadataStore`] over shared hash
//! maps. The test suite runs against it, and embedders can use it as a
//! single-node backend; the conditional operations are atomic because each
//! collection sits behind one `RwLock`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::types::Id;

use super::models::{
    AuditLog, Connection, Consumer, DlsConfiguration, Producer, Schema, SchemaBinding,
    SchemaVersion, Station, Tag,
};
use super::store::{MetadataStore, StoreResult};

/// Shared in-memory collections.
#[derive(Debug, Clone, Default)]
pub struct MemoryMetadataStore {
    stations: Arc<RwLock<Vec<Station>>>,
    producers: Arc<RwLock<Vec<Producer>>>,
    consumers: Arc<RwLock<Vec<Consumer>>>,
    schemas: Arc<RwLock<HashMap<String, Schema>>>,
    schema_versions: Arc<RwLock<Vec<SchemaVersion>>>,
    connections: Arc<RwLock<HashMap<Id, Connection>>>,
    station_tags: Arc<RwLock<HashMap<Id, Vec<Tag>>>>,
    audit_logs: Arc<RwLock<Vec<AuditLog>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Seeding and inspection helpers (used by tests and demo embedders)
    // ------------------------------------------------------------------

    /// Register a schema together with its versions.
    pub async fn seed_schema(&self, schema: Schema, versions: Vec<SchemaVersion>) {
        self.schemas
            .write()
            .await
            .insert(schema.name.clone(), schema);
        self.schema_versions.write().await.extend(versions);
    }

    /// Register a client connection.
    pub async fn seed_connection(&self, connection: Connection) {
        self.connections
            .write()
            .await
            .insert(connection.id.clone(), connection);
    }

    /// Attach tags to a station.
    pub async fn seed_tags(&self, station_id: Id, tags: Vec<Tag>) {
        self.station_tags.write().await.insert(station_id, tags);
    }

    /// Every station record, live and tombstoned.
    pub async fn all_stations(&self) -> Vec<Station> {
        self.stations.read().await.clone()
    }

    /// Every producer record.
    pub async fn all_producers(&self) -> Vec<Producer> {
        self.producers.read().await.clone()
    }

    /// Every consumer record.
    pub async fn all_consumers(&self) -> Vec<Consumer> {
        self.consumers.read().await.clone()
    }

    /// Audit records for a station, in append order.
    pub async fn audit_logs_for(&self, station_name: &str) -> Vec<AuditLog> {
        self.audit_logs
            .read()
            .await
            .iter()
            .filter(|l| l.station_name == station_name)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn get_live_station(&self, external_name: &str) -> StoreResult<Option<Station>> {
        Ok(self
            .stations
            .read()
            .await
            .iter()
            .find(|s| s.name == external_name && !s.is_deleted)
            .cloned())
    }

    async fn upsert_station_if_absent(&self, station: Station) -> StoreResult<bool> {
        let mut stations = self.stations.write().await;
        if stations
            .iter()
            .any(|s| s.name == station.name && !s.is_deleted)
        {
            return Ok(false);
        }
        stations.push(station);
        Ok(true)
    }

    async fn tombstone_station(&self, external_name: &str) -> StoreResult<()> {
        let mut stations = self.stations.write().await;
        for station in stations
            .iter_mut()
            .filter(|s| s.name == external_name && !s.is_deleted)
        {
            station.is_deleted = true;
            station.last_update = chrono::Utc::now();
        }
        Ok(())
    }

    async fn update_station_schema(
        &self,
        external_name: &str,
        binding: SchemaBinding,
    ) -> StoreResult<()> {
        let mut stations = self.stations.write().await;
        for station in stations
            .iter_mut()
            .filter(|s| s.name == external_name && !s.is_deleted)
        {
            station.schema = binding.clone();
            station.last_update = chrono::Utc::now();
        }
        Ok(())
    }

    async fn clear_station_schema(&self, external_name: &str) -> StoreResult<()> {
        self.update_station_schema(external_name, SchemaBinding::default())
            .await
    }

    async fn update_station_dls_config(
        &self,
        external_name: &str,
        config: DlsConfiguration,
    ) -> StoreResult<()> {
        let mut stations = self.stations.write().await;
        for station in stations
            .iter_mut()
            .filter(|s| s.name == external_name && !s.is_deleted)
        {
            station.dls_configuration = config;
            station.last_update = chrono::Utc::now();
        }
        Ok(())
    }

    async fn list_live_stations(&self) -> StoreResult<Vec<Station>> {
        Ok(self
            .stations
            .read()
            .await
            .iter()
            .filter(|s| !s.is_deleted)
            .cloned()
            .collect())
    }

    async fn insert_producer(&self, producer: Producer) -> StoreResult<()> {
        self.producers.write().await.push(producer);
        Ok(())
    }

    async fn get_active_producer(
        &self,
        station_id: &Id,
        name: &str,
    ) -> StoreResult<Option<Producer>> {
        Ok(self
            .producers
            .read()
            .await
            .iter()
            .find(|p| &p.station_id == station_id && p.name == name && p.is_active)
            .cloned())
    }

    async fn find_producer(
        &self,
        station_id: &Id,
        name: &str,
        connection_id: &Id,
    ) -> StoreResult<Option<Producer>> {
        Ok(self
            .producers
            .read()
            .await
            .iter()
            .find(|p| {
                &p.station_id == station_id && p.name == name && &p.connection_id == connection_id
            })
            .cloned())
    }

    async fn deactivate_producer(&self, station_id: &Id, name: &str) -> StoreResult<bool> {
        let mut producers = self.producers.write().await;
        match producers
            .iter_mut()
            .find(|p| &p.station_id == station_id && p.name == name && p.is_active)
        {
            Some(producer) => {
                producer.is_active = false;
                producer.is_deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_consumer(&self, consumer: Consumer) -> StoreResult<()> {
        self.consumers.write().await.push(consumer);
        Ok(())
    }

    async fn get_active_consumer(
        &self,
        station_id: &Id,
        name: &str,
    ) -> StoreResult<Option<Consumer>> {
        Ok(self
            .consumers
            .read()
            .await
            .iter()
            .find(|c| &c.station_id == station_id && c.name == name && c.is_active)
            .cloned())
    }

    async fn deactivate_consumer(&self, station_id: &Id, name: &str) -> StoreResult<bool> {
        let mut consumers = self.consumers.write().await;
        match consumers
            .iter_mut()
            .find(|c| &c.station_id == station_id && c.name == name && c.is_active)
        {
            Some(consumer) => {
                consumer.is_active = false;
                consumer.is_deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn consumers_in_group(
        &self,
        station_id: &Id,
        group: &str,
    ) -> StoreResult<Vec<Consumer>> {
        Ok(self
            .consumers
            .read()
            .await
            .iter()
            .filter(|c| &c.station_id == station_id && c.consumers_group == group)
            .cloned()
            .collect())
    }

    async fn deactivate_station_clients(&self, station_id: &Id) -> StoreResult<()> {
        {
            let mut producers = self.producers.write().await;
            for producer in producers.iter_mut().filter(|p| &p.station_id == station_id) {
                producer.is_active = false;
                producer.is_deleted = true;
            }
        }
        {
            let mut consumers = self.consumers.write().await;
            for consumer in consumers.iter_mut().filter(|c| &c.station_id == station_id) {
                consumer.is_active = false;
                consumer.is_deleted = true;
            }
        }
        Ok(())
    }

    async fn get_schema(&self, name: &str) -> StoreResult<Option<Schema>> {
        Ok(self.schemas.read().await.get(name).cloned())
    }

    async fn get_active_version(&self, schema_id: &Id) -> StoreResult<Option<SchemaVersion>> {
        Ok(self
            .schema_versions
            .read()
            .await
            .iter()
            .find(|v| &v.schema_id == schema_id && v.active)
            .cloned())
    }

    async fn get_connection(&self, id: &Id) -> StoreResult<Option<Connection>> {
        Ok(self.connections.read().await.get(id).cloned())
    }

    async fn get_tags_by_station(&self, station_id: &Id) -> StoreResult<Vec<Tag>> {
        Ok(self
            .station_tags
            .read()
            .await
            .get(station_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_tags_from_station(&self, station_id: &Id) -> StoreResult<()> {
        self.station_tags.write().await.remove(station_id);
        Ok(())
    }

    async fn create_audit_logs(&self, logs: Vec<AuditLog>) -> StoreResult<()> {
        self.audit_logs.write().await.extend(logs);
        Ok(())
    }

    async fn remove_audit_logs_by_station(&self, station_name: &str) -> StoreResult<()> {
        self.audit_logs
            .write()
            .await
            .retain(|l| l.station_name != station_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::{RetentionType, StorageType};
    use chrono::Utc;

    fn station(name: &str) -> Station {
        Station {
            id: Id::new(),
            name: name.to_string(),
            retention_type: RetentionType::default(),
            retention_value: 604_800,
            storage_type: StorageType::default(),
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
        }
    }

    #[tokio::test]
    async fn test_upsert_if_absent_blocks_live_duplicates() {
        let store = MemoryMetadataStore::new();
        assert!(store.upsert_station_if_absent(station("orders")).await.unwrap());
        assert!(!store.upsert_station_if_absent(station("orders")).await.unwrap());

        let stations = store.all_stations().await;
        assert_eq!(stations.len(), 1);
    }

    #[tokio::test]
    async fn test_tombstone_unblocks_recreation() {
        let store = MemoryMetadataStore::new();
        assert!(store.upsert_station_if_absent(station("orders")).await.unwrap());
        store.tombstone_station("orders").await.unwrap();
        assert!(store.upsert_station_if_absent(station("orders")).await.unwrap());

        // Two records total: one tombstoned, one live.
        let stations = store.all_stations().await;
        assert_eq!(stations.len(), 2);
        assert_eq!(stations.iter().filter(|s| !s.is_deleted).count(), 1);
    }

    #[tokio::test]
    async fn test_schema_updates_skip_tombstoned_records() {
        let store = MemoryMetadataStore::new();
        store.upsert_station_if_absent(station("orders")).await.unwrap();
        store.tombstone_station("orders").await.unwrap();
        store
            .update_station_schema("orders", SchemaBinding::new("orderv1", 1))
            .await
            .unwrap();

        let stations = store.all_stations().await;
        assert!(!stations[0].schema.is_bound());
    }

    #[tokio::test]
    async fn test_deactivate_station_clients_touches_both_collections() {
        let store = MemoryMetadataStore::new();
        let sid = Id::new();
        store
            .insert_producer(Producer {
                id: Id::new(),
                name: "p1".into(),
                station_id: sid.clone(),
                producer_type: "application".into(),
                connection_id: Id::new(),
                created_by_user: "root".into(),
                is_active: true,
                is_deleted: false,
                creation_date: Utc::now(),
            })
            .await
            .unwrap();
        store
            .insert_consumer(Consumer {
                id: Id::new(),
                name: "c1".into(),
                station_id: sid.clone(),
                consumer_type: "application".into(),
                connection_id: Id::new(),
                consumers_group: "cg1".into(),
                max_ack_time_ms: 30_000,
                max_msg_deliveries: 10,
                created_by_user: "root".into(),
                is_active: true,
                is_deleted: false,
                creation_date: Utc::now(),
            })
            .await
            .unwrap();

        store.deactivate_station_clients(&sid).await.unwrap();

        for p in store.all_producers().await {
            assert!(!p.is_active);
            assert!(p.is_deleted);
        }
        for c in store.all_consumers().await {
            assert!(!c.is_active);
            assert!(c.is_deleted);
        }
    }

    #[tokio::test]
    async fn test_deactivate_producer_reports_misses() {
        let store = MemoryMetadataStore::new();
        let sid = Id::new();
        assert!(!store.deactivate_producer(&sid, "ghost").await.unwrap());
    }
}
