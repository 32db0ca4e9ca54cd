//! Station lifecycle: create, destroy, DLS bootstrap and configuration.
//!
//! Create and destroy each come in two flavors sharing one core: the native
//! path, where this control plane owns the engine streams, and the
//! non-native path, where a foreign stream-engine client supplies the
//! stream step as a [`StreamHook`].
//!
//! # Consistency Protocol
//!
//! Stream creation precedes the metadata insert so that a client's follow-up
//! publish can never observe a metadata-present-but-stream-missing state.
//! The insert itself is an upsert-if-absent keyed by
//! `(external name, is_deleted = false)`: losing that race fails the create
//! with NameExists and leaves the just-created stream orphaned; a later
//! create re-attempts it and a destroy reaps both. On destruction the order
//! flips: streams are deleted before the tombstone is written, so a
//! tombstoned station never has live streams behind it.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::analytics::EventParam;
use crate::constants::{
    dls_stream_name, station_subject, DEFAULT_REPLICAS, DEFAULT_RETENTION_VALUE_SECS,
};
use crate::engine::{StreamConfig, StreamStorage};
use crate::error::{Error, Result};
use crate::metadata::models::{DlsConfiguration, SchemaBinding, Station};
use crate::station::{
    normalize_idempotency_window, validate_replicas, RetentionType, StationName, StorageType,
};
use crate::types::{Actor, Id};
use crate::wire::requests::CreateStationRequest;

use super::{ControlPlane, StreamHook};

impl ControlPlane {
    /// Create a station whose streams this control plane owns.
    pub async fn create_station(
        &self,
        request: &CreateStationRequest,
        actor: &Actor,
    ) -> Result<Station> {
        self.create_station_intern(request, actor, None).await
    }

    /// Shared creation core. A `non_native_create` hook marks the station
    /// non-native and replaces the main-stream creation step.
    pub async fn create_station_intern(
        &self,
        request: &CreateStationRequest,
        actor: &Actor,
        non_native_create: Option<StreamHook>,
    ) -> Result<Station> {
        let is_native = non_native_create.is_none();

        let station_name = StationName::from_external(&request.name).map_err(|e| {
            warn!(station = %request.name, error = %e, "rejected station name");
            e
        })?;

        if self
            .store()
            .get_live_station(station_name.external())
            .await?
            .is_some()
        {
            let err = Error::NameExists(station_name.external().to_string());
            warn!(station = %station_name, "{err}");
            return Err(err);
        }

        let mut schema = SchemaBinding::default();
        if !request.schema_name.is_empty() {
            let schema_name = request.schema_name.to_lowercase();
            let record = self
                .store()
                .get_schema(&schema_name)
                .await?
                .ok_or_else(|| Error::SchemaMissing(schema_name.clone()))?;
            let version = self
                .store()
                .get_active_version(&record.id)
                .await?
                .ok_or_else(|| Error::Store(format!("schema {schema_name} has no active version")))?;
            schema = SchemaBinding::new(schema_name, version.version_number);
        }

        let (retention_type, retention_value) = if request.retention_type.is_empty() {
            (RetentionType::MessageAgeSec, DEFAULT_RETENTION_VALUE_SECS)
        } else {
            (
                request.retention_type.to_lowercase().parse()?,
                request.retention_value,
            )
        };

        let storage_type = if request.storage_type.is_empty() {
            StorageType::File
        } else {
            request.storage_type.to_lowercase().parse()?
        };

        let replicas = if request.replicas > 0 {
            validate_replicas(request.replicas)?;
            request.replicas
        } else {
            DEFAULT_REPLICAS
        };

        let now = Utc::now();
        let station = Station {
            id: Id::new(),
            name: station_name.external().to_string(),
            retention_type,
            retention_value,
            storage_type,
            replicas,
            dedup_enabled: request.dedup_enabled,
            dedup_window_in_ms: request.dedup_window_in_ms,
            created_by_user: actor.username.clone(),
            creation_date: now,
            last_update: now,
            is_deleted: false,
            schema,
            idempotency_window_in_ms: normalize_idempotency_window(
                request.idempotency_window_in_ms,
            ),
            is_native,
            dls_configuration: request.dls_configuration,
        };

        // Streams first, metadata second; see the module docs for the
        // consistency protocol.
        match non_native_create {
            Some(hook) => hook.await?,
            None => {
                self.engine()
                    .create_stream(main_stream_config(&station_name, &station))
                    .await?
            }
        }
        self.engine()
            .create_stream(dls_stream_config(&station_name, &station))
            .await?;

        if !self.store().upsert_station_if_absent(station.clone()).await? {
            let err = Error::NameExists(station_name.external().to_string());
            warn!(station = %station_name, "{err}");
            return Err(err);
        }

        let message = format!(
            "Station {} has been created by user {}",
            station_name.external(),
            actor.username
        );
        info!("{message}");
        self.audit(station_name.external(), &message, actor).await;
        self.analytics()
            .send_event_with_params(
                &actor.username,
                &[EventParam::new("station-name", station_name.external())],
                "user-create-station",
            )
            .await;

        Ok(station)
    }

    /// Destroy a station whose streams this control plane owns.
    pub async fn destroy_station(&self, station_name: &str, actor: &Actor) -> Result<()> {
        self.destroy_station_intern(station_name, actor, None).await
    }

    /// Shared destruction core. A `non_native_remove` hook replaces the
    /// main-stream deletion step.
    pub async fn destroy_station_intern(
        &self,
        station_name: &str,
        actor: &Actor,
        non_native_remove: Option<StreamHook>,
    ) -> Result<()> {
        let station_name = StationName::from_external(station_name).map_err(|e| {
            warn!(error = %e, "rejected station name");
            e
        })?;

        let Some(station) = self.store().get_live_station(station_name.external()).await? else {
            // The historical message names the zero-valued record, not the
            // requested name.
            let err = Error::not_found("Station", "");
            warn!(station = %station_name, "{err}");
            return Err(err);
        };

        self.remove_station_resources(&station, non_native_remove)
            .await?;

        self.store()
            .tombstone_station(station_name.external())
            .await?;

        let message = format!(
            "Station {} has been deleted by user {}",
            station_name.external(),
            actor.username
        );
        info!("{message}");
        self.audit(station_name.external(), &message, actor).await;
        self.analytics()
            .send_event(&actor.username, "user-remove-station")
            .await;

        Ok(())
    }

    /// Tear down everything a station owns besides its metadata record:
    /// both streams, tag attachments, client records, and audit history.
    pub(crate) async fn remove_station_resources(
        &self,
        station: &Station,
        non_native_remove: Option<StreamHook>,
    ) -> Result<()> {
        let station_name = StationName::from_external(&station.name)?;

        match non_native_remove {
            Some(hook) => hook.await?,
            None => self.engine().delete_stream(station_name.internal()).await?,
        }
        self.engine()
            .delete_stream(&dls_stream_name(station_name.internal()))
            .await?;

        self.store().remove_tags_from_station(&station.id).await?;
        self.store()
            .deactivate_station_clients(&station.id)
            .await?;

        if let Err(e) = self
            .store()
            .remove_audit_logs_by_station(&station.name)
            .await
        {
            error!(station = %station.name, error = %e, "failed removing audit logs");
        }

        Ok(())
    }

    /// Change a station's dead-letter capture switches. Returns the applied
    /// configuration.
    pub async fn update_dls_config(
        &self,
        station_name: &str,
        config: DlsConfiguration,
    ) -> Result<DlsConfiguration> {
        let station_name = StationName::from_external(station_name)?;
        let station = self
            .store()
            .get_live_station(station_name.external())
            .await?
            .ok_or_else(|| Error::not_found("Station", station_name.external()))?;

        if station.dls_configuration != config {
            self.store()
                .update_station_dls_config(station_name.external(), config)
                .await?;
        }

        Ok(config)
    }

    /// Startup reconciliation: every live station must have a DLS stream.
    ///
    /// Stations created before the dead-letter subsystem existed get one
    /// retrofitted, with both capture switches enabled. Detection keys off
    /// the engine's typed stream-not-found error; any other engine error
    /// aborts the bootstrap.
    pub async fn launch_dls_for_old_stations(&self) -> Result<()> {
        for station in self.store().list_live_stations().await? {
            let station_name = StationName::from_external(&station.name)?;
            let stream = dls_stream_name(station_name.internal());

            match self.engine().stream_info(&stream).await {
                Ok(_) => {}
                Err(e) if e.is_stream_not_found() => {
                    info!(station = %station_name, "retrofitting DLS stream");
                    self.store()
                        .update_station_dls_config(
                            station_name.external(),
                            DlsConfiguration::all(),
                        )
                        .await?;
                    self.engine()
                        .create_stream(dls_stream_config(&station_name, &station))
                        .await?;
                }
                Err(e) => {
                    error!(station = %station_name, error = %e, "DLS bootstrap aborted");
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}

/// Engine configuration of a station's main stream.
fn main_stream_config(name: &StationName, station: &Station) -> StreamConfig {
    let mut config = StreamConfig {
        name: name.internal().to_string(),
        subjects: vec![station_subject(name.internal())],
        storage: engine_storage(station.storage_type),
        replicas: station.replicas,
        duplicate_window_ms: station.idempotency_window_in_ms,
        ..Default::default()
    };

    match station.retention_type {
        RetentionType::MessageAgeSec => config.max_age_secs = station.retention_value,
        RetentionType::Messages => config.max_msgs = station.retention_value,
        RetentionType::Bytes => config.max_bytes = station.retention_value,
    }

    config
}

/// Engine configuration of a station's dead-letter stream. The DLS is
/// unbounded; entries leave it only through ack or station destruction.
fn dls_stream_config(name: &StationName, station: &Station) -> StreamConfig {
    let stream = dls_stream_name(name.internal());
    StreamConfig {
        subjects: vec![format!("{stream}.>")],
        name: stream,
        storage: engine_storage(station.storage_type),
        replicas: station.replicas,
        ..Default::default()
    }
}

fn engine_storage(storage: StorageType) -> StreamStorage {
    match storage {
        StorageType::File => StreamStorage::File,
        StorageType::Memory => StreamStorage::Memory,
    }
}
