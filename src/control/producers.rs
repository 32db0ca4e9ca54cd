//! Producer lifecycle.
//!
//! Producers register against a station and a connection. A create against
//! an absent station creates the station first with all defaults, so SDK
//! clients can start producing without a separate provisioning step. The
//! v1+ reply carries the station's active schema so the producer can start
//! validating immediately.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::metadata::models::{Producer, SchemaUpdateInit, Station};
use crate::station::{validate_entity_name, StationName};
use crate::types::{Actor, Id};
use crate::wire::requests::{CreateProducerRequest, CreateStationRequest};

use super::schemas::schema_update_init;
use super::ControlPlane;

impl ControlPlane {
    /// Register a producer. Returns the station's active schema when one is
    /// bound, for the v1+ reply.
    pub async fn create_producer(
        &self,
        request: &CreateProducerRequest,
        actor: &Actor,
    ) -> Result<Option<SchemaUpdateInit>> {
        let name = request.name.to_lowercase();
        validate_entity_name(&name, "Producer").map_err(|e| {
            warn!(producer = %request.name, error = %e, "rejected producer name");
            e
        })?;

        let station_name = StationName::from_external(&request.station_name)?;
        let connection_id = Id::from(request.connection_id.as_str());
        self.store()
            .get_connection(&connection_id)
            .await?
            .ok_or_else(|| Error::not_found("Connection", request.connection_id.clone()))?;

        let station = self.station_or_default(&station_name, actor).await?;

        if self
            .store()
            .get_active_producer(&station.id, &name)
            .await?
            .is_some()
        {
            let err = Error::Validation(format!(
                "Producer {name} at station {} already exists",
                station_name.external()
            ));
            warn!(station = %station_name, "{err}");
            return Err(err);
        }

        self.store()
            .insert_producer(Producer {
                id: Id::new(),
                name: name.clone(),
                station_id: station.id.clone(),
                producer_type: request.producer_type.clone(),
                connection_id,
                created_by_user: actor.username.clone(),
                is_active: true,
                is_deleted: false,
                creation_date: Utc::now(),
            })
            .await?;

        let message = format!(
            "Producer {name} has been created by user {}",
            actor.username
        );
        info!(station = %station_name, "{message}");
        self.audit(station_name.external(), &message, actor).await;
        self.analytics()
            .send_event(&actor.username, "user-create-producer")
            .await;

        if !station.schema.is_bound() {
            return Ok(None);
        }

        let schema = self
            .store()
            .get_schema(&station.schema.schema_name)
            .await?
            .ok_or_else(|| {
                Error::Store(format!(
                    "station {} references schema {} which is missing",
                    station.name, station.schema.schema_name
                ))
            })?;
        let version = self
            .store()
            .get_active_version(&schema.id)
            .await?
            .ok_or_else(|| Error::Store(format!("schema {} has no active version", schema.name)))?;

        Ok(Some(schema_update_init(&schema, &version)))
    }

    /// Deregister a producer: mark it inactive and deleted.
    pub async fn destroy_producer(
        &self,
        station_name: &str,
        producer_name: &str,
        actor: &Actor,
    ) -> Result<()> {
        let station_name = StationName::from_external(station_name)?;
        let name = producer_name.to_lowercase();

        let station = self
            .store()
            .get_live_station(station_name.external())
            .await?
            .ok_or_else(|| Error::not_found("Station", station_name.external()))?;

        if !self.store().deactivate_producer(&station.id, &name).await? {
            let err = Error::not_found("Producer", name.clone());
            warn!(station = %station_name, "{err}");
            return Err(err);
        }

        let message = format!(
            "Producer {name} has been deleted by user {}",
            actor.username
        );
        info!(station = %station_name, "{message}");
        self.audit(station_name.external(), &message, actor).await;
        self.analytics()
            .send_event(&actor.username, "user-remove-producer")
            .await;

        Ok(())
    }

    /// Look up a live station, creating it with all defaults when absent.
    ///
    /// A concurrent creator winning the upsert race is fine: the station is
    /// re-fetched and used as-is.
    pub(crate) async fn station_or_default(
        &self,
        station_name: &StationName,
        actor: &Actor,
    ) -> Result<Station> {
        if let Some(station) = self
            .store()
            .get_live_station(station_name.external())
            .await?
        {
            return Ok(station);
        }

        let request = CreateStationRequest::with_defaults(station_name.external());
        match self.create_station_intern(&request, actor, None).await {
            Ok(station) => Ok(station),
            Err(Error::NameExists(_)) => self
                .store()
                .get_live_station(station_name.external())
                .await?
                .ok_or_else(|| Error::not_found("Station", station_name.external())),
            Err(e) => Err(e),
        }
    }
}
