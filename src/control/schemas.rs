//! Schema bindings and live propagation to producers.
//!
//! Attaching or detaching a schema mutates the station's binding in the
//! metadata store and then notifies live producers on the station's update
//! subject. The publish happens on the same task that applied the metadata
//! update, which is what guarantees per-station ordering of updates;
//! delivery itself is fire-and-forget, producers re-subscribe on reconnect.

use tracing::{error, info, warn};

use crate::constants::schema_updates_subject;
use crate::error::{Error, Result};
use crate::metadata::models::{
    ProducerSchemaUpdate, Schema, SchemaUpdateInit, SchemaVersion, StationSchemaUpdates,
};
use crate::station::StationName;
use crate::types::Actor;

use super::ControlPlane;

impl ControlPlane {
    /// Attach a schema to a station at its current active version and
    /// notify the station's producers.
    pub async fn attach_schema(
        &self,
        schema_name: &str,
        station_name: &str,
        actor: &Actor,
    ) -> Result<SchemaUpdateInit> {
        let station_name = StationName::from_external(station_name)?;
        if self
            .store()
            .get_live_station(station_name.external())
            .await?
            .is_none()
        {
            let err = Error::not_found("Station", station_name.external());
            warn!(station = %station_name, "{err}");
            return Err(err);
        }

        let schema_name = schema_name.to_lowercase();
        let schema = self
            .store()
            .get_schema(&schema_name)
            .await?
            .ok_or_else(|| Error::SchemaMissing(schema_name.clone()))?;
        let version = self
            .store()
            .get_active_version(&schema.id)
            .await?
            .ok_or_else(|| Error::Store(format!("schema {schema_name} has no active version")))?;

        self.store()
            .update_station_schema(
                station_name.external(),
                crate::metadata::models::SchemaBinding::new(&schema_name, version.version_number),
            )
            .await?;

        let message = format!(
            "Schema {schema_name} has been attached to station {} by user {}",
            station_name.external(),
            actor.username
        );
        info!("{message}");
        self.audit(station_name.internal(), &message, actor).await;
        self.analytics()
            .send_event(&actor.username, "user-attach-schema-to-station")
            .await;

        let init = schema_update_init(&schema, &version);
        self.publish_schema_update(&station_name, &ProducerSchemaUpdate::init(init.clone()))
            .await;

        Ok(init)
    }

    /// Detach a station's schema and notify its producers.
    ///
    /// `update_db` is false on paths where the binding is already gone
    /// (station teardown) and only the producer notification is needed.
    pub async fn detach_schema(
        &self,
        station_name: &str,
        update_db: bool,
        _actor: &Actor,
    ) -> Result<()> {
        let station_name = StationName::from_external(station_name)?;
        if self
            .store()
            .get_live_station(station_name.external())
            .await?
            .is_none()
        {
            let err = Error::not_found("Station", station_name.external());
            warn!(station = %station_name, "{err}");
            return Err(err);
        }

        if update_db {
            self.store()
                .clear_station_schema(station_name.external())
                .await?;
        }

        self.publish_schema_update(&station_name, &ProducerSchemaUpdate::drop())
            .await;

        Ok(())
    }

    /// Whether a newer active version exists for the schema a station is
    /// bound to, with the active version's content.
    pub async fn get_updates_for_schema_by_station(
        &self,
        station_name: &str,
        actor: &Actor,
    ) -> Result<StationSchemaUpdates> {
        let station_name = StationName::from_external(station_name)?;
        let station = self
            .store()
            .get_live_station(station_name.external())
            .await?
            .ok_or_else(|| Error::not_found("Station", station_name.external()))?;

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
        let active = self
            .store()
            .get_active_version(&schema.id)
            .await?
            .ok_or_else(|| Error::Store(format!("schema {} has no active version", schema.name)))?;

        // Historical quirk: this read-only handler reports an "apply" event.
        self.analytics()
            .send_event(&actor.username, "user-apply-schema-updates-on-station")
            .await;

        Ok(StationSchemaUpdates {
            schema_name: schema.name.clone(),
            updates_available: active.version_number != station.schema.version_number,
            active_version: (&active).into(),
            schema_type: schema.schema_type,
        })
    }

    /// Broadcast a schema update on the station's update subject.
    ///
    /// Best-effort: a failed publish is logged, never propagated. Producers
    /// that miss it fetch the binding on reconnect.
    pub(crate) async fn publish_schema_update(
        &self,
        station_name: &StationName,
        update: &ProducerSchemaUpdate,
    ) {
        let subject = schema_updates_subject(station_name.internal());
        match serde_json::to_vec(update) {
            Ok(payload) => {
                if let Err(e) = self.wire().publish(&subject, payload.into()).await {
                    warn!(station = %station_name, error = %e, "schema update publish failed");
                }
            }
            Err(e) => {
                error!(station = %station_name, error = %e, "schema update serialization failed");
            }
        }
    }
}

/// Render a schema and one of its versions as an init-update payload.
pub(crate) fn schema_update_init(schema: &Schema, version: &SchemaVersion) -> SchemaUpdateInit {
    SchemaUpdateInit {
        schema_name: schema.name.clone(),
        active_version: version.into(),
        schema_type: schema.schema_type.clone(),
    }
}
