//! Consumer lifecycle.
//!
//! Consumers always belong to a consumer group; a create that names no
//! group joins a group named after the consumer. Group-level ack and
//! redelivery settings are derived from the first member at read time, so
//! creation only validates and records them.

use chrono::Utc;
use tracing::{info, warn};

use crate::constants::{DEFAULT_MAX_ACK_TIME_MS, DEFAULT_MAX_MSG_DELIVERIES};
use crate::error::{Error, Result};
use crate::metadata::models::Consumer;
use crate::station::{validate_entity_name, StationName};
use crate::types::{Actor, Id};
use crate::wire::requests::CreateConsumerRequest;

use super::ControlPlane;

impl ControlPlane {
    /// Register a consumer, creating its station with defaults when absent.
    pub async fn create_consumer(
        &self,
        request: &CreateConsumerRequest,
        actor: &Actor,
    ) -> Result<()> {
        let name = request.name.to_lowercase();
        validate_entity_name(&name, "Consumer").map_err(|e| {
            warn!(consumer = %request.name, error = %e, "rejected consumer name");
            e
        })?;

        let consumers_group = if request.consumers_group.is_empty() {
            name.clone()
        } else {
            let group = request.consumers_group.to_lowercase();
            validate_entity_name(&group, "Consumer group")?;
            group
        };

        let station_name = StationName::from_external(&request.station_name)?;
        let connection_id = Id::from(request.connection_id.as_str());
        self.store()
            .get_connection(&connection_id)
            .await?
            .ok_or_else(|| Error::not_found("Connection", request.connection_id.clone()))?;

        let station = self.station_or_default(&station_name, actor).await?;

        if self
            .store()
            .get_active_consumer(&station.id, &name)
            .await?
            .is_some()
        {
            let err = Error::Validation(format!(
                "Consumer {name} at station {} already exists",
                station_name.external()
            ));
            warn!(station = %station_name, "{err}");
            return Err(err);
        }

        let max_ack_time_ms = if request.max_ack_time_ms > 0 {
            request.max_ack_time_ms
        } else {
            DEFAULT_MAX_ACK_TIME_MS
        };
        let max_msg_deliveries = if request.max_msg_deliveries > 0 {
            request.max_msg_deliveries
        } else {
            DEFAULT_MAX_MSG_DELIVERIES
        };

        self.store()
            .insert_consumer(Consumer {
                id: Id::new(),
                name: name.clone(),
                station_id: station.id.clone(),
                consumer_type: request.consumer_type.clone(),
                connection_id,
                consumers_group,
                max_ack_time_ms,
                max_msg_deliveries,
                created_by_user: actor.username.clone(),
                is_active: true,
                is_deleted: false,
                creation_date: Utc::now(),
            })
            .await?;

        let message = format!(
            "Consumer {name} has been created by user {}",
            actor.username
        );
        info!(station = %station_name, "{message}");
        self.audit(station_name.external(), &message, actor).await;
        self.analytics()
            .send_event(&actor.username, "user-create-consumer")
            .await;

        Ok(())
    }

    /// Deregister a consumer: mark it inactive and deleted.
    pub async fn destroy_consumer(
        &self,
        station_name: &str,
        consumer_name: &str,
        actor: &Actor,
    ) -> Result<()> {
        let station_name = StationName::from_external(station_name)?;
        let name = consumer_name.to_lowercase();

        let station = self
            .store()
            .get_live_station(station_name.external())
            .await?
            .ok_or_else(|| Error::not_found("Station", station_name.external()))?;

        if !self.store().deactivate_consumer(&station.id, &name).await? {
            let err = Error::not_found("Consumer", name.clone());
            warn!(station = %station_name, "{err}");
            return Err(err);
        }

        let message = format!(
            "Consumer {name} has been deleted by user {}",
            actor.username
        );
        info!(station = %station_name, "{message}");
        self.audit(station_name.external(), &message, actor).await;
        self.analytics()
            .send_event(&actor.username, "user-remove-consumer")
            .await;

        Ok(())
    }
}
