//! Control-request dispatcher.
//!
//! Binds the eight control subjects under their queue groups and routes
//! each delivery to its lifecycle handler. The dispatch loop never blocks:
//! every request runs on its own tokio task.
//!
//! # Reply Guarantee
//!
//! Every request produces exactly one reply on its reply subject: empty
//! bytes on success, the error message otherwise. A handler panic still
//! replies (with a generic internal error); an unreplied request would be a
//! protocol bug, leaving the SDK client hanging until its own timeout.
//!
//! v1+ producer creations get a typed JSON reply instead of the
//! empty-or-error convention; version selection is carried on the request
//! envelope (`req_version`, absent means v0).

use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::constants::{
    CONSUMER_CREATIONS_GROUP, CONSUMER_CREATIONS_SUBJECT, CONSUMER_DESTRUCTIONS_GROUP,
    CONSUMER_DESTRUCTIONS_SUBJECT, PRODUCER_CREATIONS_GROUP, PRODUCER_CREATIONS_SUBJECT,
    PRODUCER_DESTRUCTIONS_GROUP, PRODUCER_DESTRUCTIONS_SUBJECT, SCHEMA_ATTACHMENTS_GROUP,
    SCHEMA_ATTACHMENTS_SUBJECT, SCHEMA_DETACHMENTS_GROUP, SCHEMA_DETACHMENTS_SUBJECT,
    STATION_CREATIONS_GROUP, STATION_CREATIONS_SUBJECT, STATION_DESTRUCTIONS_GROUP,
    STATION_DESTRUCTIONS_SUBJECT,
};
use crate::control::ControlPlane;
use crate::error::{Error, Result};
use crate::types::Actor;
use crate::wire::requests::{
    AttachSchemaRequest, CreateConsumerRequest, CreateProducerRequest, CreateProducerResponse,
    CreateStationRequest, DestroyConsumerRequest, DestroyProducerRequest, DestroyStationRequest,
    DetachSchemaRequest,
};
use crate::wire::{Delivery, DeliveryHandler, PubSub, SubscriptionId};

/// The fixed set of control subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSubject {
    StationCreations,
    StationDestructions,
    ProducerCreations,
    ProducerDestructions,
    ConsumerCreations,
    ConsumerDestructions,
    SchemaAttachments,
    SchemaDetachments,
}

impl ControlSubject {
    pub const ALL: [ControlSubject; 8] = [
        ControlSubject::StationCreations,
        ControlSubject::StationDestructions,
        ControlSubject::ProducerCreations,
        ControlSubject::ProducerDestructions,
        ControlSubject::ConsumerCreations,
        ControlSubject::ConsumerDestructions,
        ControlSubject::SchemaAttachments,
        ControlSubject::SchemaDetachments,
    ];

    /// The wire subject requests arrive on.
    pub fn subject(&self) -> &'static str {
        match self {
            ControlSubject::StationCreations => STATION_CREATIONS_SUBJECT,
            ControlSubject::StationDestructions => STATION_DESTRUCTIONS_SUBJECT,
            ControlSubject::ProducerCreations => PRODUCER_CREATIONS_SUBJECT,
            ControlSubject::ProducerDestructions => PRODUCER_DESTRUCTIONS_SUBJECT,
            ControlSubject::ConsumerCreations => CONSUMER_CREATIONS_SUBJECT,
            ControlSubject::ConsumerDestructions => CONSUMER_DESTRUCTIONS_SUBJECT,
            ControlSubject::SchemaAttachments => SCHEMA_ATTACHMENTS_SUBJECT,
            ControlSubject::SchemaDetachments => SCHEMA_DETACHMENTS_SUBJECT,
        }
    }

    /// The queue group the subject is subscribed under.
    pub fn queue_group(&self) -> &'static str {
        match self {
            ControlSubject::StationCreations => STATION_CREATIONS_GROUP,
            ControlSubject::StationDestructions => STATION_DESTRUCTIONS_GROUP,
            ControlSubject::ProducerCreations => PRODUCER_CREATIONS_GROUP,
            ControlSubject::ProducerDestructions => PRODUCER_DESTRUCTIONS_GROUP,
            ControlSubject::ConsumerCreations => CONSUMER_CREATIONS_GROUP,
            ControlSubject::ConsumerDestructions => CONSUMER_DESTRUCTIONS_GROUP,
            ControlSubject::SchemaAttachments => SCHEMA_ATTACHMENTS_GROUP,
            ControlSubject::SchemaDetachments => SCHEMA_DETACHMENTS_GROUP,
        }
    }
}

/// Bound control subscriptions.
pub struct Dispatcher {
    wire: Arc<dyn PubSub>,
    subscriptions: Vec<SubscriptionId>,
}

impl Dispatcher {
    /// Subscribe every control subject on `wire`, routing into `control`.
    pub async fn bind(control: Arc<ControlPlane>, wire: Arc<dyn PubSub>) -> Result<Self> {
        let mut subscriptions = Vec::with_capacity(ControlSubject::ALL.len());

        for subject in ControlSubject::ALL {
            let control = control.clone();
            let handler: DeliveryHandler = Arc::new(move |delivery: Delivery| {
                // The substrate may reuse the delivery buffer once this
                // callback returns.
                let delivery = Delivery {
                    payload: Bytes::copy_from_slice(&delivery.payload),
                    ..delivery
                };
                tokio::spawn(dispatch_delivery(control.clone(), subject, delivery));
            });

            let sid = wire
                .queue_subscribe(subject.subject(), subject.queue_group(), handler)
                .await?;
            subscriptions.push(sid);
        }

        Ok(Dispatcher {
            wire,
            subscriptions,
        })
    }

    /// Drop all control subscriptions.
    pub async fn shutdown(&self) {
        for sid in &self.subscriptions {
            let _ = self.wire.unsubscribe(*sid).await;
        }
    }
}

/// Handle one delivery, upholding the reply guarantee.
async fn dispatch_delivery(control: Arc<ControlPlane>, subject: ControlSubject, delivery: Delivery) {
    let reply_subject = delivery.reply.clone();
    let wire = control.wire();

    debug!(subject = subject.subject(), caller = %delivery.caller, "control request");

    // The handler runs on its own task so a panic is contained here and
    // still produces a reply.
    let reply = match tokio::spawn(route(control, subject, delivery)).await {
        Ok(reply) => reply,
        Err(join_error) => {
            error!(
                subject = subject.subject(),
                error = %join_error,
                "control handler panicked"
            );
            Bytes::from_static(b"internal server error")
        }
    };

    if reply_subject.is_empty() {
        if !reply.is_empty() {
            warn!(subject = subject.subject(), "dropping reply: no reply subject");
        }
        return;
    }

    if let Err(e) = wire.publish(&reply_subject, reply).await {
        error!(subject = subject.subject(), error = %e, "failed publishing reply");
    }
}

/// Route a delivery to its handler and encode the reply.
async fn route(control: Arc<ControlPlane>, subject: ControlSubject, delivery: Delivery) -> Bytes {
    match subject {
        ControlSubject::StationCreations => {
            empty_or_error(async {
                let request: CreateStationRequest = decode(&delivery.payload)?;
                let actor = Actor::application(delivery.caller.clone());
                control.create_station_intern(&request, &actor, None).await?;
                Ok(())
            })
            .await
        }
        ControlSubject::StationDestructions => {
            empty_or_error(async {
                let request: DestroyStationRequest = decode(&delivery.payload)?;
                let actor = Actor::application(delivery.caller.clone());
                control
                    .destroy_station_intern(&request.station_name, &actor, None)
                    .await
            })
            .await
        }
        ControlSubject::ProducerCreations => {
            let request: CreateProducerRequest = match decode(&delivery.payload) {
                Ok(request) => request,
                Err(e) => return Bytes::from(e.to_string()),
            };
            let actor = Actor::application(delivery.caller.clone());
            let result = control.create_producer(&request, &actor).await;

            if request.req_version >= 1 {
                // Typed reply for SDKs that understand it.
                let response = match result {
                    Ok(update) => CreateProducerResponse {
                        schema_update: update.unwrap_or_default(),
                        error: String::new(),
                    },
                    Err(e) => CreateProducerResponse {
                        error: e.to_string(),
                        ..Default::default()
                    },
                };
                match serde_json::to_vec(&response) {
                    Ok(payload) => Bytes::from(payload),
                    Err(e) => {
                        error!(error = %e, "producer response serialization failed");
                        Bytes::from_static(b"internal server error")
                    }
                }
            } else {
                match result {
                    Ok(_) => Bytes::new(),
                    Err(e) => Bytes::from(e.to_string()),
                }
            }
        }
        ControlSubject::ProducerDestructions => {
            empty_or_error(async {
                let request: DestroyProducerRequest = decode(&delivery.payload)?;
                let actor = Actor::application(delivery.caller.clone());
                control
                    .destroy_producer(&request.station_name, &request.name, &actor)
                    .await
            })
            .await
        }
        ControlSubject::ConsumerCreations => {
            empty_or_error(async {
                let request: CreateConsumerRequest = decode(&delivery.payload)?;
                let actor = Actor::application(delivery.caller.clone());
                control.create_consumer(&request, &actor).await
            })
            .await
        }
        ControlSubject::ConsumerDestructions => {
            empty_or_error(async {
                let request: DestroyConsumerRequest = decode(&delivery.payload)?;
                let actor = Actor::application(delivery.caller.clone());
                control
                    .destroy_consumer(&request.station_name, &request.name, &actor)
                    .await
            })
            .await
        }
        ControlSubject::SchemaAttachments => {
            empty_or_error(async {
                let request: AttachSchemaRequest = decode(&delivery.payload)?;
                let actor = Actor::sdk(delivery.caller.clone());
                control
                    .attach_schema(&request.name, &request.station_name, &actor)
                    .await?;
                Ok(())
            })
            .await
        }
        ControlSubject::SchemaDetachments => {
            empty_or_error(async {
                let request: DetachSchemaRequest = decode(&delivery.payload)?;
                let actor = Actor::sdk(delivery.caller.clone());
                control
                    .detach_schema(&request.station_name, true, &actor)
                    .await
            })
            .await
        }
    }
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    serde_json::from_slice(payload).map_err(Error::from)
}

async fn empty_or_error<F>(handler: F) -> Bytes
where
    F: std::future::Future<Output = Result<()>>,
{
    match handler.await {
        Ok(()) => Bytes::new(),
        Err(e) => Bytes::from(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subject_has_a_distinct_queue_group() {
        let mut groups: Vec<&str> = ControlSubject::ALL.iter().map(|s| s.queue_group()).collect();
        groups.sort();
        groups.dedup();
        assert_eq!(groups.len(), ControlSubject::ALL.len());
    }

    #[test]
    fn test_subjects_follow_the_wire_contract() {
        assert_eq!(
            ControlSubject::StationCreations.subject(),
            "$memphis_station_creations"
        );
        assert_eq!(
            ControlSubject::SchemaDetachments.subject(),
            "$memphis_schema_detachments"
        );
        assert_eq!(
            ControlSubject::StationCreations.queue_group(),
            "memphis_station_creations_listeners_group"
        );
    }
}
