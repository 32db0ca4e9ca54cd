//! Schema attach/detach and propagation integration tests.

mod common;

use roundhouse::constants::schema_updates_subject;
use roundhouse::error::Error;
use roundhouse::metadata::models::{ProducerSchemaUpdate, SchemaUpdateType};
use roundhouse::metadata::MetadataStore;
use roundhouse::types::Actor;
use roundhouse::wire::requests::{CreateProducerRequest, CreateStationRequest};

use common::{harness, seed_connection, seed_schema, Harness};

async fn station(h: &Harness, name: &str) {
    h.control
        .create_station(
            &CreateStationRequest {
                name: name.to_string(),
                ..Default::default()
            },
            &Actor::user("root"),
        )
        .await
        .unwrap();
}

fn updates_on(h: &Harness, station_internal: &str) -> Vec<ProducerSchemaUpdate> {
    h.wire
        .published_to(&schema_updates_subject(station_internal))
        .iter()
        .map(|m| serde_json::from_slice(&m.payload).unwrap())
        .collect()
}

#[tokio::test]
async fn test_attach_schema_binds_and_notifies() {
    let h = harness();
    station(&h, "Orders").await;
    seed_schema(&h.store, "orderv1", 3).await;

    let init = h
        .control
        .attach_schema("OrderV1", "Orders", &Actor::user("root"))
        .await
        .unwrap();
    assert_eq!(init.schema_name, "orderv1");
    assert_eq!(init.active_version.version_number, 3);

    // Binding persisted on the live record.
    let stored = h.store.get_live_station("orders").await.unwrap().unwrap();
    assert_eq!(stored.schema.schema_name, "orderv1");
    assert_eq!(stored.schema.version_number, 3);

    // An init update went out on the station's update subject.
    let updates = updates_on(&h, "orders");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].update_type, SchemaUpdateType::Init);
    assert_eq!(updates[0].init.schema_name, "orderv1");
    assert_eq!(updates[0].init.active_version.version_number, 3);
}

#[tokio::test]
async fn test_attach_missing_schema_fails() {
    let h = harness();
    station(&h, "orders").await;

    let err = h
        .control
        .attach_schema("ghost", "orders", &Actor::user("root"))
        .await
        .unwrap_err();
    assert_eq!(err, Error::SchemaMissing("ghost".to_string()));
    assert!(updates_on(&h, "orders").is_empty());
}

#[tokio::test]
async fn test_attach_to_missing_station_fails() {
    let h = harness();
    seed_schema(&h.store, "orderv1", 1).await;

    let err = h
        .control
        .attach_schema("orderv1", "ghost", &Actor::user("root"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Station ghost does not exist");
}

#[tokio::test]
async fn test_detach_schema_clears_binding_and_notifies() {
    let h = harness();
    station(&h, "orders").await;
    seed_schema(&h.store, "orderv1", 2).await;
    let actor = Actor::user("root");

    h.control
        .attach_schema("orderv1", "orders", &actor)
        .await
        .unwrap();
    h.control.detach_schema("orders", true, &actor).await.unwrap();

    let stored = h.store.get_live_station("orders").await.unwrap().unwrap();
    assert!(!stored.schema.is_bound());

    // Updates preserve binding-change order: init then drop.
    let updates = updates_on(&h, "orders");
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].update_type, SchemaUpdateType::Init);
    assert_eq!(updates[1].update_type, SchemaUpdateType::Drop);
}

#[tokio::test]
async fn test_detach_without_db_update_only_notifies() {
    let h = harness();
    station(&h, "orders").await;
    seed_schema(&h.store, "orderv1", 1).await;
    let actor = Actor::user("root");
    h.control
        .attach_schema("orderv1", "orders", &actor)
        .await
        .unwrap();

    h.control.detach_schema("orders", false, &actor).await.unwrap();

    // Binding untouched, drop still broadcast.
    let stored = h.store.get_live_station("orders").await.unwrap().unwrap();
    assert!(stored.schema.is_bound());
    let updates = updates_on(&h, "orders");
    assert_eq!(updates.last().unwrap().update_type, SchemaUpdateType::Drop);
}

#[tokio::test]
async fn test_updates_on_dotted_station_use_internal_name() {
    let h = harness();
    station(&h, "prod.orders").await;
    seed_schema(&h.store, "orderv1", 1).await;

    h.control
        .attach_schema("orderv1", "prod.orders", &Actor::user("root"))
        .await
        .unwrap();

    assert_eq!(updates_on(&h, "prod#orders").len(), 1);
}

#[tokio::test]
async fn test_schema_updates_available_flag() {
    let h = harness();
    station(&h, "orders").await;
    seed_schema(&h.store, "orderv1", 2).await;
    let actor = Actor::user("root");
    h.control
        .attach_schema("orderv1", "orders", &actor)
        .await
        .unwrap();

    // Bound at the active version: nothing newer.
    let updates = h
        .control
        .get_updates_for_schema_by_station("orders", &actor)
        .await
        .unwrap();
    assert!(!updates.updates_available);
    assert_eq!(updates.active_version.version_number, 2);

    // A newer active version appears: updates become available.
    seed_schema(&h.store, "orderv2", 1).await;
    h.control
        .attach_schema("orderv2", "orders", &actor)
        .await
        .unwrap();
    seed_schema(&h.store, "orderv2", 2).await; // re-seed with a newer active
    let updates = h
        .control
        .get_updates_for_schema_by_station("orders", &actor)
        .await
        .unwrap();
    assert!(updates.updates_available);

    // Historical quirk: the read-only handler reports an "apply" event.
    assert!(h
        .analytics
        .events()
        .iter()
        .any(|(_, e)| e == "user-apply-schema-updates-on-station"));
}

#[tokio::test]
async fn test_v1_producer_creation_returns_bound_schema() {
    let h = harness();
    station(&h, "orders").await;
    seed_schema(&h.store, "orderv1", 3).await;
    let actor = Actor::application("sdk-user");
    h.control
        .attach_schema("orderv1", "orders", &actor)
        .await
        .unwrap();
    let connection_id = seed_connection(&h.store).await;

    let update = h
        .control
        .create_producer(
            &CreateProducerRequest {
                name: "P1".to_string(),
                station_name: "orders".to_string(),
                connection_id: connection_id.to_string(),
                producer_type: "application".to_string(),
                req_version: 1,
            },
            &actor,
        )
        .await
        .unwrap();

    let update = update.expect("bound station returns a schema update");
    assert_eq!(update.schema_name, "orderv1");
    assert_eq!(update.active_version.version_number, 3);
}

#[tokio::test]
async fn test_producer_creation_without_binding_returns_none() {
    let h = harness();
    station(&h, "orders").await;
    let connection_id = seed_connection(&h.store).await;

    let update = h
        .control
        .create_producer(
            &CreateProducerRequest {
                name: "p1".to_string(),
                station_name: "orders".to_string(),
                connection_id: connection_id.to_string(),
                producer_type: "application".to_string(),
                req_version: 1,
            },
            &Actor::application("sdk-user"),
        )
        .await
        .unwrap();

    assert!(update.is_none());
}
