//! Space persistence: store round-trips and debounced saving.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use loomflow::runtime::{DebouncedSaver, InMemorySpaceStore, PersistedSpace, SpaceStore};
use loomflow::types::SpaceId;
use loomflow::utils::json_ext::JsonSerializable;
use loomflow::value::FlowValue;

#[tokio::test]
async fn store_round_trips_a_full_space() {
    let store = InMemorySpaceStore::new();
    let space_id = SpaceId::new("s1");
    let snapshot = linear_flow(test_registry(), "upper", "hello");

    store.save(&space_id, &snapshot).await.unwrap();
    let loaded = store.load(&space_id).await.unwrap().unwrap();

    assert_eq!(loaded, snapshot);
}

#[tokio::test]
async fn loading_an_unknown_space_is_none() {
    let store = InMemorySpaceStore::new();
    let loaded = store.load(&SpaceId::new("missing")).await.unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn persisted_payload_survives_a_json_round_trip() {
    let snapshot = linear_flow(test_registry(), "upper", "hello");

    let payload = PersistedSpace::from(&snapshot).to_json_string().unwrap();
    let restored: loomflow::graph::FlowSnapshot =
        PersistedSpace::from_json_str(&payload).unwrap().into();

    assert_eq!(restored, snapshot);
}

#[tokio::test]
async fn rapid_saves_coalesce_into_the_latest_snapshot() {
    let store = Arc::new(InMemorySpaceStore::new());
    let space_id = SpaceId::new("s1");
    let saver = DebouncedSaver::new(
        space_id.clone(),
        store.clone(),
        Duration::from_millis(20),
    );

    let first = linear_flow(test_registry(), "upper", "one");
    let second = linear_flow(test_registry(), "upper", "two");
    saver.request_save(first);
    saver.request_save(second.clone());

    // Nothing hits the store until the debounce window elapses.
    assert!(store.load(&space_id).await.unwrap().is_none());
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(store.load(&space_id).await.unwrap(), Some(second));
    assert!(!saver.has_pending());
}

#[tokio::test]
async fn flush_writes_pending_state_immediately() {
    let store = Arc::new(InMemorySpaceStore::new());
    let space_id = SpaceId::new("s1");
    // A long window that the test never waits out.
    let saver = DebouncedSaver::new(space_id.clone(), store.clone(), Duration::from_secs(60));

    let snapshot = linear_flow(test_registry(), "echo", "x");
    saver.request_save(snapshot.clone());
    saver.flush().await;

    assert_eq!(store.load(&space_id).await.unwrap(), Some(snapshot));
    assert!(!saver.has_pending());
}

#[tokio::test]
async fn resaving_an_unchanged_snapshot_schedules_nothing() {
    let store = Arc::new(InMemorySpaceStore::new());
    let space_id = SpaceId::new("s1");
    let saver = DebouncedSaver::new(space_id, store.clone(), Duration::from_secs(60));

    let snapshot = linear_flow(test_registry(), "echo", "x");
    saver.request_save(snapshot.clone());
    saver.flush().await;

    saver.request_save(snapshot);
    assert!(!saver.has_pending());
}

#[tokio::test]
async fn a_mutated_graph_round_trips_with_its_values() {
    use loomflow::edits::{EditEvent, FlowBuilder};
    use loomflow::types::NodeKind;

    let mut engine = FlowBuilder::new(test_registry())
        .add_node("in", NodeKind::FlowInput)
        .add_node("work", NodeKind::Custom("upper".into()))
        .connect("in", "input", "work", "text")
        .live_value("in", "input", FlowValue::Text("seed".into()))
        .into_engine();
    let input = connector_id(engine.snapshot(), "in", "input");
    engine
        .submit(EditEvent::set_column_binding(input.clone(), Some(1)))
        .unwrap();

    let store = InMemorySpaceStore::new();
    let space_id = SpaceId::new("s1");
    store.save(&space_id, engine.snapshot()).await.unwrap();
    let loaded = store.load(&space_id).await.unwrap().unwrap();

    assert_eq!(loaded.live_value(&input), Some(&FlowValue::Text("seed".into())));
    assert_eq!(loaded.column_binding(&input), Some(1));
    assert_eq!(&loaded, engine.snapshot());
}
