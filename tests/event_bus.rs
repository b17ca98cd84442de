//! Event bus fan-out: sinks, broadcast subscribers, and run wiring.

mod common;

use std::time::Duration;

use common::*;
use loomflow::event_bus::{EventBus, FlowEvent, MemorySink};
use loomflow::run::{FlowRunner, RunOptions};
use loomflow::types::RunStatus;
use std::sync::Arc;

#[tokio::test]
async fn events_reach_both_sinks_and_subscribers() {
    let sink = MemorySink::new();
    let bus = EventBus::with_sink(sink.clone());
    bus.listen_for_events();
    let mut stream = bus.subscribe();

    let sender = bus.get_sender();
    sender
        .send(FlowEvent::diagnostic("test", "hello"))
        .unwrap();

    let received = stream
        .next_timeout(Duration::from_secs(1))
        .await
        .expect("subscriber should see the event");
    assert_eq!(received, FlowEvent::diagnostic("test", "hello"));

    bus.stop_listener().await;
    assert_eq!(sink.snapshot().len(), 1);
}

#[tokio::test]
async fn listener_startup_is_idempotent() {
    let sink = MemorySink::new();
    let bus = EventBus::with_sink(sink.clone());
    bus.listen_for_events();
    bus.listen_for_events();

    bus.get_sender()
        .send(FlowEvent::diagnostic("test", "once"))
        .unwrap();

    bus.stop_listener().await;
    // A duplicated listener would double-deliver into the sink.
    assert_eq!(sink.snapshot().len(), 1);
}

#[tokio::test]
async fn a_run_streams_its_lifecycle_through_the_bus() {
    let sink = MemorySink::new();
    let bus = EventBus::with_sink(sink.clone());
    bus.listen_for_events();

    let runner = FlowRunner::new(
        Arc::new(linear_flow(test_registry(), "upper", "hi")),
        Arc::new(test_registry()),
    );
    let report = runner.run(RunOptions::new(bus.get_sender())).await;
    assert!(report.is_completed());

    bus.stop_listener().await;
    let captured = sink.snapshot();

    let transitions: Vec<RunStatus> = captured
        .iter()
        .filter_map(|ev| match ev {
            FlowEvent::Run(t) => Some(t.status()),
            _ => None,
        })
        .collect();
    assert_eq!(transitions, vec![RunStatus::Running, RunStatus::Completed]);
    assert!(
        captured
            .iter()
            .any(|ev| matches!(ev, FlowEvent::Node(n) if n.node_id() == "work"))
    );
}

#[tokio::test]
async fn late_subscribers_miss_earlier_events() {
    let bus = EventBus::with_sink(MemorySink::new());
    bus.listen_for_events();

    bus.get_sender()
        .send(FlowEvent::diagnostic("test", "early"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut stream = bus.subscribe();
    bus.get_sender()
        .send(FlowEvent::diagnostic("test", "late"))
        .unwrap();

    let received = stream.next_timeout(Duration::from_secs(1)).await.unwrap();
    assert_eq!(received, FlowEvent::diagnostic("test", "late"));

    bus.stop_listener().await;
}
