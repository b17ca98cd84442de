//! Event bus utilities providing fan-out, sinks, and subscriber APIs.
//!
//! The module is organised around a flume ingress channel drained by a
//! listener task ([`EventBus`]), pluggable [`EventSink`]s, and a
//! broadcast-based [`EventHub`] whose [`EventStream`] subscribers consume
//! the lifecycle events runs and batches emit.

pub mod bus;
pub mod event;
pub mod hub;
pub mod sink;

pub use bus::EventBus;
pub use event::{
    DiagnosticEvent, FlowEvent, NodeLifecycleEvent, NodePhase, RunTransitionEvent, STREAM_END_SCOPE,
    VariableValueEvent,
};
pub use hub::{BlockingEventIter, EventHub, EventStream, NoSubscribers};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
