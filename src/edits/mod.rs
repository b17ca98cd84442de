//! Graph edits: events, the static cascade allow-list, and the derivation
//! engine that keeps snapshots consistent.
//!
//! Everything that changes a flow graph goes through [`FlowEngine::submit`]
//! as an [`EditEvent`] — the UI layer, loaders, and [`FlowBuilder`] alike —
//! so every construction path pays the same consistency rules.

pub mod allowlist;
pub mod builder;
pub mod engine;
pub mod event;

pub use builder::FlowBuilder;
pub use engine::{EditError, EditReport, FlowEngine};
pub use event::{EditEvent, EditEventKind};
