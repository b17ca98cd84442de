//! The graph store: immutable snapshots plus the patches that evolve them.
//!
//! The store is deliberately passive. It validates nothing and decides
//! nothing; the derivation engine in [`crate::edits`] owns consistency, and
//! [`FlowSnapshot::apply`] merely folds an already-validated
//! [`SnapshotPatch`] into the next snapshot. This keeps every read path
//! lock-free (executors share `&FlowSnapshot`) and makes "did anything
//! change" a value comparison.

pub mod patch;
pub mod snapshot;

pub use patch::{PatchOp, SnapshotPatch};
pub use snapshot::{Connector, Edge, FlowNode, FlowSnapshot, Position};
