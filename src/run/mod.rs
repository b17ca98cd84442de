//! Single-run execution: the runner, its options and report, and the
//! variable scope runs accumulate values in.
//!
//! One run executes one immutable snapshot from flow inputs to flow
//! outputs. The batch module layers row/iteration fan-out on top of this by
//! launching one run per cell.

pub mod executor;
pub mod scope;

pub use executor::{FlowRunner, RunOptions, RunReport};
pub use scope::VariableScope;
