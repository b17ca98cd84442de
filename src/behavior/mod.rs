//! Node behaviors: connector shapes, default configs, and executable steps.
//!
//! The engine consumes this module's contract and nothing more: what slots a
//! node kind starts with ([`NodeBehavior::initial_connectors`]) and how it
//! runs ([`NodeStep`]). What a step actually does — call a model, evaluate a
//! script — lives behind the trait and stays out of the engine.

pub mod registry;
pub mod step;

pub use registry::{BehaviorError, BehaviorRegistry, ConnectorSpec, NodeBehavior};
pub use step::{NodeStep, StepContext, StepContextError, StepError, StepOutput};
