//! Executable step contract for flow nodes.
//!
//! This module provides the core abstractions for node execution: the
//! [`NodeStep`] trait, the [`StepContext`] handed to each invocation, the
//! [`StepOutput`] a step returns, and step error handling.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::event_bus::FlowEvent;
use crate::run::VariableScope;
use crate::types::{CellTag, ConnectorId, NodeId, RunId};
use crate::value::FlowValue;

/// Core trait defining an executable node step.
///
/// A step is the external collaborator behind a node kind: it receives the
/// node's config, the resolved input arguments, and a read-only scope
/// snapshot, and produces the node's declared outputs. Steps must be
/// stateless across invocations; every run (and every batch cell) calls
/// them with a fresh context.
///
/// # Streaming
///
/// A step may surface non-terminal partial values through
/// [`StepContext::emit_partial`] before returning. Partials travel the same
/// variable-change channel as finals but are flagged non-final; the run does
/// not treat the connector's value as produced until the step returns.
///
/// # Cancellation
///
/// Long-running steps should poll [`StepContext::is_cancelled`] (or select
/// on [`StepContext::cancelled`]) at their own suspension points and bail
/// out with [`StepError::Cancelled`]. The executor never forcibly
/// interrupts an in-flight step; it discards the result instead.
///
/// # Examples
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use loomflow::behavior::{NodeStep, StepContext, StepError, StepOutput};
/// use loomflow::value::FlowValue;
///
/// struct Uppercase;
///
/// #[async_trait]
/// impl NodeStep for Uppercase {
///     async fn execute(&self, ctx: StepContext) -> Result<StepOutput, StepError> {
///         let text = ctx.arg("input").as_text().unwrap_or_default().to_string();
///         Ok(StepOutput::single(FlowValue::Text(text.to_uppercase())))
///     }
/// }
/// ```
#[async_trait]
pub trait NodeStep: Send + Sync {
    /// Execute this step with the given context.
    async fn execute(&self, ctx: StepContext) -> Result<StepOutput, StepError>;
}

/// Execution context passed to a step invocation.
///
/// Owns clones of everything the step may touch, so the step can hold the
/// context across await points without borrowing from the executor.
#[derive(Clone, Debug)]
pub struct StepContext {
    /// The run this invocation belongs to.
    pub run_id: RunId,
    /// The node being executed.
    pub node_id: NodeId,
    /// Kind-specific node configuration.
    pub config: serde_json::Value,
    /// Resolved input values, keyed by input connector name.
    pub args: FxHashMap<String, FlowValue>,
    /// Read-only copy of the scope at invocation time.
    pub scope: VariableScope,
    /// Cooperative cancellation signal for this run.
    pub cancel: CancellationToken,
    pub(crate) event_sender: flume::Sender<FlowEvent>,
    pub(crate) primary_output: Option<ConnectorId>,
    pub(crate) cell: Option<CellTag>,
}

impl StepContext {
    /// The resolved value of the named input, or [`FlowValue::Empty`] when
    /// the input is disconnected.
    pub fn arg(&self, name: &str) -> FlowValue {
        self.args.get(name).cloned().unwrap_or(FlowValue::Empty)
    }

    /// Emit a non-terminal partial value for this node's primary output
    /// connector.
    ///
    /// Partial emission from a node without an output connector is dropped
    /// with a warning rather than failing the step.
    pub fn emit_partial(&self, value: FlowValue) -> Result<(), StepContextError> {
        let Some(connector) = &self.primary_output else {
            tracing::warn!(
                node_id = %self.node_id,
                "partial value emitted by node without an output connector; dropped"
            );
            return Ok(());
        };
        let mut event =
            FlowEvent::variable_partial(self.run_id.as_str(), connector.as_str(), value);
        if let Some(cell) = self.cell {
            event = event.tagged(cell);
        }
        self.event_sender
            .send(event)
            .map_err(|_| StepContextError::EventChannelClosed)
    }

    /// Emit a diagnostic event enriched with this node's identity.
    pub fn emit(
        &self,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), StepContextError> {
        let message = format!("[{}] {}", self.node_id, message.into());
        self.event_sender
            .send(FlowEvent::diagnostic(scope, message))
            .map_err(|_| StepContextError::EventChannelClosed)
    }

    /// Whether this run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when this run is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

/// The declared outputs of one step invocation.
///
/// Most nodes produce one value; [`single`](Self::single) maps it onto the
/// node's sole output connector. Multi-output nodes return
/// [`named`](Self::named) values keyed by output connector name.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutput {
    /// One value for the node's single output connector.
    Single(FlowValue),
    /// Values keyed by output connector name.
    Named(FxHashMap<String, FlowValue>),
    /// No outputs (sink-like nodes).
    None,
}

impl StepOutput {
    #[must_use]
    pub fn single(value: FlowValue) -> Self {
        StepOutput::Single(value)
    }

    #[must_use]
    pub fn named(values: FxHashMap<String, FlowValue>) -> Self {
        StepOutput::Named(values)
    }

    #[must_use]
    pub fn none() -> Self {
        StepOutput::None
    }
}

/// Errors that can occur when using StepContext methods.
#[derive(Debug, Error, Diagnostic)]
pub enum StepContextError {
    /// Event could not be sent because the run's event channel is gone.
    #[error("failed to emit event: event channel closed")]
    #[diagnostic(
        code(loomflow::step::event_channel_closed),
        help("The run's event bus listener has shut down. Check run lifecycle.")
    )]
    EventChannelClosed,
}

/// Errors a step invocation can fail with.
///
/// Every variant is treated the same by the executor: the node is marked
/// failed, a NodeErrors lifecycle event is emitted, and the rest of the run
/// halts. Retry policy belongs inside the step implementation, not here.
#[derive(Debug, Error, Diagnostic)]
pub enum StepError {
    /// A required input resolved to nothing.
    #[error("missing required input: {what}")]
    #[diagnostic(
        code(loomflow::step::missing_input),
        help("Check that the upstream node produced the required value.")
    )]
    MissingInput { what: String },

    /// The node's config could not be interpreted.
    #[error("invalid config: {reason}")]
    #[diagnostic(
        code(loomflow::step::invalid_config),
        help("Check the node's configuration record.")
    )]
    InvalidConfig { reason: String },

    /// External transport or timeout failure.
    #[error("transport error: {message}")]
    #[diagnostic(code(loomflow::step::transport))]
    Transport { message: String },

    /// The step observed cancellation and stopped early.
    #[error("step cancelled")]
    #[diagnostic(code(loomflow::step::cancelled))]
    Cancelled,

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(loomflow::step::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Any other step failure.
    #[error("{0}")]
    #[diagnostic(code(loomflow::step::failed))]
    Failed(String),

    /// Event channel error while streaming partials.
    #[error("event channel error: {0}")]
    #[diagnostic(code(loomflow::step::event_channel))]
    EventChannel(#[from] StepContextError),
}
