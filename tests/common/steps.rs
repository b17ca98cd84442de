//! Test step implementations shared across integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use loomflow::behavior::{NodeStep, StepContext, StepError, StepOutput};
use loomflow::value::FlowValue;

/// Returns its `text` input unchanged.
#[derive(Debug, Clone)]
pub struct EchoStep;

#[async_trait]
impl NodeStep for EchoStep {
    async fn execute(&self, ctx: StepContext) -> Result<StepOutput, StepError> {
        Ok(StepOutput::single(ctx.arg("text")))
    }
}

/// Uppercases its `text` input.
#[derive(Debug, Clone)]
pub struct UpperStep;

#[async_trait]
impl NodeStep for UpperStep {
    async fn execute(&self, ctx: StepContext) -> Result<StepOutput, StepError> {
        let text = ctx.arg("text").as_text().unwrap_or_default().to_string();
        Ok(StepOutput::single(FlowValue::Text(text.to_uppercase())))
    }
}

/// Always fails with a fixed message.
#[derive(Debug, Clone)]
pub struct FailStep {
    pub message: &'static str,
}

impl FailStep {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

#[async_trait]
impl NodeStep for FailStep {
    async fn execute(&self, _ctx: StepContext) -> Result<StepOutput, StepError> {
        Err(StepError::Failed(self.message.to_string()))
    }
}

/// Streams its `text` input character by character as partial values, then
/// returns the whole text as the final value.
#[derive(Debug, Clone)]
pub struct StreamStep;

#[async_trait]
impl NodeStep for StreamStep {
    async fn execute(&self, ctx: StepContext) -> Result<StepOutput, StepError> {
        let text = ctx.arg("text").as_text().unwrap_or_default().to_string();
        let mut streamed = String::new();
        for ch in text.chars() {
            streamed.push(ch);
            ctx.emit_partial(FlowValue::Text(streamed.clone()))
                .map_err(StepError::EventChannel)?;
        }
        Ok(StepOutput::single(FlowValue::Text(text)))
    }
}

/// Sleeps before echoing, bailing out early on cancellation.
#[derive(Debug, Clone)]
pub struct SlowStep {
    pub delay: Duration,
}

impl SlowStep {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl NodeStep for SlowStep {
    async fn execute(&self, ctx: StepContext) -> Result<StepOutput, StepError> {
        tokio::select! {
            () = ctx.cancelled() => Err(StepError::Cancelled),
            () = tokio::time::sleep(self.delay) => Ok(StepOutput::single(ctx.arg("text"))),
        }
    }
}

/// Uppercases its `text` input, except a literal `"stall"`: that invocation
/// parks until it is cancelled. Lets one batch mix fast and stuck cells.
#[derive(Debug, Clone)]
pub struct StallStep;

#[async_trait]
impl NodeStep for StallStep {
    async fn execute(&self, ctx: StepContext) -> Result<StepOutput, StepError> {
        let text = ctx.arg("text").as_text().unwrap_or_default().to_string();
        if text == "stall" {
            ctx.cancelled().await;
            return Err(StepError::Cancelled);
        }
        Ok(StepOutput::single(FlowValue::Text(text.to_uppercase())))
    }
}

/// Tracks how many invocations run at once, for concurrency-bound tests.
#[derive(Debug)]
pub struct GaugeStep {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    delay: Duration,
}

impl GaugeStep {
    /// Returns the step and a handle to the observed peak concurrency.
    pub fn new(delay: Duration) -> (Self, Arc<AtomicUsize>) {
        let peak = Arc::new(AtomicUsize::new(0));
        (
            Self {
                active: Arc::new(AtomicUsize::new(0)),
                peak: Arc::clone(&peak),
                delay,
            },
            peak,
        )
    }
}

#[async_trait]
impl NodeStep for GaugeStep {
    async fn execute(&self, ctx: StepContext) -> Result<StepOutput, StepError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(StepOutput::single(ctx.arg("text")))
    }
}
