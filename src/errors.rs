use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::telemetry::{FormatterMode, PlainFormatter, TelemetryFormatter};
use crate::types::CellTag;

/// Represents an error event with scope, error details, tags, and context.
///
/// # JSON Serialization Format
///
/// `ErrorEvent` serializes to JSON with the following structure:
///
/// ```json
/// {
///   "when": "2026-08-12T10:30:00Z",
///   "scope": {
///     "scope": "node",
///     "node": "node-42",
///     "run": "run-7"
///   },
///   "error": {
///     "message": "script step failed",
///     "cause": {
///       "message": "timeout after 30s",
///       "cause": null,
///       "details": {"elapsed_ms": 30000}
///     },
///     "details": {"attempt": 1}
///   },
///   "tags": ["execution"],
///   "context": {
///     "connector": "conn-9"
///   }
/// }
/// ```
///
/// The `scope` field uses a tagged union format with a discriminator field
/// named `"scope"`. Supported scope variants are:
/// - `"node"`: requires `node` (string) and `run` (string)
/// - `"cell"`: requires `row` (u64) and `iteration` (u64)
/// - `"run"`: requires `run` (string)
/// - `"persistence"`: requires `space` (string)
/// - `"app"`: no additional fields
///
/// # Examples
///
/// Using constructors and builders:
///
/// ```
/// use loomflow::errors::{ErrorEvent, ErrorDetail};
/// use serde_json::json;
///
/// let event = ErrorEvent::node("node-1", "run-1", ErrorDetail::msg("step failed"))
///     .with_tag("execution")
///     .with_context(json!({"connector": "conn-3"}));
///
/// let json_str = serde_json::to_string(&event).unwrap();
/// assert!(json_str.contains("\"scope\":\"node\""));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ErrorEvent {
    #[serde(default = "chrono::Utc::now")]
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub scope: ErrorScope,
    #[serde(default)]
    pub error: ErrorDetail,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: serde_json::Value,
}

impl ErrorEvent {
    /// Create a node-scoped error event for a failure inside one run.
    pub fn node<N: Into<String>, R: Into<String>>(node: N, run: R, error: ErrorDetail) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Node {
                node: node.into(),
                run: run.into(),
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Create a cell-scoped error event for a batch cell failure.
    pub fn cell(tag: CellTag, error: ErrorDetail) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Cell {
                row: tag.row,
                iteration: tag.iteration,
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Create a run-scoped error event.
    pub fn run<R: Into<String>>(run: R, error: ErrorDetail) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Run { run: run.into() },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Create a persistence-scoped error event for a failed space write.
    pub fn persistence<S: Into<String>>(space: S, error: ErrorDetail) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Persistence {
                space: space.into(),
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Replace the tag list on this error event.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Add a single tag to this error event.
    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Attach context metadata to this error event.
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ErrorScope {
    Node {
        node: String,
        run: String,
    },
    Cell {
        row: usize,
        iteration: usize,
    },
    Run {
        run: String,
    },
    Persistence {
        space: String,
    },
    #[default]
    App,
}

/// Message plus optional cause chain and structured details.
///
/// Kept serde-friendly and free of trait objects so it survives persistence
/// and the event stream unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorDetail>>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Default for ErrorDetail {
    fn default() -> Self {
        ErrorDetail {
            message: String::new(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorDetail {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c as &dyn std::error::Error)
    }
}

impl ErrorDetail {
    pub fn msg<M: Into<String>>(m: M) -> Self {
        ErrorDetail {
            message: m.into(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_cause(mut self, cause: ErrorDetail) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

/// Format error events with explicit color mode control.
///
/// - [`FormatterMode::Auto`]: auto-detects TTY capability (checks stderr)
/// - [`FormatterMode::Colored`]: always includes color codes
/// - [`FormatterMode::Plain`]: never includes color codes
///
/// # Examples
///
/// ```
/// use loomflow::errors::{ErrorEvent, ErrorDetail, pretty_print_with_mode};
/// use loomflow::telemetry::FormatterMode;
///
/// let events = vec![
///     ErrorEvent::node("node-1", "run-1", ErrorDetail::msg("step failed"))
/// ];
///
/// let plain = pretty_print_with_mode(&events, FormatterMode::Plain);
/// assert!(!plain.contains("\x1b["));
/// ```
pub fn pretty_print_with_mode(events: &[ErrorEvent], mode: FormatterMode) -> String {
    let formatter = PlainFormatter::with_mode(mode);
    let renders = formatter.render_errors(events);
    let mut out = String::new();
    for (idx, render) in renders.into_iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        for line in render.lines {
            out.push_str(&line);
        }
    }
    out
}

/// Format error events as human-readable text with auto-detected color
/// support. For explicit control, use [`pretty_print_with_mode`].
pub fn pretty_print(events: &[ErrorEvent]) -> String {
    pretty_print_with_mode(events, FormatterMode::Auto)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_indents_the_cause_chain() {
        let events = vec![
            ErrorEvent::node(
                "script",
                "run-1",
                ErrorDetail::msg("step failed").with_cause(
                    ErrorDetail::msg("timeout after 30s")
                        .with_cause(ErrorDetail::msg("socket closed")),
                ),
            ),
            ErrorEvent::run("run-1", ErrorDetail::msg("run halted")).with_tag("execution"),
        ];

        let out = pretty_print_with_mode(&events, FormatterMode::Plain);
        assert!(!out.contains('\x1b'), "plain mode emitted color codes");

        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("[0] "));
        assert!(lines[0].contains("Node"));
        assert_eq!(lines[1], "  error: step failed");
        assert_eq!(lines[2], "  cause: timeout after 30s");
        assert_eq!(lines[3], "    cause: socket closed");
        // Events are separated by a blank line.
        assert_eq!(lines[4], "");
        assert!(lines[5].starts_with("[1] "));
        assert_eq!(lines[6], "  error: run halted");
        assert_eq!(lines[7], "  tags: [\"execution\"]");
    }

    #[test]
    fn colored_mode_wraps_lines_in_ansi_codes() {
        let events = vec![ErrorEvent::cell(
            crate::types::CellTag::new(2, 1),
            ErrorDetail::msg("cell interrupted before completion"),
        )];

        let out = pretty_print_with_mode(&events, FormatterMode::Colored);
        assert!(out.contains('\x1b'));
        assert!(out.contains("cell interrupted before completion"));
        assert!(out.contains("Cell"));
    }
}
