//! Runtime values and declared value kinds for flow variables.
//!
//! [`FlowValue`] is the value a connector holds during a run; [`ValueKind`]
//! is the type a connector *declares* in the graph. The two meet in the
//! coercion policy applied when edges are replaced: declared kinds follow
//! the wiring, runtime values flow through it.
//!
//! The audio kind is distinguished: audio-typed sources only connect into
//! targets that accept audio, and rewiring across the audio boundary retypes
//! the target connector. See [`ValueKind::accepts`] and
//! [`ValueKind::coerce_on_replace`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared type of a connector, as stored in the graph.
///
/// Connectors may also be untyped (`value_kind: None` on the connector),
/// which accepts anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Plain text. The generic fallback kind.
    Text,
    /// Floating-point number.
    Number,
    /// Boolean.
    Bool,
    /// Arbitrary structured JSON.
    Json,
    /// Binary audio payload. The distinguished incompatible kind.
    Audio,
}

impl ValueKind {
    /// Whether a source of kind `source` may legally connect into a target
    /// declared as `target`.
    ///
    /// Only the audio kind restricts wiring: an audio source requires an
    /// audio-typed or untyped target. Everything else is accepted and left
    /// to runtime representation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use loomflow::value::ValueKind;
    ///
    /// assert!(ValueKind::accepts(Some(ValueKind::Number), Some(ValueKind::Text)));
    /// assert!(ValueKind::accepts(Some(ValueKind::Audio), None));
    /// assert!(!ValueKind::accepts(Some(ValueKind::Audio), Some(ValueKind::Text)));
    /// ```
    #[must_use]
    pub fn accepts(source: Option<ValueKind>, target: Option<ValueKind>) -> bool {
        match source {
            Some(ValueKind::Audio) => matches!(target, None | Some(ValueKind::Audio)),
            _ => true,
        }
    }

    /// Declared-kind coercion applied to an exclusive target when the edge
    /// feeding it is replaced by one with a differently kinded source.
    ///
    /// The policy table, made explicit:
    ///
    /// | displaced source | incoming source | target becomes |
    /// |------------------|-----------------|----------------|
    /// | non-audio        | audio           | `Audio`        |
    /// | audio            | non-audio       | `Text`         |
    /// | otherwise        |                 | unchanged      |
    ///
    /// The upgrade is explicit; the downgrade falls back to the generic
    /// text kind rather than the incoming source's kind. Returns `None`
    /// when no retype is required.
    #[must_use]
    pub fn coerce_on_replace(
        displaced: Option<ValueKind>,
        incoming: Option<ValueKind>,
    ) -> Option<ValueKind> {
        let displaced_audio = displaced == Some(ValueKind::Audio);
        let incoming_audio = incoming == Some(ValueKind::Audio);
        match (displaced_audio, incoming_audio) {
            (false, true) => Some(ValueKind::Audio),
            (true, false) => Some(ValueKind::Text),
            _ => None,
        }
    }

    /// Declared-kind coercion applied to a target when a fresh edge lands
    /// on it. An audio source retypes an untyped target explicitly; nothing
    /// else retypes anything.
    #[must_use]
    pub fn coerce_on_connect(
        source: Option<ValueKind>,
        target: Option<ValueKind>,
    ) -> Option<ValueKind> {
        if source == Some(ValueKind::Audio) && target != Some(ValueKind::Audio) {
            Some(ValueKind::Audio)
        } else {
            None
        }
    }

    /// Declared-kind coercion applied to a surviving target when its
    /// incoming edge is removed. Losing an audio source downgrades the
    /// target to the generic text kind; losing any other source changes
    /// nothing.
    #[must_use]
    pub fn coerce_on_disconnect(
        source: Option<ValueKind>,
        target: Option<ValueKind>,
    ) -> Option<ValueKind> {
        if source == Some(ValueKind::Audio) && target == Some(ValueKind::Audio) {
            Some(ValueKind::Text)
        } else {
            None
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Number => write!(f, "number"),
            Self::Bool => write!(f, "bool"),
            Self::Json => write!(f, "json"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Reference to a binary audio payload.
///
/// Payload bytes are carried base64-encoded so the value stays serde-friendly
/// end to end; the engine never inspects the content.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioRef {
    /// MIME type of the payload, e.g. `"audio/wav"`.
    pub media_type: String,
    /// Base64-encoded payload bytes.
    pub data: String,
}

/// A value held by a connector during one run.
///
/// `Empty` is the well-defined value of a disconnected optional input; it is
/// not an error and not the same as an absent scope entry (absent means the
/// upstream node has not produced the value yet).
///
/// # Examples
///
/// ```rust
/// use loomflow::value::{FlowValue, ValueKind};
///
/// let v = FlowValue::Text("hello".to_string());
/// assert_eq!(v.kind(), Some(ValueKind::Text));
/// assert!(FlowValue::Empty.is_empty());
/// assert_eq!(FlowValue::from(3.5).kind(), Some(ValueKind::Number));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FlowValue {
    /// Well-defined "nothing": disconnected optional inputs resolve to this.
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Json(serde_json::Value),
    Audio(AudioRef),
}

impl FlowValue {
    /// The declared kind this value corresponds to; `Empty` has none.
    #[must_use]
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            FlowValue::Empty => None,
            FlowValue::Text(_) => Some(ValueKind::Text),
            FlowValue::Number(_) => Some(ValueKind::Number),
            FlowValue::Bool(_) => Some(ValueKind::Bool),
            FlowValue::Json(_) => Some(ValueKind::Json),
            FlowValue::Audio(_) => Some(ValueKind::Audio),
        }
    }

    /// Returns `true` for [`Empty`](Self::Empty).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, FlowValue::Empty)
    }

    /// Text content if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FlowValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness used by condition predicates: empty, `false`, zero, empty
    /// text, JSON `null`, and empty JSON containers are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            FlowValue::Empty => false,
            FlowValue::Text(s) => !s.is_empty(),
            FlowValue::Number(n) => *n != 0.0,
            FlowValue::Bool(b) => *b,
            FlowValue::Json(v) => match v {
                serde_json::Value::Null => false,
                serde_json::Value::Bool(b) => *b,
                serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
                serde_json::Value::String(s) => !s.is_empty(),
                serde_json::Value::Array(a) => !a.is_empty(),
                serde_json::Value::Object(o) => !o.is_empty(),
            },
            FlowValue::Audio(a) => !a.data.is_empty(),
        }
    }

    /// Normalized JSON view, used by condition predicates for equality and
    /// containment checks. `Empty` maps to JSON `null`.
    #[must_use]
    pub fn as_json(&self) -> serde_json::Value {
        match self {
            FlowValue::Empty => serde_json::Value::Null,
            FlowValue::Text(s) => serde_json::Value::String(s.clone()),
            FlowValue::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            FlowValue::Bool(b) => serde_json::Value::Bool(*b),
            FlowValue::Json(v) => v.clone(),
            FlowValue::Audio(a) => serde_json::json!({
                "media_type": a.media_type,
                "data": a.data,
            }),
        }
    }

    /// Short single-line rendering for logs and sinks. Audio payloads are
    /// summarized, never dumped.
    #[must_use]
    pub fn preview(&self) -> String {
        const MAX: usize = 80;
        match self {
            FlowValue::Empty => "<empty>".to_string(),
            FlowValue::Text(s) => {
                if s.len() > MAX {
                    let cut = s
                        .char_indices()
                        .take_while(|(i, _)| *i < MAX)
                        .last()
                        .map_or(0, |(i, c)| i + c.len_utf8());
                    format!("{}…", &s[..cut])
                } else {
                    s.clone()
                }
            }
            FlowValue::Number(n) => n.to_string(),
            FlowValue::Bool(b) => b.to_string(),
            FlowValue::Json(v) => {
                let rendered = v.to_string();
                if rendered.len() > MAX {
                    let cut = rendered
                        .char_indices()
                        .take_while(|(i, _)| *i < MAX)
                        .last()
                        .map_or(0, |(i, c)| i + c.len_utf8());
                    format!("{}…", &rendered[..cut])
                } else {
                    rendered
                }
            }
            FlowValue::Audio(a) => format!("<audio {} {} bytes b64>", a.media_type, a.data.len()),
        }
    }
}

impl Default for FlowValue {
    fn default() -> Self {
        FlowValue::Empty
    }
}

impl From<&str> for FlowValue {
    fn from(s: &str) -> Self {
        FlowValue::Text(s.to_string())
    }
}

impl From<String> for FlowValue {
    fn from(s: String) -> Self {
        FlowValue::Text(s)
    }
}

impl From<f64> for FlowValue {
    fn from(n: f64) -> Self {
        FlowValue::Number(n)
    }
}

impl From<bool> for FlowValue {
    fn from(b: bool) -> Self {
        FlowValue::Bool(b)
    }
}

impl From<serde_json::Value> for FlowValue {
    fn from(v: serde_json::Value) -> Self {
        FlowValue::Json(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_source_rejected_by_typed_target() {
        assert!(!ValueKind::accepts(
            Some(ValueKind::Audio),
            Some(ValueKind::Number)
        ));
        assert!(ValueKind::accepts(
            Some(ValueKind::Audio),
            Some(ValueKind::Audio)
        ));
        assert!(ValueKind::accepts(Some(ValueKind::Audio), None));
    }

    #[test]
    fn replace_coercion_is_audio_asymmetric() {
        // Upgrade is explicit.
        assert_eq!(
            ValueKind::coerce_on_replace(Some(ValueKind::Text), Some(ValueKind::Audio)),
            Some(ValueKind::Audio)
        );
        // Downgrade always lands on text, even when the incoming kind is known.
        assert_eq!(
            ValueKind::coerce_on_replace(Some(ValueKind::Audio), Some(ValueKind::Number)),
            Some(ValueKind::Text)
        );
        // Non-audio retyping does not touch the target.
        assert_eq!(
            ValueKind::coerce_on_replace(Some(ValueKind::Text), Some(ValueKind::Number)),
            None
        );
        assert_eq!(
            ValueKind::coerce_on_replace(Some(ValueKind::Audio), Some(ValueKind::Audio)),
            None
        );
    }

    #[test]
    fn truthiness_covers_json_shapes() {
        assert!(!FlowValue::Json(serde_json::json!(null)).is_truthy());
        assert!(!FlowValue::Json(serde_json::json!([])).is_truthy());
        assert!(FlowValue::Json(serde_json::json!({"a": 1})).is_truthy());
        assert!(!FlowValue::Text(String::new()).is_truthy());
        assert!(FlowValue::Number(0.5).is_truthy());
    }

    #[test]
    fn preview_truncates_long_text() {
        let long = "x".repeat(200);
        let shown = FlowValue::Text(long).preview();
        assert!(shown.chars().count() <= 81);
        assert!(shown.ends_with('…'));
    }
}
