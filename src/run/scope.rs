//! The variable scope of one run: produced values keyed by connector.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::types::ConnectorId;
use crate::value::FlowValue;

/// Values produced so far in one run, keyed by the connector that carries
/// them.
///
/// The executor owns the scope and hands read-only copies to steps; a
/// connector is "produced" once its final value lands here, partials never
/// touch it. For batch cells the finished scope becomes the cell's value
/// map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableScope {
    values: FxHashMap<ConnectorId, FlowValue>,
}

impl VariableScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, connector_id: &ConnectorId) -> Option<&FlowValue> {
        self.values.get(connector_id)
    }

    /// The value at `connector_id`, or [`FlowValue::Empty`] when nothing has
    /// been produced there.
    pub fn value_or_empty(&self, connector_id: &ConnectorId) -> FlowValue {
        self.values
            .get(connector_id)
            .cloned()
            .unwrap_or(FlowValue::Empty)
    }

    pub fn set(&mut self, connector_id: impl Into<ConnectorId>, value: FlowValue) {
        self.values.insert(connector_id.into(), value);
    }

    pub fn contains(&self, connector_id: &ConnectorId) -> bool {
        self.values.contains_key(connector_id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConnectorId, &FlowValue)> {
        self.values.iter()
    }

    #[must_use]
    pub fn into_inner(self) -> FxHashMap<ConnectorId, FlowValue> {
        self.values
    }
}

impl From<FxHashMap<ConnectorId, FlowValue>> for VariableScope {
    fn from(values: FxHashMap<ConnectorId, FlowValue>) -> Self {
        Self { values }
    }
}

impl FromIterator<(ConnectorId, FlowValue)> for VariableScope {
    fn from_iter<T: IntoIterator<Item = (ConnectorId, FlowValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_connector_reads_empty() {
        let scope = VariableScope::new();
        assert_eq!(
            scope.value_or_empty(&ConnectorId::new("c1")),
            FlowValue::Empty
        );
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut scope = VariableScope::new();
        scope.set("c1", FlowValue::Text("hello".into()));
        assert_eq!(
            scope.get(&ConnectorId::new("c1")),
            Some(&FlowValue::Text("hello".into()))
        );
        assert_eq!(scope.len(), 1);
    }
}
