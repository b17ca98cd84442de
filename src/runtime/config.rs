//! Runtime configuration for flow spaces.
//!
//! Explicit configuration always wins; the environment (via `dotenvy`) only
//! fills gaps. `LOOMFLOW_DB` names the sqlite database file and
//! `LOOMFLOW_EVENT_CAPACITY` sizes the event hub's subscriber buffer.

use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::batch::BatchOptions;
use crate::event_bus::{EventBus, EventSink, MemorySink, StdOutSink};
use crate::types::{ConnectorId, SpaceId};

/// Which [`SpaceStore`](crate::runtime::SpaceStore) backs a space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PersistenceMode {
    /// Keep snapshots in process memory only.
    #[default]
    InMemory,
    /// Durable sqlite store (requires the `sqlite` cargo feature).
    #[cfg(feature = "sqlite")]
    Sqlite,
}

/// Top-level knobs for opening and running one flow space.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// The space to open. `None` generates a fresh id (a new, empty space).
    pub space_id: Option<SpaceId>,
    pub persistence: PersistenceMode,
    /// Sqlite database file name, resolved against `LOOMFLOW_DB` when not
    /// set explicitly.
    pub sqlite_db_name: Option<String>,
    /// Batch runs per row. Clamped to at least one.
    pub repeat_times: usize,
    /// Batch cells in flight at once. Clamped to at least one.
    pub concurrency_limit: usize,
    /// Debounce window for persistence writes.
    pub save_debounce: Duration,
    /// Column bindings applied to the space on open, keyed by flow input
    /// connector.
    pub column_bindings: FxHashMap<ConnectorId, Option<usize>>,
    pub event_bus: EventBusConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            space_id: Some(SpaceId::generate()),
            persistence: PersistenceMode::InMemory,
            sqlite_db_name: Self::resolve_sqlite_db_name(None),
            repeat_times: 1,
            concurrency_limit: 4,
            save_debounce: Duration::from_millis(500),
            column_bindings: FxHashMap::default(),
            event_bus: EventBusConfig::default(),
        }
    }
}

impl RuntimeConfig {
    fn resolve_sqlite_db_name(provided: Option<String>) -> Option<String> {
        if let Some(name) = provided {
            return Some(name);
        }
        dotenvy::dotenv().ok();
        Some(std::env::var("LOOMFLOW_DB").unwrap_or_else(|_| "loomflow.db".to_string()))
    }

    #[must_use]
    pub fn with_space_id(mut self, space_id: impl Into<SpaceId>) -> Self {
        self.space_id = Some(space_id.into());
        self
    }

    #[must_use]
    pub fn with_persistence(mut self, persistence: PersistenceMode) -> Self {
        self.persistence = persistence;
        self
    }

    #[must_use]
    pub fn with_sqlite_db_name(mut self, name: impl Into<String>) -> Self {
        self.sqlite_db_name = Self::resolve_sqlite_db_name(Some(name.into()));
        self
    }

    #[must_use]
    pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
        self.repeat_times = repeat_times.max(1);
        self
    }

    #[must_use]
    pub fn with_concurrency_limit(mut self, concurrency_limit: usize) -> Self {
        self.concurrency_limit = concurrency_limit.max(1);
        self
    }

    #[must_use]
    pub fn with_save_debounce(mut self, window: Duration) -> Self {
        self.save_debounce = window;
        self
    }

    #[must_use]
    pub fn with_column_binding(
        mut self,
        connector: impl Into<ConnectorId>,
        column: Option<usize>,
    ) -> Self {
        self.column_bindings.insert(connector.into(), column);
        self
    }

    #[must_use]
    pub fn with_event_bus(mut self, event_bus: EventBusConfig) -> Self {
        self.event_bus = event_bus;
        self
    }

    #[must_use]
    pub fn with_stdout_event_bus(self) -> Self {
        self.with_event_bus(EventBusConfig::with_stdout_only())
    }

    #[must_use]
    pub fn with_memory_event_bus(self) -> Self {
        self.with_event_bus(EventBusConfig::with_memory_sink())
    }

    /// The batch fan-out knobs of this config.
    #[must_use]
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions::default()
            .with_repeat_times(self.repeat_times)
            .with_concurrency_limit(self.concurrency_limit)
    }
}

/// Declarative sink selection for [`EventBusConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkConfig {
    StdOut,
    Memory,
}

/// Event bus shape: subscriber buffer capacity plus the sink set.
#[derive(Clone, Debug)]
pub struct EventBusConfig {
    pub buffer_capacity: usize,
    pub sinks: Vec<SinkConfig>,
}

impl EventBusConfig {
    pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

    #[must_use]
    pub fn new(buffer_capacity: usize, sinks: Vec<SinkConfig>) -> Self {
        Self {
            buffer_capacity: if buffer_capacity == 0 {
                Self::DEFAULT_BUFFER_CAPACITY
            } else {
                buffer_capacity
            },
            sinks,
        }
    }

    #[must_use]
    pub fn with_stdout_only() -> Self {
        Self::new(Self::resolve_capacity(), vec![SinkConfig::StdOut])
    }

    #[must_use]
    pub fn with_memory_sink() -> Self {
        Self::new(
            Self::resolve_capacity(),
            vec![SinkConfig::StdOut, SinkConfig::Memory],
        )
    }

    #[must_use]
    pub fn add_sink(mut self, sink: SinkConfig) -> Self {
        if !self.sinks.contains(&sink) {
            self.sinks.push(sink);
        }
        self
    }

    fn resolve_capacity() -> usize {
        dotenvy::dotenv().ok();
        std::env::var("LOOMFLOW_EVENT_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Self::DEFAULT_BUFFER_CAPACITY)
    }

    /// Materialize the configured bus. The caller still has to start its
    /// listener.
    #[must_use]
    pub fn build_event_bus(&self) -> EventBus {
        let sinks: Vec<Box<dyn EventSink>> = self
            .sinks
            .iter()
            .map(|sink| match sink {
                SinkConfig::StdOut => Box::new(StdOutSink::default()) as Box<dyn EventSink>,
                SinkConfig::Memory => Box::new(MemorySink::new()) as Box<dyn EventSink>,
            })
            .collect();
        EventBus::with_sinks_and_capacity(sinks, self.buffer_capacity)
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::with_stdout_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_knobs_clamp_to_one() {
        let config = RuntimeConfig::default()
            .with_repeat_times(0)
            .with_concurrency_limit(0);
        assert_eq!(config.repeat_times, 1);
        assert_eq!(config.concurrency_limit, 1);
    }

    #[test]
    fn zero_capacity_falls_back_to_default() {
        let bus = EventBusConfig::new(0, vec![SinkConfig::Memory]);
        assert_eq!(bus.buffer_capacity, EventBusConfig::DEFAULT_BUFFER_CAPACITY);
    }

    #[test]
    fn add_sink_deduplicates() {
        let bus = EventBusConfig::with_stdout_only()
            .add_sink(SinkConfig::StdOut)
            .add_sink(SinkConfig::Memory);
        assert_eq!(bus.sinks, vec![SinkConfig::StdOut, SinkConfig::Memory]);
    }
}
