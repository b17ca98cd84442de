//! The flow space façade: one opened space wiring the derivation engine,
//! event bus, executors, and debounced persistence together.
//!
//! This is the intended entry point for applications. Lower layers stay
//! usable on their own (the engine for headless editing, the runners for
//! embedding), but `FlowSpace` is where their lifecycles meet: every edit
//! goes through the engine, every content change schedules a debounced
//! save, and every run emits into the space's bus.

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tracing::instrument;

use super::config::{PersistenceMode, RuntimeConfig};
use super::debounce::DebouncedSaver;
use super::store::{InMemorySpaceStore, SpaceStore, StoreError};
use crate::batch::{BatchHandle, BatchRunner, Table};
use crate::behavior::BehaviorRegistry;
use crate::edits::{EditError, EditEvent, EditReport, FlowEngine};
use crate::event_bus::{EventBus, EventStream, FlowEvent};
use crate::graph::FlowSnapshot;
use crate::run::{FlowRunner, RunOptions, RunReport};
use crate::types::SpaceId;

/// Failures while opening or closing a space.
#[derive(Debug, Error, Diagnostic)]
pub enum SpaceError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// One opened flow space.
pub struct FlowSpace {
    space_id: SpaceId,
    config: RuntimeConfig,
    engine: FlowEngine,
    registry: Arc<BehaviorRegistry>,
    bus: EventBus,
    saver: Arc<DebouncedSaver>,
}

impl FlowSpace {
    /// Open a space per `config`: build the configured store, load the
    /// space's snapshot (or start empty), start the event bus listener, and
    /// apply the config's column bindings.
    #[instrument(skip(config, registry), fields(space_id = ?config.space_id))]
    pub async fn open(config: RuntimeConfig, registry: BehaviorRegistry) -> Result<Self, SpaceError> {
        let space_id = config
            .space_id
            .clone()
            .unwrap_or_else(SpaceId::generate);

        let store: Arc<dyn SpaceStore> = match config.persistence {
            PersistenceMode::InMemory => Arc::new(InMemorySpaceStore::new()),
            #[cfg(feature = "sqlite")]
            PersistenceMode::Sqlite => {
                let db_name = config
                    .sqlite_db_name
                    .clone()
                    .unwrap_or_else(|| "loomflow.db".to_string());
                Arc::new(super::store_sqlite::SqliteSpaceStore::connect(&format!(
                    "sqlite://{db_name}"
                ))
                .await?)
            }
        };

        let snapshot = store.load(&space_id).await?.unwrap_or_default();
        let registry = Arc::new(registry);
        let mut engine = FlowEngine::with_snapshot(registry.as_ref().clone(), snapshot);

        for (connector, column) in &config.column_bindings {
            if let Err(err) =
                engine.submit(EditEvent::set_column_binding(connector.clone(), *column))
            {
                tracing::warn!(
                    connector = %connector,
                    error = %err,
                    "configured column binding skipped"
                );
            }
        }

        let bus = config.event_bus.build_event_bus();
        bus.listen_for_events();

        let saver = DebouncedSaver::new(space_id.clone(), store, config.save_debounce);

        Ok(Self {
            space_id,
            config,
            engine,
            registry,
            bus,
            saver,
        })
    }

    pub fn space_id(&self) -> &SpaceId {
        &self.space_id
    }

    pub fn snapshot(&self) -> &FlowSnapshot {
        self.engine.snapshot()
    }

    pub fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    /// Apply one edit. A content-changing edit schedules a debounced save;
    /// a no-op edit schedules nothing.
    pub fn submit(&mut self, event: EditEvent) -> Result<EditReport, EditError> {
        let report = self.engine.submit(event)?;
        if report.content_changed {
            self.saver.request_save(self.engine.snapshot().clone());
        }
        Ok(report)
    }

    /// Apply a sequence of edits, stopping at the first error.
    pub fn submit_all(
        &mut self,
        events: impl IntoIterator<Item = EditEvent>,
    ) -> Result<Vec<EditReport>, EditError> {
        events.into_iter().map(|ev| self.submit(ev)).collect()
    }

    /// Subscribe to this space's lifecycle event stream.
    pub fn subscribe(&self) -> EventStream {
        self.bus.subscribe()
    }

    /// The ingress side of this space's event bus, for external emitters.
    pub fn events(&self) -> flume::Sender<FlowEvent> {
        self.bus.get_sender()
    }

    /// A runner pinned to the current snapshot. Edits made after this call
    /// do not affect runs started from it.
    pub fn runner(&self) -> FlowRunner {
        FlowRunner::new(
            Arc::new(self.engine.snapshot().clone()),
            Arc::clone(&self.registry),
        )
    }

    /// Run options pre-wired to this space's event bus.
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions::new(self.bus.get_sender())
    }

    /// Execute the flow once with live values as inputs.
    pub async fn run_interactive(&self) -> RunReport {
        self.run_with(self.run_options()).await
    }

    /// Execute the flow once with explicit options.
    pub async fn run_with(&self, options: RunOptions) -> RunReport {
        self.runner().run(options).await
    }

    /// Launch a batch over `table` using this config's fan-out knobs.
    pub fn start_batch(&self, table: Table) -> BatchHandle {
        BatchRunner::new(self.runner(), self.bus.get_sender())
            .start(table, self.config.batch_options())
    }

    /// Force any pending debounced save to disk now.
    pub async fn flush(&self) {
        self.saver.flush().await;
    }

    /// Flush pending writes and stop the event bus listener.
    pub async fn close(self) {
        self.saver.flush().await;
        self.bus.stop_listener().await;
    }
}
