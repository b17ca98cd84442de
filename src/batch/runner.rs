//! Batch execution: one independent run per (row, iteration) cell, fanned
//! out over a bounded worker pool.
//!
//! Cells never talk to each other. Every cell gets the same snapshot and the
//! same live values; only the column-bound flow inputs differ per row. The
//! cell board is the shared progress surface: workers update it the moment a
//! cell changes state, so callers can poll it while the batch is in flight.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::batch::Table;
use crate::errors::{ErrorDetail, ErrorEvent};
use crate::event_bus::{FlowEvent, STREAM_END_SCOPE};
use crate::run::{FlowRunner, RunOptions};
use crate::types::{CellStatus, CellTag, ConnectorId, RunId};
use crate::value::FlowValue;

/// Fan-out parameters for one batch.
#[derive(Clone, Copy, Debug)]
pub struct BatchOptions {
    /// Runs per row. Clamped to at least one.
    pub repeat_times: usize,
    /// Cells in flight at once. Clamped to at least one.
    pub concurrency_limit: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            repeat_times: 1,
            concurrency_limit: 4,
        }
    }
}

impl BatchOptions {
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
}

/// Live state of one cell on the board.
#[derive(Clone, Debug, Default)]
pub struct CellState {
    pub status: CellStatus,
    pub errors: Vec<ErrorEvent>,
    /// The cell run's produced values, present once the cell is terminal.
    pub values: FxHashMap<ConnectorId, FlowValue>,
}

/// Shared progress surface for one batch, updated by workers as cells move
/// through their lifecycle.
#[derive(Clone, Debug, Default)]
pub struct CellBoard {
    cells: Arc<Mutex<FxHashMap<CellTag, CellState>>>,
}

impl CellBoard {
    fn preset(&self, tags: &[CellTag]) {
        let mut cells = self.cells.lock();
        for tag in tags {
            cells.insert(
                *tag,
                CellState {
                    status: CellStatus::Waiting,
                    ..CellState::default()
                },
            );
        }
    }

    fn set_status(&self, tag: CellTag, status: CellStatus) {
        self.cells.lock().entry(tag).or_default().status = status;
    }

    fn record(&self, tag: CellTag, state: CellState) {
        self.cells.lock().insert(tag, state);
    }

    pub fn get(&self, tag: &CellTag) -> Option<CellState> {
        self.cells.lock().get(tag).cloned()
    }

    pub fn status(&self, tag: &CellTag) -> CellStatus {
        self.cells
            .lock()
            .get(tag)
            .map(|s| s.status)
            .unwrap_or_default()
    }

    /// A point-in-time copy of the whole board.
    pub fn snapshot(&self) -> FxHashMap<CellTag, CellState> {
        self.cells.lock().clone()
    }

    pub fn count_with_status(&self, status: CellStatus) -> usize {
        self.cells
            .lock()
            .values()
            .filter(|s| s.status == status)
            .count()
    }
}

/// What one finished batch did.
#[derive(Clone, Debug)]
pub struct BatchReport {
    pub total_cells: usize,
    pub completed: usize,
    pub interrupted: usize,
    pub cancelled: bool,
}

/// Control handle for an in-flight batch.
pub struct BatchHandle {
    cancel: CancellationToken,
    board: CellBoard,
    join: tokio::task::JoinHandle<BatchReport>,
}

impl BatchHandle {
    /// The batch's progress board; cheap to clone and poll while running.
    pub fn board(&self) -> CellBoard {
        self.board.clone()
    }

    /// Request cancellation. In-flight cells stop at their next suspension
    /// point; queued cells never start and are marked interrupted.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the batch to drain and return its report.
    pub async fn wait(self) -> BatchReport {
        self.join.await.unwrap_or(BatchReport {
            total_cells: 0,
            completed: 0,
            interrupted: 0,
            cancelled: true,
        })
    }
}

/// Fans a table out into per-cell runs over a bounded worker pool.
pub struct BatchRunner {
    runner: FlowRunner,
    events: flume::Sender<FlowEvent>,
}

impl BatchRunner {
    pub fn new(runner: FlowRunner, events: flume::Sender<FlowEvent>) -> Self {
        Self { runner, events }
    }

    /// Launch the batch and return immediately with its control handle.
    #[instrument(skip(self, table), fields(rows = table.row_count()))]
    pub fn start(&self, table: Table, options: BatchOptions) -> BatchHandle {
        let repeat_times = options.repeat_times.max(1);
        let workers = options.concurrency_limit.max(1);

        let tags: Vec<CellTag> = (0..table.row_count())
            .flat_map(|row| (0..repeat_times).map(move |iteration| CellTag::new(row, iteration)))
            .collect();

        let board = CellBoard::default();
        board.preset(&tags);

        let cancel = CancellationToken::new();
        let (tx, rx) = flume::unbounded::<CellTag>();
        for tag in &tags {
            // Unbounded queue with every cell pre-enqueued; send cannot fail
            // while rx is held below.
            let _ = tx.send(*tag);
        }
        drop(tx);

        let table = Arc::new(table);
        let total_cells = tags.len();
        let mut pool = JoinSet::new();
        for _ in 0..workers.min(total_cells.max(1)) {
            let worker = CellWorker {
                runner: self.runner.clone(),
                events: self.events.clone(),
                board: board.clone(),
                table: Arc::clone(&table),
                cancel: cancel.clone(),
                queue: rx.clone(),
            };
            pool.spawn(worker.drain());
        }
        drop(rx);

        let driver_board = board.clone();
        let driver_cancel = cancel.clone();
        let driver_events = self.events.clone();
        let join = tokio::spawn(async move {
            while pool.join_next().await.is_some() {}

            // Cells still Waiting after the pool drained were abandoned by
            // cancellation.
            let mut interrupted_waiting = 0;
            for (tag, state) in driver_board.snapshot() {
                if state.status == CellStatus::Waiting || state.status == CellStatus::Running {
                    driver_board.set_status(tag, CellStatus::Interrupted);
                    interrupted_waiting += 1;
                }
            }

            let completed = driver_board.count_with_status(CellStatus::Complete);
            let interrupted = driver_board.count_with_status(CellStatus::Interrupted);
            let cancelled = driver_cancel.is_cancelled();
            tracing::info!(
                total_cells,
                completed,
                interrupted,
                cancelled,
                abandoned = interrupted_waiting,
                "batch finished"
            );
            if driver_events
                .send(FlowEvent::diagnostic(STREAM_END_SCOPE, "batch finished"))
                .is_err()
            {
                tracing::warn!("event channel closed before batch end marker");
            }
            BatchReport {
                total_cells,
                completed,
                interrupted,
                cancelled,
            }
        });

        BatchHandle {
            cancel,
            board,
            join,
        }
    }
}

/// One worker of the pool: pulls cell tags until the queue drains or the
/// batch is cancelled.
struct CellWorker {
    runner: FlowRunner,
    events: flume::Sender<FlowEvent>,
    board: CellBoard,
    table: Arc<Table>,
    cancel: CancellationToken,
    queue: flume::Receiver<CellTag>,
}

impl CellWorker {
    async fn drain(self) {
        loop {
            let tag = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                tag = self.queue.recv_async() => match tag {
                    Ok(tag) => tag,
                    Err(_) => break,
                },
            };
            self.run_cell(tag).await;
        }
    }

    async fn run_cell(&self, tag: CellTag) {
        self.board.set_status(tag, CellStatus::Running);

        let mut options = RunOptions::new(self.events.clone())
            .with_run_id(RunId::generate())
            .with_cancel(self.cancel.child_token())
            .with_cell(tag);
        for (connector, value) in self.column_overrides(tag.row) {
            options = options.with_override(connector, value);
        }

        let report = self.runner.run(options).await;
        let status = if report.is_completed() {
            CellStatus::Complete
        } else {
            CellStatus::Interrupted
        };
        let mut errors = report.errors;
        if status == CellStatus::Interrupted {
            // Re-scope the failure to the cell so batch consumers see which
            // (row, iteration) it belongs to; the run's own error, when
            // there is one, becomes the cause.
            let mut detail = ErrorDetail::msg("cell interrupted before completion");
            if let Some(first) = errors.first() {
                detail = detail.with_cause(first.error.clone());
            }
            errors.push(ErrorEvent::cell(tag, detail));
        }
        self.board.record(
            tag,
            CellState {
                status,
                errors,
                values: report.scope.into_inner(),
            },
        );
    }

    /// Per-row flow input overrides from the snapshot's column bindings.
    /// A bound column missing from a ragged row reads as empty text.
    fn column_overrides(&self, row: usize) -> Vec<(ConnectorId, FlowValue)> {
        self.runner
            .snapshot()
            .column_bindings()
            .iter()
            .filter_map(|(connector, binding)| binding.map(|col| (connector.clone(), col)))
            .map(|(connector, col)| {
                let text = self.table.cell(row, col).unwrap_or_default().to_string();
                (connector, FlowValue::Text(text))
            })
            .collect()
    }
}
