//! Batch execution over tabular input.
//!
//! A batch turns one flow into `rows x repeat_times` independent cell runs,
//! bounded by a concurrency limit. The [`Table`] carries the input rows,
//! [`BatchRunner`] fans cells out over a worker pool, and the [`CellBoard`]
//! exposes per-cell progress while the batch drains.

pub mod runner;
pub mod table;

pub use runner::{BatchHandle, BatchOptions, BatchReport, BatchRunner, CellBoard, CellState};
pub use table::{Table, TableError};
