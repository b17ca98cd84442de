//! Batch input tables, parsed from CSV text.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures while parsing batch table text.
#[derive(Debug, Error, Diagnostic)]
pub enum TableError {
    #[error("failed to parse table: {0}")]
    #[diagnostic(
        code(loomflow::batch::table_parse),
        help("Batch tables are CSV text; the first record is the header row.")
    )]
    Csv(#[from] csv::Error),
}

/// A rectangular batch input: one header row plus data rows.
///
/// Rows are allowed to be ragged on the wire; [`cell`](Self::cell) reads a
/// missing trailing field as absent rather than erroring. An empty source
/// text still yields one empty data row, so a flow with no column bindings
/// runs its cells from live values alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse CSV text into a table. The first record is the header.
    pub fn parse(text: &str) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record?;
            records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        let mut records = records.into_iter();
        let header = records.next().unwrap_or_default();
        let rows: Vec<Vec<String>> = records.collect();
        if rows.is_empty() {
            return Ok(Self {
                header,
                rows: vec![vec![]],
            });
        }
        Ok(Self { header, rows })
    }

    /// Build a table directly, for programmatic callers and tests.
    #[must_use]
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let rows = if rows.is_empty() { vec![vec![]] } else { rows };
        Self { header, rows }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Number of data rows. Always at least one.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    /// Column index of a header name, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// The cell at `(row, column)`; absent for out-of-range rows and ragged
    /// short rows.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}
