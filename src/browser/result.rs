//! Query execution contract and the lazy result stream.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use super::calculators::WindowCalculator;
use crate::cell::Cell;
use crate::sql::Query;

/// One result row, by label.
pub type Record = Map<String, Value>;

/// Errors raised by an executor or its cursors. Passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("Query '{label}' failed: {message}")]
    Query { label: String, message: String },

    #[error("Cursor failed: {0}")]
    Cursor(String),

    #[error("Row has {found} values, expected {expected}")]
    RowShape { expected: usize, found: usize },
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// A forward-only cursor over positional rows.
pub trait Cursor: Send {
    /// Up to `n` rows; empty once exhausted.
    fn fetch_many(&mut self, n: usize) -> ExecutionResult<Vec<Vec<Value>>>;

    /// Release the cursor. Called at most once by the stream.
    fn close(&mut self);
}

/// Runs compiled queries.
pub trait Executor: Send + Sync {
    fn execute(&self, query: &Query, label: &str) -> ExecutionResult<Box<dyn Cursor>>;
}

/// Cursor over rows already in memory.
#[derive(Debug, Default)]
pub struct MemoryCursor {
    rows: VecDeque<Vec<Value>>,
    closed: Arc<AtomicBool>,
}

impl MemoryCursor {
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Self {
            rows: rows.into(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag set once the cursor has been closed.
    pub fn close_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl Cursor for MemoryCursor {
    fn fetch_many(&mut self, n: usize) -> ExecutionResult<Vec<Vec<Value>>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ExecutionError::Cursor("cursor is closed".into()));
        }
        let n = n.min(self.rows.len());
        Ok(self.rows.drain(..n).collect())
    }

    fn close(&mut self) {
        self.rows.clear();
        self.closed.store(true, Ordering::SeqCst);
    }
}

// =============================================================================
// Result stream
// =============================================================================

/// Lazy, single-pass records over a cursor.
///
/// Rows are fetched in batches. The cursor is closed when the stream is
/// exhausted, fails, is closed explicitly, or is dropped. Iterating a
/// closed stream yields nothing.
pub struct ResultStream {
    cursor: Option<Box<dyn Cursor>>,
    labels: Vec<String>,
    batch: VecDeque<Vec<Value>>,
    batch_size: usize,
    exclude_if_null: Vec<String>,
    calculators: Vec<WindowCalculator>,
}

impl ResultStream {
    pub fn new(cursor: Box<dyn Cursor>, labels: Vec<String>, batch_size: usize) -> Self {
        Self {
            cursor: Some(cursor),
            labels,
            batch: VecDeque::new(),
            batch_size: batch_size.max(1),
            exclude_if_null: vec![],
            calculators: vec![],
        }
    }

    /// Skip records where any of `names` is null.
    pub fn with_exclude_if_null(mut self, names: Vec<String>) -> Self {
        self.exclude_if_null = names;
        self
    }

    /// Run `calculators` over every record that is yielded.
    pub fn with_calculators(mut self, calculators: Vec<WindowCalculator>) -> Self {
        self.calculators = calculators;
        self
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }

    /// Release the cursor. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
        self.batch.clear();
    }

    fn to_record(&self, row: Vec<Value>) -> ExecutionResult<Record> {
        if row.len() != self.labels.len() {
            return Err(ExecutionError::RowShape {
                expected: self.labels.len(),
                found: row.len(),
            });
        }
        Ok(self.labels.iter().cloned().zip(row).collect())
    }

    fn excluded(&self, record: &Record) -> bool {
        self.exclude_if_null
            .iter()
            .any(|name| record.get(name).map_or(true, Value::is_null))
    }
}

impl Iterator for ResultStream {
    type Item = ExecutionResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.batch.is_empty() {
                let cursor = self.cursor.as_mut()?;
                match cursor.fetch_many(self.batch_size) {
                    Ok(rows) if rows.is_empty() => {
                        self.close();
                        return None;
                    }
                    Ok(rows) => self.batch.extend(rows),
                    Err(e) => {
                        self.close();
                        return Some(Err(e));
                    }
                }
            }

            let row = self.batch.pop_front()?;
            let mut record = match self.to_record(row) {
                Ok(r) => r,
                Err(e) => {
                    self.close();
                    return Some(Err(e));
                }
            };

            if self.excluded(&record) {
                continue;
            }
            for calculator in &mut self.calculators {
                calculator.apply(&mut record);
            }
            return Some(Ok(record));
        }
    }
}

impl Drop for ResultStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream")
            .field("labels", &self.labels)
            .field("buffered", &self.batch.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// =============================================================================
// Aggregation result
// =============================================================================

/// What an aggregation call produces.
#[derive(Debug)]
pub struct AggregationResult {
    pub cell: Cell,
    /// Requested aggregate names.
    pub aggregates: Vec<String>,
    pub summary: Option<Record>,
    /// Drilldown rows; `None` without drilldown or split.
    pub cells: Option<ResultStream>,
    /// Drilled levels per dimension.
    pub levels: BTreeMap<String, Vec<String>>,
    /// Labels of the drilldown rows.
    pub labels: Vec<String>,
    /// Number of drilldown groups before pagination.
    pub total_cell_count: Option<u64>,
    /// Aggregates computed by calculators rather than the database.
    pub calculators: Vec<String>,
    /// Aggregates whose null value suppresses a drilldown row.
    pub exclude_if_null: Vec<String>,
}

impl AggregationResult {
    pub fn new(cell: Cell, aggregates: Vec<String>) -> Self {
        Self {
            cell,
            aggregates,
            summary: None,
            cells: None,
            levels: BTreeMap::new(),
            labels: vec![],
            total_cell_count: None,
            calculators: vec![],
            exclude_if_null: vec![],
        }
    }

    /// Drain the drilldown rows.
    pub fn collect_cells(&mut self) -> ExecutionResult<Vec<Record>> {
        match self.cells.as_mut() {
            Some(stream) => stream.collect(),
            None => Ok(vec![]),
        }
    }
}
