//! The external interface the core reads columnar data through (§6 of the
//! design). Any storage backend -- object-storage-backed parquet, or (as
//! here) an in-memory fixture -- can implement these traits; the engine
//! never assumes a concrete layout.

use crate::error::Result;
use tempo_model::Value;

/// Summary statistics a predicate may consult before deciding whether to
/// open a chunk, without reading any values.
#[derive(Debug, Clone, Default)]
pub struct ColumnStatistics {
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub has_nulls: bool,
}

/// A handle to one column's data within one row group. Reference-counted by
/// the backend; `next_page`/`close` release backend resources as the core
/// advances past them.
pub trait ColumnChunk: Send {
    fn statistics(&self) -> Option<&ColumnStatistics> {
        None
    }

    /// Returns the next page, or `None` when the chunk is exhausted.
    fn next_page(&mut self) -> Result<Option<Box<dyn Page>>>;

    fn close(&mut self);
}

/// A sub-unit of a column chunk: the unit of I/O and of reslicing.
pub trait Page: Send {
    fn num_rows(&self) -> usize;

    /// A fresh value reader for this page's values, in row order.
    fn values(&self) -> Box<dyn ValueReader>;

    /// Repetition levels for each value in the page, if the column is
    /// repeated; `None` for a column with no repeated ancestor (every value
    /// starts a new row, repetition level implicitly 0).
    fn repetition_levels(&self) -> Option<&[u8]>;

    /// Returns a page covering just `[offset_rows, offset_rows+num_rows)` of
    /// this page's rows, for in-page skip-ahead.
    fn slice(&self, offset_rows: usize, num_rows: usize) -> Box<dyn Page>;

    fn release(&mut self);
}

/// Pulls values out of a page's backing storage in batches.
pub trait ValueReader: Send {
    /// Appends up to `buf.capacity() - buf.len()` values (or `max` more if
    /// `buf` has no spare capacity) to `buf`. Returns the number of values
    /// written and whether the page is now exhausted.
    fn read_values(&mut self, buf: &mut Vec<Value>, max: usize) -> Result<(usize, bool)>;
}

/// One horizontal slab of rows across all columns in a block.
pub trait RowGroup: Send {
    fn num_rows(&self) -> usize;

    fn column_chunk(&self, column_index: usize) -> Result<Box<dyn ColumnChunk>>;
}

/// A readable block: an ordered sequence of row groups.
pub trait BlockReader {
    fn row_groups(&self) -> Vec<Box<dyn RowGroup>>;
}
