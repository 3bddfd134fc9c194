//! `IteratorResult`: the tuple every column/compositional iterator in
//! `parquetquery` produces, and the opaque metadata it may carry alongside
//! projected column values.

use crate::row_number::RowNumber;
use crate::value::Value;

/// Iterator-synthesized metadata attached under a key in `other_entries`.
/// Most commonly a nested `IteratorResult` representing a child group (e.g.
/// the span-level match nested under a trace-level join).
#[derive(Debug, Clone)]
pub enum OtherValue {
    Nested(Box<IteratorResult>),
}

/// `(RowNumber, entries, other_entries)`. `entries` holds `(key, Value)`
/// pairs selected by upstream iterators in insertion order; duplicate keys
/// are permitted. `other_entries` holds `(key, OtherValue)` pairs for
/// iterator-synthesized data that isn't itself a column value.
///
/// Owned by the iterator that returned it; valid only until the next call
/// on that iterator. Reused via a [`crate::pool::ResultPool`] (defined in
/// `parquetquery`, which depends on this crate) to avoid per-tuple
/// allocation.
#[derive(Debug, Clone, Default)]
pub struct IteratorResult {
    pub row: RowNumber,
    pub entries: Vec<(String, Value)>,
    pub other_entries: Vec<(String, OtherValue)>,
}

impl IteratorResult {
    pub fn new(row: RowNumber) -> Self {
        Self {
            row,
            entries: Vec::new(),
            other_entries: Vec::new(),
        }
    }

    /// Clears contents but keeps the allocated backing storage, for reuse
    /// from a pool.
    pub fn reset(&mut self, row: RowNumber) {
        self.row = row;
        self.entries.clear();
        self.other_entries.clear();
    }

    pub fn push_entry(&mut self, key: impl Into<String>, value: Value) {
        self.entries.push((key.into(), value));
    }

    pub fn push_other(&mut self, key: impl Into<String>, value: OtherValue) {
        self.other_entries.push((key.into(), value));
    }

    /// All entries with the given key, in insertion order.
    pub fn entries_for<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a Value> + 'a {
        self.entries.iter().filter(move |(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn first_entry(&self, key: &str) -> Option<&Value> {
        self.entries_for(key).next()
    }

    pub fn others_for<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a OtherValue> + 'a {
        self.other_entries.iter().filter(move |(k, _)| k == key).map(|(_, v)| v)
    }
}
