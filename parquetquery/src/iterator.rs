//! The polymorphic iterator interface every leaf and compositional iterator
//! implements (§9: "Dynamic dispatch"). Type-erased via a boxed trait object
//! so a tree can mix a `SyncIterator<i64>` leaf with `SyncIterator<String>`
//! siblings under one `JoinIterator` without monomorphizing the whole tree.

use crate::error::Result;
use std::fmt::Display;
use tempo_model::{IteratorResult, RowNumber};

/// A row-aligned stream of `IteratorResult`s, strictly monotonically
/// increasing in `RowNumber` under full comparison.
pub trait RowIterator: Display + Send {
    /// Returns the next result, or `None` when exhausted.
    fn next(&mut self) -> Result<Option<IteratorResult>>;

    /// Returns the next result with `RowNumber::compare(d, result.row, r) >= Greater|Equal`,
    /// or `None` if no such result remains.
    fn seek_to(&mut self, r: RowNumber, d: usize) -> Result<Option<IteratorResult>>;

    /// Releases chunks, pages, buffers, and the interner. Idempotent.
    fn close(&mut self);
}

pub type BoxedIterator = Box<dyn RowIterator>;
