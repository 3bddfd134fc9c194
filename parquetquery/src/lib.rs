//! Synchronous columnar iterator engine: the machinery that walks column
//! chunks from object storage with predicate pushdown, and composes leaf
//! column iterators into join/left-join/union trees over a shared
//! row-number space (§4.1 of the design).
//!
//! The engine is single-threaded and cooperative per query (§5): one
//! logical task drives an iterator tree via `next`/`seek_to`. Parallelism
//! comes from running independent queries across threads, never from
//! sharing one iterator instance.

pub mod block;
pub mod error;
pub mod intern;
pub mod iterator;
pub mod join;
pub mod left_join;
pub mod mem;
pub mod pool;
pub mod predicate;
pub mod sync_iterator;
pub mod union;

#[cfg(test)]
mod test_support;

pub use block::{BlockReader, ColumnChunk, ColumnStatistics, Page, RowGroup, ValueReader};
pub use error::{Error, Result};
pub use intern::Interner;
pub use iterator::{BoxedIterator, RowIterator};
pub use join::JoinIterator;
pub use left_join::LeftJoinIterator;
pub use pool::{BufferPool, ResultPool};
pub use predicate::{GroupPredicate, KeyValueGroupPredicate, Predicate, PresencePredicate, StringEqualPredicate};
pub use sync_iterator::{SyncIterator, SyncIteratorOptions};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use mem::{MemBlock, MemColumn};
    use tempo_model::Value;
    use trace::CancellationToken;

    fn names_column() -> MemColumn {
        MemColumn::single_page(
            vec![
                Value::string(b"alpha".to_vec(), 0, 0),
                Value::string(b"beta".to_vec(), 0, 0),
                Value::string(b"gamma".to_vec(), 0, 0),
            ],
            None,
        )
    }

    #[test]
    fn sync_iterator_yields_monotonic_rows() {
        let mut block = MemBlock::new();
        block.add_row_group(3, vec![names_column()]);
        let row_groups = block.row_groups();

        let mut iter = SyncIterator::new(
            row_groups,
            0,
            None,
            SyncIteratorOptions {
                select_as: Some("name".into()),
                max_definition_level: 0,
                buffer_size: 2,
                intern: false,
            },
            BufferPool::new(),
            ResultPool::new(),
            CancellationToken::new(),
        );

        let mut rows = Vec::new();
        while let Some(r) = iter.next().unwrap() {
            rows.push((r.row.get(0), r.first_entry("name").unwrap().as_str().unwrap().to_string()));
        }
        assert_eq!(
            rows,
            vec![(0, "alpha".to_string()), (1, "beta".to_string()), (2, "gamma".to_string())]
        );
    }

    #[test]
    fn sync_iterator_applies_value_predicate() {
        struct OnlyBeta;
        impl Predicate for OnlyBeta {
            fn keep_value(&self, value: &tempo_model::Value) -> bool {
                value.as_str() == Some("beta")
            }
        }

        let mut block = MemBlock::new();
        block.add_row_group(3, vec![names_column()]);

        let mut iter = SyncIterator::new(
            block.row_groups(),
            0,
            Some(std::sync::Arc::new(OnlyBeta)),
            SyncIteratorOptions {
                select_as: Some("name".into()),
                max_definition_level: 0,
                buffer_size: 10,
                intern: false,
            },
            BufferPool::new(),
            ResultPool::new(),
            CancellationToken::new(),
        );

        let r = iter.next().unwrap().unwrap();
        assert_eq!(r.row.get(0), 1);
        assert!(iter.next().unwrap().is_none());
    }

    #[test]
    fn sync_iterator_seek_to_skips_ahead() {
        let mut block = MemBlock::new();
        block.add_row_group(3, vec![names_column()]);

        let mut iter = SyncIterator::new(
            block.row_groups(),
            0,
            None,
            SyncIteratorOptions {
                select_as: Some("name".into()),
                max_definition_level: 0,
                buffer_size: 10,
                intern: false,
            },
            BufferPool::new(),
            ResultPool::new(),
            CancellationToken::new(),
        );

        let target = tempo_model::RowNumber::at_row(2);
        let r = iter.seek_to(target, 0).unwrap().unwrap();
        assert_eq!(r.row.get(0), 2);
        assert_eq!(r.first_entry("name").unwrap().as_str(), Some("gamma"));
    }

    #[test]
    fn sync_iterator_cancellation_stops_iteration() {
        let mut block = MemBlock::new();
        block.add_row_group(3, vec![names_column()]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut iter = SyncIterator::new(
            block.row_groups(),
            0,
            None,
            SyncIteratorOptions::default(),
            BufferPool::new(),
            ResultPool::new(),
            cancel,
        );
        assert!(iter.next().unwrap().is_none());
    }
}
