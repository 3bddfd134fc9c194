//! Wraps a child iterator's results as a single nested entry under `key`,
//! with the reported `RowNumber` truncated to `level`. Used to fold a
//! finer-grained iterator (spans) under a coarser one (resources, traces)
//! without losing its own row identity: the original, untruncated result is
//! kept inside the `OtherValue::Nested` payload, exactly the use this crate
//! documents for `other_entries`.

use std::fmt;

use parquetquery::{BoxedIterator, Result, RowIterator};
use tempo_model::{IteratorResult, OtherValue, RowNumber};

pub struct NestUnderKey {
    inner: BoxedIterator,
    key: &'static str,
    level: usize,
}

impl NestUnderKey {
    pub fn new(inner: BoxedIterator, key: &'static str, level: usize) -> Self {
        Self { inner, key, level }
    }

    fn wrap(&self, r: IteratorResult) -> IteratorResult {
        let mut out = IteratorResult::new(RowNumber::truncate(self.level, &r.row));
        out.push_other(self.key, OtherValue::Nested(Box::new(r)));
        out
    }
}

impl RowIterator for NestUnderKey {
    fn next(&mut self) -> Result<Option<IteratorResult>> {
        Ok(self.inner.next()?.map(|r| self.wrap(r)))
    }

    fn seek_to(&mut self, r: RowNumber, d: usize) -> Result<Option<IteratorResult>> {
        Ok(self.inner.seek_to(r, d)?.map(|r| self.wrap(r)))
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

impl fmt::Display for NestUnderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NestUnderKey(key={}, level={}, inner={})", self.key, self.level, self.inner)
    }
}
