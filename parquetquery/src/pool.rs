//! Freelists avoiding per-tuple and per-page allocation (§5 "shared
//! resources"): a [`ResultPool`] for [`IteratorResult`], and a
//! [`BufferPool`] for value buffers, keyed by capacity class.

use parking_lot::Mutex;
use std::sync::Arc;
use tempo_model::{IteratorResult, RowNumber, Value};

#[derive(Debug, Default)]
struct ResultPoolInner {
    free: Vec<IteratorResult>,
}

/// A freelist for `IteratorResult` objects. The default pool is shared
/// process-wide; tests construct a private one for isolation (§5).
#[derive(Debug, Clone, Default)]
pub struct ResultPool {
    inner: Arc<Mutex<ResultPoolInner>>,
}

impl ResultPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a reusable, cleared `IteratorResult` set to `row`.
    pub fn get(&self, row: RowNumber) -> IteratorResult {
        let mut inner = self.inner.lock();
        match inner.free.pop() {
            Some(mut r) => {
                r.reset(row);
                r
            }
            None => IteratorResult::new(row),
        }
    }

    /// Returns a result to the pool for reuse. Callers must not hold any
    /// other reference to it afterwards.
    pub fn put(&self, result: IteratorResult) {
        self.inner.lock().free.push(result);
    }

    pub fn len_free(&self) -> usize {
        self.inner.lock().free.len()
    }
}

/// Rounds a requested capacity up to a small number of size classes so the
/// freelist can be indexed by class rather than exact size.
fn capacity_class(n: usize) -> usize {
    n.next_power_of_two().max(64)
}

#[derive(Debug, Default)]
struct BufferPoolInner {
    // keyed by capacity class
    free: std::collections::HashMap<usize, Vec<Vec<Value>>>,
}

/// Freelist for column-read value buffers, keyed by capacity class.
/// Buffers are cleared before being returned to the pool.
#[derive(Debug, Clone, Default)]
pub struct BufferPool {
    inner: Arc<Mutex<BufferPoolInner>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, min_capacity: usize) -> Vec<Value> {
        let class = capacity_class(min_capacity);
        let mut inner = self.inner.lock();
        if let Some(bucket) = inner.free.get_mut(&class) {
            if let Some(buf) = bucket.pop() {
                return buf;
            }
        }
        Vec::with_capacity(class)
    }

    pub fn put(&self, mut buf: Vec<Value>) {
        buf.clear();
        let class = capacity_class(buf.capacity());
        self.inner.lock().free.entry(class).or_default().push(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_pool_reuses_allocations() {
        let pool = ResultPool::new();
        let mut r = pool.get(RowNumber::at_row(0));
        r.push_entry("a", Value::int(1, 0, 0));
        pool.put(r);
        assert_eq!(pool.len_free(), 1);

        let r2 = pool.get(RowNumber::at_row(1));
        assert!(r2.entries.is_empty());
        assert_eq!(r2.row, RowNumber::at_row(1));
        assert_eq!(pool.len_free(), 0);
    }

    #[test]
    fn buffer_pool_clears_before_reuse() {
        let pool = BufferPool::new();
        let mut buf = pool.get(16);
        buf.push(Value::int(1, 0, 0));
        pool.put(buf);

        let buf2 = pool.get(16);
        assert!(buf2.is_empty());
    }
}
