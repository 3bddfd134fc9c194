//! Per-iterator string interner for low-cardinality columns. Exclusive to
//! the iterator that owns it; retention of interned values past `Close()`
//! is undefined unless the caller clones.

use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Interner {
    table: HashMap<Vec<u8>, Arc<[u8]>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a shared handle for `bytes`, reusing a prior interning
    /// within this iterator's lifetime if present.
    pub fn intern(&mut self, bytes: &[u8]) -> Arc<[u8]> {
        if let Some(existing) = self.table.get(bytes) {
            return Arc::clone(existing);
        }
        let arc: Arc<[u8]> = Arc::from(bytes);
        self.table.insert(bytes.to_vec(), Arc::clone(&arc));
        arc
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_values_share_storage() {
        let mut interner = Interner::new();
        let a = interner.intern(b"service.name");
        let b = interner.intern(b"service.name");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);
    }
}
