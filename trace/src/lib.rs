//! Cooperative cancellation and lightweight span instrumentation for the
//! query core.
//!
//! The iterator engine is synchronous and single-threaded per query (see
//! the crate-level docs on `parquetquery`), so cancellation cannot rely on
//! an async runtime dropping a future. Instead callers hand leaf iterators a
//! [`CancellationToken`], which they must observe at page transitions.

pub mod span;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative, clonable cancellation signal.
///
/// Cloning shares the underlying flag: cancelling any clone cancels all of
/// them. There is no callback mechanism; callers must poll
/// [`CancellationToken::is_cancelled`] at suspension points.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let a = CancellationToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }
}
