//! In-memory `RowIterator` fixture used by the compositional-iterator unit
//! tests: wraps a sorted list of level-0 row numbers.

use std::fmt;

use tempo_model::{IteratorResult, RowNumber};

use crate::error::Result;
use crate::iterator::RowIterator;

pub struct VecIterator {
    rows: Vec<i32>,
    idx: usize,
}

impl VecIterator {
    pub fn from_rows(rows: Vec<i32>) -> Self {
        Self { rows, idx: 0 }
    }
}

impl RowIterator for VecIterator {
    fn next(&mut self) -> Result<Option<IteratorResult>> {
        if self.idx >= self.rows.len() {
            return Ok(None);
        }
        let row = RowNumber::at_row(self.rows[self.idx]);
        self.idx += 1;
        Ok(Some(IteratorResult::new(row)))
    }

    fn seek_to(&mut self, r: RowNumber, d: usize) -> Result<Option<IteratorResult>> {
        while self.idx < self.rows.len() {
            let row = RowNumber::at_row(self.rows[self.idx]);
            if RowNumber::compare(d, &row, &r) != std::cmp::Ordering::Less {
                self.idx += 1;
                return Ok(Some(IteratorResult::new(row)));
            }
            self.idx += 1;
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.idx = self.rows.len();
    }
}

impl fmt::Display for VecIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VecIterator(remaining={})", self.rows.len() - self.idx)
    }
}
