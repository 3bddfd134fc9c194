//! Inner join over row-aligned child iterators (§4.1.3).

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use tempo_model::{IteratorResult, RowNumber};

use crate::error::Result;
use crate::iterator::{BoxedIterator, RowIterator};
use crate::pool::ResultPool;
use crate::predicate::GroupPredicate;

fn merge_into(out: &mut IteratorResult, mut r: IteratorResult, pool: &ResultPool) {
    out.entries.append(&mut r.entries);
    out.other_entries.append(&mut r.other_entries);
    pool.put(r);
}

/// Produces a result exactly when every child has a peek whose RowNumber
/// matches all others' at `definition_level`.
pub struct JoinIterator {
    definition_level: usize,
    children: Vec<BoxedIterator>,
    peeks: Vec<Option<IteratorResult>>,
    group_predicate: Option<Arc<dyn GroupPredicate>>,
    result_pool: ResultPool,
}

impl JoinIterator {
    pub fn new(
        definition_level: usize,
        children: Vec<BoxedIterator>,
        group_predicate: Option<Arc<dyn GroupPredicate>>,
        result_pool: ResultPool,
    ) -> Self {
        let n = children.len();
        Self {
            definition_level,
            children,
            peeks: (0..n).map(|_| None).collect(),
            group_predicate,
            result_pool,
        }
    }

    fn refill(&mut self, i: usize) -> Result<bool> {
        if self.peeks[i].is_none() {
            self.peeks[i] = self.children[i].next()?;
        }
        Ok(self.peeks[i].is_some())
    }

    /// Advances children until all peeks agree at `definition_level`, or one
    /// is exhausted. Returns `false` if any child is exhausted.
    fn align(&mut self) -> Result<bool> {
        let d = self.definition_level;
        loop {
            for i in 0..self.children.len() {
                if !self.refill(i)? {
                    return Ok(false);
                }
            }
            let target = self.peeks[0].as_ref().unwrap().row;
            let mut swapped = false;
            for i in 1..self.children.len() {
                let cur = self.peeks[i].as_ref().unwrap().row;
                if RowNumber::compare(d, &cur, &target) == Ordering::Less {
                    let truncated = RowNumber::truncate(d, &target);
                    self.peeks[i] = self.children[i].seek_to(truncated, d)?;
                    if self.peeks[i].is_none() {
                        return Ok(false);
                    }
                }
                let cur = self.peeks[i].as_ref().unwrap().row;
                if RowNumber::compare(d, &cur, &target) == Ordering::Greater {
                    // This child is ahead of everyone: it becomes the new
                    // driver so we never seek backwards.
                    self.children.swap(0, i);
                    self.peeks.swap(0, i);
                    swapped = true;
                    break;
                }
            }
            if swapped {
                continue;
            }
            let all_equal = (1..self.children.len())
                .all(|i| RowNumber::compare(d, &self.peeks[i].as_ref().unwrap().row, &target) == Ordering::Equal);
            if all_equal {
                return Ok(true);
            }
        }
    }

    fn collect(&mut self) -> Result<IteratorResult> {
        let d = self.definition_level;
        let target = self.peeks[0].as_ref().unwrap().row;
        let mut out = self.result_pool.get(target);
        for i in 0..self.children.len() {
            loop {
                match self.peeks[i].take() {
                    Some(r) if RowNumber::compare(d, &r.row, &target) == Ordering::Equal => {
                        merge_into(&mut out, r, &self.result_pool);
                        self.peeks[i] = self.children[i].next()?;
                    }
                    other => {
                        self.peeks[i] = other;
                        break;
                    }
                }
            }
        }
        Ok(out)
    }
}

impl RowIterator for JoinIterator {
    fn next(&mut self) -> Result<Option<IteratorResult>> {
        loop {
            if !self.align()? {
                return Ok(None);
            }
            let group = self.collect()?;
            match &self.group_predicate {
                Some(gp) if !gp.keep_group(&group) => {
                    self.result_pool.put(group);
                    continue;
                }
                _ => return Ok(Some(group)),
            }
        }
    }

    fn seek_to(&mut self, r: RowNumber, d2: usize) -> Result<Option<IteratorResult>> {
        let truncated = RowNumber::truncate(d2, &r);
        for i in 0..self.children.len() {
            self.peeks[i] = self.children[i].seek_to(truncated, d2)?;
        }
        self.next()
    }

    fn close(&mut self) {
        for child in &mut self.children {
            child.close();
        }
        self.peeks.iter_mut().for_each(|p| *p = None);
    }
}

impl fmt::Display for JoinIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JoinIterator(d={}, children={})", self.definition_level, self.children.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::VecIterator;

    #[test]
    fn joins_matching_rows_only() {
        let a = VecIterator::from_rows(vec![0, 1, 2, 3]);
        let b = VecIterator::from_rows(vec![1, 3]);
        let mut join = JoinIterator::new(0, vec![Box::new(a), Box::new(b)], None, ResultPool::new());

        let r1 = join.next().unwrap().unwrap();
        assert_eq!(r1.row.get(0), 1);
        let r2 = join.next().unwrap().unwrap();
        assert_eq!(r2.row.get(0), 3);
        assert!(join.next().unwrap().is_none());
    }

    #[test]
    fn join_idempotence_joining_with_self() {
        let a = VecIterator::from_rows(vec![0, 2, 4, 6]);
        let b = VecIterator::from_rows(vec![0, 2, 4, 6]);
        let mut join = JoinIterator::new(0, vec![Box::new(a), Box::new(b)], None, ResultPool::new());

        let mut rows = Vec::new();
        while let Some(r) = join.next().unwrap() {
            rows.push(r.row.get(0));
        }
        assert_eq!(rows, vec![0, 2, 4, 6]);
    }

    #[test]
    fn group_predicate_filters_joined_groups() {
        let a = VecIterator::from_rows(vec![0, 1, 2]);
        let b = VecIterator::from_rows(vec![0, 1, 2]);
        let pred: Arc<dyn GroupPredicate> = Arc::new(|r: &IteratorResult| r.row.get(0) != 1);
        let mut join = JoinIterator::new(0, vec![Box::new(a), Box::new(b)], Some(pred), ResultPool::new());

        let mut rows = Vec::new();
        while let Some(r) = join.next().unwrap() {
            rows.push(r.row.get(0));
        }
        assert_eq!(rows, vec![0, 2]);
    }
}
