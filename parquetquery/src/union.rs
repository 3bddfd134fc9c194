//! Union over row-aligned child iterators (§4.1.3): emits a result for the
//! minimum RowNumber among non-exhausted children, grouping all children
//! tied at that minimum.

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

pub struct UnionIterator {
    definition_level: usize,
    children: Vec<BoxedIterator>,
    peeks: Vec<Option<IteratorResult>>,
    group_predicate: Option<Arc<dyn GroupPredicate>>,
    result_pool: ResultPool,
}

impl UnionIterator {
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

    fn refill_all(&mut self) -> Result<()> {
        for i in 0..self.children.len() {
            if self.peeks[i].is_none() {
                self.peeks[i] = self.children[i].next()?;
            }
        }
        Ok(())
    }
}

impl RowIterator for UnionIterator {
    fn next(&mut self) -> Result<Option<IteratorResult>> {
        let d = self.definition_level;
        loop {
            self.refill_all()?;
            let min_row = self
                .peeks
                .iter()
                .filter_map(|p| p.as_ref().map(|r| r.row))
                .min_by(|a, b| RowNumber::compare(d, a, b));

            let Some(min_row) = min_row else {
                return Ok(None);
            };

            let mut out = self.result_pool.get(min_row);
            for i in 0..self.children.len() {
                if let Some(r) = self.peeks[i].as_ref() {
                    if RowNumber::compare(d, &r.row, &min_row) == Ordering::Equal {
                        let r = self.peeks[i].take().unwrap();
                        merge_into(&mut out, r, &self.result_pool);
                        self.peeks[i] = self.children[i].next()?;
                    }
                }
            }

            match &self.group_predicate {
                Some(gp) if !gp.keep_group(&out) => {
                    self.result_pool.put(out);
                    continue;
                }
                _ => return Ok(Some(out)),
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

impl fmt::Display for UnionIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnionIterator(d={}, children={})", self.definition_level, self.children.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::VecIterator;
    use std::collections::HashSet;

    #[test]
    fn union_completeness_over_children() {
        let a = VecIterator::from_rows(vec![0, 2, 4]);
        let b = VecIterator::from_rows(vec![1, 2, 5]);
        let mut union = UnionIterator::new(0, vec![Box::new(a), Box::new(b)], None, ResultPool::new());

        let mut rows = Vec::new();
        while let Some(r) = union.next().unwrap() {
            rows.push(r.row.get(0));
        }
        let expected: HashSet<i32> = [0, 1, 2, 4, 5].into_iter().collect();
        let got: HashSet<i32> = rows.iter().copied().collect();
        assert_eq!(expected, got);
        // strictly increasing
        for w in rows.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn tied_rows_grouped_into_one_result() {
        let a = VecIterator::from_rows(vec![3]);
        let b = VecIterator::from_rows(vec![3]);
        let mut union = UnionIterator::new(0, vec![Box::new(a), Box::new(b)], None, ResultPool::new());
        let r = union.next().unwrap().unwrap();
        assert_eq!(r.row.get(0), 3);
        assert!(union.next().unwrap().is_none());
    }
}
