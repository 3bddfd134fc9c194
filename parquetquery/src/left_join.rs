//! Left join: all `required` children must match at `definition_level`;
//! `optional` children are attached when present (§4.1.3).

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use tempo_model::{IteratorResult, RowNumber};

use crate::error::{Error, Result};
use crate::iterator::{BoxedIterator, RowIterator};
use crate::pool::ResultPool;
use crate::predicate::GroupPredicate;

fn merge_into(out: &mut IteratorResult, mut r: IteratorResult, pool: &ResultPool) {
    out.entries.append(&mut r.entries);
    out.other_entries.append(&mut r.other_entries);
    pool.put(r);
}

pub struct LeftJoinIterator {
    definition_level: usize,
    required: Vec<BoxedIterator>,
    optional: Vec<BoxedIterator>,
    required_peeks: Vec<Option<IteratorResult>>,
    optional_peeks: Vec<Option<IteratorResult>>,
    group_predicate: Option<Arc<dyn GroupPredicate>>,
    result_pool: ResultPool,
}

impl LeftJoinIterator {
    pub fn new(
        definition_level: usize,
        required: Vec<BoxedIterator>,
        optional: Vec<BoxedIterator>,
        group_predicate: Option<Arc<dyn GroupPredicate>>,
        result_pool: ResultPool,
    ) -> Result<Self> {
        if required.is_empty() {
            return Err(Error::NoRequiredIterators {});
        }
        let (nr, no) = (required.len(), optional.len());
        Ok(Self {
            definition_level,
            required,
            optional,
            required_peeks: (0..nr).map(|_| None).collect(),
            optional_peeks: (0..no).map(|_| None).collect(),
            group_predicate,
            result_pool,
        })
    }

    fn refill_required(&mut self, i: usize) -> Result<bool> {
        if self.required_peeks[i].is_none() {
            self.required_peeks[i] = self.required[i].next()?;
        }
        Ok(self.required_peeks[i].is_some())
    }

    /// Aligns the required children, using the same swap-driver rule as
    /// `JoinIterator`. Returns `false` once any required child is exhausted.
    fn align_required(&mut self) -> Result<bool> {
        let d = self.definition_level;
        loop {
            for i in 0..self.required.len() {
                if !self.refill_required(i)? {
                    return Ok(false);
                }
            }
            let target = self.required_peeks[0].as_ref().unwrap().row;
            let mut swapped = false;
            for i in 1..self.required.len() {
                let cur = self.required_peeks[i].as_ref().unwrap().row;
                if RowNumber::compare(d, &cur, &target) == Ordering::Less {
                    let truncated = RowNumber::truncate(d, &target);
                    self.required_peeks[i] = self.required[i].seek_to(truncated, d)?;
                    if self.required_peeks[i].is_none() {
                        return Ok(false);
                    }
                }
                let cur = self.required_peeks[i].as_ref().unwrap().row;
                if RowNumber::compare(d, &cur, &target) == Ordering::Greater {
                    self.required.swap(0, i);
                    self.required_peeks.swap(0, i);
                    swapped = true;
                    break;
                }
            }
            if swapped {
                continue;
            }
            let all_equal = (1..self.required.len())
                .all(|i| RowNumber::compare(d, &self.required_peeks[i].as_ref().unwrap().row, &target) == Ordering::Equal);
            if all_equal {
                return Ok(true);
            }
        }
    }

    fn collect(&mut self) -> Result<IteratorResult> {
        let d = self.definition_level;
        let target = self.required_peeks[0].as_ref().unwrap().row;
        let mut out = self.result_pool.get(target);
        for i in 0..self.required.len() {
            loop {
                match self.required_peeks[i].take() {
                    Some(r) if RowNumber::compare(d, &r.row, &target) == Ordering::Equal => {
                        merge_into(&mut out, r, &self.result_pool);
                        self.required_peeks[i] = self.required[i].next()?;
                    }
                    other => {
                        self.required_peeks[i] = other;
                        break;
                    }
                }
            }
        }
        // Optional children: advance each to the matching RowNumber and
        // collect if present, otherwise leave the result without it.
        for i in 0..self.optional.len() {
            if self.optional_peeks[i].is_none() {
                self.optional_peeks[i] = self.optional[i].next()?;
            }
            let truncated = RowNumber::truncate(d, &target);
            if let Some(peek) = self.optional_peeks[i].as_ref() {
                if RowNumber::compare(d, &peek.row, &target) == Ordering::Less {
                    self.optional_peeks[i] = self.optional[i].seek_to(truncated, d)?;
                }
            }
            loop {
                match self.optional_peeks[i].take() {
                    Some(r) if RowNumber::compare(d, &r.row, &target) == Ordering::Equal => {
                        merge_into(&mut out, r, &self.result_pool);
                        self.optional_peeks[i] = self.optional[i].next()?;
                    }
                    other => {
                        self.optional_peeks[i] = other;
                        break;
                    }
                }
            }
        }
        Ok(out)
    }
}

impl RowIterator for LeftJoinIterator {
    fn next(&mut self) -> Result<Option<IteratorResult>> {
        loop {
            if !self.align_required()? {
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
        for i in 0..self.required.len() {
            self.required_peeks[i] = self.required[i].seek_to(truncated, d2)?;
        }
        for i in 0..self.optional.len() {
            self.optional_peeks[i] = self.optional[i].seek_to(truncated, d2)?;
        }
        self.next()
    }

    fn close(&mut self) {
        for child in &mut self.required {
            child.close();
        }
        for child in &mut self.optional {
            child.close();
        }
        self.required_peeks.iter_mut().for_each(|p| *p = None);
        self.optional_peeks.iter_mut().for_each(|p| *p = None);
    }
}

impl fmt::Display for LeftJoinIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LeftJoinIterator(d={}, required={}, optional={})",
            self.definition_level,
            self.required.len(),
            self.optional.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::VecIterator;

    #[test]
    fn rejects_empty_required() {
        let err = LeftJoinIterator::new(0, vec![], vec![], None, ResultPool::new());
        assert!(err.is_err());
    }

    #[test]
    fn optional_absence_does_not_drop_required_match() {
        let required = VecIterator::from_rows(vec![0, 1, 2]);
        let optional = VecIterator::from_rows(vec![1]);
        let mut lj = LeftJoinIterator::new(
            0,
            vec![Box::new(required)],
            vec![Box::new(optional)],
            None,
            ResultPool::new(),
        )
        .unwrap();

        let mut rows = Vec::new();
        while let Some(r) = lj.next().unwrap() {
            rows.push(r.row.get(0));
        }
        assert_eq!(rows, vec![0, 1, 2]);
    }

    #[test]
    fn conservation_count_matches_inner_join_over_required_only() {
        use crate::join::JoinIterator;

        let a = VecIterator::from_rows(vec![0, 1, 2, 3]);
        let b = VecIterator::from_rows(vec![1, 3]);
        let mut inner = JoinIterator::new(0, vec![Box::new(a), Box::new(b)], None, ResultPool::new());
        let mut inner_count = 0;
        while inner.next().unwrap().is_some() {
            inner_count += 1;
        }

        let a2 = VecIterator::from_rows(vec![0, 1, 2, 3]);
        let b2 = VecIterator::from_rows(vec![1, 3]);
        let optional = VecIterator::from_rows(vec![]);
        let mut lj = LeftJoinIterator::new(
            0,
            vec![Box::new(a2), Box::new(b2)],
            vec![Box::new(optional)],
            None,
            ResultPool::new(),
        )
        .unwrap();
        let mut lj_count = 0;
        while lj.next().unwrap().is_some() {
            lj_count += 1;
        }
        assert_eq!(inner_count, lj_count);
    }
}
