//! The column iterator contract (§4.1.2): scans one column across a list of
//! row groups, applying chunk/page/value predicates, and yields
//! `(RowNumber, Value)` pairs wrapped in `IteratorResult`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use observability_deps::tracing::{debug, trace};
use tempo_model::{IteratorResult, RowNumber, Value};
use trace::CancellationToken;

use crate::block::{ColumnChunk, Page, RowGroup, ValueReader};
use crate::error::Result;
use crate::intern::Interner;
use crate::iterator::RowIterator;
use crate::pool::{BufferPool, ResultPool};
use crate::predicate::Predicate;

/// Page-reslice heuristic threshold (§4.1.2 step 3): with more than this
/// many rows to walk with `Next()`, prefer a `Page::slice` instead.
const RESLICE_THRESHOLD_ROWS: usize = 1000;

#[derive(Debug)]
pub struct SyncIteratorOptions {
    pub select_as: Option<String>,
    pub max_definition_level: usize,
    pub buffer_size: usize,
    pub intern: bool,
}

impl Default for SyncIteratorOptions {
    fn default() -> Self {
        Self {
            select_as: None,
            max_definition_level: 7,
            buffer_size: 1000,
            intern: false,
        }
    }
}

struct GroupBounds {
    // min/max are meaningful at level 0 only: max is exclusive, min+num_rows.
    min_row0: i32,
    max_row0: i32,
}

struct OpenPage {
    page: Box<dyn Page>,
    reader: Box<dyn ValueReader>,
    rep_levels: Option<Vec<u8>>,
    // index into rep_levels / the value stream, for reslice bookkeeping
    scan_pos: usize,
    // row0 this page starts at (the cur_row.position0 value just before the
    // page's first value is read)
    start_row0: i32,
}

/// Scans one column across a list of row groups.
pub struct SyncIterator {
    row_groups: Vec<Box<dyn RowGroup>>,
    bounds: Vec<GroupBounds>,
    column_index: usize,
    predicate: Option<Arc<dyn Predicate>>,
    options: SyncIteratorOptions,
    buffer_pool: BufferPool,
    result_pool: ResultPool,
    interner: Option<Interner>,
    cancel: CancellationToken,

    cur_group: usize,
    cur_chunk: Option<Box<dyn ColumnChunk>>,
    cur_page: Option<OpenPage>,
    cur_row: RowNumber,
    pending: VecDeque<(RowNumber, Value)>,
    closed: bool,
}

impl SyncIterator {
    pub fn new(
        row_groups: Vec<Box<dyn RowGroup>>,
        column_index: usize,
        predicate: Option<Arc<dyn Predicate>>,
        options: SyncIteratorOptions,
        buffer_pool: BufferPool,
        result_pool: ResultPool,
        cancel: CancellationToken,
    ) -> Self {
        let mut bounds = Vec::with_capacity(row_groups.len());
        let mut next_min = 0i32;
        for rg in &row_groups {
            let n = rg.num_rows() as i32;
            bounds.push(GroupBounds {
                min_row0: next_min,
                max_row0: next_min + n,
            });
            next_min += n;
        }
        let interner = options.intern.then(Interner::new);
        Self {
            row_groups,
            bounds,
            column_index,
            predicate,
            options,
            buffer_pool,
            result_pool,
            interner,
            cancel,
            cur_group: 0,
            cur_chunk: None,
            cur_page: None,
            cur_row: RowNumber::at_row(-1),
            pending: VecDeque::new(),
            closed: false,
        }
    }

    fn max_def(&self) -> usize {
        self.options.max_definition_level
    }

    /// Resets `cur_row` so the first value read in group `idx` lands exactly
    /// at `bounds[idx].min_row0`, regardless of whether prior groups were
    /// opened or skipped.
    fn reset_for_group(&mut self, idx: usize) {
        self.cur_row = RowNumber::at_row(self.bounds[idx].min_row0 - 1);
    }

    /// Opens the next row group's column chunk, consulting `KeepColumnChunk`
    /// and skipping rejected groups. Returns `false` once all groups are
    /// exhausted.
    fn open_next_chunk(&mut self) -> Result<bool> {
        loop {
            if self.cur_group >= self.row_groups.len() {
                return Ok(false);
            }
            self.reset_for_group(self.cur_group);
            let chunk = self.row_groups[self.cur_group].column_chunk(self.column_index)?;
            let keep = self
                .predicate
                .as_ref()
                .map(|p| p.keep_column_chunk(chunk.as_ref()))
                .unwrap_or(true);
            if !keep {
                trace!(group = self.cur_group, "skipping rejected column chunk");
                self.cur_group += 1;
                continue;
            }
            self.cur_chunk = Some(chunk);
            self.cur_group += 1;
            return Ok(true);
        }
    }

    /// Opens the next page of the current chunk, consulting `KeepPage`.
    /// Returns `false` once the chunk has no more pages.
    fn open_next_page(&mut self) -> Result<bool> {
        loop {
            let chunk = match self.cur_chunk.as_mut() {
                Some(c) => c,
                None => return Ok(false),
            };
            let page = match chunk.next_page()? {
                Some(p) => p,
                None => return Ok(false),
            };
            let keep = self.predicate.as_ref().map(|p| p.keep_page(page.as_ref())).unwrap_or(true);
            let num_rows = page.num_rows();
            if !keep {
                debug!(num_rows, "skipping rejected page");
                for _ in 0..num_rows {
                    self.cur_row.next(0, 0, self.max_def());
                }
                continue;
            }
            // `start_row0` is the first row index this page covers
            // (inclusive): one past whatever row the cursor last landed on.
            let start_row0 = self.cur_row.get(0) + 1;
            let rep_levels = page.repetition_levels().map(|s| s.to_vec());
            let reader = page.values();
            self.cur_page = Some(OpenPage {
                page,
                reader,
                rep_levels,
                scan_pos: 0,
                start_row0,
            });
            return Ok(true);
        }
    }

    /// Pulls up to `buffer_size` values from the current page into
    /// `pending`, applying `KeepValue` and advancing `cur_row` for every
    /// value seen (accepted or not). Returns `false` if the page is now
    /// exhausted.
    fn fill_pending(&mut self) -> Result<bool> {
        let open = match self.cur_page.as_mut() {
            Some(p) => p,
            None => return Ok(false),
        };
        let mut buf = self.buffer_pool.get(self.options.buffer_size);
        let (n, eof) = open.reader.read_values(&mut buf, self.options.buffer_size)?;
        for value in buf.drain(..n) {
            open.scan_pos += 1;
            self.cur_row
                .next(value.repetition_level as usize, value.definition_level as usize, self.max_def());
            let keep = self.predicate.as_ref().map(|p| p.keep_value(&value)).unwrap_or(true);
            if keep {
                let value = match (&mut self.interner, value.as_bytes()) {
                    (Some(interner), Some(bytes)) => {
                        let interned = interner.intern(bytes);
                        Value::new(
                            tempo_model::ValueData::Bytes(interned.to_vec()),
                            value.repetition_level,
                            value.definition_level,
                        )
                    }
                    _ => value,
                };
                self.pending.push_back((self.cur_row, value));
            }
        }
        self.buffer_pool.put(buf);
        if n == 0 && eof {
            self.cur_page = None;
            return Ok(false);
        }
        Ok(true)
    }

    fn emit(&self, row: RowNumber, value: Value) -> IteratorResult {
        let mut result = self.result_pool.get(row);
        if let Some(select_as) = &self.options.select_as {
            result.push_entry(select_as.clone(), value);
        }
        result
    }

    /// Reslices the current page so that scanning forward from it needs
    /// fewer than the threshold number of `Next()` calls to reach `r` at
    /// level `d` (§4.1.2 step 3).
    fn maybe_reslice(&mut self, r: &RowNumber, d: usize) {
        let Some(open) = self.cur_page.as_ref() else { return };
        let target_row0 = r.get(0);
        let remaining_rows = (target_row0 - self.cur_row.get(0)).max(0) as usize;

        let should_reslice = if d == 0 {
            remaining_rows > RESLICE_THRESHOLD_ROWS
        } else {
            match &open.rep_levels {
                Some(levels) => {
                    let remaining_next_calls = levels
                        .iter()
                        .skip(open.scan_pos)
                        .filter(|&&lvl| lvl == 0)
                        .count()
                        .min(levels.len().saturating_sub(open.scan_pos));
                    remaining_next_calls > RESLICE_THRESHOLD_ROWS
                }
                None => remaining_rows > RESLICE_THRESHOLD_ROWS,
            }
        };
        if !should_reslice || remaining_rows == 0 {
            return;
        }

        let open = self.cur_page.as_mut().unwrap();
        let offset = (target_row0 - open.start_row0).max(0) as usize;
        let num_rows = open.page.num_rows().saturating_sub(offset);
        let sliced = open.page.slice(offset, num_rows);
        let rep_levels = sliced.repetition_levels().map(|s| s.to_vec());
        let reader = sliced.values();
        self.cur_page = Some(OpenPage {
            page: sliced,
            reader,
            rep_levels,
            scan_pos: 0,
            start_row0: target_row0,
        });
        self.cur_row = RowNumber::truncate(0, r).preceding();
    }
}

impl RowIterator for SyncIterator {
    fn next(&mut self) -> Result<Option<IteratorResult>> {
        if self.closed {
            return Ok(None);
        }
        loop {
            if self.cancel.is_cancelled() {
                self.close();
                return Ok(None);
            }
            if let Some((row, value)) = self.pending.pop_front() {
                return Ok(Some(self.emit(row, value)));
            }
            if self.cur_page.is_none() {
                if self.cur_chunk.is_none() || !self.open_next_page()? {
                    if self.cur_chunk.is_some() {
                        self.cur_chunk.as_mut().unwrap().close();
                        self.cur_chunk = None;
                    }
                    if !self.open_next_chunk()? {
                        return Ok(None);
                    }
                    continue;
                }
            }
            if !self.fill_pending()? {
                continue;
            }
        }
    }

    fn seek_to(&mut self, r: RowNumber, d: usize) -> Result<Option<IteratorResult>> {
        if self.closed {
            return Ok(None);
        }
        // Step 1: discard the current row group if it is entirely before `r`
        // at level 0, then skip forward (applying `KeepColumnChunk`) to the
        // first row group whose max exceeds `r`.
        if self.cur_chunk.is_some() {
            let open_idx = self.cur_group - 1;
            if self.bounds[open_idx].max_row0 as i64 <= r.get(0) as i64 {
                self.cur_chunk.as_mut().unwrap().close();
                self.cur_chunk = None;
                self.cur_page = None;
            }
        }
        if self.cur_chunk.is_none() {
            while self.cur_group < self.row_groups.len()
                && self.bounds[self.cur_group].max_row0 as i64 <= r.get(0) as i64
            {
                self.cur_group += 1;
            }
            if !self.open_next_chunk()? {
                return Ok(None);
            }
        }

        // Step 2: advance pages until the current page's max > r at level 0.
        loop {
            if self.cur_page.is_none() && !self.open_next_page()? {
                self.cur_chunk.as_mut().unwrap().close();
                self.cur_chunk = None;
                if !self.open_next_chunk()? {
                    return Ok(None);
                }
                continue;
            }
            let open = self.cur_page.as_ref().unwrap();
            let page_max = open.start_row0 + open.page.num_rows() as i32;
            if (page_max as i64) > r.get(0) as i64 {
                break;
            }
            // page entirely before target: skip it, bumping cur_row.
            let num_rows = open.page.num_rows();
            for _ in 0..num_rows {
                self.cur_row.next(0, 0, self.max_def());
            }
            self.cur_page = None;
        }

        // Step 3: reslice within the page if it would save a lot of scanning.
        self.maybe_reslice(&r, d);

        // Step 4: linearly advance until row >= r at level d.
        loop {
            match self.next()? {
                Some(result) => {
                    if RowNumber::compare(d, &result.row, &r) != std::cmp::Ordering::Less {
                        return Ok(Some(result));
                    }
                    self.result_pool.put(result);
                }
                None => return Ok(None),
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(chunk) = self.cur_chunk.as_mut() {
            chunk.close();
        }
        if let Some(open) = self.cur_page.as_mut() {
            open.page.release();
        }
        self.cur_chunk = None;
        self.cur_page = None;
        self.pending.clear();
        if let Some(interner) = self.interner.as_mut() {
            interner.clear();
        }
        self.closed = true;
    }
}

impl fmt::Display for SyncIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyncIterator(column={}, select_as={:?})", self.column_index, self.options.select_as)
    }
}

impl Drop for SyncIterator {
    fn drop(&mut self) {
        self.close();
    }
}
