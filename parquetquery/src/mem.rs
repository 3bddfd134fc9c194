//! An in-memory reference implementation of the `BlockReader` interface
//! (§6), sufficient to exercise `SyncIterator`/`JoinIterator`/etc in tests
//! without a real object-storage-backed parquet reader. Not part of the
//! core contract; a real backend is an external collaborator (§1).

use crate::block::{BlockReader, ColumnChunk, ColumnStatistics, Page, RowGroup, ValueReader};
use crate::error::Result;
use tempo_model::Value;

#[derive(Clone)]
struct PageData {
    values: Vec<Value>,
    rep_levels: Option<Vec<u8>>,
    num_rows: usize,
}

struct MemValueReader {
    values: Vec<Value>,
    pos: usize,
}

impl ValueReader for MemValueReader {
    fn read_values(&mut self, buf: &mut Vec<Value>, max: usize) -> Result<(usize, bool)> {
        let mut n = 0;
        while n < max && self.pos < self.values.len() {
            buf.push(self.values[self.pos].clone());
            self.pos += 1;
            n += 1;
        }
        Ok((n, self.pos >= self.values.len()))
    }
}

struct MemPage {
    data: PageData,
}

impl Page for MemPage {
    fn num_rows(&self) -> usize {
        self.data.num_rows
    }

    fn values(&self) -> Box<dyn ValueReader> {
        Box::new(MemValueReader {
            values: self.data.values.clone(),
            pos: 0,
        })
    }

    fn repetition_levels(&self) -> Option<&[u8]> {
        self.data.rep_levels.as_deref()
    }

    fn slice(&self, offset_rows: usize, num_rows: usize) -> Box<dyn Page> {
        let (start, end) = match &self.data.rep_levels {
            Some(levels) => {
                let row_boundaries: Vec<usize> = levels
                    .iter()
                    .enumerate()
                    .filter(|(_, &l)| l == 0)
                    .map(|(i, _)| i)
                    .collect();
                let start = row_boundaries.get(offset_rows).copied().unwrap_or(self.data.values.len());
                let end = row_boundaries.get(offset_rows + num_rows).copied().unwrap_or(self.data.values.len());
                (start, end)
            }
            None => (offset_rows.min(self.data.values.len()), (offset_rows + num_rows).min(self.data.values.len())),
        };
        Box::new(MemPage {
            data: PageData {
                values: self.data.values[start..end].to_vec(),
                rep_levels: self.data.rep_levels.as_ref().map(|l| l[start..end].to_vec()),
                num_rows,
            },
        })
    }

    fn release(&mut self) {}
}

struct MemColumnChunk {
    pages: Vec<PageData>,
    idx: usize,
    stats: Option<ColumnStatistics>,
}

impl ColumnChunk for MemColumnChunk {
    fn statistics(&self) -> Option<&ColumnStatistics> {
        self.stats.as_ref()
    }

    fn next_page(&mut self) -> Result<Option<Box<dyn Page>>> {
        if self.idx >= self.pages.len() {
            return Ok(None);
        }
        let data = self.pages[self.idx].clone();
        self.idx += 1;
        Ok(Some(Box::new(MemPage { data })))
    }

    fn close(&mut self) {}
}

/// One column's data within a [`MemRowGroup`]: a sequence of pages, each a
/// flat list of already-leveled `Value`s.
#[derive(Clone, Default)]
pub struct MemColumn {
    pages: Vec<PageData>,
    stats: Option<ColumnStatistics>,
}

impl MemColumn {
    /// A single page holding `values`, with `rep_levels` (one per value) if
    /// the column is repeated.
    pub fn single_page(values: Vec<Value>, rep_levels: Option<Vec<u8>>) -> Self {
        let num_rows = match &rep_levels {
            Some(levels) => levels.iter().filter(|&&l| l == 0).count(),
            None => values.len(),
        };
        Self {
            pages: vec![PageData {
                values,
                rep_levels,
                num_rows,
            }],
            stats: None,
        }
    }

    pub fn with_statistics(mut self, stats: ColumnStatistics) -> Self {
        self.stats = Some(stats);
        self
    }
}

pub struct MemRowGroup {
    num_rows: usize,
    columns: Vec<MemColumn>,
}

impl MemRowGroup {
    pub fn new(num_rows: usize, columns: Vec<MemColumn>) -> Self {
        Self { num_rows, columns }
    }
}

impl RowGroup for MemRowGroup {
    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn column_chunk(&self, column_index: usize) -> Result<Box<dyn ColumnChunk>> {
        let col = &self.columns[column_index];
        Ok(Box::new(MemColumnChunk {
            pages: col.pages.clone(),
            idx: 0,
            stats: col.stats.clone(),
        }))
    }
}

/// A block made of one or more [`MemRowGroup`]s.
#[derive(Default)]
pub struct MemBlock {
    row_groups: Vec<MemRowGroupSpec>,
}

struct MemRowGroupSpec {
    num_rows: usize,
    columns: Vec<MemColumn>,
}

impl MemBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row_group(&mut self, num_rows: usize, columns: Vec<MemColumn>) -> &mut Self {
        self.row_groups.push(MemRowGroupSpec { num_rows, columns });
        self
    }
}

impl BlockReader for MemBlock {
    fn row_groups(&self) -> Vec<Box<dyn RowGroup>> {
        self.row_groups
            .iter()
            .map(|spec| Box::new(MemRowGroup::new(spec.num_rows, spec.columns.clone())) as Box<dyn RowGroup>)
            .collect()
    }
}
