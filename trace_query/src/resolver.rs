//! Maps an attribute name (plus scope) to the column index a `BlockReader`
//! exposes it under. The engine never guesses a layout; callers wire up a
//! `ColumnResolver` for whatever block schema they read (§6: "any columnar
//! format satisfying this interface suffices").

use std::collections::HashMap;
use tempo_model::spanset::{IntrinsicKind, Scope};

pub trait ColumnResolver: Send + Sync {
    fn span_attr_columns(&self, name: &str) -> Option<(usize, usize)>;

    fn resource_attr_columns(&self, name: &str) -> Option<(usize, usize)>;

    fn span_intrinsic_column(&self, kind: IntrinsicKind) -> Option<usize>;

    fn trace_intrinsic_column(&self, kind: IntrinsicKind) -> Option<usize>;

    /// The trace id column, read once per trace (§4.2.3).
    fn trace_id_column(&self) -> Option<usize>;

    /// The trace start-time column (nanoseconds since epoch), read once per
    /// trace.
    fn trace_start_time_column(&self) -> Option<usize>;

    /// For unscoped (`.attr`) lookups: try span scope, then resource scope.
    fn unscoped_attr_columns(&self, name: &str) -> Vec<(Scope, usize, usize)> {
        let mut out = Vec::new();
        if let Some((k, v)) = self.span_attr_columns(name) {
            out.push((Scope::Span, k, v));
        }
        if let Some((k, v)) = self.resource_attr_columns(name) {
            out.push((Scope::Resource, k, v));
        }
        out
    }
}

/// A resolver backed by explicit name -> column-index maps, fit for tests
/// and for fixed schemas known ahead of time.
#[derive(Debug, Clone, Default)]
pub struct MapColumnResolver {
    pub span_attrs: HashMap<String, (usize, usize)>,
    pub resource_attrs: HashMap<String, (usize, usize)>,
    pub span_intrinsics: HashMap<IntrinsicKind, usize>,
    pub trace_intrinsics: HashMap<IntrinsicKind, usize>,
    pub trace_id: Option<usize>,
    pub trace_start_time: Option<usize>,
}

impl MapColumnResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_span_attr(mut self, name: impl Into<String>, keys_col: usize, values_col: usize) -> Self {
        self.span_attrs.insert(name.into(), (keys_col, values_col));
        self
    }

    pub fn with_resource_attr(mut self, name: impl Into<String>, keys_col: usize, values_col: usize) -> Self {
        self.resource_attrs.insert(name.into(), (keys_col, values_col));
        self
    }

    pub fn with_span_intrinsic(mut self, kind: IntrinsicKind, column: usize) -> Self {
        self.span_intrinsics.insert(kind, column);
        self
    }

    pub fn with_trace_intrinsic(mut self, kind: IntrinsicKind, column: usize) -> Self {
        self.trace_intrinsics.insert(kind, column);
        self
    }

    pub fn with_trace_id(mut self, column: usize) -> Self {
        self.trace_id = Some(column);
        self
    }

    pub fn with_trace_start_time(mut self, column: usize) -> Self {
        self.trace_start_time = Some(column);
        self
    }
}

impl ColumnResolver for MapColumnResolver {
    fn span_attr_columns(&self, name: &str) -> Option<(usize, usize)> {
        self.span_attrs.get(name).copied()
    }

    fn resource_attr_columns(&self, name: &str) -> Option<(usize, usize)> {
        self.resource_attrs.get(name).copied()
    }

    fn span_intrinsic_column(&self, kind: IntrinsicKind) -> Option<usize> {
        self.span_intrinsics.get(&kind).copied()
    }

    fn trace_intrinsic_column(&self, kind: IntrinsicKind) -> Option<usize> {
        self.trace_intrinsics.get(&kind).copied()
    }

    fn trace_id_column(&self) -> Option<usize> {
        self.trace_id
    }

    fn trace_start_time_column(&self) -> Option<usize> {
        self.trace_start_time
    }
}
