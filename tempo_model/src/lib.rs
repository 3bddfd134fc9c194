//! Shared domain types for the Tempo query/ingest core: the row-number
//! algebra, columnar `Value`, `IteratorResult`, and the caller-visible
//! `Spanset`/rebatch wire shapes.
//!
//! This crate has no dependencies and no behavior beyond small constructors
//! and accessors, mirroring the role the teacher's `data_types`/`schema`
//! crates play for the rest of the workspace.

pub mod rebatch;
pub mod result;
pub mod row_number;
pub mod spanset;
pub mod value;

pub use rebatch::{
    AttributeValue, Event, InstrumentationScope, KeyValue, Link, PushErrorReason, RawSpan,
    RebatchedTrace, Resource, ResourceSpans, ResourceSpansBatch, ScopeSpans,
};
pub use result::{IteratorResult, OtherValue};
pub use row_number::RowNumber;
pub use spanset::{Attribute, AttributeList, IntrinsicKind, Scope, Span, SpanKind, Spanset, Static, StatusCode};
pub use value::{Value, ValueData};
