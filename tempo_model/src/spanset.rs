//! Caller-visible query output: `Spanset`, `Span`, and the attribute
//! representation used throughout the trace fetch layer.

use std::fmt;

/// Which structural scope an attribute was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Span,
    Resource,
    Intrinsic,
    /// Unscoped (`.attr`) condition before the second pass resolves it.
    None,
}

/// A well-known intrinsic, distinct from user attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicKind {
    Duration,
    SpanId,
    Name,
    Status,
    Kind,
    TraceRootService,
    TraceRootSpan,
    TraceDuration,
    /// Not an intrinsic: a plain named attribute.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub scope: Scope,
    pub name: String,
    pub intrinsic_kind: IntrinsicKind,
}

impl Attribute {
    pub fn named(scope: Scope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
            intrinsic_kind: IntrinsicKind::None,
        }
    }

    pub fn intrinsic(kind: IntrinsicKind, name: impl Into<String>) -> Self {
        Self {
            scope: Scope::Intrinsic,
            name: name.into(),
            intrinsic_kind: kind,
        }
    }
}

/// Small enum for `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Unset,
    Ok,
    Error,
}

/// Small enum for `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

/// A tagged value carried alongside an [`Attribute`] in a `span_attrs` /
/// `resource_attrs` / `trace_attrs` list.
#[derive(Debug, Clone, PartialEq)]
pub enum Static {
    Nil,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    /// Nanosecond duration; kept as a distinct variant (not `Int`) so
    /// numeric comparisons on `Duration` are unambiguous integer arithmetic
    /// (never float).
    Duration(i64),
    Status(StatusCode),
    Kind(SpanKind),
}

impl fmt::Display for Static {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Static::Nil => write!(f, "nil"),
            Static::Int(v) => write!(f, "{v}"),
            Static::Float(v) => write!(f, "{v}"),
            Static::Bool(v) => write!(f, "{v}"),
            Static::String(v) => write!(f, "{v}"),
            Static::Duration(ns) => write!(f, "{ns}ns"),
            Static::Status(s) => write!(f, "{s:?}"),
            Static::Kind(k) => write!(f, "{k:?}"),
        }
    }
}

pub type AttributeList = Vec<(Attribute, Static)>;

#[derive(Debug, Clone)]
pub struct Span {
    pub id: Vec<u8>,
    pub start_time_ns: i64,
    pub duration_ns: i64,
    pub span_attrs: AttributeList,
    pub resource_attrs: AttributeList,
    pub trace_attrs: AttributeList,
}

impl Span {
    pub fn new(id: Vec<u8>, start_time_ns: i64, duration_ns: i64) -> Self {
        Self {
            id,
            start_time_ns,
            duration_ns,
            span_attrs: Vec::new(),
            resource_attrs: Vec::new(),
            trace_attrs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Spanset {
    pub trace_id: Vec<u8>,
    pub root_span_name: String,
    pub root_service_name: String,
    pub start_time_ns: i64,
    pub duration_ns: i64,
    pub spans: Vec<Span>,
}
