//! The structured query shape a TraceQL parser would emit (§4.2.1): a flat
//! list of conditions, each naming an attribute, a comparison op, and zero
//! or more operands.

use tempo_model::spanset::{Attribute, IntrinsicKind, Scope, Static};

/// Comparison operators a condition can apply. `Presence` takes no operands
/// and keeps non-null values; `NoFilter` takes no operands and keeps
/// everything, used when a condition exists purely to request projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Regex,
    NotRegex,
    Presence,
    NoFilter,
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub attribute: Attribute,
    pub op: Op,
    pub operands: Vec<Static>,
}

impl Condition {
    pub fn new(attribute: Attribute, op: Op, operands: Vec<Static>) -> Self {
        Self { attribute, op, operands }
    }

    /// A meta-condition requests projection of `attribute` without
    /// filtering anything out.
    pub fn projection(attribute: Attribute) -> Self {
        Self {
            attribute,
            op: Op::NoFilter,
            operands: vec![],
        }
    }

    pub fn is_meta(&self) -> bool {
        matches!(self.op, Op::NoFilter)
    }
}

/// How the request's conditions combine into a keep/drop decision for a
/// span (§8 seed scenarios 2-3: TraceQL disjunctions like
/// `{a} ∨ {b}` need `Any`; a plain condition list defaults to `All`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, Default)]
pub struct FetchSpansRequest {
    pub conditions: Vec<Condition>,
    pub combinator: Combinator,
}

impl FetchSpansRequest {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions, combinator: Combinator::All }
    }

    /// A request whose conditions are disjoined: a span is kept if *any*
    /// condition matches it (§8 scenarios 2-3).
    pub fn any(conditions: Vec<Condition>) -> Self {
        Self { conditions, combinator: Combinator::Any }
    }

    pub fn span_scope(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(|c| c.attribute.scope == Scope::Span)
    }

    pub fn resource_scope(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(|c| c.attribute.scope == Scope::Resource)
    }

    pub fn unscoped(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(|c| c.attribute.scope == Scope::None)
    }

    pub fn trace_intrinsics(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(|c| {
            c.attribute.scope == Scope::Intrinsic
                && matches!(
                    c.attribute.intrinsic_kind,
                    IntrinsicKind::TraceRootService | IntrinsicKind::TraceRootSpan | IntrinsicKind::TraceDuration
                )
        })
    }

    /// Conditions on a span-level intrinsic (`name`, `duration`, `status`,
    /// `kind`, span id), distinct from the baseline projection of the same
    /// columns: these additionally narrow the span-level join.
    pub fn span_intrinsics(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(|c| {
            c.attribute.scope == Scope::Intrinsic
                && matches!(
                    c.attribute.intrinsic_kind,
                    IntrinsicKind::Name | IntrinsicKind::SpanId | IntrinsicKind::Duration | IntrinsicKind::Status | IntrinsicKind::Kind
                )
        })
    }
}
