//! Builds the iterator tree for a [`FetchSpansRequest`] (§4.2.2) and walks it
//! to emit [`Spanset`]s (§4.2.3).
//!
//! Tree shape, innermost first:
//! - `span_tree`: inner join of the always-projected span intrinsics plus
//!   any span-scope conditions, at the span definition level. Non-meta
//!   conditions narrow the join; each span-scope attribute condition reads
//!   its `keys`/`values` column pair and is filtered with an
//!   [`AttributePredicate`](crate::value_predicate::AttributePredicate).
//! - `nested_span`: wraps each span result as a single `"span"` entry at the
//!   resource definition level, so many spans can be folded under one
//!   resource without losing their own row identity.
//! - `resource_group`: left join attaching resource-scope attribute
//!   iterators (optional) to the nested span stream (required), so a
//!   resource with no matching spans never surfaces and a span is kept even
//!   when its resource has no attributes of interest.
//! - `nested_resource`: wraps each resource group as a `"resource"` entry at
//!   the trace definition level.
//! - `top`: left join attaching the nested resource stream (optional) to the
//!   trace intrinsics join (required), yielding exactly one result per
//!   trace.
//!
//! Resource-scope and unscoped conditions are honored as projections (with
//! nil-as-attribute fallback) rather than as tree-level filters; matching is
//! re-checked as a cheap post-filter once a trace's spans are materialized.
//! See `DESIGN.md` for why: the join primitives compare at one definition
//! level per call, and attaching a coarser optional (resource) to a finer
//! required (span) cleanly as a *filter* would need a different definition
//! level on each side at once.

use std::sync::Arc;

use observability_deps::tracing::{debug, trace};
use parquetquery::{
    BlockReader, BoxedIterator, BufferPool, GroupPredicate, JoinIterator, LeftJoinIterator, Predicate, ResultPool,
    RowIterator,
};
use tempo_model::spanset::{Attribute, IntrinsicKind, Scope, SpanKind, Spanset, Static, StatusCode};
use tempo_model::{IteratorResult, OtherValue, Value};
use trace::span::SpanRecorder;
use trace::CancellationToken;

use crate::error::{Error, Result};
use crate::nest::NestUnderKey;
use crate::request::{Combinator, Condition, FetchSpansRequest};
use crate::resolver::ColumnResolver;
use crate::value_predicate::{arc_predicate, AttributePredicate, ConditionPredicate};

pub const TRACE_LEVEL: usize = 0;
pub const RESOURCE_LEVEL: usize = 1;
pub const SPAN_LEVEL: usize = 2;
pub const RESOURCE_ATTR_LEVEL: usize = 2;
pub const SPAN_ATTR_LEVEL: usize = 3;

/// The pools every leaf iterator in a query tree shares (§5 "shared
/// resources"): one `ResultPool`/`BufferPool` per query, not per leaf.
#[derive(Clone, Default)]
pub struct Pools {
    pub buffer: BufferPool,
    pub result: ResultPool,
}

fn leaf(
    block: &dyn BlockReader,
    column: usize,
    max_def: usize,
    select_as: &str,
    predicate: Option<Arc<dyn Predicate>>,
    pools: &Pools,
    cancel: &CancellationToken,
) -> BoxedIterator {
    Box::new(parquetquery::SyncIterator::new(
        block.row_groups(),
        column,
        predicate,
        parquetquery::SyncIteratorOptions {
            select_as: Some(select_as.to_string()),
            max_definition_level: max_def,
            buffer_size: 1000,
            intern: false,
        },
        pools.buffer.clone(),
        pools.result.clone(),
        cancel.clone(),
    ))
}

/// Builds the span-level iterator for one named attribute-map condition: a
/// join of its `keys`/`values` columns at `attr_level`, re-grouped at
/// `group_level` so every attribute belonging to the same span/resource
/// lands in one result (§4.1.4).
fn attribute_group(
    block: &dyn BlockReader,
    keys_col: usize,
    values_col: usize,
    group_level: usize,
    attr_level: usize,
    group_predicate: Option<Arc<dyn GroupPredicate>>,
    pools: &Pools,
    cancel: &CancellationToken,
) -> BoxedIterator {
    let keys_iter = leaf(block, keys_col, attr_level, "keys", None, pools, cancel);
    let values_iter = leaf(block, values_col, attr_level, "values", None, pools, cancel);
    let pair = JoinIterator::new(attr_level, vec![keys_iter, values_iter], group_predicate, pools.result.clone());
    Box::new(JoinIterator::new(group_level, vec![Box::new(pair)], None, pools.result.clone()))
}

fn baseline_span_iters(
    block: &dyn BlockReader,
    resolver: &dyn ColumnResolver,
    pools: &Pools,
    cancel: &CancellationToken,
) -> Result<Vec<BoxedIterator>> {
    let mut out = Vec::new();
    for (kind, key) in [
        (IntrinsicKind::Name, "name"),
        (IntrinsicKind::SpanId, "span_id"),
        (IntrinsicKind::Duration, "duration_ns"),
        (IntrinsicKind::Status, "status"),
        (IntrinsicKind::Kind, "kind"),
    ] {
        let column = resolver.span_intrinsic_column(kind).ok_or_else(|| Error::InvalidCondition {
            attribute: key.into(),
            details: "schema has no column for this span intrinsic".into(),
        })?;
        out.push(leaf(block, column, SPAN_LEVEL, key, None, pools, cancel));
    }
    Ok(out)
}

fn baseline_trace_iters(
    block: &dyn BlockReader,
    resolver: &dyn ColumnResolver,
    pools: &Pools,
    cancel: &CancellationToken,
) -> Result<Vec<BoxedIterator>> {
    let mut out = Vec::new();
    let trace_id = resolver.trace_id_column().ok_or_else(|| Error::InvalidCondition {
        attribute: "trace_id".into(),
        details: "schema has no trace id column".into(),
    })?;
    out.push(leaf(block, trace_id, TRACE_LEVEL, "trace_id", None, pools, cancel));

    let start_time = resolver.trace_start_time_column().ok_or_else(|| Error::InvalidCondition {
        attribute: "start_time_ns".into(),
        details: "schema has no trace start-time column".into(),
    })?;
    out.push(leaf(block, start_time, TRACE_LEVEL, "start_time_ns", None, pools, cancel));

    for (kind, key) in [
        (IntrinsicKind::TraceRootService, "root_service_name"),
        (IntrinsicKind::TraceRootSpan, "root_span_name"),
        (IntrinsicKind::TraceDuration, "duration_ns"),
    ] {
        let column = resolver.trace_intrinsic_column(kind).ok_or_else(|| Error::InvalidCondition {
            attribute: key.into(),
            details: "schema has no column for this trace intrinsic".into(),
        })?;
        out.push(leaf(block, column, TRACE_LEVEL, key, None, pools, cancel));
    }
    Ok(out)
}

/// Builds the leaf (or small join, for attribute-map conditions) iterator
/// for one condition at `group_level`/`attr_level`.
fn condition_iter(
    condition: &Condition,
    block: &dyn BlockReader,
    resolver: &dyn ColumnResolver,
    group_level: usize,
    attr_level: usize,
    pools: &Pools,
    cancel: &CancellationToken,
) -> Result<BoxedIterator> {
    if condition.attribute.intrinsic_kind != IntrinsicKind::None {
        let column = match condition.attribute.scope {
            Scope::Intrinsic if group_level == TRACE_LEVEL => resolver.trace_intrinsic_column(condition.attribute.intrinsic_kind),
            _ => resolver.span_intrinsic_column(condition.attribute.intrinsic_kind),
        }
        .ok_or_else(|| Error::InvalidCondition {
            attribute: condition.attribute.name.clone(),
            details: "schema has no column for this intrinsic".into(),
        })?;
        let predicate = if condition.is_meta() {
            None
        } else {
            Some(arc_predicate(condition.op, condition.operands.clone())?)
        };
        return Ok(leaf(block, column, group_level, &condition.attribute.name, predicate, pools, cancel));
    }

    let (keys_col, values_col) = match condition.attribute.scope {
        Scope::Span => resolver.span_attr_columns(&condition.attribute.name),
        Scope::Resource => resolver.resource_attr_columns(&condition.attribute.name),
        Scope::None => resolver
            .span_attr_columns(&condition.attribute.name)
            .or_else(|| resolver.resource_attr_columns(&condition.attribute.name)),
        Scope::Intrinsic => None,
    }
    .ok_or_else(|| Error::InvalidCondition {
        attribute: condition.attribute.name.clone(),
        details: "schema has no attribute columns for this name".into(),
    })?;

    let predicate = ConditionPredicate::compile(condition.op, condition.operands.clone())?;
    let group_pred: Arc<dyn GroupPredicate> = Arc::new(AttributePredicate {
        key: condition.attribute.name.clone().into_bytes(),
        predicate,
    });
    Ok(attribute_group(block, keys_col, values_col, group_level, attr_level, Some(group_pred), pools, cancel))
}

fn join_or_single(level: usize, mut iters: Vec<BoxedIterator>, pools: &Pools) -> BoxedIterator {
    if iters.len() == 1 {
        iters.pop().unwrap()
    } else {
        Box::new(JoinIterator::new(level, iters, None, pools.result.clone()))
    }
}

/// Builds the full tree described in the module doc and returns its root,
/// yielding one [`IteratorResult`] per trace.
pub fn build_tree(
    request: &FetchSpansRequest,
    block: &dyn BlockReader,
    resolver: &dyn ColumnResolver,
    pools: &Pools,
    cancel: &CancellationToken,
) -> Result<BoxedIterator> {
    debug!(conditions = request.conditions.len(), combinator = ?request.combinator, "building iterator tree");
    let mut trace_iters = baseline_trace_iters(block, resolver, pools, cancel)?;
    for c in request.trace_intrinsics() {
        trace_iters.push(condition_iter(c, block, resolver, TRACE_LEVEL, TRACE_LEVEL, pools, cancel)?);
    }
    let trace_tree = join_or_single(TRACE_LEVEL, trace_iters, pools);

    let mut span_iters = baseline_span_iters(block, resolver, pools, cancel)?;
    for c in request.span_scope() {
        // Under `Combinator::Any` this condition must not filter the join
        // (that would drop spans satisfied by a *different* disjunct);
        // project it instead and let `Results::materialize` OR the
        // conditions together over the materialized attributes.
        match request.combinator {
            Combinator::All => span_iters.push(condition_iter(c, block, resolver, SPAN_LEVEL, SPAN_ATTR_LEVEL, pools, cancel)?),
            Combinator::Any => {
                let projection = Condition::projection(c.attribute.clone());
                span_iters.push(condition_iter(&projection, block, resolver, SPAN_LEVEL, SPAN_ATTR_LEVEL, pools, cancel)?);
            }
        }
    }
    if request.combinator == Combinator::All {
        for c in request.span_intrinsics() {
            span_iters.push(condition_iter(c, block, resolver, SPAN_LEVEL, SPAN_ATTR_LEVEL, pools, cancel)?);
        }
    }
    // Under `Any`, span intrinsics need no extra projection: `name`,
    // `duration_ns`, `status`, and `kind` are already baseline-projected and
    // decoded into `span_attrs` unconditionally in `materialize`.
    for c in request.unscoped() {
        if resolver.span_attr_columns(&c.attribute.name).is_some() {
            // Unscoped conditions only ever project here: the match itself
            // (which scope satisfied it) is decided in the post-filter pass
            // in `Results::materialize`, since it can be satisfied by either
            // scope independently.
            let projection = Condition::projection(c.attribute.clone());
            span_iters.push(condition_iter(&projection, block, resolver, SPAN_LEVEL, SPAN_ATTR_LEVEL, pools, cancel)?);
        }
    }
    let span_tree = join_or_single(SPAN_LEVEL, span_iters, pools);
    let nested_span: BoxedIterator = Box::new(NestUnderKey::new(span_tree, "span", RESOURCE_LEVEL));

    let mut resource_iters = Vec::new();
    for c in request.resource_scope() {
        match request.combinator {
            Combinator::All => resource_iters.push(condition_iter(c, block, resolver, RESOURCE_LEVEL, RESOURCE_ATTR_LEVEL, pools, cancel)?),
            Combinator::Any => {
                let projection = Condition::projection(c.attribute.clone());
                resource_iters.push(condition_iter(&projection, block, resolver, RESOURCE_LEVEL, RESOURCE_ATTR_LEVEL, pools, cancel)?);
            }
        }
    }
    for c in request.unscoped() {
        if resolver.resource_attr_columns(&c.attribute.name).is_some() {
            let projection = Condition::projection(c.attribute.clone());
            resource_iters.push(condition_iter(&projection, block, resolver, RESOURCE_LEVEL, RESOURCE_ATTR_LEVEL, pools, cancel)?);
        }
    }
    let resource_optional: Vec<BoxedIterator> = if resource_iters.is_empty() {
        Vec::new()
    } else {
        vec![join_or_single(RESOURCE_LEVEL, resource_iters, pools)]
    };
    let resource_group = LeftJoinIterator::new(RESOURCE_LEVEL, vec![nested_span], resource_optional, None, pools.result.clone())?;
    let nested_resource: BoxedIterator = Box::new(NestUnderKey::new(Box::new(resource_group), "resource", TRACE_LEVEL));

    let top = LeftJoinIterator::new(TRACE_LEVEL, vec![trace_tree], vec![nested_resource], None, pools.result.clone())?;
    Ok(Box::new(top))
}

fn decode_status(value: Option<&Value>) -> StatusCode {
    match value.and_then(Value::as_int) {
        Some(1) => StatusCode::Ok,
        Some(2) => StatusCode::Error,
        _ => StatusCode::Unset,
    }
}

fn decode_kind(value: Option<&Value>) -> SpanKind {
    match value.and_then(Value::as_int) {
        Some(1) => SpanKind::Server,
        Some(2) => SpanKind::Client,
        Some(3) => SpanKind::Producer,
        Some(4) => SpanKind::Consumer,
        _ => SpanKind::Internal,
    }
}

fn value_to_static(value: &Value) -> Static {
    match &value.data {
        tempo_model::ValueData::Int(v) => Static::Int(*v),
        tempo_model::ValueData::Float(v) => Static::Float(*v),
        tempo_model::ValueData::Bool(v) => Static::Bool(*v),
        tempo_model::ValueData::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => Static::String(s.to_string()),
            Err(_) => Static::String(String::from_utf8_lossy(b).into_owned()),
        },
        tempo_model::ValueData::Null => Static::Nil,
    }
}

/// Reconstructs an attribute list from a group whose `keys`/`values`
/// columns were joined and flattened into repeated entries (§4.1.4),
/// padding any requested-but-absent name with `Static::Nil` (§4.2.3
/// nil-as-attribute semantics).
fn zip_attrs(result: &IteratorResult, scope: Scope, requested: &[&str]) -> Vec<(Attribute, Static)> {
    let keys: Vec<&Value> = result.entries_for("keys").collect();
    let values: Vec<&Value> = result.entries_for("values").collect();
    let mut out: Vec<(Attribute, Static)> = keys
        .iter()
        .zip(values.iter())
        .filter_map(|(k, v)| k.as_str().map(|name| (Attribute::named(scope, name), value_to_static(v))))
        .collect();
    for name in requested {
        if !out.iter().any(|(a, _)| a.name == *name) {
            out.push((Attribute::named(scope, *name), Static::Nil));
        }
    }
    out
}

fn attr_lookup<'a>(attrs: &'a [(Attribute, Static)], name: &str) -> Option<&'a Static> {
    attrs.iter().find(|(a, _)| a.name == name).map(|(_, v)| v)
}

/// Whether `c` matches the materialized attributes of one span: resource-
/// and span-scoped conditions check their own scope only; unscoped
/// conditions check either (§4.2.3).
fn condition_matches(c: &Condition, resource_attrs: &[(Attribute, Static)], span_attrs: &[(Attribute, Static)]) -> bool {
    let Ok(predicate) = ConditionPredicate::compile(c.op, c.operands.clone()) else {
        return false;
    };
    let hits = |attrs: &[(Attribute, Static)]| match attr_lookup(attrs, &c.attribute.name) {
        Some(Static::Nil) | None => false,
        Some(v) => predicate.matches_value(&static_to_value(v)),
    };
    match c.attribute.scope {
        Scope::Resource => hits(resource_attrs),
        Scope::None => hits(span_attrs) || hits(resource_attrs),
        _ => hits(span_attrs),
    }
}

pub struct Results {
    tree: BoxedIterator,
    resource_filters: Vec<Condition>,
    span_filters: Vec<Condition>,
    unscoped_filters: Vec<Condition>,
    combinator: Combinator,
    recorder: SpanRecorder,
}

impl Results {
    fn new(tree: BoxedIterator, request: &FetchSpansRequest) -> Self {
        let resource_filters = request.resource_scope().filter(|c| !c.is_meta()).cloned().collect();
        let span_filters = request
            .span_scope()
            .chain(request.span_intrinsics())
            .filter(|c| !c.is_meta())
            .cloned()
            .collect();
        let unscoped_filters = request.unscoped().filter(|c| !c.is_meta()).cloned().collect();
        Self {
            tree,
            resource_filters,
            span_filters,
            unscoped_filters,
            combinator: request.combinator,
            recorder: SpanRecorder::default(),
        }
    }

    fn all_filters(&self) -> impl Iterator<Item = &Condition> {
        self.resource_filters.iter().chain(self.span_filters.iter()).chain(self.unscoped_filters.iter())
    }

    /// Pulls the next trace's `Spanset`, or `None` once the tree is
    /// exhausted. Callers drive this in a loop (§6 "results.next").
    pub fn next(&mut self) -> Result<Option<Spanset>> {
        loop {
            let Some(top) = self.tree.next()? else {
                self.recorder.event("iterator tree exhausted");
                return Ok(None);
            };
            if let Some(spanset) = self.materialize(&top)? {
                return Ok(Some(spanset));
            }
        }
    }

    pub fn close(&mut self) {
        self.tree.close();
    }

    fn materialize(&self, top: &IteratorResult) -> Result<Option<Spanset>> {
        let trace_id = top.first_entry("trace_id").and_then(Value::as_bytes).unwrap_or(&[]).to_vec();
        let start_time_ns = top.first_entry("start_time_ns").and_then(Value::as_int).unwrap_or(0);
        let root_service_name = top.first_entry("root_service_name").and_then(Value::as_str).unwrap_or("").to_string();
        let root_span_name = top.first_entry("root_span_name").and_then(Value::as_str).unwrap_or("").to_string();
        let duration_ns = top.first_entry("duration_ns").and_then(Value::as_int).unwrap_or(0);

        let trace_attrs = vec![
            (Attribute::intrinsic(IntrinsicKind::TraceRootService, "trace:rootServiceName"), Static::String(root_service_name.clone())),
            (Attribute::intrinsic(IntrinsicKind::TraceRootSpan, "trace:rootSpanName"), Static::String(root_span_name.clone())),
            (Attribute::intrinsic(IntrinsicKind::TraceDuration, "trace:duration"), Static::Duration(duration_ns)),
        ];

        let mut spans = Vec::new();
        for other in top.others_for("resource") {
            let OtherValue::Nested(resource_result) = other;
            let resource_requested: Vec<&str> = self
                .resource_filters
                .iter()
                .chain(self.unscoped_filters.iter())
                .map(|c| c.attribute.name.as_str())
                .collect();
            let resource_attrs = zip_attrs(resource_result, Scope::Resource, &resource_requested);

            // Under `All`, a resource that fails its own conditions can
            // never contribute a matching span regardless of the span-level
            // checks below, so it's worth dropping early. Under `Any`, a
            // span can still be kept by a span/unscoped disjunct even if
            // every resource condition fails, so no such shortcut applies.
            if self.combinator == Combinator::All && !self.resource_filters.iter().all(|c| condition_matches(c, &resource_attrs, &[])) {
                trace!("resource failed its own conditions, skipping its spans");
                continue;
            }

            for span_other in resource_result.others_for("span") {
                let OtherValue::Nested(span_result) = span_other;
                let name = span_result.first_entry("name").and_then(Value::as_str).unwrap_or("").to_string();
                let span_id = span_result.first_entry("span_id").and_then(Value::as_bytes).unwrap_or(&[]).to_vec();
                let span_duration_ns = span_result.first_entry("duration_ns").and_then(Value::as_int).unwrap_or(0);
                let status = decode_status(span_result.first_entry("status"));
                let kind = decode_kind(span_result.first_entry("kind"));

                let span_requested: Vec<&str> = self
                    .span_filters
                    .iter()
                    .chain(self.unscoped_filters.iter())
                    .map(|c| c.attribute.name.as_str())
                    .collect();
                let mut span_attrs = zip_attrs(span_result, Scope::Span, &span_requested);
                span_attrs.push((Attribute::intrinsic(IntrinsicKind::Name, "name"), Static::String(name.clone())));
                span_attrs.push((Attribute::intrinsic(IntrinsicKind::Duration, "duration"), Static::Duration(span_duration_ns)));
                span_attrs.push((Attribute::intrinsic(IntrinsicKind::Status, "status"), Static::Status(status)));
                span_attrs.push((Attribute::intrinsic(IntrinsicKind::Kind, "kind"), Static::Kind(kind)));

                let keep = match self.combinator {
                    // Each group is internally AND'd, and the groups AND
                    // together: a resource condition must hold (checked
                    // above), every span condition must hold, and every
                    // unscoped condition must hold against *either* scope.
                    Combinator::All => {
                        self.span_filters.iter().all(|c| condition_matches(c, &resource_attrs, &span_attrs))
                            && self.unscoped_filters.iter().all(|c| condition_matches(c, &resource_attrs, &span_attrs))
                    }
                    // A span survives if any condition in any group matches
                    // it, regardless of which scope satisfied it (§8
                    // scenarios 2-3).
                    Combinator::Any => self.all_filters().any(|c| condition_matches(c, &resource_attrs, &span_attrs)),
                };
                if !keep {
                    trace!("span failed the second-pass filter, dropping");
                    continue;
                }

                let mut span = tempo_model::spanset::Span::new(span_id, start_time_ns, span_duration_ns);
                span.span_attrs = span_attrs;
                span.resource_attrs = resource_attrs.clone();
                span.trace_attrs = trace_attrs.clone();
                spans.push(span);
            }
        }

        if spans.is_empty() && (!self.resource_filters.is_empty() || !self.span_filters.is_empty() || !self.unscoped_filters.is_empty()) {
            return Ok(None);
        }

        Ok(Some(Spanset {
            trace_id,
            root_span_name,
            root_service_name,
            start_time_ns,
            duration_ns,
            spans,
        }))
    }
}

/// Converts a reconstructed attribute value back into a `Value` for reuse
/// with `ConditionPredicate`, used only by the post-filter pass.
fn static_to_value(s: &Static) -> Value {
    match s {
        Static::Nil => Value::null(0, 0),
        Static::Int(v) => Value::int(*v, 0, 0),
        Static::Float(v) => Value::new(tempo_model::ValueData::Float(*v), 0, 0),
        Static::Bool(v) => Value::boolean(*v, 0, 0),
        Static::String(v) => Value::string(v.clone().into_bytes(), 0, 0),
        Static::Duration(v) => Value::int(*v, 0, 0),
        Static::Status(_) | Static::Kind(_) => Value::null(0, 0),
    }
}

pub struct FetchSpansExecutor;

impl FetchSpansExecutor {
    /// Builds the iterator tree and returns a lazily-pulled `Results`
    /// handle (§6: "results.next(ctx) -> Option<Spanset>").
    pub fn execute(
        request: &FetchSpansRequest,
        block: &dyn BlockReader,
        resolver: &dyn ColumnResolver,
        pools: Pools,
        cancel: CancellationToken,
    ) -> Result<Results> {
        let tree = build_tree(request, block, resolver, &pools, &cancel)?;
        let results = Results::new(tree, request);
        results.recorder.event("fetch request ready to pull");
        Ok(results)
    }
}
