//! Per-trace partitioning of incoming resource-span batches (§4.3.1).
//!
//! Grouping is by exact trace id, never by ring token (see `crate::token`):
//! two trace ids that collide under the ring hash still land in two
//! separate [`RebatchedTrace`]s.

use std::collections::HashMap;

use indexmap::IndexMap;
use observability_deps::tracing::debug;
use tempo_model::{AttributeValue, KeyValue, RawSpan, RebatchedTrace, ResourceSpans, ResourceSpansBatch, ScopeSpans};

use crate::error::{Error, Result};
use crate::token::token;

/// Tunable knob named in §4.3.1: the per-attribute byte cap `A`.
#[derive(Debug, Clone, Copy)]
pub struct RebatchOptions {
    pub max_attr_bytes: usize,
}

impl Default for RebatchOptions {
    fn default() -> Self {
        Self { max_attr_bytes: 2048 }
    }
}

pub struct RebatchResult {
    pub rebatched_traces: Vec<RebatchedTrace>,
    /// Parallel to `rebatched_traces`.
    pub ring_tokens: Vec<u32>,
    pub truncated_attribute_count: usize,
}

struct TraceAccumulator {
    trace_id: Vec<u8>,
    resource_spans: Vec<ResourceSpans>,
    resource_positions: HashMap<(usize, usize), usize>,
    scope_positions: HashMap<(usize, usize, usize), usize>,
    span_count: usize,
    start_unix_s: u64,
    end_unix_s: u64,
}

impl TraceAccumulator {
    fn new(trace_id: Vec<u8>) -> Self {
        Self {
            trace_id,
            resource_spans: Vec::new(),
            resource_positions: HashMap::new(),
            scope_positions: HashMap::new(),
            span_count: 0,
            start_unix_s: u64::MAX,
            end_unix_s: 0,
        }
    }

    fn observe_span_time(&mut self, start_unix_nano: u64, end_unix_nano: u64) {
        let start_s = start_unix_nano / 1_000_000_000;
        let end_s = end_unix_nano / 1_000_000_000;
        self.start_unix_s = self.start_unix_s.min(start_s);
        self.end_unix_s = self.end_unix_s.max(end_s);
    }
}

/// Truncates `s` to at most `max_bytes` bytes at a UTF-8 char boundary,
/// reporting whether truncation happened. Cutting at a char boundary (never
/// a lossy re-decode) keeps the result's byte length at or under the cap, so
/// rerunning this function on its own output is always a no-op.
fn truncate_string(mut s: String, max_bytes: usize) -> (String, bool) {
    if s.len() <= max_bytes {
        return (s, false);
    }
    let mut cut = max_bytes;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    (s, true)
}

fn truncate_kv(kv: KeyValue, max_bytes: usize, truncated: &mut usize) -> KeyValue {
    let (key, key_truncated) = truncate_string(kv.key, max_bytes);
    if key_truncated {
        *truncated += 1;
    }
    let value = match kv.value {
        AttributeValue::String(s) => {
            let (s, value_truncated) = truncate_string(s, max_bytes);
            if value_truncated {
                *truncated += 1;
            }
            AttributeValue::String(s)
        }
        other => other,
    };
    KeyValue { key, value }
}

fn truncate_attrs(attrs: Vec<KeyValue>, max_bytes: usize, truncated: &mut usize) -> Vec<KeyValue> {
    attrs.into_iter().map(|kv| truncate_kv(kv, max_bytes, truncated)).collect()
}

fn truncate_span(mut span: RawSpan, max_bytes: usize, truncated: &mut usize) -> RawSpan {
    span.attributes = truncate_attrs(span.attributes, max_bytes, truncated);
    for event in &mut span.events {
        let attrs = std::mem::take(&mut event.attributes);
        event.attributes = truncate_attrs(attrs, max_bytes, truncated);
    }
    for link in &mut span.links {
        let attrs = std::mem::take(&mut link.attributes);
        link.attributes = truncate_attrs(attrs, max_bytes, truncated);
    }
    span
}

/// Partitions `batches` by trace id, truncating oversize attributes and
/// computing a ring token per trace (§4.3.1).
pub fn rebatch(batches: &[ResourceSpansBatch], tenant: &str, options: &RebatchOptions) -> Result<RebatchResult> {
    let mut traces: IndexMap<Vec<u8>, TraceAccumulator> = IndexMap::new();
    let mut truncated_attribute_count = 0usize;

    for (batch_idx, batch) in batches.iter().enumerate() {
        for (resource_idx, rs) in batch.resource_spans.iter().enumerate() {
            for (scope_idx, ss) in rs.scope_spans.iter().enumerate() {
                for span in &ss.spans {
                    if span.trace_id.len() != 16 {
                        return Err(Error::InvalidTraceId {
                            bits: span.trace_id.len() * 8,
                        });
                    }

                    let acc = traces
                        .entry(span.trace_id.clone())
                        .or_insert_with(|| TraceAccumulator::new(span.trace_id.clone()));

                    let resource_pos = match acc.resource_positions.get(&(batch_idx, resource_idx)) {
                        Some(&p) => p,
                        None => {
                            let resource = truncate_attrs(rs.resource.attributes.clone(), options.max_attr_bytes, &mut truncated_attribute_count);
                            acc.resource_spans.push(ResourceSpans {
                                resource: tempo_model::Resource { attributes: resource },
                                scope_spans: Vec::new(),
                            });
                            let p = acc.resource_spans.len() - 1;
                            acc.resource_positions.insert((batch_idx, resource_idx), p);
                            p
                        }
                    };

                    let scope_pos = match acc.scope_positions.get(&(batch_idx, resource_idx, scope_idx)) {
                        Some(&p) => p,
                        None => {
                            let mut scope = ss.scope.clone();
                            scope.attributes = truncate_attrs(scope.attributes, options.max_attr_bytes, &mut truncated_attribute_count);
                            acc.resource_spans[resource_pos].scope_spans.push(ScopeSpans { scope, spans: Vec::new() });
                            let p = acc.resource_spans[resource_pos].scope_spans.len() - 1;
                            acc.scope_positions.insert((batch_idx, resource_idx, scope_idx), p);
                            p
                        }
                    };

                    acc.observe_span_time(span.start_time_unix_nano, span.end_time_unix_nano);
                    acc.span_count += 1;
                    let copied = truncate_span(span.clone(), options.max_attr_bytes, &mut truncated_attribute_count);
                    acc.resource_spans[resource_pos].scope_spans[scope_pos].spans.push(copied);
                }
            }
        }
    }

    debug!(trace_count = traces.len(), truncated_attribute_count, "rebatched incoming spans");

    let mut rebatched_traces = Vec::with_capacity(traces.len());
    let mut ring_tokens = Vec::with_capacity(traces.len());
    for (trace_id, acc) in traces {
        ring_tokens.push(token(tenant, &trace_id));
        rebatched_traces.push(RebatchedTrace {
            trace_id,
            resource_spans: acc.resource_spans,
            span_count: acc.span_count,
            start_unix_s: if acc.start_unix_s == u64::MAX { 0 } else { acc.start_unix_s },
            end_unix_s: acc.end_unix_s,
        });
    }

    Ok(RebatchResult {
        rebatched_traces,
        ring_tokens,
        truncated_attribute_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_model::{Event, InstrumentationScope, Link, Resource};

    fn span(trace_id: &[u8], span_id: u8, name: &str, attrs: Vec<KeyValue>) -> RawSpan {
        RawSpan {
            trace_id: trace_id.to_vec(),
            span_id: vec![span_id],
            name: name.to_string(),
            start_time_unix_nano: 1_000_000_000,
            end_time_unix_nano: 2_000_000_000,
            attributes: attrs,
            events: Vec::new(),
            links: Vec::new(),
        }
    }

    fn batch_with(resource_attrs: Vec<KeyValue>, spans: Vec<RawSpan>) -> ResourceSpansBatch {
        ResourceSpansBatch {
            resource_spans: vec![ResourceSpans {
                resource: Resource { attributes: resource_attrs },
                scope_spans: vec![ScopeSpans {
                    scope: InstrumentationScope::default(),
                    spans,
                }],
            }],
        }
    }

    #[test]
    fn spans_with_same_trace_id_land_in_one_rebatched_trace() {
        let trace_id = vec![1u8; 16];
        let batch = batch_with(vec![], vec![span(&trace_id, 1, "a", vec![]), span(&trace_id, 2, "b", vec![])]);
        let result = rebatch(&[batch], "tenant", &RebatchOptions::default()).unwrap();

        assert_eq!(result.rebatched_traces.len(), 1);
        assert_eq!(result.rebatched_traces[0].span_count, 2);
    }

    #[test]
    fn distinct_trace_ids_never_merge() {
        let a = vec![1u8; 16];
        let b = vec![2u8; 16];
        let batch = batch_with(vec![], vec![span(&a, 1, "a", vec![]), span(&b, 1, "b", vec![])]);
        let result = rebatch(&[batch], "tenant", &RebatchOptions::default()).unwrap();

        assert_eq!(result.rebatched_traces.len(), 2);
        assert_eq!(result.ring_tokens.len(), 2);
    }

    #[test]
    fn invalid_trace_id_length_is_rejected() {
        let batch = batch_with(vec![], vec![span(&[1, 2, 3], 1, "a", vec![])]);
        let err = rebatch(&[batch], "tenant", &RebatchOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidTraceId { bits: 24 }));
    }

    #[test]
    fn oversize_attribute_values_are_truncated_and_counted() {
        let trace_id = vec![1u8; 16];
        let long_value = "x".repeat(10);
        let attrs = vec![KeyValue::new("k", AttributeValue::String(long_value))];
        let batch = batch_with(vec![], vec![span(&trace_id, 1, "a", attrs)]);
        let options = RebatchOptions { max_attr_bytes: 4 };
        let result = rebatch(&[batch], "tenant", &options).unwrap();

        assert_eq!(result.truncated_attribute_count, 1);
        let rebatched = &result.rebatched_traces[0];
        let stored = &rebatched.resource_spans[0].scope_spans[0].spans[0].attributes[0];
        assert_eq!(stored.value, AttributeValue::String("xxxx".to_string()));
    }

    #[test]
    fn rerunning_truncation_is_idempotent() {
        let trace_id = vec![1u8; 16];
        let attrs = vec![KeyValue::new("a-long-key-name", AttributeValue::String("short".to_string()))];
        let batch = batch_with(vec![], vec![span(&trace_id, 1, "a", attrs)]);
        let options = RebatchOptions { max_attr_bytes: 4 };

        let first = rebatch(&[batch], "tenant", &options).unwrap();
        assert_eq!(first.truncated_attribute_count, 2); // both key and value exceed the cap

        let reencoded = ResourceSpansBatch {
            resource_spans: first.rebatched_traces[0].resource_spans.clone(),
        };
        let second = rebatch(&[reencoded], "tenant", &options).unwrap();
        assert_eq!(second.truncated_attribute_count, 0);
    }

    #[test]
    fn each_trace_gets_its_own_resource_header_copy() {
        let a = vec![1u8; 16];
        let b = vec![2u8; 16];
        let resource_attrs = vec![KeyValue::new("env", AttributeValue::String("prod".to_string()))];
        let batch = batch_with(resource_attrs, vec![span(&a, 1, "a", vec![]), span(&b, 1, "b", vec![])]);
        let result = rebatch(&[batch], "tenant", &RebatchOptions::default()).unwrap();

        assert_eq!(result.rebatched_traces.len(), 2);
        for rebatched in &result.rebatched_traces {
            assert_eq!(rebatched.resource_spans.len(), 1);
            assert_eq!(rebatched.resource_spans[0].resource.attributes, resource_attrs_for_env_prod());
            assert_eq!(rebatched.resource_spans[0].scope_spans[0].spans.len(), 1);
        }
    }

    fn resource_attrs_for_env_prod() -> Vec<KeyValue> {
        vec![KeyValue::new("env", AttributeValue::String("prod".to_string()))]
    }

    #[test]
    fn events_and_links_are_truncated_too() {
        let trace_id = vec![1u8; 16];
        let mut s = span(&trace_id, 1, "a", vec![]);
        s.events.push(Event {
            name: "ev".to_string(),
            time_unix_nano: 1,
            attributes: vec![KeyValue::new("k", AttributeValue::String("toolong".to_string()))],
        });
        s.links.push(Link {
            trace_id: vec![9; 16],
            span_id: vec![9],
            attributes: vec![KeyValue::new("k", AttributeValue::String("toolong".to_string()))],
        });
        let batch = batch_with(vec![], vec![s]);
        let options = RebatchOptions { max_attr_bytes: 3 };
        let result = rebatch(&[batch], "tenant", &options).unwrap();

        assert_eq!(result.truncated_attribute_count, 2);
    }
}
