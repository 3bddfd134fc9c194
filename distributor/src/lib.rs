//! Distributor ingress (§4.3): the pre-storage step that rate-limits,
//! partitions, and bounds incoming resource-span batches for one tenant
//! before they are sent to replicas.

pub mod delay;
pub mod error;
pub mod rate_limiter;
pub mod rebatcher;
pub mod replication;
pub mod token;

pub use error::{Error, Result};
pub use rate_limiter::{RateLimiter, RateLimiterConfig, RateLimitStrategy};
pub use rebatcher::{RebatchOptions, RebatchResult};
pub use replication::{Outcome, ReplicationConfig};

use std::time::Duration;

use observability_deps::tracing::debug;
use tempo_model::ResourceSpansBatch;
use trace::CancellationToken;

/// Ties a tenant's rate limiter, rebatch options, and artificial delay
/// together for the ingress entry point (§4.3).
pub struct DistributorConfig {
    pub rebatch: RebatchOptions,
    pub rate_limiter: RateLimiterConfig,
    pub artificial_delay: Duration,
}

/// What the ingress entry point hands back to the caller, who performs the
/// actual per-replica sends and later feeds the results to
/// [`replication::accept_traces`].
pub struct IngestResponse {
    pub result: RebatchResult,
}

pub struct Distributor {
    rebatch_options: RebatchOptions,
    rate_limiter: RateLimiter,
    artificial_delay: Duration,
}

impl Distributor {
    pub fn new(config: DistributorConfig) -> Self {
        Self {
            rebatch_options: config.rebatch,
            rate_limiter: RateLimiter::new(config.rate_limiter),
            artificial_delay: config.artificial_delay,
        }
    }

    /// Validates, rate-limits, and rebatches `batches` for `tenant`,
    /// returning the per-trace write units and ring tokens the caller sends
    /// to replicas (§4.3, §6 "Distributor ingress"). All-or-nothing: a
    /// rejection here writes nothing.
    pub fn push(&self, tenant: &str, batches: &[ResourceSpansBatch], cancel: &CancellationToken) -> Result<IngestResponse> {
        delay::pad_to(self.artificial_delay, || self.push_inner(tenant, batches, cancel))
    }

    fn push_inner(&self, tenant: &str, batches: &[ResourceSpansBatch], cancel: &CancellationToken) -> Result<IngestResponse> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let size = estimated_bytes(batches);
        self.rate_limiter.check(tenant, size)?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let result = rebatcher::rebatch(batches, tenant, &self.rebatch_options)?;
        debug!(tenant, trace_count = result.rebatched_traces.len(), size, "accepted ingest batch");
        Ok(IngestResponse { result })
    }
}

/// A byte-size estimate used only for rate limiting, not wire-accurate
/// encoding: sums the variable-length fields a request actually carries.
fn estimated_bytes(batches: &[ResourceSpansBatch]) -> u64 {
    let mut total = 0u64;
    for batch in batches {
        for rs in &batch.resource_spans {
            total += attrs_bytes(&rs.resource.attributes);
            for ss in &rs.scope_spans {
                total += ss.scope.name.len() as u64;
                total += attrs_bytes(&ss.scope.attributes);
                for span in &ss.spans {
                    total += span.trace_id.len() as u64;
                    total += span.span_id.len() as u64;
                    total += span.name.len() as u64;
                    total += attrs_bytes(&span.attributes);
                    for event in &span.events {
                        total += event.name.len() as u64;
                        total += attrs_bytes(&event.attributes);
                    }
                    for link in &span.links {
                        total += link.trace_id.len() as u64;
                        total += link.span_id.len() as u64;
                        total += attrs_bytes(&link.attributes);
                    }
                }
            }
        }
    }
    total
}

fn attrs_bytes(attrs: &[tempo_model::KeyValue]) -> u64 {
    attrs
        .iter()
        .map(|kv| {
            let value_len = match &kv.value {
                tempo_model::AttributeValue::String(s) => s.len(),
                _ => 8,
            };
            (kv.key.len() + value_len) as u64
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_model::{AttributeValue, InstrumentationScope, KeyValue, RawSpan, Resource, ResourceSpans, ScopeSpans};

    fn span(trace_id: &[u8]) -> RawSpan {
        RawSpan {
            trace_id: trace_id.to_vec(),
            span_id: vec![1],
            name: "op".to_string(),
            start_time_unix_nano: 1_000_000_000,
            end_time_unix_nano: 2_000_000_000,
            attributes: vec![KeyValue::new("k", AttributeValue::String("v".to_string()))],
            events: Vec::new(),
            links: Vec::new(),
        }
    }

    fn batch(trace_id: &[u8]) -> ResourceSpansBatch {
        ResourceSpansBatch {
            resource_spans: vec![ResourceSpans {
                resource: Resource::default(),
                scope_spans: vec![ScopeSpans { scope: InstrumentationScope::default(), spans: vec![span(trace_id)] }],
            }],
        }
    }

    fn distributor() -> Distributor {
        Distributor::new(DistributorConfig {
            rebatch: RebatchOptions::default(),
            rate_limiter: RateLimiterConfig {
                rate_limit_bytes: 1_000_000,
                burst_size_bytes: 1_000_000,
                strategy: RateLimitStrategy::Local,
                live_distributors: 1,
            },
            artificial_delay: Duration::ZERO,
        })
    }

    #[test]
    fn push_rebatches_and_tokens_a_valid_batch() {
        let response = distributor().push("tenant", &[batch(&[1; 16])], &CancellationToken::new()).unwrap();
        assert_eq!(response.result.rebatched_traces.len(), 1);
        assert_eq!(response.result.ring_tokens.len(), 1);
    }

    #[test]
    fn push_rejects_invalid_trace_ids_with_nothing_written() {
        let err = distributor().push("tenant", &[batch(&[1, 2, 3])], &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidTraceId { bits: 24 }));
    }

    #[test]
    fn push_rejects_when_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = distributor().push("tenant", &[batch(&[1; 16])], &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn push_rejects_oversize_batches_before_rebatching() {
        let config = DistributorConfig {
            rebatch: RebatchOptions::default(),
            rate_limiter: RateLimiterConfig { rate_limit_bytes: 10, burst_size_bytes: 1, strategy: RateLimitStrategy::Local, live_distributors: 1 },
            artificial_delay: Duration::ZERO,
        };
        let distributor = Distributor::new(config);
        let err = distributor.push("tenant", &[batch(&[1; 16])], &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, Error::ExceedsBurst { .. }));
    }
}
