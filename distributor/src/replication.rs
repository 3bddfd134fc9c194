//! Replication-aware accounting for rebatched traces (§4.3.2): aggregates
//! per-replica push responses into an accept/discard decision per trace and
//! feeds the discard counters.

use std::sync::Arc;

use metric::CounterFamily;
use tempo_model::{PushErrorReason, RebatchedTrace};

/// `R`, the replication factor, and the derived acceptance quorum.
#[derive(Debug, Clone, Copy)]
pub struct ReplicationConfig {
    pub replication_factor: u32,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self { replication_factor: 3 }
    }
}

impl ReplicationConfig {
    /// Strict majority of replicas: `⌊R/2⌋ + 1`. `R = 1` needs exactly 1
    /// success, matching "any non-success discards the trace"; `R = 3` needs
    /// 2, matching the worked example below.
    pub fn quorum(&self) -> u32 {
        self.replication_factor / 2 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Discarded { reason: PushErrorReason },
}

/// Aggregates the `reasons` observed from each replica for one trace
/// (§4.3.2). `reasons` need not have length `R`; a replica that never
/// responded simply contributes nothing.
pub fn aggregate(reasons: &[PushErrorReason], config: &ReplicationConfig) -> Outcome {
    let num_success = reasons.iter().filter(|r| **r == PushErrorReason::NoError).count() as u32;
    let last_error = reasons
        .iter()
        .rev()
        .find(|r| **r != PushErrorReason::NoError)
        .copied()
        .unwrap_or(PushErrorReason::NoError);

    if num_success >= config.quorum() {
        Outcome::Accepted
    } else {
        // `last_error` is `NoError` when every response seen was a success
        // but quorum still wasn't met (fewer than `R` replicas responded at
        // all); the discard then has no replica-reported cause to report.
        Outcome::Discarded { reason: last_error }
    }
}

/// Aggregates one trace per index of `per_trace_reasons`, incrementing
/// `discarded_spans` (labeled by reason) for every discarded trace, and
/// returns the traces that survived.
pub fn accept_traces<'a>(
    traces: &'a [RebatchedTrace],
    per_trace_reasons: &[Vec<PushErrorReason>],
    config: &ReplicationConfig,
    discarded_spans: &Arc<CounterFamily>,
) -> Vec<&'a RebatchedTrace> {
    traces
        .iter()
        .zip(per_trace_reasons.iter())
        .filter_map(|(trace, reasons)| match aggregate(reasons, config) {
            Outcome::Accepted => Some(trace),
            Outcome::Discarded { reason } => {
                discarded_spans.inc(reason.as_str(), trace.span_count as u64);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(r: u32) -> ReplicationConfig {
        ReplicationConfig { replication_factor: r }
    }

    #[test]
    fn quorum_is_a_strict_majority() {
        assert_eq!(config(1).quorum(), 1);
        assert_eq!(config(3).quorum(), 2);
        assert_eq!(config(5).quorum(), 3);
    }

    #[test]
    fn trace_accepted_when_quorum_met() {
        use PushErrorReason::*;
        let outcome = aggregate(&[NoError, TraceTooLarge, NoError], &config(3));
        assert_eq!(outcome, Outcome::Accepted);
    }

    #[test]
    fn trace_discarded_with_last_error_reason_when_quorum_missed() {
        use PushErrorReason::*;
        let outcome = aggregate(&[TraceTooLarge, NoError, TraceTooLarge], &config(3));
        assert_eq!(outcome, Outcome::Discarded { reason: TraceTooLarge });
    }

    #[test]
    fn trace_discarded_with_no_error_reason_when_too_few_replicas_respond() {
        use PushErrorReason::*;
        // Only one of three replicas responded, and it succeeded: quorum (2)
        // still isn't met, but there's no replica-reported failure to blame.
        let outcome = aggregate(&[NoError], &config(3));
        assert_eq!(outcome, Outcome::Discarded { reason: NoError });
    }

    #[test]
    fn r_equals_one_accepts_on_success_and_discards_on_failure() {
        use PushErrorReason::*;
        assert_eq!(aggregate(&[NoError], &config(1)), Outcome::Accepted);
        assert_eq!(aggregate(&[MaxLiveTraces], &config(1)), Outcome::Discarded { reason: MaxLiveTraces });
    }

    #[test]
    fn discard_counter_receives_full_span_count_of_discarded_trace() {
        use PushErrorReason::*;
        let registry = metric::Registry::new();
        let discarded_spans = registry.register_counter_family("discarded_spans");
        let trace = RebatchedTrace {
            trace_id: vec![1; 16],
            resource_spans: vec![],
            span_count: 7,
            start_unix_s: 0,
            end_unix_s: 1,
        };
        let survivors = accept_traces(&[trace], &[vec![TraceTooLarge, TraceTooLarge, NoError]], &config(3), &discarded_spans);

        assert!(survivors.is_empty());
        assert_eq!(discarded_spans.fetch("TRACE_TOO_LARGE"), 7);
    }
}
