//! A thin wrapper that records iterator/rebatcher activity against the
//! ambient `tracing` subscriber, mirroring the shape of a distributed-tracing
//! span recorder without pulling in an exporter.

use observability_deps::tracing::{debug, Span};

/// Tracks a logical unit of work (one query, one rebatch request) and emits
/// structured log events against it. Not a replacement for a full
/// OpenTelemetry span: event export is out of scope here (see §1 of the
/// design notes on external collaborators).
#[derive(Debug)]
pub struct SpanRecorder {
    span: Option<Span>,
}

impl SpanRecorder {
    pub fn new(span: Option<Span>) -> Self {
        Self { span }
    }

    pub fn event(&self, message: &str) {
        let _enter = self.span.as_ref().map(|s| s.enter());
        debug!(message);
    }
}

impl Default for SpanRecorder {
    fn default() -> Self {
        Self::new(None)
    }
}
