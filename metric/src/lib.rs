//! A minimal process-wide metric registry.
//!
//! Counters are grouped by a fixed attribute set (e.g. `reason`) so callers
//! get one handle per distinct label combination rather than formatting
//! strings on every observation.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A monotonically increasing counter, safe to share across threads.
#[derive(Debug, Default)]
pub struct U64Counter {
    value: std::sync::atomic::AtomicU64,
}

impl U64Counter {
    pub fn inc(&self, delta: u64) {
        self.value.fetch_add(delta, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn fetch(&self) -> u64 {
        self.value.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// A named family of counters, keyed by an attribute string (e.g. the
/// discard `reason`). Mirrors the shape of a labeled Prometheus counter
/// vector without pulling in a metrics backend.
#[derive(Debug, Default)]
pub struct CounterFamily {
    name: &'static str,
    counters: Mutex<HashMap<String, Arc<U64Counter>>>,
}

impl CounterFamily {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the counter for `label`, creating it on first use.
    pub fn recorder(&self, label: &str) -> Arc<U64Counter> {
        let mut counters = self.counters.lock();
        if let Some(c) = counters.get(label) {
            return Arc::clone(c);
        }
        let c = Arc::new(U64Counter::default());
        counters.insert(label.to_string(), Arc::clone(&c));
        c
    }

    pub fn inc(&self, label: &str, delta: u64) {
        self.recorder(label).inc(delta);
    }

    pub fn fetch(&self, label: &str) -> u64 {
        self.counters
            .lock()
            .get(label)
            .map(|c| c.fetch())
            .unwrap_or_default()
    }
}

/// Process-wide collection of named metric families. Callers hold an `Arc`
/// and register families lazily by name; tests construct a private
/// `Registry` for isolation rather than sharing the process-wide default.
#[derive(Debug, Default)]
pub struct Registry {
    families: Mutex<HashMap<&'static str, Arc<CounterFamily>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_counter_family(&self, name: &'static str) -> Arc<CounterFamily> {
        let mut families = self.families.lock();
        if let Some(f) = families.get(name) {
            return Arc::clone(f);
        }
        let f = Arc::new(CounterFamily::new(name));
        families.insert(name, Arc::clone(&f));
        f
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_per_label() {
        let reg = Registry::new();
        let family = reg.register_counter_family("discarded_spans");
        family.inc("TRACE_TOO_LARGE", 5);
        family.inc("TRACE_TOO_LARGE", 2);
        family.inc("MAX_LIVE_TRACES", 1);

        assert_eq!(family.fetch("TRACE_TOO_LARGE"), 7);
        assert_eq!(family.fetch("MAX_LIVE_TRACES"), 1);
        assert_eq!(family.fetch("RATE_LIMITED"), 0);
    }

    #[test]
    fn same_family_returned_by_name() {
        let reg = Registry::new();
        let a = reg.register_counter_family("x");
        let b = reg.register_counter_family("x");
        a.inc("l", 1);
        assert_eq!(b.fetch("l"), 1);
    }
}
