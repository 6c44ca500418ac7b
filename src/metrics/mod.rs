//! Counter sinks for [`crate::introspector::MetricsCollection`].
//!
//! Sinks are constructed by the caller and injected; nothing registers
//! itself in a process-wide registry.

pub mod prom;
pub mod statsd;

use std::collections::BTreeMap;

use dashmap::DashMap;

pub use prom::PrometheusSink;
pub use statsd::StatsdSink;

/// Label naming the introspector that answered.
pub const INTROSPECTOR_LABEL: &str = "introspector";
/// Optional caller-supplied scope for the counter.
pub const NAMESPACE_LABEL: &str = "namespace";
/// Value of [`INTROSPECTOR_LABEL`] when no introspector answered.
pub const NONE: &str = "none";

/// Receives counter increments. Must tolerate concurrent calls.
pub trait CounterSink: Send + Sync {
    fn increment_counter(&self, labels: &BTreeMap<String, String>);
}

/// Keeps counts in memory, keyed by the rendered label set.
#[derive(Default)]
pub struct MemorySink {
    counts: DashMap<String, u64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count recorded for an exact label set.
    pub fn count(&self, labels: &BTreeMap<String, String>) -> u64 {
        self.counts.get(&render(labels)).map(|c| *c).unwrap_or(0)
    }

    /// Sum over every label set whose introspector label is `name`.
    pub fn count_for(&self, name: &str) -> u64 {
        let needle = format!("{}={}", INTROSPECTOR_LABEL, name);
        self.counts
            .iter()
            .filter(|e| e.key().split(',').any(|part| part == needle))
            .map(|e| *e.value())
            .sum()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|e| *e.value()).sum()
    }
}

impl CounterSink for MemorySink {
    fn increment_counter(&self, labels: &BTreeMap<String, String>) {
        *self.counts.entry(render(labels)).or_insert(0) += 1;
    }
}

fn render(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
