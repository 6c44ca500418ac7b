//! Prometheus counter sink.
//!
//! The counter is registered in a registry the caller owns, so several
//! chains (or tests) can each keep their own.

use std::collections::BTreeMap;

use prometheus::proto::MetricFamily;
use prometheus::{opts, CounterVec, Encoder, Registry, TextEncoder};

use super::{CounterSink, INTROSPECTOR_LABEL, NAMESPACE_LABEL, NONE};

pub const COUNTER_NAME: &str = "introspector_counts";

pub struct PrometheusSink {
    counter: CounterVec,
}

impl PrometheusSink {
    /// Create the `introspector_counts` counter and register it in `registry`.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let counter = CounterVec::new(
            opts!(
                COUNTER_NAME,
                "The requests to introspect a token and which introspector responds"
            ),
            &[INTROSPECTOR_LABEL, NAMESPACE_LABEL],
        )?;
        registry.register(Box::new(counter.clone()))?;
        Ok(Self { counter })
    }

    pub fn counter(&self) -> &CounterVec {
        &self.counter
    }
}

impl CounterSink for PrometheusSink {
    fn increment_counter(&self, labels: &BTreeMap<String, String>) {
        let introspector = labels
            .get(INTROSPECTOR_LABEL)
            .map(String::as_str)
            .unwrap_or(NONE);
        let namespace = labels
            .get(NAMESPACE_LABEL)
            .map(String::as_str)
            .unwrap_or("");
        self.counter
            .with_label_values(&[introspector, namespace])
            .inc();
    }
}

/// Encode everything in `registry` as Prometheus text format.
pub fn encode(registry: &Registry) -> String {
    encode_families(&registry.gather())
}

/// Encoding failures are logged and yield an empty string.
fn encode_families(metric_families: &[MetricFamily]) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(metric_families, &mut buffer) {
        tracing::warn!(error = %e, "failed to encode prometheus metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "prometheus output is not utf-8");
        String::new()
    })
}

// ── Tests ─────────────────────────────────────────────────────
