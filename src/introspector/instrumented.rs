use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::collection::Collection;
use super::{Introspector, Warden};
use crate::errors::IntrospectError;
use crate::metrics::{CounterSink, INTROSPECTOR_LABEL, NAMESPACE_LABEL, NONE};
use crate::models::{Introspection, Permission};

/// A [`Collection`] that counts which member answered each request.
///
/// Every call increments the sink once, labelled with the answering
/// member's name or `"none"` when the chain was exhausted. Results and
/// errors are passed through untouched.
pub struct MetricsCollection<I: ?Sized = dyn Warden> {
    collection: Collection<I>,
    sink: Arc<dyn CounterSink>,
    namespace: Option<String>,
}

impl<I: ?Sized> MetricsCollection<I> {
    pub fn new(collection: Collection<I>, sink: Arc<dyn CounterSink>) -> Self {
        Self {
            collection,
            sink,
            namespace: None,
        }
    }

    /// Add a `namespace` label to every increment.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn collection(&self) -> &Collection<I> {
        &self.collection
    }

    fn record(&self, answered_by: Option<&str>) {
        let mut labels = BTreeMap::new();
        labels.insert(
            INTROSPECTOR_LABEL.to_string(),
            answered_by.unwrap_or(NONE).to_string(),
        );
        if let Some(ns) = &self.namespace {
            labels.insert(NAMESPACE_LABEL.to_string(), ns.clone());
        }
        self.sink.increment_counter(&labels);
    }
}

#[async_trait]
impl<I: Introspector + ?Sized> Introspector for MetricsCollection<I> {
    async fn introspect(&self, token: &str) -> Result<Introspection, IntrospectError> {
        let traced = self.collection.introspect_traced(token).await;
        self.record(traced.answered_by);
        traced.result
    }

    fn name(&self) -> &str {
        "metrics_collection"
    }
}

#[async_trait]
impl<I: Warden + ?Sized> Warden for MetricsCollection<I> {
    async fn allowed(
        &self,
        token: &str,
        permission: &Permission,
        scopes: &[String],
    ) -> Result<(Introspection, bool), IntrospectError> {
        let traced = self.collection.allowed_traced(token, permission, scopes).await;
        self.record(traced.answered_by);
        traced.result
    }
}

// ── Tests ────────────────────────────────────────────────────
