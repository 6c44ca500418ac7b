use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::introspection::Introspection;

/// A request for permission that can be accepted or denied.
///
/// Empty `resource`, `action` or `context` mean "unconstrained": that part of
/// the check is skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// The resource access is requested to, e.g. `car:777`.
    #[serde(default)]
    pub resource: String,

    /// The action requested on the resource, e.g. `drive`.
    #[serde(default)]
    pub action: String,

    /// Environmental attributes, e.g. `{"weather": "windy"}`.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl Permission {
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn is_unconstrained(&self) -> bool {
        self.resource.is_empty() && self.action.is_empty() && self.context.is_empty()
    }
}

/// What a subject has been granted, kinda like a ladon policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grants {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

/// The first dimension a permission check failed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Inactive,
    MissingScope(String),
    Resource(String),
    Action(String),
    Context(String),
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Denial::Inactive => write!(f, "token is not active"),
            Denial::MissingScope(s) => write!(f, "scope '{}' not granted", s),
            Denial::Resource(r) => write!(f, "resource '{}' not granted", r),
            Denial::Action(a) => write!(f, "action '{}' not granted", a),
            Denial::Context(k) => write!(f, "context '{}' does not match", k),
        }
    }
}

impl Grants {
    /// Check a permission request against these grants.
    ///
    /// Every supplied constraint must match: each requested scope must be
    /// granted, a non-empty resource and action must be listed, and each
    /// context key must be present with an identical value.
    pub fn check(&self, permission: &Permission, scopes: &[String]) -> Result<(), Denial> {
        if let Some(missing) = scopes.iter().find(|s| !self.scopes.contains(*s)) {
            return Err(Denial::MissingScope(missing.clone()));
        }

        if !permission.resource.is_empty() && !self.resources.contains(&permission.resource) {
            return Err(Denial::Resource(permission.resource.clone()));
        }

        if !permission.action.is_empty() && !self.actions.contains(&permission.action) {
            return Err(Denial::Action(permission.action.clone()));
        }

        for (key, value) in &permission.context {
            if self.context.get(key) != Some(value) {
                return Err(Denial::Context(key.clone()));
            }
        }

        Ok(())
    }
}

/// Evaluate a permission request for an introspected token.
///
/// The token must be active and carry every requested scope before the
/// grants are consulted.
pub fn evaluate(
    introspection: &Introspection,
    grants: &Grants,
    permission: &Permission,
    scopes: &[String],
) -> Result<(), Denial> {
    if !introspection.active {
        return Err(Denial::Inactive);
    }
    if let Some(missing) = scopes.iter().find(|s| !introspection.has_scope(s)) {
        return Err(Denial::MissingScope(missing.clone()));
    }
    grants.check(permission, scopes)
}

// ── Tests ────────────────────────────────────────────────────
