//! Deterministic test double with a dotted token grammar.
//!
//! ```text
//! subject.scope1,scope2
//! subject.scope1,scope2.action1,action2.resource1,resource2.key=value,key2=value2
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::{IntrospectError, MockParseError};
use crate::introspector::{Introspector, Warden};
use crate::models::permission::evaluate;
use crate::models::{Grants, Introspection, Permission};

/// Returns fictitious introspections parsed from the token itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mock;

impl Mock {
    pub fn new() -> Self {
        Self
    }

    /// Parse a dotted token into the grants it describes.
    pub fn parse(token: &str) -> Result<Grants, MockParseError> {
        let fields: Vec<&str> = token.split('.').collect();
        match fields.as_slice() {
            [subject, scopes] => Ok(Grants {
                subject: subject.to_string(),
                scopes: list(scopes),
                ..Default::default()
            }),
            [subject, scopes, actions, resources, context] => Ok(Grants {
                subject: subject.to_string(),
                scopes: list(scopes),
                actions: list(actions),
                resources: list(resources),
                context: pairs(context)?,
            }),
            _ => Err(MockParseError::FieldCount(fields.len())),
        }
    }
}

fn list(field: &str) -> Vec<String> {
    field
        .split(',')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn pairs(field: &str) -> Result<BTreeMap<String, String>, MockParseError> {
    field
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
            _ => Err(MockParseError::ContextPair(pair.to_string())),
        })
        .collect()
}

fn introspection_of(grants: &Grants) -> Introspection {
    Introspection {
        active: true,
        subject: grants.subject.clone(),
        scope: grants.scopes.clone(),
        ..Default::default()
    }
}

#[async_trait]
impl Introspector for Mock {
    async fn introspect(&self, token: &str) -> Result<Introspection, IntrospectError> {
        let grants = Mock::parse(token)?;
        Ok(introspection_of(&grants))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[async_trait]
impl Warden for Mock {
    async fn allowed(
        &self,
        token: &str,
        permission: &Permission,
        scopes: &[String],
    ) -> Result<(Introspection, bool), IntrospectError> {
        let grants = Mock::parse(token)?;
        let introspection = introspection_of(&grants);
        let can = evaluate(&introspection, &grants, permission, scopes).is_ok();
        Ok((introspection, can))
    }
}
