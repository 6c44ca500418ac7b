use std::sync::Arc;

use async_trait::async_trait;

use super::{token_prefix, Introspector, Warden};
use crate::errors::IntrospectError;
use crate::models::{Introspection, Permission};

/// An ordered fallback chain of introspectors.
///
/// Members are queried in the order they were added; the first one that
/// understands the token answers. If none does, the error lists every
/// member's failure in chain order.
pub struct Collection<I: ?Sized = dyn Warden> {
    members: Vec<Arc<I>>,
}

/// Result of running the chain, plus the member that produced it.
pub(crate) struct Traced<'a, T> {
    pub result: Result<T, IntrospectError>,
    pub answered_by: Option<&'a str>,
}

impl<I: ?Sized> Collection<I> {
    pub fn new() -> Self {
        Self { members: Vec::new() }
    }

    pub fn with(mut self, member: Arc<I>) -> Self {
        self.members.push(member);
        self
    }

    pub fn push(&mut self, member: Arc<I>) {
        self.members.push(member);
    }

    pub fn members(&self) -> &[Arc<I>] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<I: ?Sized> Default for Collection<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ?Sized> Clone for Collection<I> {
    fn clone(&self) -> Self {
        Self {
            members: self.members.clone(),
        }
    }
}

impl<I: ?Sized> From<Vec<Arc<I>>> for Collection<I> {
    fn from(members: Vec<Arc<I>>) -> Self {
        Self { members }
    }
}

impl<I: ?Sized> FromIterator<Arc<I>> for Collection<I> {
    fn from_iter<T: IntoIterator<Item = Arc<I>>>(iter: T) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

impl<I: Introspector + ?Sized> Collection<I> {
    pub(crate) async fn introspect_traced(&self, token: &str) -> Traced<'_, Introspection> {
        let mut errs = Vec::new();

        for member in &self.members {
            match member.introspect(token).await {
                // Returned even when inactive: the member understood the token.
                Ok(introspection) => {
                    return Traced {
                        result: Ok(introspection),
                        answered_by: Some(member.name()),
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        introspector = member.name(),
                        token = token_prefix(token),
                        error = %e,
                        "introspector rejected token"
                    );
                    errs.push(e);
                }
            }
        }

        Traced {
            result: Err(IntrospectError::Exhausted(errs)),
            answered_by: None,
        }
    }
}

impl<I: Warden + ?Sized> Collection<I> {
    pub(crate) async fn allowed_traced(
        &self,
        token: &str,
        permission: &Permission,
        scopes: &[String],
    ) -> Traced<'_, (Introspection, bool)> {
        let mut errs = Vec::new();

        for member in &self.members {
            match member.allowed(token, permission, scopes).await {
                Ok((introspection, true)) => {
                    return Traced {
                        result: Ok((introspection, true)),
                        answered_by: Some(member.name()),
                    }
                }
                // A refusal is not final: a later member may grant it.
                Ok((_, false)) => {
                    tracing::debug!(
                        introspector = member.name(),
                        token = token_prefix(token),
                        action = %permission.action,
                        resource = %permission.resource,
                        "permission refused"
                    );
                    errs.push(IntrospectError::NotAllowed {
                        introspector: member.name().to_string(),
                    });
                }
                Err(e) => {
                    tracing::debug!(
                        introspector = member.name(),
                        token = token_prefix(token),
                        error = %e,
                        "introspector rejected token"
                    );
                    errs.push(e);
                }
            }
        }

        Traced {
            result: Err(IntrospectError::Exhausted(errs)),
            answered_by: None,
        }
    }
}

#[async_trait]
impl<I: Introspector + ?Sized> Introspector for Collection<I> {
    async fn introspect(&self, token: &str) -> Result<Introspection, IntrospectError> {
        self.introspect_traced(token).await.result
    }

    fn name(&self) -> &str {
        "collection"
    }
}

#[async_trait]
impl<I: Warden + ?Sized> Warden for Collection<I> {
    async fn allowed(
        &self,
        token: &str,
        permission: &Permission,
        scopes: &[String],
    ) -> Result<(Introspection, bool), IntrospectError> {
        self.allowed_traced(token, permission, scopes).await.result
    }
}

// ── Tests ────────────────────────────────────────────────────
