//! The introspection capability and its combinators.
//!
//! In a perfect world authentication is handled once, by one standard OAuth
//! provider. In practice a service has to accept tokens from an OAuth server,
//! a couple of differently keyed JWT issuers and the odd legacy mock, all at
//! once. [`Introspector`] hides which one understood a token;
//! [`Collection`] asks each in turn and answers with the first that does.

pub mod cached;
pub mod collection;
pub mod instrumented;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::IntrospectError;
use crate::models::{Introspection, Permission};

pub use cached::Cached;
pub use collection::Collection;
pub use instrumented::MetricsCollection;

/// Retrieves what an access token means.
///
/// Implementations must return `Ok` with `active == false` for tokens that
/// are well formed but expired or revoked, and `Err` only when the token
/// cannot be understood (bad structure, unexpected signing method, backend
/// failure).
#[async_trait]
pub trait Introspector: Send + Sync {
    async fn introspect(&self, token: &str) -> Result<Introspection, IntrospectError>;

    /// Label used in diagnostics and metrics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// An introspector that can also decide whether a token grants a permission.
#[async_trait]
pub trait Warden: Introspector {
    /// Introspect `token`, then check that it is active, carries every scope
    /// in `scopes`, and that its subject may perform `permission`.
    async fn allowed(
        &self,
        token: &str,
        permission: &Permission,
        scopes: &[String],
    ) -> Result<(Introspection, bool), IntrospectError>;
}

#[async_trait]
impl<T: Introspector + ?Sized> Introspector for Arc<T> {
    async fn introspect(&self, token: &str) -> Result<Introspection, IntrospectError> {
        (**self).introspect(token).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: Warden + ?Sized> Warden for Arc<T> {
    async fn allowed(
        &self,
        token: &str,
        permission: &Permission,
        scopes: &[String],
    ) -> Result<(Introspection, bool), IntrospectError> {
        (**self).allowed(token, permission, scopes).await
    }
}

/// First few characters of a token, safe to put in a log line.
pub(crate) fn token_prefix(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_prefix_truncates() {
        assert_eq!(token_prefix("eyJhbGciOiJIUzI1NiJ9.payload"), "eyJhbGci");
        assert_eq!(token_prefix("short"), "short");
        assert_eq!(token_prefix(""), "");
    }
}
