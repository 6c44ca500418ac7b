//! Deterministic test double whose token is a JSON grants document:
//!
//! ```text
//! {"subject":"123456","scopes":["profile:cars","car:seats"],"actions":["drive","sell"],
//!  "resources":["car:777"],"context":{"weather":"windy"}}
//! ```
//!
//! Useful to test the presence of checks for both specific scopes and
//! specific permissions.

use async_trait::async_trait;

use crate::errors::{IntrospectError, MockParseError};
use crate::introspector::{Introspector, Warden};
use crate::models::permission::evaluate;
use crate::models::{Grants, Introspection, Permission};

#[derive(Debug, Clone, Copy, Default)]
pub struct WardenMock;

impl WardenMock {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(token: &str) -> Result<Grants, MockParseError> {
        serde_json::from_str(token).map_err(|_| MockParseError::Json)
    }
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
impl Introspector for WardenMock {
    async fn introspect(&self, token: &str) -> Result<Introspection, IntrospectError> {
        Ok(introspection_of(&WardenMock::parse(token)?))
    }

    fn name(&self) -> &str {
        "warden_mock"
    }
}

#[async_trait]
impl Warden for WardenMock {
    async fn allowed(
        &self,
        token: &str,
        permission: &Permission,
        scopes: &[String],
    ) -> Result<(Introspection, bool), IntrospectError> {
        let grants = WardenMock::parse(token)?;
        let introspection = introspection_of(&grants);
        let verdict = evaluate(&introspection, &grants, permission, scopes);
        if let Err(denial) = &verdict {
            tracing::debug!(subject = %grants.subject, %denial, "warden mock denied");
        }
        Ok((introspection, verdict.is_ok()))
    }
}
