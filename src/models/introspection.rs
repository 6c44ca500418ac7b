//! The canonical introspection record, modelled on IETF RFC 7662.
//!
//! Every backend variant produces one of these. It serializes to the RFC 7662
//! JSON shape (`sub`, `exp`, `iat`, ...) with empty fields omitted, which is
//! also the form stored in the cache.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Snapshot of what an access token asserts at evaluation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Introspection {
    /// True only if the token verified and passed the provider's liveness
    /// checks. Does not imply time validity, see [`Introspection::valid`].
    pub active: bool,

    /// Granted scopes. Serialized as a single space-joined string.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_scope",
        deserialize_with = "deserialize_scope"
    )]
    pub scope: Vec<String>,

    /// OAuth 2.0 client that requested the token.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_id: String,

    /// Machine-readable identifier of the resource owner.
    #[serde(rename = "sub", default, skip_serializing_if = "String::is_empty")]
    pub subject: String,

    #[serde(rename = "exp", default, skip_serializing_if = "is_zero")]
    pub expires_at: i64,

    #[serde(rename = "iat", default, skip_serializing_if = "is_zero")]
    pub issued_at: i64,

    #[serde(rename = "nbf", default, skip_serializing_if = "is_zero")]
    pub not_before: i64,

    /// Human-readable identifier of the resource owner.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,

    #[serde(rename = "aud", default, skip_serializing_if = "String::is_empty")]
    pub audience: String,

    #[serde(rename = "iss", default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,

    /// Provider-specific claims not covered above.
    #[serde(rename = "ext", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Why an introspection is not usable right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidityError {
    #[error("token used before issued")]
    IssuedInFuture,

    #[error("token is not valid yet")]
    NotYetValid,

    #[error("token is expired")]
    Expired,

    #[error("token is not active")]
    NotActive,
}

impl Introspection {
    /// An inactive introspection carrying no claims.
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Check temporal validity against the current clock.
    pub fn valid(&self) -> Result<(), ValidityError> {
        self.valid_at(chrono::Utc::now().timestamp())
    }

    /// Check temporal validity against `now` (Unix seconds).
    ///
    /// Checks run in a fixed order and stop at the first failure: issued in
    /// the future, not yet valid, expired, inactive. Zero timestamps are
    /// treated as absent.
    pub fn valid_at(&self, now: i64) -> Result<(), ValidityError> {
        if self.issued_at != 0 && self.issued_at > now {
            return Err(ValidityError::IssuedInFuture);
        }
        if self.not_before != 0 && self.not_before > now {
            return Err(ValidityError::NotYetValid);
        }
        if self.expires_at != 0 && self.expires_at < now {
            return Err(ValidityError::Expired);
        }
        if !self.active {
            return Err(ValidityError::NotActive);
        }
        Ok(())
    }

    /// True if `scope` was granted to this token.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.iter().any(|s| s == scope)
    }

    /// The scope set in its wire form.
    pub fn scope_string(&self) -> String {
        self.scope.join(" ")
    }
}

/// Split a space-joined scope string. Empty segments are dropped, so `""`
/// yields no scopes.
pub fn split_scope(scope: &str) -> Vec<String> {
    scope
        .split(' ')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

fn serialize_scope<S: Serializer>(scope: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&scope.join(" "))
}

fn deserialize_scope<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map(split_scope).unwrap_or_default())
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn live() -> Introspection {
        Introspection {
            active: true,
            issued_at: NOW - 60,
            not_before: NOW - 60,
            expires_at: NOW + 3600,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_live_token() {
        assert_eq!(live().valid_at(NOW), Ok(()));
    }

    #[test]
    fn test_valid_issued_in_future_wins_over_expired() {
        let i = Introspection {
            issued_at: NOW + 100,
            expires_at: NOW - 100,
            ..live()
        };
        assert_eq!(i.valid_at(NOW), Err(ValidityError::IssuedInFuture));
    }

    #[test]
    fn test_valid_not_yet_valid_before_expired() {
        let i = Introspection {
            not_before: NOW + 10,
            expires_at: NOW - 10,
            ..live()
        };
        assert_eq!(i.valid_at(NOW), Err(ValidityError::NotYetValid));
    }

    #[test]
    fn test_valid_expired() {
        let i = Introspection {
            expires_at: NOW - 1,
            ..live()
        };
        assert_eq!(i.valid_at(NOW), Err(ValidityError::Expired));
    }

    #[test]
    fn test_valid_expired_before_inactive() {
        let i = Introspection {
            active: false,
            expires_at: NOW - 1,
            ..live()
        };
        assert_eq!(i.valid_at(NOW), Err(ValidityError::Expired));
    }

    #[test]
    fn test_valid_inactive_but_in_window() {
        let i = Introspection {
            active: false,
            ..live()
        };
        assert_eq!(i.valid_at(NOW), Err(ValidityError::NotActive));
    }

    #[test]
    fn test_valid_zero_timestamps_are_absent() {
        let i = Introspection {
            active: true,
            ..Default::default()
        };
        assert_eq!(i.valid_at(NOW), Ok(()));
    }

    #[test]
    fn test_active_does_not_imply_valid() {
        let i = Introspection {
            active: true,
            expires_at: NOW - 5,
            ..Default::default()
        };
        assert!(i.active);
        assert!(i.valid_at(NOW).is_err());
    }

    #[test]
    fn test_scope_round_trip() {
        let scopes = vec!["users:create".to_string(), "users:modify".to_string(), "admin".to_string()];
        let i = Introspection {
            scope: scopes.clone(),
            ..Default::default()
        };
        let joined = i.scope_string();
        assert_eq!(joined, "users:create users:modify admin");
        assert_eq!(split_scope(&joined), scopes);
    }

    #[test]
    fn test_serialization_omits_empty_fields() {
        let i = Introspection {
            client_id: "1".into(),
            ..Default::default()
        };
        let json = serde_json::to_string(&i).unwrap();
        assert_eq!(json, r#"{"active":false,"client_id":"1"}"#);
    }

    #[test]
    fn test_serialization_uses_rfc7662_names() {
        let mut extra = BTreeMap::new();
        extra.insert("jti".to_string(), serde_json::json!("abc"));
        let i = Introspection {
            active: true,
            scope: vec!["a".into(), "b".into()],
            subject: "user-1".into(),
            expires_at: 10,
            issuer: "api.example.cc".into(),
            extra,
            ..Default::default()
        };

        let value = serde_json::to_value(&i).unwrap();
        assert_eq!(value["scope"], "a b");
        assert_eq!(value["sub"], "user-1");
        assert_eq!(value["exp"], 10);
        assert_eq!(value["iss"], "api.example.cc");
        assert_eq!(value["ext"]["jti"], "abc");

        let back: Introspection = serde_json::from_value(value).unwrap();
        assert_eq!(back, i);
    }

    #[test]
    fn test_deserialize_missing_scope() {
        let i: Introspection = serde_json::from_str(r#"{"active":true}"#).unwrap();
        assert!(i.scope.is_empty());
        assert!(i.active);
    }
}
