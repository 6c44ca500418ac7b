//! Mapping from a raw claim set onto the canonical fields of an
//! [`Introspection`]. Shared by the JWT and OAuth variants.

use serde_json::{Map, Value};

use crate::errors::IntrospectError;
use crate::models::introspection::split_scope;
use crate::models::Introspection;

/// Fill every canonical field present in `claims`. Unknown claims go to
/// `extra`. `active` is left for the caller to decide.
pub fn map_claims(claims: Map<String, Value>) -> Result<Introspection, IntrospectError> {
    let mut i = Introspection::default();

    for (key, value) in claims {
        match key.as_str() {
            "iss" => i.issuer = string_claim(&key, value)?,
            "sub" => i.subject = string_claim(&key, value)?,
            "client_id" => i.client_id = string_claim(&key, value)?,
            "username" => i.username = string_claim(&key, value)?,
            "scope" => i.scope = split_scope(&string_claim(&key, value)?),
            "aud" => {
                i.audience = match &value {
                    Value::String(s) => s.clone(),
                    Value::Array(_) => string_list(&key, &value)?.join(" "),
                    _ => return Err(invalid(&key, "a string or a list of strings")),
                }
            }
            "exp" => i.expires_at = time_claim(&key, &value)?,
            "iat" => i.issued_at = time_claim(&key, &value)?,
            "nbf" => i.not_before = time_claim(&key, &value)?,
            _ => {
                i.extra.insert(key, value);
            }
        }
    }

    Ok(i)
}

pub(crate) fn string_list(key: &str, value: &Value) -> Result<Vec<String>, IntrospectError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid(key, "a list of strings"))?;
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(String::from)
                .ok_or_else(|| invalid(key, "a list of strings"))
        })
        .collect()
}

pub(crate) fn invalid(key: &str, expected: &'static str) -> IntrospectError {
    IntrospectError::InvalidClaim {
        claim: key.to_string(),
        expected,
    }
}

fn string_claim(key: &str, value: Value) -> Result<String, IntrospectError> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(invalid(key, "a string")),
    }
}

// Providers disagree on integer vs float for NumericDate.
fn time_claim(key: &str, value: &Value) -> Result<i64, IntrospectError> {
    value
        .as_f64()
        .map(|v| v as i64)
        .ok_or_else(|| invalid(key, "a number"))
}
