//! JWT introspection: signature verification and claim mapping.
//!
//! Workflow for each token:
//! 1. Decode the header and check its `alg` belongs to the configured family
//! 2. Verify the signature (expiry is NOT enforced here)
//! 3. Map the standard claims (RFC 7519 §4.1) onto the canonical fields;
//!    anything else lands in `extra`
//! 4. Set `active` from the token's time window
//!
//! An expired or not-yet-valid token is a successful, inactive introspection.
//! A bad signature, unexpected algorithm or mistyped claim is an error.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use super::claims::{invalid, map_claims, string_list};
use crate::errors::IntrospectError;
use crate::introspector::{Introspector, Warden};
use crate::models::permission::evaluate;
use crate::models::{Grants, Introspection, Permission};

// ── Types ────────────────────────────────────────────────────

/// Family of signing algorithms a [`Jwt`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigningMethod {
    #[default]
    Hmac,
    Rsa,
    Ecdsa,
}

impl SigningMethod {
    pub fn accepts(&self, alg: Algorithm) -> bool {
        match self {
            SigningMethod::Hmac => matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512),
            SigningMethod::Rsa => matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            SigningMethod::Ecdsa => matches!(alg, Algorithm::ES256 | Algorithm::ES384),
        }
    }
}

impl FromStr for SigningMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "" | "HMAC" => Ok(SigningMethod::Hmac),
            "RSA" => Ok(SigningMethod::Rsa),
            "ECDSA" => Ok(SigningMethod::Ecdsa),
            other => Err(format!("unknown signing method '{}', expected HMAC, RSA or ECDSA", other)),
        }
    }
}

/// Extracts info from a token if it manages to verify it.
#[derive(Clone)]
pub struct Jwt {
    key: DecodingKey,
    method: SigningMethod,
    issuer: Option<String>,
    audience: Option<String>,
    name: String,
}

impl Jwt {
    pub fn new(key: DecodingKey, method: SigningMethod) -> Self {
        Self {
            key,
            method,
            issuer: None,
            audience: None,
            name: "jwt".to_string(),
        }
    }

    /// HMAC (HS256/384/512) with a shared secret.
    pub fn hmac(secret: &[u8]) -> Self {
        Self::new(DecodingKey::from_secret(secret), SigningMethod::Hmac)
    }

    /// RSA with a PEM-encoded public key.
    pub fn rsa_pem(pem: &[u8]) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self::new(DecodingKey::from_rsa_pem(pem)?, SigningMethod::Rsa))
    }

    /// ECDSA with a PEM-encoded public key.
    pub fn ec_pem(pem: &[u8]) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self::new(DecodingKey::from_ec_pem(pem)?, SigningMethod::Ecdsa))
    }

    /// Reject tokens whose `iss` differs.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Reject tokens whose `aud` does not include `audience`.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Label used in logs and metrics, e.g. to tell two issuers apart.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn method(&self) -> SigningMethod {
        self.method
    }

    /// Verify the signature and return the raw claims.
    fn verify(&self, token: &str) -> Result<Map<String, Value>, IntrospectError> {
        let header = decode_header(token).map_err(|e| IntrospectError::Malformed(e.to_string()))?;
        if !self.method.accepts(header.alg) {
            return Err(IntrospectError::UnexpectedSigningMethod(format!("{:?}", header.alg)));
        }

        // Time claims are reported through `active`, never as errors.
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Map<String, Value>>(token, &self.key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm | ErrorKind::InvalidKeyFormat => {
                    IntrospectError::Verification(e.to_string())
                }
                _ => IntrospectError::Malformed(e.to_string()),
            }
        })?;
        Ok(data.claims)
    }

    fn check_expected(&self, introspection: &Introspection) -> Result<(), IntrospectError> {
        if let Some(expected) = &self.issuer {
            if &introspection.issuer != expected {
                return Err(IntrospectError::ClaimMismatch {
                    claim: "iss".into(),
                    expected: expected.clone(),
                    actual: introspection.issuer.clone(),
                });
            }
        }
        if let Some(expected) = &self.audience {
            if !introspection.audience.split(' ').any(|a| a == expected) {
                return Err(IntrospectError::ClaimMismatch {
                    claim: "aud".into(),
                    expected: expected.clone(),
                    actual: introspection.audience.clone(),
                });
            }
        }
        Ok(())
    }
}

// ── Claim mapping ────────────────────────────────────────────

/// Build an introspection from verified claims, evaluating the time window
/// against `now`.
pub fn introspection_from_claims(claims: Map<String, Value>, now: i64) -> Result<Introspection, IntrospectError> {
    let mut i = map_claims(claims)?;

    let expired = i.expires_at != 0 && now > i.expires_at;
    let early = (i.issued_at != 0 && i.issued_at > now) || (i.not_before != 0 && i.not_before > now);
    i.active = !expired && !early;

    Ok(i)
}

/// Grants carried by the token itself: its scopes plus the optional
/// `actions`, `resources` and `context` claims.
pub fn grants_from_claims(i: &Introspection) -> Result<Grants, IntrospectError> {
    let actions = match i.extra.get("actions") {
        Some(v) => string_list("actions", v)?,
        None => Vec::new(),
    };
    let resources = match i.extra.get("resources") {
        Some(v) => string_list("resources", v)?,
        None => Vec::new(),
    };
    let context = match i.extra.get("context") {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| {
                v.as_str()
                    .map(|s| (k.clone(), s.to_string()))
                    .ok_or_else(|| invalid("context", "a map of strings"))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?,
        Some(_) => return Err(invalid("context", "a map of strings")),
        None => BTreeMap::new(),
    };

    Ok(Grants {
        subject: i.subject.clone(),
        scopes: i.scope.clone(),
        actions,
        resources,
        context,
    })
}

// ── Capability ───────────────────────────────────────────────

#[async_trait]
impl Introspector for Jwt {
    async fn introspect(&self, token: &str) -> Result<Introspection, IntrospectError> {
        let claims = self.verify(token)?;
        let introspection = introspection_from_claims(claims, chrono::Utc::now().timestamp())?;
        self.check_expected(&introspection)?;
        Ok(introspection)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Warden for Jwt {
    async fn allowed(
        &self,
        token: &str,
        permission: &Permission,
        scopes: &[String],
    ) -> Result<(Introspection, bool), IntrospectError> {
        let introspection = self.introspect(token).await?;
        let grants = grants_from_claims(&introspection)?;
        let verdict = evaluate(&introspection, &grants, permission, scopes);
        if let Err(denial) = &verdict {
            tracing::debug!(introspector = %self.name, subject = %introspection.subject, %denial, "permission denied");
        }
        Ok((introspection, verdict.is_ok()))
    }
}

// ── Tests ────────────────────────────────────────────────────
