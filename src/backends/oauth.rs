//! RFC 7662 token introspection against a remote endpoint.
//! Uses reqwest-middleware for retries on transient failures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::{Map, Value};

use super::claims::{invalid, map_claims};
use crate::errors::IntrospectError;
use crate::introspector::{token_prefix, Introspector};
use crate::models::Introspection;

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Client credentials for HTTP basic authentication at the endpoint.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Queries an introspection endpoint to obtain info about the given token.
pub struct Oauth {
    endpoint: String,
    client: ClientWithMiddleware,
    credentials: Option<Credentials>,
    token_type_hint: Option<String>,
}

impl Oauth {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let reqwest_client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(2);

        let client = ClientBuilder::new(reqwest_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self::with_client(endpoint, client))
    }

    /// Use a pre-built client, e.g. one that already carries an
    /// authorization middleware.
    pub fn with_client(endpoint: impl Into<String>, client: ClientWithMiddleware) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            credentials: None,
            token_type_hint: None,
        }
    }

    pub fn with_credentials(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        });
        self
    }

    /// Sent as `token_type_hint`, e.g. `access_token`.
    pub fn with_token_type_hint(mut self, hint: impl Into<String>) -> Self {
        self.token_type_hint = Some(hint.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Decode an RFC 7662 response body.
pub fn introspection_from_response(mut body: Map<String, Value>) -> Result<Introspection, IntrospectError> {
    let active = match body.remove("active") {
        Some(Value::Bool(b)) => b,
        Some(_) => return Err(invalid("active", "a boolean")),
        None => false,
    };
    let mut introspection = map_claims(body)?;
    introspection.active = active;
    Ok(introspection)
}

#[async_trait]
impl Introspector for Oauth {
    async fn introspect(&self, token: &str) -> Result<Introspection, IntrospectError> {
        let mut form = vec![("token", token)];
        if let Some(hint) = &self.token_type_hint {
            form.push(("token_type_hint", hint.as_str()));
        }

        let mut req = self.client.post(&self.endpoint).form(&form);
        if let Some(creds) = &self.credentials {
            req = req.basic_auth(&creds.client_id, Some(&creds.client_secret));
        }

        let resp = req.send().await.map_err(|e| {
            tracing::warn!(endpoint = %self.endpoint, token = %token_prefix(token), "introspection request failed after retries: {}", e);
            IntrospectError::Upstream(e.to_string())
        })?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(IntrospectError::Upstream(format!(
                "expected status code 200, got {}: {}",
                status.as_u16(),
                body
            )));
        }

        let body: Map<String, Value> = resp
            .json()
            .await
            .map_err(|e| IntrospectError::Upstream(format!("decode json: {}", e)))?;

        introspection_from_response(body)
    }

    fn name(&self) -> &str {
        "oauth"
    }
}
