use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::backends::{Jwt, Mock, Oauth, SigningMethod, WardenMock};
use crate::cache::DEFAULT_TTL_SECS;
use crate::introspector::{Collection, Introspector, Warden};

#[derive(Debug, Clone, Default)]
pub struct JwtConfig {
    /// HMAC shared secret. Takes precedence over `key_path`.
    pub secret: Option<String>,
    /// PEM public key for RSA / ECDSA.
    pub key_path: Option<String>,
    pub method: SigningMethod,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OauthConfig {
    pub endpoint: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub jwt: Option<JwtConfig>,
    pub oauth: Option<OauthConfig>,
    /// Adds the dotted `Mock` double at the end of the chain.
    pub enable_mock: bool,
    /// Enables the Redis tier behind the in-memory cache.
    pub redis_url: Option<String>,
    /// Set via INTROSPECTOR_CACHE_TTL_SECS. Default: 300.
    pub cache_ttl_secs: u64,
    /// Optional `namespace` label on the introspector counter.
    pub metrics_namespace: Option<String>,
    /// Send counters to DogStatsD instead of the Prometheus registry.
    /// Set via INTROSPECTOR_METRICS_SINK=statsd.
    pub statsd: bool,
}

impl Config {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let method = match var("INTROSPECTOR_JWT_METHOD") {
        Some(m) => m.parse::<SigningMethod>().map_err(anyhow::Error::msg)?,
        None => SigningMethod::default(),
    };

    let secret = var("INTROSPECTOR_JWT_SECRET");
    let key_path = var("INTROSPECTOR_JWT_KEY_PATH");
    let jwt = if secret.is_some() || key_path.is_some() {
        Some(JwtConfig {
            secret,
            key_path,
            method,
            issuer: var("INTROSPECTOR_JWT_ISSUER"),
            audience: var("INTROSPECTOR_JWT_AUDIENCE"),
        })
    } else {
        None
    };

    let oauth = var("INTROSPECTOR_OAUTH_ENDPOINT").map(|endpoint| OauthConfig {
        endpoint,
        client_id: var("INTROSPECTOR_OAUTH_CLIENT_ID"),
        client_secret: var("INTROSPECTOR_OAUTH_CLIENT_SECRET"),
        timeout_secs: var("INTROSPECTOR_OAUTH_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::backends::oauth::DEFAULT_TIMEOUT_SECS),
    });

    Ok(Config {
        jwt,
        oauth,
        enable_mock: var("INTROSPECTOR_ENABLE_MOCK")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false),
        redis_url: var("REDIS_URL"),
        cache_ttl_secs: var("INTROSPECTOR_CACHE_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TTL_SECS),
        metrics_namespace: var("INTROSPECTOR_METRICS_NAMESPACE"),
        statsd: var("INTROSPECTOR_METRICS_SINK").is_some_and(|v| v.eq_ignore_ascii_case("statsd")),
    })
}

/// Build the configured JWT variant, if any.
pub fn build_jwt(cfg: &JwtConfig) -> anyhow::Result<Jwt> {
    let mut jwt = match (&cfg.secret, &cfg.key_path) {
        (Some(secret), _) => Jwt::hmac(secret.as_bytes()),
        (None, Some(path)) => {
            let pem = std::fs::read(path).with_context(|| format!("read JWT key {}", path))?;
            match cfg.method {
                SigningMethod::Rsa => Jwt::rsa_pem(&pem).context("parse RSA public key")?,
                SigningMethod::Ecdsa => Jwt::ec_pem(&pem).context("parse ECDSA public key")?,
                SigningMethod::Hmac => Jwt::hmac(&pem),
            }
        }
        (None, None) => anyhow::bail!("JWT configured without INTROSPECTOR_JWT_SECRET or INTROSPECTOR_JWT_KEY_PATH"),
    };
    if let Some(issuer) = &cfg.issuer {
        jwt = jwt.with_issuer(issuer);
    }
    if let Some(audience) = &cfg.audience {
        jwt = jwt.with_audience(audience);
    }
    Ok(jwt)
}

/// Introspection chain in the order JWT, OAuth, Mock.
pub fn build_chain(cfg: &Config) -> anyhow::Result<Collection<dyn Introspector>> {
    let mut chain: Collection<dyn Introspector> = Collection::new();

    if let Some(jwt) = &cfg.jwt {
        chain.push(Arc::new(build_jwt(jwt)?));
    }

    if let Some(oauth) = &cfg.oauth {
        let mut backend = Oauth::new(&oauth.endpoint, Duration::from_secs(oauth.timeout_secs))
            .context("build OAuth HTTP client")?;
        if let (Some(id), Some(secret)) = (&oauth.client_id, &oauth.client_secret) {
            backend = backend.with_credentials(id, secret);
        }
        chain.push(Arc::new(backend));
    }

    if cfg.enable_mock {
        chain.push(Arc::new(Mock::new()));
    }

    if chain.is_empty() {
        tracing::warn!("no introspector configured, every token will be rejected");
    }
    Ok(chain)
}

/// Permission-checking chain: JWT, then the Mock and WardenMock doubles when
/// enabled. The OAuth variant has no grants to check and is left out.
pub fn build_warden_chain(cfg: &Config) -> anyhow::Result<Collection<dyn Warden>> {
    let mut chain: Collection<dyn Warden> = Collection::new();

    if let Some(jwt) = &cfg.jwt {
        chain.push(Arc::new(build_jwt(jwt)?));
    }
    if cfg.enable_mock {
        chain.push(Arc::new(Mock::new()));
        chain.push(Arc::new(WardenMock::new()));
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_order() {
        let cfg = Config {
            jwt: Some(JwtConfig {
                secret: Some("secret".into()),
                ..Default::default()
            }),
            oauth: Some(OauthConfig {
                endpoint: "http://127.0.0.1:1/introspect".into(),
                client_id: None,
                client_secret: None,
                timeout_secs: 1,
            }),
            enable_mock: true,
            ..Default::default()
        };

        let chain = build_chain(&cfg).unwrap();
        let names: Vec<&str> = chain.members().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["jwt", "oauth", "mock"]);
    }

    #[test]
    fn test_warden_chain_skips_oauth() {
        let cfg = Config {
            oauth: Some(OauthConfig {
                endpoint: "http://127.0.0.1:1/introspect".into(),
                client_id: None,
                client_secret: None,
                timeout_secs: 1,
            }),
            enable_mock: true,
            ..Default::default()
        };
        let chain = build_warden_chain(&cfg).unwrap();
        let names: Vec<&str> = chain.members().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["mock", "warden_mock"]);
    }

    #[test]
    fn test_empty_config_builds_empty_chain() {
        let chain = build_chain(&Config::default()).unwrap();
        assert!(chain.is_empty());
    }

    #[test]
    fn test_secret_builds_hmac_jwt() {
        let cfg = JwtConfig {
            secret: Some("secret".into()),
            method: SigningMethod::Rsa,
            ..Default::default()
        };
        let jwt = build_jwt(&cfg).unwrap();
        assert_eq!(jwt.method(), SigningMethod::Hmac, "a shared secret always means HMAC");
    }

    #[test]
    fn test_missing_key_file_is_an_error() {
        let cfg = JwtConfig {
            key_path: Some("/nonexistent/key.pem".into()),
            method: SigningMethod::Rsa,
            ..Default::default()
        };
        assert!(build_jwt(&cfg).is_err());
    }
}
