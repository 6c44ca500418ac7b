use thiserror::Error;

/// Failure of an introspection or permission check.
///
/// An expired, revoked or otherwise inactive token is never an error: it is
/// reported as `active == false`. These variants mean the backend could not
/// make sense of the token at all, which is what lets a collection fall
/// through to its next member.
#[derive(Debug, Error)]
pub enum IntrospectError {
    #[error("introspect failed: malformed token: {0}")]
    Malformed(String),

    #[error("introspect failed: unexpected signing method: {0}")]
    UnexpectedSigningMethod(String),

    #[error("introspect failed: claims['{claim}'] is not {expected}")]
    InvalidClaim { claim: String, expected: &'static str },

    #[error("introspect failed: claims['{claim}'] is '{actual}', expected '{expected}'")]
    ClaimMismatch {
        claim: String,
        expected: String,
        actual: String,
    },

    #[error("introspect failed: verify token: {0}")]
    Verification(String),

    #[error("introspect failed: upstream: {0}")]
    Upstream(String),

    #[error("cache entry serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("corrupt cache entry at '{key}': {source}")]
    CorruptCacheEntry {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// An error replayed from the cache. Displays the original message verbatim.
    #[error("{0}")]
    Cached(String),

    #[error("not allowed for {introspector}")]
    NotAllowed { introspector: String },

    #[error("{}", format_exhausted(.0))]
    Exhausted(Vec<IntrospectError>),
}

impl IntrospectError {
    /// The per-member errors of an exhausted chain, in chain order.
    pub fn causes(&self) -> &[IntrospectError] {
        match self {
            IntrospectError::Exhausted(errs) => errs,
            _ => &[],
        }
    }
}

fn format_exhausted(errs: &[IntrospectError]) -> String {
    match errs.len() {
        0 => "no introspector configured".to_string(),
        1 => format!("1 error occurred:\n\t* {}", errs[0]),
        n => {
            let lines: Vec<String> = errs.iter().map(|e| format!("\t* {}", e)).collect();
            format!("{} errors occurred:\n{}", n, lines.join("\n"))
        }
    }
}

/// Failure of a cache store backend (connection refused, timeout, ...).
///
/// Distinct from a malformed payload, which surfaces as
/// [`IntrospectError::CorruptCacheEntry`].
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// A test-double token that does not follow its grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MockParseError {
    #[error("the token must be in the form 'subject.scope1,scope2' or 'subject.scopes.actions.resources.key=value', got {0} fields")]
    FieldCount(usize),

    #[error("context pair '{0}' must be in the form key=value")]
    ContextPair(String),

    #[error("the token is malformed, should look like {{\"subject\":\"123456\",\"scopes\":[\"profile:cars\"],\"actions\":[\"drive\"],\"resources\":[\"car:777\"],\"context\":{{\"weather\":\"windy\"}}}}")]
    Json,
}

impl From<MockParseError> for IntrospectError {
    fn from(err: MockParseError) -> Self {
        IntrospectError::Malformed(err.to_string())
    }
}

// ── Tests ────────────────────────────────────────────────────
