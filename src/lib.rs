//! Provider-agnostic access token introspection.
//!
//! Re-exports the modules used by the binary and by integration tests in `tests/`.

pub mod backends;
pub mod cache;
pub mod config;
pub mod errors;
pub mod introspector;
pub mod metrics;
pub mod models;

pub use errors::IntrospectError;
pub use introspector::{Cached, Collection, Introspector, MetricsCollection, Warden};
pub use models::{Grants, Introspection, Permission, ValidityError};
