//! Concrete introspector variants.

pub mod claims;
pub mod jwt;
pub mod mock;
pub mod oauth;
pub mod warden_mock;

pub use jwt::{Jwt, SigningMethod};
pub use mock::Mock;
pub use oauth::Oauth;
pub use warden_mock::WardenMock;
