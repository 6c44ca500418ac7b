pub mod introspection;
pub mod permission;

pub use introspection::{split_scope, Introspection, ValidityError};
pub use permission::{Denial, Grants, Permission};
