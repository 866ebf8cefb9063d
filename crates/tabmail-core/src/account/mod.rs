//! Account management module.
//!
//! Provides the immutable credential context the engine runs against,
//! its validation, and the JSON account store.

mod model;
mod store;
mod validation;

pub use model::{AccountInfo, CredentialContext, Security};
pub use store::AccountStore;
pub use validation::{ValidationError, ValidationResult, validate_context};
