//! Credential context validation.

use super::model::CredentialContext;

/// Validation error for a credential context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Host is empty.
    EmptyHost,
    /// Port is zero.
    InvalidPort,
    /// Username is empty.
    EmptyUsername,
    /// Secret is empty.
    EmptySecret,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyHost => "Server is required",
            Self::InvalidPort => "Port must be 1-65535",
            Self::EmptyUsername => "Username is required",
            Self::EmptySecret => "Password is required",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyHost => "host",
            Self::InvalidPort => "port",
            Self::EmptyUsername => "username",
            Self::EmptySecret => "secret",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating a context.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate a credential context.
///
/// Returns `Ok(())` exactly when [`CredentialContext::is_ready`] holds.
///
/// # Errors
///
/// Returns every failed check, in field order.
pub fn validate_context(ctx: &CredentialContext) -> ValidationResult {
    let mut errors = Vec::new();

    if ctx.host().trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if ctx.port() == 0 {
        errors.push(ValidationError::InvalidPort);
    }
    if ctx.username().trim().is_empty() {
        errors.push(ValidationError::EmptyUsername);
    }
    if ctx.secret().trim().is_empty() {
        errors.push(ValidationError::EmptySecret);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::account::Security;

    #[test]
    fn test_valid_context() {
        let ctx = CredentialContext::new("h", 995, Security::Tls, "u", "p");
        assert!(validate_context(&ctx).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let ctx = CredentialContext::new("", 0, Security::Tls, "", "");
        let errors = validate_context(&ctx).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyHost,
                ValidationError::InvalidPort,
                ValidationError::EmptyUsername,
                ValidationError::EmptySecret,
            ]
        );
        assert_eq!(errors[1].field(), "port");
        assert_eq!(errors[3].to_string(), "Password is required");
    }

    #[test]
    fn test_agrees_with_is_ready() {
        let ctx = CredentialContext::new("h", 110, Security::None, " ", "p");
        assert_eq!(validate_context(&ctx).is_ok(), ctx.is_ready());
    }
}
