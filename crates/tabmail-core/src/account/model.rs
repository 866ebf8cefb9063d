//! Account model types.

use serde::{Deserialize, Serialize};

/// Security/encryption mode for the mailbox connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    StartTls,
}

impl Security {
    /// Maps a "use SSL" flag: `true` is implicit TLS, `false` is STARTTLS.
    #[must_use]
    pub const fn from_ssl_flag(use_ssl: bool) -> Self {
        if use_ssl { Self::Tls } else { Self::StartTls }
    }

    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::Tls => "SSL/TLS",
            Self::StartTls => "STARTTLS",
        }
    }
}

/// Connection parameters of the active account.
///
/// Immutable once built. Cloning is cheap enough for per-call snapshots.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialContext {
    host: String,
    port: u16,
    security: Security,
    username: String,
    secret: String,
}

impl CredentialContext {
    /// Creates a context. Nothing is validated here; see
    /// [`CredentialContext::is_ready`].
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        security: Security,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            security,
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Server hostname.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Transport security mode.
    #[must_use]
    pub const fn security(&self) -> Security {
        self.security
    }

    /// Login name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// True when host, username and secret are non-blank and the port is
    /// non-zero.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.host.trim().is_empty()
            && self.port > 0
            && !self.username.trim().is_empty()
            && !self.secret.trim().is_empty()
    }
}

impl std::fmt::Debug for CredentialContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialContext")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A stored account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Store-assigned identifier. Empty until the account is first saved.
    #[serde(default)]
    pub id: String,
    /// Name shown in lists, usually the address.
    #[serde(default)]
    pub display_name: String,
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    #[serde(default)]
    pub security: Security,
    /// Login name.
    pub username: String,
    /// Password.
    pub secret: String,
}

impl AccountInfo {
    /// Creates an unsaved account whose display name is the username.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        security: Security,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        let username = username.into();
        Self {
            id: String::new(),
            display_name: username.clone(),
            host: host.into(),
            port,
            security,
            username,
            secret: secret.into(),
        }
    }

    /// Snapshot of this account's connection parameters.
    #[must_use]
    pub fn to_context(&self) -> CredentialContext {
        CredentialContext::new(
            self.host.clone(),
            self.port,
            self.security,
            self.username.clone(),
            self.secret.clone(),
        )
    }

    /// True if this record describes the same login as `other`
    /// (username and host, ignoring case).
    #[must_use]
    pub fn same_login(&self, other: &Self) -> bool {
        self.username.eq_ignore_ascii_case(&other.username)
            && self.host.eq_ignore_ascii_case(&other.host)
    }
}

impl std::fmt::Debug for AccountInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountInfo")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .finish_non_exhaustive()
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

    fn ready() -> CredentialContext {
        CredentialContext::new("mail.example.com", 995, Security::Tls, "a@example.com", "x")
    }

    #[test]
    fn test_ready_context() {
        assert!(ready().is_ready());
    }

    #[test]
    fn test_unready_contexts() {
        let blank_host = CredentialContext::new("  ", 995, Security::Tls, "a", "x");
        let zero_port = CredentialContext::new("h", 0, Security::Tls, "a", "x");
        let no_user = CredentialContext::new("h", 995, Security::Tls, "", "x");
        let no_secret = CredentialContext::new("h", 995, Security::Tls, "a", " ");

        for ctx in [blank_host, zero_port, no_user, no_secret] {
            assert!(!ctx.is_ready(), "{ctx:?}");
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let ctx = CredentialContext::new("h", 995, Security::Tls, "a", "hunter2");
        assert!(!format!("{ctx:?}").contains("hunter2"));

        let info = AccountInfo::new("h", 995, Security::Tls, "a", "hunter2");
        assert!(!format!("{info:?}").contains("hunter2"));
    }

    #[test]
    fn test_ssl_flag_mapping() {
        assert_eq!(Security::from_ssl_flag(true), Security::Tls);
        assert_eq!(Security::from_ssl_flag(false), Security::StartTls);
    }

    #[test]
    fn test_to_context_round_trips_fields() {
        let info = AccountInfo::new("pop.example.com", 110, Security::StartTls, "bob", "pw");
        let ctx = info.to_context();
        assert_eq!(ctx.host(), "pop.example.com");
        assert_eq!(ctx.port(), 110);
        assert_eq!(ctx.security(), Security::StartTls);
        assert_eq!(ctx.username(), "bob");
        assert_eq!(ctx.secret(), "pw");
        assert_eq!(info.display_name, "bob");
    }

    #[test]
    fn test_same_login_ignores_case() {
        let a = AccountInfo::new("Mail.Example.com", 995, Security::Tls, "Bob@Example.com", "1");
        let b = AccountInfo::new("mail.example.com", 110, Security::None, "bob@example.com", "2");
        assert!(a.same_login(&b));
    }
}
