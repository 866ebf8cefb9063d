//! Where and how to reach a POP3 server.

use std::time::Duration;

/// Plain POP3 port (RFC 1939).
pub const POP3_PORT: u16 = 110;

/// POP3 over TLS port (RFC 8314).
pub const POP3S_PORT: u16 = 995;

/// How the session is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plaintext throughout.
    None,
    /// Plaintext greeting, then `STLS` if `CAPA` lists it; otherwise the
    /// session stays in plaintext.
    StlsIfOffered,
    /// Plaintext greeting, then a mandatory `STLS`.
    StartTls,
    /// TLS before the greeting.
    #[default]
    Implicit,
}

impl Security {
    /// The port this mode is normally served on.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Implicit => POP3S_PORT,
            Self::None | Self::StlsIfOffered | Self::StartTls => POP3_PORT,
        }
    }

    /// Whether the TLS handshake precedes the greeting.
    #[must_use]
    pub const fn tls_on_connect(self) -> bool {
        matches!(self, Self::Implicit)
    }
}

/// POP3 connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server hostname, also used for certificate verification.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Session protection.
    pub security: Security,
    /// Bound on TCP connect plus any TLS handshake.
    pub connect_timeout: Duration,
    /// Bound on each server response, the greeting included.
    pub io_timeout: Duration,
}

impl Config {
    /// Settings for `host` on the usual port for `security`, with a 30s
    /// connect and 60s response timeout.
    #[must_use]
    pub fn new(host: impl Into<String>, security: Security) -> Self {
        Self {
            host: host.into(),
            port: security.default_port(),
            security,
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
        }
    }

    /// Uses `port`; zero keeps the current one.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        if port != 0 {
            self.port = port;
        }
        self
    }

    /// Replaces both timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, connect: Duration, io: Duration) -> Self {
        self.connect_timeout = connect;
        self.io_timeout = io;
        self
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

    #[test]
    fn test_port_follows_security() {
        assert_eq!(Config::new("h", Security::Implicit).port, 995);
        assert_eq!(Config::new("h", Security::StlsIfOffered).port, 110);
        assert_eq!(Config::new("h", Security::StartTls).port, 110);
        assert_eq!(Config::new("h", Security::None).port, 110);
    }

    #[test]
    fn test_only_implicit_handshakes_on_connect() {
        assert!(Security::Implicit.tls_on_connect());
        assert!(!Security::StartTls.tls_on_connect());
        assert!(!Security::StlsIfOffered.tls_on_connect());
    }

    #[test]
    fn test_overrides() {
        let config = Config::new("pop.example.com", Security::StartTls)
            .with_port(1110)
            .with_timeouts(Duration::from_secs(5), Duration::from_secs(7));

        assert_eq!(config.port, 1110);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.io_timeout, Duration::from_secs(7));

        let config = config.with_port(0);
        assert_eq!(config.port, 1110);
    }
}
