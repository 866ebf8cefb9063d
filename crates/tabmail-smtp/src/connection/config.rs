//! Submission connection configuration.

use std::time::Duration;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption. STARTTLS is never attempted.
    None,
    /// Plaintext, upgraded with STARTTLS when the server advertises it
    /// (port 587).
    #[default]
    StartTls,
    /// TLS from the start (port 465).
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 587,
            Self::Implicit => 465,
        }
    }
}

/// SMTP submission configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Domain sent with EHLO.
    pub client_hostname: String,
    /// Connection timeout (TCP connect plus TLS handshake).
    pub connect_timeout: Duration,
    /// Timeout for each server reply.
    pub io_timeout: Duration,
}

impl Config {
    /// Creates a builder for the given host.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder {
            config: Self {
                host: host.into(),
                port: 0,
                security: Security::default(),
                client_hostname: "localhost".to_string(),
                connect_timeout: Duration::from_secs(30),
                io_timeout: Duration::from_secs(60),
            },
        }
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sets the port. Zero keeps the security mode's default.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.config.security = security;
        self
    }

    /// Sets the EHLO domain.
    #[must_use]
    pub fn client_hostname(mut self, name: impl Into<String>) -> Self {
        self.config.client_hostname = name.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the reply timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(mut self) -> Config {
        if self.config.port == 0 {
            self.config.port = self.config.security.default_port();
        }
        self.config
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
    fn test_defaults() {
        let config = Config::builder("smtp.example.com").build();
        assert_eq!(config.port, 587);
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.client_hostname, "localhost");
    }

    #[test]
    fn test_implicit_port() {
        let config = Config::builder("smtp.example.com")
            .security(Security::Implicit)
            .build();
        assert_eq!(config.port, 465);

        let config = Config::builder("smtp.example.com")
            .security(Security::Implicit)
            .port(2465)
            .client_hostname("laptop.local")
            .build();
        assert_eq!(config.port, 2465);
        assert_eq!(config.client_hostname, "laptop.local");
    }
}
