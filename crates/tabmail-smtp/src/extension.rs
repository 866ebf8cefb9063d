//! ESMTP extensions advertised in the EHLO reply (RFC 5321 Section 4.1.1.1).

/// SASL mechanisms this client can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN (RFC 4616).
    Plain,
    /// LOGIN (obsolete, still common on submission servers).
    Login,
}

impl AuthMechanism {
    /// Parses a mechanism name (case-insensitive).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("PLAIN") {
            Some(Self::Plain)
        } else if name.eq_ignore_ascii_case("LOGIN") {
            Some(Self::Login)
        } else {
            None
        }
    }

    /// Name used in the AUTH command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        }
    }
}

/// A single EHLO keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    /// STARTTLS (RFC 3207).
    StartTls,
    /// AUTH with the supported mechanisms this client understands.
    Auth(Vec<AuthMechanism>),
    /// SIZE with optional limit in bytes (RFC 1870).
    Size(Option<u64>),
    /// 8BITMIME (RFC 6152).
    EightBitMime,
    /// PIPELINING (RFC 2920).
    Pipelining,
    /// SMTPUTF8 (RFC 6531).
    SmtpUtf8,
    /// Anything else, kept verbatim.
    Other(String),
}

impl Extension {
    /// Parses one EHLO line after the greeting line.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_ascii_whitespace();
        let keyword = words.next().unwrap_or_default().to_ascii_uppercase();

        match keyword.as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(words.filter_map(AuthMechanism::parse).collect()),
            "SIZE" => Self::Size(words.next().and_then(|n| n.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            _ => Self::Other(line.trim().to_string()),
        }
    }
}

/// What the server told us in its EHLO reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    /// Domain from the first EHLO line.
    pub domain: String,
    /// Advertised extensions.
    pub extensions: Vec<Extension>,
}

impl ServerInfo {
    /// Builds server info from the lines of a 250 EHLO reply.
    #[must_use]
    pub fn from_ehlo_lines(lines: &[String]) -> Self {
        let mut iter = lines.iter();
        let domain = iter
            .next()
            .and_then(|l| l.split_ascii_whitespace().next())
            .unwrap_or_default()
            .to_string();

        Self {
            domain,
            extensions: iter.map(|l| Extension::parse(l)).collect(),
        }
    }

    /// Returns true if STARTTLS was advertised.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.extensions.contains(&Extension::StartTls)
    }

    /// Returns the AUTH mechanisms this client understands, in advertised
    /// order.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .filter_map(|e| match e {
                Extension::Auth(mechs) => Some(mechs.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// Returns true if any AUTH line was advertised.
    #[must_use]
    pub fn advertises_auth(&self) -> bool {
        self.extensions
            .iter()
            .any(|e| matches!(e, Extension::Auth(_)))
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

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_server_info_from_ehlo() {
        let info = ServerInfo::from_ehlo_lines(&lines(&[
            "smtp.example.com Hello client",
            "SIZE 35882577",
            "8BITMIME",
            "STARTTLS",
            "AUTH LOGIN PLAIN XOAUTH2",
            "ENHANCEDSTATUSCODES",
        ]));

        assert_eq!(info.domain, "smtp.example.com");
        assert!(info.supports_starttls());
        assert_eq!(
            info.auth_mechanisms(),
            vec![AuthMechanism::Login, AuthMechanism::Plain]
        );
        assert!(info.extensions.contains(&Extension::Size(Some(35_882_577))));
        assert!(
            info.extensions
                .contains(&Extension::Other("ENHANCEDSTATUSCODES".to_string()))
        );
    }

    #[test]
    fn test_no_extensions() {
        let info = ServerInfo::from_ehlo_lines(&lines(&["mx.local"]));
        assert!(!info.supports_starttls());
        assert!(!info.advertises_auth());
        assert!(info.auth_mechanisms().is_empty());
    }

    #[test]
    fn test_auth_only_unknown_mechanisms() {
        let info = ServerInfo::from_ehlo_lines(&lines(&["mx", "auth cram-md5"]));
        assert!(info.advertises_auth());
        assert!(info.auth_mechanisms().is_empty());
    }
}
