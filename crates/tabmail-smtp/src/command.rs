//! SMTP command serialization.

use std::fmt;

use crate::{Error, Result};

/// An SMTP command sent by the client.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO with the client's domain.
    Ehlo(String),
    /// STARTTLS.
    StartTls,
    /// AUTH with a mechanism and optional initial response.
    Auth {
        /// Mechanism name.
        mechanism: String,
        /// Base64 initial response.
        initial: Option<String>,
    },
    /// A bare base64 line answering an AUTH challenge.
    AuthResponse(String),
    /// MAIL FROM.
    MailFrom(String),
    /// RCPT TO.
    RcptTo(String),
    /// DATA.
    Data,
    /// RSET.
    Rset,
    /// NOOP.
    Noop,
    /// QUIT.
    Quit,
}

impl Command {
    /// Short name for logging. Never includes arguments.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ehlo(_) => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } => "AUTH",
            Self::AuthResponse(_) => "AUTH-RESPONSE",
            Self::MailFrom(_) => "MAIL",
            Self::RcptTo(_) => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
        }
    }

    /// Serializes the command to wire format including CRLF.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] for malformed envelope addresses and
    /// [`Error::Protocol`] for arguments that would break framing.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let line = match self {
            Self::Ehlo(domain) => format!("EHLO {}", checked(domain)?),
            Self::StartTls => "STARTTLS".to_string(),
            Self::Auth { mechanism, initial } => match initial {
                Some(initial) => format!("AUTH {} {}", checked(mechanism)?, checked(initial)?),
                None => format!("AUTH {}", checked(mechanism)?),
            },
            Self::AuthResponse(data) => checked_allow_empty(data)?.to_string(),
            Self::MailFrom(address) => format!("MAIL FROM:<{}>", envelope(address)?),
            Self::RcptTo(address) => format!("RCPT TO:<{}>", envelope(address)?),
            Self::Data => "DATA".to_string(),
            Self::Rset => "RSET".to_string(),
            Self::Noop => "NOOP".to_string(),
            Self::Quit => "QUIT".to_string(),
        };

        let mut bytes = line.into_bytes();
        bytes.extend_from_slice(b"\r\n");
        Ok(bytes)
    }
}

// AUTH payloads carry credentials
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth { mechanism, .. } => write!(f, "Auth({mechanism}, <redacted>)"),
            Self::AuthResponse(_) => f.write_str("AuthResponse(<redacted>)"),
            Self::Ehlo(d) => write!(f, "Ehlo({d:?})"),
            Self::MailFrom(a) => write!(f, "MailFrom({a:?})"),
            Self::RcptTo(a) => write!(f, "RcptTo({a:?})"),
            other => f.write_str(other.name()),
        }
    }
}

fn checked(arg: &str) -> Result<&str> {
    if arg.is_empty() {
        return Err(Error::Protocol("empty command argument".to_string()));
    }
    checked_allow_empty(arg)
}

fn checked_allow_empty(arg: &str) -> Result<&str> {
    if arg.contains(['\r', '\n']) {
        return Err(Error::Protocol(
            "command argument contains a line break".to_string(),
        ));
    }
    Ok(arg)
}

/// Validates a forward or reverse path address.
fn envelope(address: &str) -> Result<&str> {
    let address = address.trim();
    let valid = address
        .rsplit_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
        && !address
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>'));

    if valid {
        Ok(address)
    } else {
        Err(Error::InvalidAddress(address.to_string()))
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
    fn test_serialize_envelope() {
        assert_eq!(
            Command::MailFrom("a@example.com".to_string())
                .serialize()
                .unwrap(),
            b"MAIL FROM:<a@example.com>\r\n"
        );
        assert_eq!(
            Command::RcptTo(" b@example.com ".to_string())
                .serialize()
                .unwrap(),
            b"RCPT TO:<b@example.com>\r\n"
        );
    }

    #[test]
    fn test_invalid_addresses_rejected() {
        for bad in ["", "nobody", "@example.com", "a@", "a b@c.d", "<a@b.c>", "a@b\r\nRSET"] {
            assert!(
                matches!(
                    Command::RcptTo(bad.to_string()).serialize(),
                    Err(Error::InvalidAddress(_))
                ),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_serialize_auth() {
        let cmd = Command::Auth {
            mechanism: "PLAIN".to_string(),
            initial: Some("AGEAYg==".to_string()),
        };
        assert_eq!(cmd.serialize().unwrap(), b"AUTH PLAIN AGEAYg==\r\n");
        assert_eq!(
            Command::AuthResponse(String::new()).serialize().unwrap(),
            b"\r\n"
        );
    }

    #[test]
    fn test_crlf_injection_rejected() {
        assert!(Command::Ehlo("host\r\nQUIT".to_string()).serialize().is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let cmd = Command::AuthResponse("c2VjcmV0".to_string());
        assert!(!format!("{cmd:?}").contains("c2VjcmV0"));
        let cmd = Command::Auth {
            mechanism: "PLAIN".to_string(),
            initial: Some("AGEAYg==".to_string()),
        };
        assert!(!format!("{cmd:?}").contains("AGEAYg=="));
    }
}
