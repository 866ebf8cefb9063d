//! SMTP reply parsing.
//!
//! A reply is one or more lines sharing a three-digit code. Every line but
//! the last has a hyphen after the code:
//!
//! ```text
//! 250-mail.example.com
//! 250-STARTTLS
//! 250 AUTH PLAIN LOGIN
//! ```

use std::fmt;

use crate::{Error, Result};

/// Well-known SMTP reply codes (RFC 5321 Section 4.2.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplyCode(pub u16);

impl ReplyCode {
    /// 220 Service ready.
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel.
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication successful (RFC 4954).
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 Requested mail action okay, completed.
    pub const OK: Self = Self(250);
    /// 251 User not local; will forward.
    pub const USER_NOT_LOCAL: Self = Self(251);
    /// 334 Server challenge during AUTH.
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input.
    pub const START_DATA: Self = Self(354);

    /// Returns true for 2xx codes.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true for 3xx codes.
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Returns true for 4xx and 5xx codes.
    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 >= 400 && self.0 < 600
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A complete (possibly multi-line) server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code shared by all lines.
    pub code: ReplyCode,
    /// Text of each line, without the code and separator.
    pub lines: Vec<String>,
}

impl Reply {
    /// Returns all lines joined with a space.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join(" ")
    }

    /// Turns a 4xx/5xx reply into [`Error::SmtpError`], and any other code
    /// that is not `expected` into [`Error::Protocol`].
    pub fn expect(self, expected: &[ReplyCode]) -> Result<Self> {
        if expected.contains(&self.code) {
            return Ok(self);
        }
        if self.code.is_error() {
            return Err(Error::smtp_error(self.code.0, self.message()));
        }
        Err(Error::Protocol(format!(
            "unexpected reply {}: {}",
            self.code,
            self.message()
        )))
    }
}

/// One parsed reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    /// Three-digit code.
    pub code: ReplyCode,
    /// True if this line ends the reply.
    pub is_last: bool,
    /// Text after the separator.
    pub text: String,
}

/// Parses one reply line (with or without its line ending).
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the line does not start with a
/// three-digit code followed by a space, a hyphen, or nothing.
pub fn parse_reply_line(line: &[u8]) -> Result<ReplyLine> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);

    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(Error::Protocol(format!("malformed reply line: {line:?}")));
    }
    let code = line[..3]
        .parse::<u16>()
        .map_err(|_| Error::Protocol(format!("malformed reply code: {line:?}")))?;

    let (is_last, text) = match bytes.get(3) {
        None => (true, ""),
        Some(b' ') => (true, &line[4..]),
        Some(b'-') => (false, &line[4..]),
        Some(_) => return Err(Error::Protocol(format!("malformed reply line: {line:?}"))),
    };

    Ok(ReplyLine {
        code: ReplyCode(code),
        is_last,
        text: text.to_string(),
    })
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
    fn test_parse_single_line() {
        let line = parse_reply_line(b"250 OK\r\n").unwrap();
        assert_eq!(line.code, ReplyCode::OK);
        assert!(line.is_last);
        assert_eq!(line.text, "OK");
    }

    #[test]
    fn test_parse_continuation_line() {
        let line = parse_reply_line(b"250-STARTTLS\r\n").unwrap();
        assert!(!line.is_last);
        assert_eq!(line.text, "STARTTLS");
    }

    #[test]
    fn test_parse_bare_code() {
        let line = parse_reply_line(b"354\r\n").unwrap();
        assert_eq!(line.code, ReplyCode::START_DATA);
        assert!(line.is_last);
        assert!(line.text.is_empty());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_reply_line(b"hello\r\n").is_err());
        assert!(parse_reply_line(b"25\r\n").is_err());
        assert!(parse_reply_line(b"250xOK\r\n").is_err());
    }

    #[test]
    fn test_expect_maps_error_codes() {
        let reply = Reply {
            code: ReplyCode(550),
            lines: vec!["mailbox unavailable".to_string()],
        };
        let err = reply.expect(&[ReplyCode::OK]).unwrap_err();
        assert!(err.is_permanent());

        let reply = Reply {
            code: ReplyCode(334),
            lines: vec![],
        };
        assert!(matches!(
            reply.expect(&[ReplyCode::OK]),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_code_classes() {
        assert!(ReplyCode::OK.is_positive());
        assert!(ReplyCode::START_DATA.is_intermediate());
        assert!(ReplyCode(421).is_error());
        assert!(!ReplyCode::SERVICE_READY.is_error());
    }
}
