//! POP3 command builder.

use std::fmt;

use crate::{Error, Result};

/// POP3 command (RFC 1939, RFC 2449, RFC 2595).
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// USER name.
    User(String),
    /// PASS secret.
    Pass(String),
    /// CAPA (RFC 2449).
    Capa,
    /// STLS (RFC 2595).
    Stls,
    /// STAT.
    Stat,
    /// LIST, optionally for one message.
    List(Option<u32>),
    /// UIDL, optionally for one message.
    Uidl(Option<u32>),
    /// RETR msg.
    Retr(u32),
    /// TOP msg n.
    Top {
        /// Message number.
        message: u32,
        /// Body lines to return after the headers.
        lines: u32,
    },
    /// NOOP.
    Noop,
    /// RSET.
    Rset,
    /// QUIT.
    Quit,
}

impl Command {
    /// Command keyword, safe to log.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::User(_) => "USER",
            Self::Pass(_) => "PASS",
            Self::Capa => "CAPA",
            Self::Stls => "STLS",
            Self::Stat => "STAT",
            Self::List(_) => "LIST",
            Self::Uidl(_) => "UIDL",
            Self::Retr(_) => "RETR",
            Self::Top { .. } => "TOP",
            Self::Noop => "NOOP",
            Self::Rset => "RSET",
            Self::Quit => "QUIT",
        }
    }

    /// Returns true if the server answers this command with a multi-line body.
    #[must_use]
    pub const fn is_multiline(&self) -> bool {
        matches!(
            self,
            Self::Capa | Self::List(None) | Self::Uidl(None) | Self::Retr(_) | Self::Top { .. }
        )
    }

    /// Serializes the command into a CRLF-terminated line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if an argument is empty or
    /// contains CR or LF.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let line = match self {
            Self::User(name) => format!("USER {}", checked_argument(name)?),
            Self::Pass(secret) => format!("PASS {}", checked_argument(secret)?),
            Self::List(Some(n)) => format!("LIST {n}"),
            Self::Uidl(Some(n)) => format!("UIDL {n}"),
            Self::Retr(n) => format!("RETR {n}"),
            Self::Top { message, lines } => format!("TOP {message} {lines}"),
            other => other.name().to_string(),
        };

        let mut out = line.into_bytes();
        out.extend_from_slice(b"\r\n");
        Ok(out)
    }
}

fn checked_argument(arg: &str) -> Result<&str> {
    if arg.is_empty() {
        return Err(Error::InvalidArgument("empty argument".to_string()));
    }
    if arg.contains(['\r', '\n']) {
        return Err(Error::InvalidArgument(
            "argument contains a line break".to_string(),
        ));
    }
    Ok(arg)
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass(_) => f.write_str("Pass(<redacted>)"),
            Self::User(name) => f.debug_tuple("User").field(name).finish(),
            Self::List(n) => f.debug_tuple("List").field(n).finish(),
            Self::Uidl(n) => f.debug_tuple("Uidl").field(n).finish(),
            Self::Retr(n) => f.debug_tuple("Retr").field(n).finish(),
            Self::Top { message, lines } => f
                .debug_struct("Top")
                .field("message", message)
                .field("lines", lines)
                .finish(),
            other => f.write_str(other.name()),
        }
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
    fn test_serialize() {
        assert_eq!(Command::Stat.serialize().unwrap(), b"STAT\r\n");
        assert_eq!(Command::List(None).serialize().unwrap(), b"LIST\r\n");
        assert_eq!(Command::List(Some(3)).serialize().unwrap(), b"LIST 3\r\n");
        assert_eq!(Command::Retr(12).serialize().unwrap(), b"RETR 12\r\n");
        assert_eq!(
            Command::Top { message: 2, lines: 0 }.serialize().unwrap(),
            b"TOP 2 0\r\n"
        );
        assert_eq!(
            Command::User("a@example.com".into()).serialize().unwrap(),
            b"USER a@example.com\r\n"
        );
    }

    #[test]
    fn test_rejects_line_breaks() {
        let cmd = Command::Pass("secret\r\nDELE 1".into());
        assert!(matches!(cmd.serialize(), Err(Error::InvalidArgument(_))));
        assert!(Command::User(String::new()).serialize().is_err());
    }

    #[test]
    fn test_multiline_classification() {
        assert!(Command::Retr(1).is_multiline());
        assert!(Command::List(None).is_multiline());
        assert!(!Command::List(Some(1)).is_multiline());
        assert!(!Command::Stat.is_multiline());
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", Command::Pass("hunter2".into()));
        assert!(!debug.contains("hunter2"));
    }
}
