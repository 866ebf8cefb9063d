//! Error types for the engine.

use thiserror::Error;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No ready credential context; no network I/O was attempted.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Connection, TLS negotiation, or timeout failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Authentication rejected, or malformed/unexpected server data.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Outbound submission failed.
    #[error("Send failed: {0}")]
    Send(String),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::NotAuthenticated`].
    NotAuthenticated,
    /// See [`Error::Transport`].
    Transport,
    /// See [`Error::Protocol`].
    Protocol,
    /// Everything else.
    Other,
}

impl Error {
    /// Returns the taxonomy bucket of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthenticated => ErrorKind::NotAuthenticated,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Protocol(_) => ErrorKind::Protocol,
            _ => ErrorKind::Other,
        }
    }

    /// A copy for handing one failure to several waiters.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            Self::NotAuthenticated => Self::NotAuthenticated,
            Self::Transport(msg) => Self::Transport(msg.clone()),
            Self::Protocol(msg) => Self::Protocol(msg.clone()),
            Self::Io(err) => Self::Io(std::io::Error::new(err.kind(), err.to_string())),
            Self::Serde(err) => Self::Protocol(err.to_string()),
            Self::Config(msg) => Self::Config(msg.clone()),
            Self::Send(msg) => Self::Send(msg.clone()),
            Self::AccountNotFound(id) => Self::AccountNotFound(id.clone()),
        }
    }
}

impl From<tabmail_pop3::Error> for Error {
    fn from(err: tabmail_pop3::Error) -> Self {
        if err.is_transport() {
            Self::Transport(err.to_string())
        } else {
            Self::Protocol(err.to_string())
        }
    }
}

impl From<tabmail_mime::Error> for Error {
    fn from(err: tabmail_mime::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<tabmail_smtp::Error> for Error {
    fn from(err: tabmail_smtp::Error) -> Self {
        if err.is_transport() {
            Self::Transport(err.to_string())
        } else {
            Self::Send(err.to_string())
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    use std::time::Duration;

    #[test]
    fn test_pop3_errors_are_classified() {
        let err: Error = tabmail_pop3::Error::Timeout(Duration::from_secs(1)).into();
        assert_eq!(err.kind(), ErrorKind::Transport);

        let err: Error = tabmail_pop3::Error::Auth("bad password".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("bad password"));

        let err: Error = tabmail_pop3::Error::Server("no such message".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_smtp_rejection_is_send_error() {
        let err: Error = tabmail_smtp::Error::smtp_error(550, "no such user").into();
        assert!(matches!(err, Error::Send(_)));
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_duplicate_keeps_kind_and_message() {
        let err = Error::Transport("connection reset".to_string());
        let copy = err.duplicate();
        assert_eq!(copy.kind(), ErrorKind::Transport);
        assert_eq!(copy.to_string(), err.to_string());

        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        let Error::Io(copy) = io.duplicate() else {
            panic!("expected an I/O error");
        };
        assert_eq!(copy.kind(), std::io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_not_authenticated_kind() {
        assert_eq!(Error::NotAuthenticated.kind(), ErrorKind::NotAuthenticated);
    }
}
