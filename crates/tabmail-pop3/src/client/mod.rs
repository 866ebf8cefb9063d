//! Type-state POP3 client connection.
//!
//! Uses the type-state pattern to enforce valid state transitions at compile time.
//! The POP3 session states are:
//!
//! - `Authorization`: Initial state after the greeting
//! - `Transaction`: After successful USER/PASS
//!
//! The UPDATE state is entered by `quit()` and ends the connection, so it has
//! no marker type.

#![allow(clippy::missing_errors_doc)]

mod authorization;
mod states;
mod transaction;

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

pub use self::states::{Authorization, Transaction};
use crate::command::Command;
use crate::connection::FramedStream;
use crate::response::parse_status;
use crate::{Error, Result};

/// Default time to wait for any single server response.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

/// POP3 client connection with type-state.
///
/// The type parameter `State` tracks the session state at compile time.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) capabilities: Vec<String>,
    pub(crate) timestamp: Option<String>,
    pub(crate) io_timeout: Duration,
    _state: PhantomData<State>,
}

// Manual Debug implementation since FramedStream doesn't implement Debug
impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("capabilities", &self.capabilities)
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}

/// Shared implementation for all states.
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the capabilities from the last CAPA.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Checks if the server advertised a capability (case-insensitive,
    /// matched on the first word of each CAPA line).
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| {
            c.split_ascii_whitespace()
                .next()
                .is_some_and(|word| word.eq_ignore_ascii_case(name))
        })
    }

    /// APOP timestamp from the greeting, if the server sent one.
    #[must_use]
    pub fn greeting_timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    /// Time allowed for each server response.
    #[must_use]
    pub const fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Sends QUIT and closes the connection.
    ///
    /// From the TRANSACTION state this commits the session (UPDATE state).
    pub async fn quit(mut self) -> Result<()> {
        self.command(&Command::Quit).await?;
        Ok(())
    }

    /// Sends a single-line command and returns the `+OK` text.
    pub(crate) async fn command(&mut self, command: &Command) -> Result<String> {
        debug!(command = command.name(), "sending POP3 command");
        let line = command.serialize()?;
        let limit = self.io_timeout;
        with_timeout(limit, self.stream.write_command(&line)).await?;

        let status = with_timeout(limit, self.stream.read_line()).await?;
        parse_status(&status)
    }

    /// Sends a multi-line command and returns the `+OK` text and the body.
    ///
    /// The body is only read when the status is `+OK`.
    pub(crate) async fn command_multiline(&mut self, command: &Command) -> Result<(String, Vec<u8>)> {
        let text = self.command(command).await?;
        let body = with_timeout(self.io_timeout, self.stream.read_multiline()).await?;
        Ok((text, body))
    }

    /// Moves the connection into another state.
    pub(crate) fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            capabilities: self.capabilities,
            timestamp: self.timestamp,
            io_timeout: self.io_timeout,
            _state: PhantomData,
        }
    }
}

/// Bounds one I/O step, mapping expiry to [`Error::Timeout`].
async fn with_timeout<T>(limit: Duration, step: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, step)
        .await
        .map_err(|_| Error::Timeout(limit))?
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
    use tokio_test::io::Builder;

    const GREETING: &[u8] = b"+OK POP3 ready <1896.697170952@dbc.mtview.ca.us>\r\n";

    #[tokio::test]
    async fn test_greeting_and_capa() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"CAPA\r\n")
            .read(b"+OK Capability list follows\r\nTOP\r\nUIDL\r\nSTLS\r\nSASL PLAIN\r\n.\r\n")
            .build();

        let mut client = Client::from_stream(mock).await.unwrap();
        assert_eq!(
            client.greeting_timestamp(),
            Some("<1896.697170952@dbc.mtview.ca.us>")
        );

        let caps = client.capa().await.unwrap();
        assert_eq!(caps.len(), 4);
        assert!(client.has_capability("stls"));
        assert!(client.has_capability("SASL"));
        assert!(!client.has_capability("PIPELINING"));
    }

    #[tokio::test]
    async fn test_capa_unsupported_is_empty() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"CAPA\r\n")
            .read(b"-ERR unknown command\r\n")
            .build();

        let mut client = Client::from_stream(mock).await.unwrap();
        assert!(client.capa().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_negative_greeting() {
        let mock = Builder::new().read(b"-ERR maildrop busy\r\n").build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(msg) if msg.contains("maildrop busy")));
    }

    #[tokio::test]
    async fn test_login_and_stat() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER alice\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"+OK maildrop locked\r\n")
            .write(b"STAT\r\n")
            .read(b"+OK 5 1200\r\n")
            .write(b"QUIT\r\n")
            .read(b"+OK bye\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let mut client = client.login("alice", "secret").await.unwrap();
        let stat = client.stat().await.unwrap();
        assert_eq!(stat.count, 5);
        assert_eq!(stat.size, 1200);
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER alice\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS wrong\r\n")
            .read(b"-ERR invalid password\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let err = client.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::Auth(text) if text == "invalid password"));
    }

    #[tokio::test]
    async fn test_retr_missing_message_skips_body() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER a\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS b\r\n")
            .read(b"+OK\r\n")
            .write(b"RETR 9\r\n")
            .read(b"-ERR no such message\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let mut client = client.login("a", "b").await.unwrap();
        let err = client.retr(9).await.unwrap_err();
        assert!(matches!(err, Error::Server(_)));
    }

    #[tokio::test]
    async fn test_message_number_zero_rejected_without_io() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER a\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS b\r\n")
            .read(b"+OK\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let mut client = client.login("a", "b").await.unwrap();
        assert!(matches!(
            client.retr(0).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_timeout() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"NOOP\r\n")
            .wait(Duration::from_secs(30))
            .build();

        let client = Client::from_stream_with_timeout(mock, Duration::from_secs(2))
            .await
            .unwrap();
        let mut client: Client<_, Transaction> = client.transition();
        let err = client.noop().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(2)));
    }
}
