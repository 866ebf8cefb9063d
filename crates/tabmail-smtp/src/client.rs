//! Type-state SMTP submission client.
//!
//! ```text
//! Connected ── authenticate() ──→ Authenticated ── mail_from() ──→ MailTransaction
//!                                       ↑                               │
//!                                       │                          rcpt_to()
//!                                       │                               ▼
//!                                       └────────── data() ─────── RecipientAdded
//! ```

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::connection::{self, Config, Security, SmtpStream};
use crate::extension::{AuthMechanism, ServerInfo};
use crate::reply::{Reply, ReplyCode, parse_reply_line};
use crate::{Error, Result};

/// Default time to wait for any single server reply.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest reply line accepted (RFC 5321 allows 512; servers exceed it).
const MAX_LINE_LENGTH: u64 = 8 * 1024;

/// Session state markers.
pub mod state {
    /// Greeting received, not yet authenticated.
    #[derive(Debug)]
    pub struct Connected;

    /// Authenticated, ready for a mail transaction.
    #[derive(Debug)]
    pub struct Authenticated;

    /// MAIL FROM accepted.
    #[derive(Debug)]
    pub struct MailTransaction;

    /// At least one RCPT TO accepted.
    #[derive(Debug)]
    pub struct RecipientAdded;
}

use state::{Authenticated, Connected, MailTransaction, RecipientAdded};

/// SMTP client connection with type-state.
pub struct Client<S, State> {
    stream: BufReader<S>,
    server_info: ServerInfo,
    io_timeout: Duration,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server_info", &self.server_info)
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns what the last EHLO advertised.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Sends NOOP.
    pub async fn noop(&mut self) -> Result<()> {
        self.send(&Command::Noop).await?.expect(&[ReplyCode::OK])?;
        Ok(())
    }

    /// Sends QUIT and closes the session.
    pub async fn quit(mut self) -> Result<()> {
        self.send(&Command::Quit)
            .await?
            .expect(&[ReplyCode::CLOSING])?;
        Ok(())
    }

    async fn send(&mut self, command: &Command) -> Result<Reply> {
        debug!(command = command.name(), "sending SMTP command");
        let line = command.serialize()?;
        self.write_raw(&line).await?;
        self.read_reply().await
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream.get_mut();
        with_timeout(self.io_timeout, async {
            stream.write_all(bytes).await?;
            stream.flush().await?;
            Ok(())
        })
        .await
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let limit = self.io_timeout;
        with_timeout(limit, read_reply(&mut self.stream)).await
    }

    fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            io_timeout: self.io_timeout,
            _state: PhantomData,
        }
    }
}

impl<S> Client<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a connected stream and reads the 220 greeting.
    pub async fn from_stream(stream: S) -> Result<Self> {
        Self::from_stream_with_timeout(stream, DEFAULT_IO_TIMEOUT).await
    }

    /// Like [`Client::from_stream`], bounding every reply by `io_timeout`.
    pub async fn from_stream_with_timeout(stream: S, io_timeout: Duration) -> Result<Self> {
        let mut client = Self {
            stream: BufReader::new(stream),
            server_info: ServerInfo::default(),
            io_timeout,
            _state: PhantomData,
        };

        let greeting = client
            .read_reply()
            .await?
            .expect(&[ReplyCode::SERVICE_READY])?;
        debug!(greeting = %greeting.message(), "SMTP greeting");
        Ok(client)
    }

    /// Sends EHLO and records the advertised extensions.
    pub async fn ehlo(&mut self, domain: &str) -> Result<&ServerInfo> {
        let reply = self
            .send(&Command::Ehlo(domain.to_string()))
            .await?
            .expect(&[ReplyCode::OK])?;
        self.server_info = ServerInfo::from_ehlo_lines(&reply.lines);
        Ok(&self.server_info)
    }

    /// Authenticates with the best mechanism the server offers.
    ///
    /// PLAIN is preferred. LOGIN is used only when the server advertises it
    /// without PLAIN. A server that advertises no AUTH at all is tried with
    /// PLAIN.
    pub async fn authenticate(
        self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        let mechanisms = self.server_info.auth_mechanisms();
        if mechanisms.contains(&AuthMechanism::Plain) || !self.server_info.advertises_auth() {
            self.auth_plain(username, password).await
        } else if mechanisms.contains(&AuthMechanism::Login) {
            self.auth_login(username, password).await
        } else {
            Err(Error::NotSupported("AUTH PLAIN or LOGIN".to_string()))
        }
    }

    /// Authenticates with AUTH PLAIN (RFC 4616).
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        let initial = STANDARD.encode(format!("\0{username}\0{password}"));
        self.send(&Command::Auth {
            mechanism: AuthMechanism::Plain.as_str().to_string(),
            initial: Some(initial),
        })
        .await?
        .expect(&[ReplyCode::AUTH_SUCCESS])?;

        info!(user = username, "SMTP AUTH PLAIN succeeded");
        Ok(self.transition())
    }

    /// Authenticates with AUTH LOGIN.
    pub async fn auth_login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        self.send(&Command::Auth {
            mechanism: AuthMechanism::Login.as_str().to_string(),
            initial: None,
        })
        .await?
        .expect(&[ReplyCode::AUTH_CONTINUE])?;

        self.send(&Command::AuthResponse(STANDARD.encode(username)))
            .await?
            .expect(&[ReplyCode::AUTH_CONTINUE])?;
        self.send(&Command::AuthResponse(STANDARD.encode(password)))
            .await?
            .expect(&[ReplyCode::AUTH_SUCCESS])?;

        info!(user = username, "SMTP AUTH LOGIN succeeded");
        Ok(self.transition())
    }
}

impl Client<SmtpStream, Connected> {
    /// Connects, reads the greeting, sends EHLO, and upgrades with STARTTLS
    /// when the mode is [`Security::StartTls`] and the server offers it.
    pub async fn connect(config: &Config) -> Result<Self> {
        let stream = connection::connect(config).await?;
        let mut client = Self::from_stream_with_timeout(stream, config.io_timeout).await?;
        let offers_tls = client.ehlo(&config.client_hostname).await?.supports_starttls();

        if config.security != Security::StartTls {
            return Ok(client);
        }
        if !offers_tls {
            warn!(host = %config.host, "server does not offer STARTTLS, continuing in plaintext");
            return Ok(client);
        }

        let mut client = client.starttls(&config.host).await?;
        client.ehlo(&config.client_hostname).await?;
        Ok(client)
    }

    /// Upgrades the connection with STARTTLS (RFC 3207).
    ///
    /// The server forgets everything after the upgrade, so EHLO must be sent
    /// again.
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        if self.stream.get_ref().is_tls() {
            return Err(Error::Protocol("stream is already TLS".to_string()));
        }
        self.send(&Command::StartTls)
            .await?
            .expect(&[ReplyCode::SERVICE_READY])?;

        let plain = self.stream.into_inner();
        let tls = with_timeout(self.io_timeout, plain.upgrade_to_tls(host)).await?;
        debug!(host, "STARTTLS upgrade complete");

        Ok(Self {
            stream: BufReader::new(tls),
            server_info: ServerInfo::default(),
            io_timeout: self.io_timeout,
            _state: PhantomData,
        })
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a transaction with MAIL FROM.
    pub async fn mail_from(mut self, from: &str) -> Result<Client<S, MailTransaction>> {
        self.send(&Command::MailFrom(from.to_string()))
            .await?
            .expect(&[ReplyCode::OK])?;
        Ok(self.transition())
    }

    /// Runs a full transaction: MAIL FROM, one RCPT TO per recipient, DATA.
    pub async fn send_mail(self, from: &str, recipients: &[&str], message: &[u8]) -> Result<Self> {
        let Some((first, rest)) = recipients.split_first() else {
            return Err(Error::InvalidAddress("no recipients".to_string()));
        };

        let mut client = self.mail_from(from).await?.rcpt_to(first).await?;
        for recipient in rest {
            client = client.rcpt_to(recipient).await?;
        }
        client.data(message).await
    }
}

impl<S> Client<S, MailTransaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Adds the first recipient.
    pub async fn rcpt_to(mut self, to: &str) -> Result<Client<S, RecipientAdded>> {
        self.add_recipient(to).await?;
        Ok(self.transition())
    }
}

impl<S> Client<S, RecipientAdded>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Adds another recipient.
    pub async fn rcpt_to(mut self, to: &str) -> Result<Self> {
        self.add_recipient(to).await?;
        Ok(self)
    }

    /// Sends the message with DATA.
    ///
    /// Line endings are normalized to CRLF and lines starting with `.` are
    /// dot-stuffed.
    pub async fn data(mut self, message: &[u8]) -> Result<Client<S, Authenticated>> {
        self.send(&Command::Data)
            .await?
            .expect(&[ReplyCode::START_DATA])?;

        self.write_raw(&dot_stuff(message)).await?;
        let reply = self.read_reply().await?.expect(&[ReplyCode::OK])?;

        info!(bytes = message.len(), reply = %reply.message(), "message accepted");
        Ok(self.transition())
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn add_recipient(&mut self, to: &str) -> Result<()> {
        self.send(&Command::RcptTo(to.to_string()))
            .await?
            .expect(&[ReplyCode::OK, ReplyCode::USER_NOT_LOCAL])?;
        Ok(())
    }
}

/// Encodes a message for DATA: CRLF line endings, dot-stuffing and the
/// terminating `.` line.
#[must_use]
pub fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 16);
    let body = message.strip_suffix(b"\n").unwrap_or(message);

    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}

async fn read_reply<R>(reader: &mut R) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    let mut code = None;
    let mut lines = Vec::new();

    loop {
        let mut buf = Vec::new();
        let n = (&mut *reader)
            .take(MAX_LINE_LENGTH)
            .read_until(b'\n', &mut buf)
            .await?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed while reading reply",
            )));
        }
        if !buf.ends_with(b"\n") {
            return Err(Error::Protocol("reply line too long".to_string()));
        }

        let line = parse_reply_line(&buf)?;
        if code.is_some_and(|c| c != line.code) {
            return Err(Error::Protocol(format!(
                "reply code changed mid-reply: {}",
                line.code
            )));
        }
        code = Some(line.code);
        lines.push(line.text);

        if line.is_last {
            return Ok(Reply {
                code: line.code,
                lines,
            });
        }
    }
}

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

    #[tokio::test]
    async fn test_full_submission() {
        let mock = Builder::new()
            .read(b"220 smtp.example.com ESMTP\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-smtp.example.com\r\n250-8BITMIME\r\n250 AUTH PLAIN LOGIN\r\n")
            .write(b"AUTH PLAIN AGFsaWNlAHNlY3JldA==\r\n")
            .read(b"235 2.7.0 Authentication successful\r\n")
            .write(b"MAIL FROM:<alice@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<bob@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(b"Subject: hi\r\n\r\n..leading dot\r\n.\r\n")
            .read(b"250 queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();

        let mut client = Client::from_stream(mock).await.unwrap();
        let info = client.ehlo("localhost").await.unwrap();
        assert_eq!(info.domain, "smtp.example.com");

        let client = client.authenticate("alice", "secret").await.unwrap();
        let client = client
            .send_mail(
                "alice@example.com",
                &["bob@example.com"],
                b"Subject: hi\n\n.leading dot\n",
            )
            .await
            .unwrap();
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_login_fallback() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-mx\r\n250 AUTH LOGIN\r\n")
            .write(b"AUTH LOGIN\r\n")
            .read(b"334 VXNlcm5hbWU6\r\n")
            .write(b"YWxpY2U=\r\n")
            .read(b"334 UGFzc3dvcmQ6\r\n")
            .write(b"c2VjcmV0\r\n")
            .read(b"235 ok\r\n")
            .build();

        let mut client = Client::from_stream(mock).await.unwrap();
        client.ehlo("localhost").await.unwrap();
        client.authenticate("alice", "secret").await.unwrap();
    }

    #[tokio::test]
    async fn test_auth_rejected() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"AUTH PLAIN AGEAYg==\r\n")
            .read(b"535 5.7.8 credentials invalid\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let err = client.auth_plain("a", "b").await.unwrap_err();
        assert!(matches!(err, Error::SmtpError { code: 535, .. }));
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_recipient_rejected() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"AUTH PLAIN AGEAYg==\r\n")
            .read(b"235 ok\r\n")
            .write(b"MAIL FROM:<a@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<nobody@example.com>\r\n")
            .read(b"550 no such user\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let client = client.auth_plain("a", "b").await.unwrap();
        let err = client
            .send_mail("a@example.com", &["nobody@example.com"], b"hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SmtpError { code: 550, message } if message == "no such user"));
    }

    #[tokio::test]
    async fn test_greeting_refused() {
        let mock = Builder::new().read(b"554 no service\r\n").build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(matches!(err, Error::SmtpError { code: 554, .. }));
    }

    #[tokio::test]
    async fn test_connection_closed_mid_reply() {
        let mock = Builder::new().read(b"220-first line\r\n").build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_timeout() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"NOOP\r\n")
            .wait(Duration::from_secs(30))
            .build();

        let mut client = Client::from_stream_with_timeout(mock, Duration::from_secs(2))
            .await
            .unwrap();
        let err = client.noop().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(2)));
    }

    #[test]
    fn test_dot_stuff() {
        assert_eq!(dot_stuff(b"a\r\n.b\nc"), b"a\r\n..b\r\nc\r\n.\r\n");
        assert_eq!(dot_stuff(b""), b".\r\n");
        assert_eq!(dot_stuff(b".\n"), b"..\r\n.\r\n");
    }
}
