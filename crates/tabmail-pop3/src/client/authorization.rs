//! Implementation for the AUTHORIZATION state.

use std::marker::PhantomData;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::states::{Authorization, Transaction};
use super::{Client, DEFAULT_IO_TIMEOUT, with_timeout};
use crate::command::Command;
use crate::connection::{Config, FramedStream, Pop3Stream, Security};
use crate::response::{body_lines, greeting_timestamp, parse_status};
use crate::{Error, Result};

impl<S> Client<S, Authorization>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new client from a connected stream.
    ///
    /// Reads the server greeting with the default response timeout.
    pub async fn from_stream(stream: S) -> Result<Self> {
        Self::from_stream_with_timeout(stream, DEFAULT_IO_TIMEOUT).await
    }

    /// Creates a new client from a connected stream, bounding every server
    /// response (including the greeting) by `io_timeout`.
    pub async fn from_stream_with_timeout(stream: S, io_timeout: Duration) -> Result<Self> {
        let mut framed = FramedStream::new(stream);

        let greeting = with_timeout(io_timeout, framed.read_line()).await?;
        let text = parse_status(&greeting).map_err(|e| match e {
            Error::Server(text) => Error::Protocol(format!("server refused connection: {text}")),
            other => other,
        })?;
        debug!(greeting = %text, "POP3 greeting");

        Ok(Self {
            stream: framed,
            capabilities: Vec::new(),
            timestamp: greeting_timestamp(&text),
            io_timeout,
            _state: PhantomData,
        })
    }

    /// Queries server capabilities with CAPA (RFC 2449).
    ///
    /// Servers without CAPA answer `-ERR`; that is reported as an empty
    /// list rather than an error.
    pub async fn capa(&mut self) -> Result<Vec<String>> {
        match self.command_multiline(&Command::Capa).await {
            Ok((_, body)) => {
                self.capabilities = body_lines(&body);
                Ok(self.capabilities.clone())
            }
            Err(Error::Server(_)) => {
                self.capabilities.clear();
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Authenticates with USER/PASS.
    ///
    /// Consumes self and returns a client in the TRANSACTION state. A
    /// rejection of either command is reported as [`Error::Auth`].
    pub async fn login(mut self, username: &str, password: &str) -> Result<Client<S, Transaction>> {
        self.command(&Command::User(username.to_string()))
            .await
            .map_err(into_auth_error)?;
        self.command(&Command::Pass(password.to_string()))
            .await
            .map_err(into_auth_error)?;

        info!(user = username, "POP3 login succeeded");
        Ok(self.transition())
    }
}

impl Client<Pop3Stream, Authorization> {
    /// Connects according to `config` and reads the greeting.
    ///
    /// [`Security::StartTls`] always issues `STLS`. [`Security::StlsIfOffered`]
    /// asks `CAPA` first and stays in plaintext, with a warning, when the
    /// server does not list `STLS`.
    pub async fn connect(config: &Config) -> Result<Self> {
        let stream = Pop3Stream::open(config).await?;
        let mut client = Self::from_stream_with_timeout(stream, config.io_timeout).await?;

        match config.security {
            Security::StartTls => client.stls(&config.host).await,
            Security::StlsIfOffered => {
                client.capa().await?;
                if client.has_capability("STLS") {
                    client.stls(&config.host).await
                } else {
                    warn!(host = %config.host, "server does not offer STLS, continuing in plaintext");
                    Ok(client)
                }
            }
            Security::Implicit | Security::None => Ok(client),
        }
    }

    /// Upgrades the connection to TLS with STLS (RFC 2595).
    ///
    /// Capabilities are cleared because they may change after the upgrade.
    pub async fn stls(mut self, host: &str) -> Result<Self> {
        if self.stream.get_ref().is_tls() {
            return Err(Error::InvalidState("Stream is already TLS".to_string()));
        }

        self.command(&Command::Stls).await?;

        let plain = self.stream.into_inner();
        let tls = with_timeout(self.io_timeout, plain.upgrade_to_tls(host)).await?;
        debug!(host, "STLS upgrade complete");

        Ok(Self {
            stream: FramedStream::new(tls),
            capabilities: Vec::new(),
            timestamp: self.timestamp,
            io_timeout: self.io_timeout,
            _state: PhantomData,
        })
    }
}

fn into_auth_error(err: Error) -> Error {
    match err {
        Error::Server(text) => Error::Auth(text),
        other => other,
    }
}
