//! The byte stream under a POP3 session.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use super::config::Config;
use crate::{Error, Result};

/// Client TLS setup trusting the Mozilla root set, shared by every session.
static CONNECTOR: LazyLock<TlsConnector> = LazyLock::new(|| {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
});

/// A POP3 transport, in plaintext until the TLS handshake.
pub enum Pop3Stream {
    /// Plaintext TCP.
    Plain(TcpStream),
    /// TLS over TCP.
    Tls(Box<TlsStream<TcpStream>>),
}

impl Pop3Stream {
    /// Opens the transport for `config` within its connect timeout.
    ///
    /// With [`Security::Implicit`](super::Security::Implicit) the handshake
    /// happens here; every other mode returns a plaintext stream for the
    /// greeting.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] past the connect timeout, otherwise the socket or
    /// TLS failure.
    pub async fn open(config: &Config) -> Result<Self> {
        let limit = config.connect_timeout;
        let attempt = async {
            debug!(host = %config.host, port = config.port, security = ?config.security, "connecting");
            let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;
            if config.security.tls_on_connect() {
                handshake(tcp, &config.host).await
            } else {
                Ok(Self::Plain(tcp))
            }
        };

        tokio::time::timeout(limit, attempt)
            .await
            .map_err(|_| Error::Timeout(limit))?
    }

    /// Performs the handshake after a server accepted `STLS`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] on a stream that is already TLS, otherwise
    /// the handshake failure.
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => handshake(tcp, host).await,
            Self::Tls(_) => Err(Error::InvalidState("Stream is already TLS".to_string())),
        }
    }

    /// Returns true once the handshake is done.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

async fn handshake(tcp: TcpStream, host: &str) -> Result<Pop3Stream> {
    let server_name = ServerName::try_from(host.to_string())?;
    let tls = CONNECTOR.connect(server_name, tcp).await?;
    Ok(Pop3Stream::Tls(Box::new(tls)))
}

impl AsyncRead for Pop3Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Pop3Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
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
    use crate::connection::Security;
    use std::time::Duration;

    #[tokio::test]
    async fn test_open_plain_for_stls_modes() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        for security in [Security::None, Security::StlsIfOffered, Security::StartTls] {
            let config = Config::new("127.0.0.1", security).with_port(port);
            let stream = Pop3Stream::open(&config).await.unwrap();
            assert!(!stream.is_tls());
        }
    }

    #[tokio::test]
    async fn test_open_refused_is_transport_error() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Config::new("127.0.0.1", Security::None)
            .with_port(port)
            .with_timeouts(Duration::from_secs(5), Duration::from_secs(5));
        let err = Pop3Stream::open(&config).await.err().unwrap();
        assert!(err.is_transport());
    }
}
