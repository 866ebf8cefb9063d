//! POP3 implementation of [`RemoteMailbox`].

use std::future::Future;
use std::time::Duration;

use tabmail_pop3::{Client, Pop3Stream, Transaction};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::{FetchedMessage, MessageHeader, RemoteMailbox};
use crate::account::{CredentialContext, Security};
use crate::config::EngineConfig;
use crate::{Error, Result};

/// Stateless POP3 sessions: every call opens, authenticates, operates and
/// quits.
#[derive(Debug, Clone)]
pub struct Pop3Mailbox {
    connect_timeout: Duration,
    io_timeout: Duration,
    operation_timeout: Duration,
}

impl Pop3Mailbox {
    /// Takes the timeouts from `config`.
    #[must_use]
    pub const fn new(config: &EngineConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            io_timeout: config.io_timeout(),
            operation_timeout: config.operation_timeout(),
        }
    }

    fn pop3_config(&self, ctx: &CredentialContext) -> tabmail_pop3::Config {
        let security = match ctx.security() {
            Security::Tls => tabmail_pop3::Security::Implicit,
            Security::StartTls => tabmail_pop3::Security::StlsIfOffered,
            Security::None => tabmail_pop3::Security::None,
        };

        tabmail_pop3::Config::new(ctx.host(), security)
            .with_port(ctx.port())
            .with_timeouts(self.connect_timeout, self.io_timeout)
    }

    /// Connects and logs in. An account asking for STARTTLS is upgraded
    /// when the server offers STLS.
    async fn open(&self, ctx: &CredentialContext) -> Result<Client<Pop3Stream, Transaction>> {
        if !ctx.is_ready() {
            return Err(Error::NotAuthenticated);
        }

        let client = Client::connect(&self.pop3_config(ctx)).await?;
        Ok(client.login(ctx.username(), ctx.secret()).await?)
    }

    /// Bounds a whole session by the operation timeout.
    async fn deadline<T>(&self, session: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = self.operation_timeout;
        tokio::time::timeout(limit, session)
            .await
            .map_err(|_| Error::Transport(format!("operation timed out after {limit:?}")))?
    }
}

impl RemoteMailbox for Pop3Mailbox {
    async fn test_credentials(&self, ctx: &CredentialContext) -> bool {
        let attempt = self.deadline(async {
            let client = self.open(ctx).await?;
            close(client).await;
            Ok(())
        });

        match attempt.await {
            Ok(()) => {
                info!(host = ctx.host(), user = ctx.username(), "credentials accepted");
                true
            }
            Err(e) => {
                warn!(host = ctx.host(), error = %e, "credential test failed");
                false
            }
        }
    }

    async fn list_headers(
        &self,
        ctx: &CredentialContext,
        max_count: usize,
    ) -> Result<Vec<MessageHeader>> {
        if !ctx.is_ready() {
            return Err(Error::NotAuthenticated);
        }
        self.deadline(async {
            let mut client = self.open(ctx).await?;
            let headers = list_newest(&mut client, max_count).await?;
            close(client).await;
            info!(count = headers.len(), "listed headers");
            Ok(headers)
        })
        .await
    }

    async fn fetch_message(&self, ctx: &CredentialContext, index: u32) -> Result<FetchedMessage> {
        if !ctx.is_ready() {
            return Err(Error::NotAuthenticated);
        }
        self.deadline(async {
            let mut client = self.open(ctx).await?;
            let fetched = fetch_one(&mut client, index).await?;
            close(client).await;
            Ok(fetched)
        })
        .await
    }
}

/// Retrieves the newest `min(max_count, N)` messages, newest first.
pub(crate) async fn list_newest<S>(
    client: &mut Client<S, Transaction>,
    max_count: usize,
) -> Result<Vec<MessageHeader>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let count = client.stat().await?.count;
    let take = u32::try_from(max_count).unwrap_or(u32::MAX).min(count);
    debug!(count, take, "selecting newest messages");

    let mut headers = Vec::with_capacity(take as usize);
    for index in ((count - take)..count).rev() {
        let raw = client.retr(index + 1).await?;
        let fetched = FetchedMessage::parse(index, &raw)?;
        headers.push(MessageHeader::from_message(index, &fetched.parsed));
    }
    Ok(headers)
}

/// Retrieves the message at the 0-based `index`.
pub(crate) async fn fetch_one<S>(
    client: &mut Client<S, Transaction>,
    index: u32,
) -> Result<FetchedMessage>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let number = index
        .checked_add(1)
        .ok_or_else(|| Error::Protocol(format!("message index {index} out of range")))?;
    let raw = client.retr(number).await?;
    debug!(index, bytes = raw.len(), "fetched message");
    FetchedMessage::parse(index, &raw)
}

/// Sends QUIT. The operation already succeeded, so a failure is only logged.
async fn close<S>(client: Client<S, Transaction>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = client.quit().await {
        warn!(error = %e, "QUIT failed");
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
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio_test::io::Builder;

    fn message(subject: &str) -> Vec<u8> {
        format!("+OK\r\nFrom: x@example.com\r\nSubject: {subject}\r\n\r\nbody\r\n.\r\n").into_bytes()
    }

    async fn logged_in(mock: tokio_test::io::Mock) -> Client<tokio_test::io::Mock, Transaction> {
        let client = Client::from_stream(mock).await.unwrap();
        client.login("u", "p").await.unwrap()
    }

    fn login_script(builder: &mut Builder) -> &mut Builder {
        builder
            .read(b"+OK ready\r\n")
            .write(b"USER u\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS p\r\n")
            .read(b"+OK\r\n")
    }

    #[tokio::test]
    async fn test_listing_issues_retr_newest_first() {
        let mock = login_script(&mut Builder::new())
            .write(b"STAT\r\n")
            .read(b"+OK 5 1000\r\n")
            .write(b"RETR 5\r\n")
            .read(&message("five"))
            .write(b"RETR 4\r\n")
            .read(&message("four"))
            .write(b"RETR 3\r\n")
            .read(&message("three"))
            .build();

        let mut client = logged_in(mock).await;
        let headers = list_newest(&mut client, 3).await.unwrap();

        let indices: Vec<u32> = headers.iter().map(|h| h.index).collect();
        assert_eq!(indices, vec![4, 3, 2]);
        assert_eq!(headers[0].subject, "five");
        assert_eq!(headers[2].subject, "three");
    }

    #[tokio::test]
    async fn test_listing_smaller_mailbox_than_max() {
        let mock = login_script(&mut Builder::new())
            .write(b"STAT\r\n")
            .read(b"+OK 1 10\r\n")
            .write(b"RETR 1\r\n")
            .read(&message("only"))
            .build();

        let mut client = logged_in(mock).await;
        let headers = list_newest(&mut client, 50).await.unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].index, 0);
    }

    #[tokio::test]
    async fn test_listing_zero_max_count() {
        let mock = login_script(&mut Builder::new())
            .write(b"STAT\r\n")
            .read(b"+OK 3 10\r\n")
            .build();

        let mut client = logged_in(mock).await;
        assert!(list_newest(&mut client, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_failed_retr_fails_listing() {
        let mock = login_script(&mut Builder::new())
            .write(b"STAT\r\n")
            .read(b"+OK 2 10\r\n")
            .write(b"RETR 2\r\n")
            .read(&message("ok"))
            .write(b"RETR 1\r\n")
            .read(b"-ERR message deleted\r\n")
            .build();

        let mut client = logged_in(mock).await;
        let err = list_newest(&mut client, 10).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn test_fetch_uses_one_based_number() {
        let mock = login_script(&mut Builder::new())
            .write(b"RETR 3\r\n")
            .read(&message("third"))
            .build();

        let mut client = logged_in(mock).await;
        let fetched = fetch_one(&mut client, 2).await.unwrap();
        assert_eq!(fetched.content.index, 2);
        assert_eq!(fetched.content.subject, "third");
    }

    #[tokio::test]
    async fn test_fetch_out_of_range() {
        let mock = login_script(&mut Builder::new())
            .write(b"RETR 10\r\n")
            .read(b"-ERR no such message\r\n")
            .build();

        let mut client = logged_in(mock).await;
        let err = fetch_one(&mut client, 9).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(msg) if msg.contains("no such message")));
    }

    #[tokio::test]
    async fn test_unready_context_never_connects() {
        let mailbox = Pop3Mailbox::new(&EngineConfig::default());
        let ctx = CredentialContext::new("mail.example.com", 995, Security::Tls, "", "x");

        assert!(matches!(
            mailbox.list_headers(&ctx, 50).await,
            Err(Error::NotAuthenticated)
        ));
        assert!(matches!(
            mailbox.fetch_message(&ctx, 0).await,
            Err(Error::NotAuthenticated)
        ));
        assert!(!mailbox.test_credentials(&ctx).await);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_false() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mailbox = Pop3Mailbox::new(&EngineConfig::default());
        let ctx = CredentialContext::new("127.0.0.1", port, Security::Tls, "a@example.com", "x");
        assert!(!mailbox.test_credentials(&ctx).await);
    }

    /// Serves one scripted POP3 session on a local socket.
    async fn serve_once(listener: TcpListener, mailbox: Vec<String>) {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut lines = BufReader::new(read).lines();

        write.write_all(b"+OK ready\r\n").await.unwrap();
        while let Some(line) = lines.next_line().await.unwrap() {
            let mut words = line.split_whitespace();
            let reply = match words.next().unwrap_or_default() {
                "CAPA" => "+OK\r\nUSER\r\n.\r\n".to_string(),
                "USER" | "NOOP" => "+OK\r\n".to_string(),
                "PASS" if line == "PASS right" => "+OK\r\n".to_string(),
                "PASS" => "-ERR invalid login\r\n".to_string(),
                "STAT" => format!("+OK {} 0\r\n", mailbox.len()),
                "RETR" => {
                    let n: usize = words.next().unwrap().parse().unwrap();
                    match mailbox.get(n - 1) {
                        Some(m) => format!("+OK\r\n{m}\r\n.\r\n"),
                        None => "-ERR no such message\r\n".to_string(),
                    }
                }
                "QUIT" => {
                    write.write_all(b"+OK bye\r\n").await.unwrap();
                    return;
                }
                _ => "-ERR unknown\r\n".to_string(),
            };
            write.write_all(reply.as_bytes()).await.unwrap();
        }
    }

    fn plain_context(port: u16, secret: &str) -> CredentialContext {
        CredentialContext::new("127.0.0.1", port, Security::None, "u", secret)
    }

    #[tokio::test]
    async fn test_session_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(
            listener,
            vec![
                "Subject: old\r\n\r\na".to_string(),
                "Subject: new\r\n\r\nb".to_string(),
            ],
        ));

        let mailbox = Pop3Mailbox::new(&EngineConfig::default());
        let headers = mailbox
            .list_headers(&plain_context(port, "right"), 50)
            .await
            .unwrap();
        server.await.unwrap();

        let subjects: Vec<&str> = headers.iter().map(|h| h.subject.as_str()).collect();
        assert_eq!(subjects, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_rejected_login_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(listener, Vec::new()));

        let mailbox = Pop3Mailbox::new(&EngineConfig::default());
        let err = mailbox
            .list_headers(&plain_context(port, "wrong"), 50)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Protocol);
        server.abort();
    }

    #[test]
    fn test_account_security_maps_to_session_mode() {
        let mailbox = Pop3Mailbox::new(&EngineConfig::default());
        let mode = |security| {
            let ctx = CredentialContext::new("h", 1110, security, "u", "x");
            let config = mailbox.pop3_config(&ctx);
            assert_eq!(config.port, 1110);
            config.security
        };

        assert_eq!(mode(Security::Tls), tabmail_pop3::Security::Implicit);
        assert_eq!(mode(Security::StartTls), tabmail_pop3::Security::StlsIfOffered);
        assert_eq!(mode(Security::None), tabmail_pop3::Security::None);
    }

    #[tokio::test]
    async fn test_starttls_skipped_when_not_offered() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(listener, Vec::new()));

        let mailbox = Pop3Mailbox::new(&EngineConfig::default());
        let ctx = CredentialContext::new("127.0.0.1", port, Security::StartTls, "u", "right");
        assert!(mailbox.test_credentials(&ctx).await);
        server.await.unwrap();
    }
}
