//! Integration tests for the POP3 client.
//!
//! These tests use a mock stream to simulate POP3 server responses
//! without requiring a real server connection.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use tabmail_pop3::{Client, Command, Error, ScanListing};

/// Mock stream that returns predefined responses.
struct MockStream {
    /// Responses to return (in order).
    responses: Cursor<Vec<u8>>,
    /// Captured commands sent by the client.
    #[allow(dead_code)]
    sent: Vec<u8>,
}

impl MockStream {
    fn new(responses: &[u8]) -> Self {
        Self {
            responses: Cursor::new(responses.to_vec()),
            sent: Vec::new(),
        }
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.responses.get_ref();
        let pos = usize::try_from(self.responses.position()).unwrap();

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.responses.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn script(lines: &[&str]) -> Vec<u8> {
    lines.concat().into_bytes()
}

#[tokio::test]
async fn test_full_session_newest_first() {
    let responses = script(&[
        "+OK POP3 server ready\r\n",
        "+OK\r\n",
        "+OK logged in\r\n",
        "+OK 3 600\r\n",
        "+OK 200 octets\r\n",
        "Subject: third\r\n\r\nbody three\r\n.\r\n",
        "+OK 200 octets\r\n",
        "Subject: second\r\n\r\n..dotted line\r\n.\r\n",
        "+OK bye\r\n",
    ]);

    let client = Client::from_stream(MockStream::new(&responses))
        .await
        .unwrap();
    let mut client = client.login("user@example.com", "pw").await.unwrap();

    let stat = client.stat().await.unwrap();
    assert_eq!(stat.count, 3);

    let newest = client.retr(3).await.unwrap();
    assert_eq!(newest, b"Subject: third\r\n\r\nbody three\r\n");

    let next = client.retr(2).await.unwrap();
    assert_eq!(next, b"Subject: second\r\n\r\n.dotted line\r\n");

    client.quit().await.unwrap();
}

#[tokio::test]
async fn test_listing_and_partial_retrieval() {
    let responses = script(&[
        "+OK ready\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK 2 messages\r\n1 120\r\n2 200\r\n.\r\n",
        "+OK\r\n1 uid-one\r\n2 uid-two\r\n.\r\n",
        "+OK\r\nSubject: top\r\n\r\nfirst line\r\n.\r\n",
        "+OK\r\n",
        "+OK\r\n",
    ]);

    let mock = MockStream::new(&responses);
    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("bob", "hunter2").await.unwrap();

    let listing = client.list().await.unwrap();
    assert_eq!(
        listing,
        vec![
            ScanListing {
                message: 1,
                size: 120
            },
            ScanListing {
                message: 2,
                size: 200
            },
        ]
    );

    let uids = client.uidl().await.unwrap();
    assert_eq!(uids.len(), 2);
    assert_eq!(uids[1].uid, "uid-two");

    let top = client.top(1, 1).await.unwrap();
    assert!(top.starts_with(b"Subject: top"));

    client.noop().await.unwrap();
    client.rset().await.unwrap();
}

#[tokio::test]
async fn test_single_message_listing() {
    let responses = script(&[
        "+OK ready\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK 2 200\r\n",
        "+OK 2 uid-two\r\n",
        "-ERR no such message, only 2 messages in maildrop\r\n",
    ]);

    let client = Client::from_stream(MockStream::new(&responses))
        .await
        .unwrap();
    let mut client = client.login("bob", "hunter2").await.unwrap();

    let size = client.list_message(2).await.unwrap();
    assert_eq!(
        size,
        ScanListing {
            message: 2,
            size: 200
        }
    );

    let uid = client.uidl_message(2).await.unwrap();
    assert_eq!(uid.message, 2);
    assert_eq!(uid.uid, "uid-two");

    // Rejected locally, nothing is sent
    let err = client.uidl_message(0).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let err = client.list_message(3).await.unwrap_err();
    assert!(matches!(err, Error::Server(_)));
}

#[tokio::test]
async fn test_user_rejected_is_auth_error() {
    let responses = script(&["+OK ready\r\n", "-ERR unknown mailbox\r\n"]);

    let client = Client::from_stream(MockStream::new(&responses))
        .await
        .unwrap();
    let err = client.login("nobody", "pw").await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_connection_dropped_mid_body() {
    let responses = script(&[
        "+OK ready\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK message follows\r\nSubject: cut\r\n",
    ]);

    let client = Client::from_stream(MockStream::new(&responses))
        .await
        .unwrap();
    let mut client = client.login("a", "b").await.unwrap();
    let err = client.retr(1).await.unwrap_err();
    assert!(err.is_transport());
}

#[test]
fn test_command_serialization_matches_wire() {
    assert_eq!(Command::Top { message: 4, lines: 10 }.serialize().unwrap(), b"TOP 4 10\r\n");
    assert_eq!(Command::Uidl(Some(7)).serialize().unwrap(), b"UIDL 7\r\n");
    assert_eq!(Command::Quit.serialize().unwrap(), b"QUIT\r\n");
}
