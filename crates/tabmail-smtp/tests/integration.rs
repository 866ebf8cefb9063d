//! Integration tests for the SMTP client against a scripted server.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use tabmail_smtp::{AuthMechanism, Client, Error};

/// Mock stream that replays server replies and records client output.
struct MockStream {
    replies: Cursor<Vec<u8>>,
    #[allow(dead_code)]
    sent: Vec<u8>,
}

impl MockStream {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Cursor::new(replies.concat().into_bytes()),
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
        let pos = usize::try_from(self.replies.position()).unwrap();
        let data = self.replies.get_ref();
        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.replies.set_position((pos + to_read) as u64);
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

#[tokio::test]
async fn test_multiline_ehlo_and_two_recipients() {
    let stream = MockStream::new(&[
        "220 mx.example.com ESMTP ready\r\n",
        "250-mx.example.com greets you\r\n250-SIZE 1000000\r\n250-STARTTLS\r\n250 AUTH LOGIN PLAIN\r\n",
        "235 ok\r\n",
        "250 sender ok\r\n",
        "250 rcpt ok\r\n",
        "251 will forward\r\n",
        "354 end with .\r\n",
        "250 queued as ABC\r\n",
        "221 bye\r\n",
    ]);

    let mut client = Client::from_stream(stream).await.unwrap();
    let info = client.ehlo("client.local").await.unwrap();
    assert!(info.supports_starttls());
    assert_eq!(
        info.auth_mechanisms(),
        vec![AuthMechanism::Login, AuthMechanism::Plain]
    );

    let client = client.authenticate("u", "p").await.unwrap();
    let client = client
        .send_mail(
            "u@example.com",
            &["a@example.com", "b@example.org"],
            b"Subject: x\r\n\r\nbody\r\n",
        )
        .await
        .unwrap();
    client.quit().await.unwrap();
}

#[tokio::test]
async fn test_no_recipients_is_rejected_before_io() {
    let stream = MockStream::new(&["220 ready\r\n", "235 ok\r\n"]);
    let client = Client::from_stream(stream).await.unwrap();
    let client = client.auth_plain("u", "p").await.unwrap();

    let err = client
        .send_mail("u@example.com", &[], b"hi")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAddress(_)));
}

#[tokio::test]
async fn test_unsupported_auth_mechanisms() {
    let stream = MockStream::new(&["220 ready\r\n", "250-mx\r\n250 AUTH CRAM-MD5 XOAUTH2\r\n"]);
    let mut client = Client::from_stream(stream).await.unwrap();
    client.ehlo("localhost").await.unwrap();

    let err = client.authenticate("u", "p").await.unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
}

#[tokio::test]
async fn test_transient_data_failure() {
    let stream = MockStream::new(&[
        "220 ready\r\n",
        "235 ok\r\n",
        "250 ok\r\n",
        "250 ok\r\n",
        "354 go\r\n",
        "451 try again later\r\n",
    ]);
    let client = Client::from_stream(stream).await.unwrap();
    let client = client.auth_plain("u", "p").await.unwrap();

    let err = client
        .send_mail("u@example.com", &["a@example.com"], b"x")
        .await
        .unwrap_err();
    assert!(err.is_transient());
}
