//! Framed I/O for the POP3 protocol.
//!
//! POP3 responses are a single status line, optionally followed by a
//! multi-line body terminated by a line holding only `.`. Body lines that
//! begin with `.` are byte-stuffed by the server and unstuffed here.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum multi-line body size to prevent memory exhaustion.
const MAX_BODY_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// Framed connection for the POP3 protocol.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(256),
        }
    }

    /// Reads one line, including its terminator.
    ///
    /// Lines normally end in CRLF; a bare LF is accepted too.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            if let Some(pos) = find_lf(buf) {
                line.extend_from_slice(&buf[..=pos]);
                self.reader.consume(pos + 1);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }

        Ok(line)
    }

    /// Reads a multi-line body up to and excluding the `.` terminator line.
    ///
    /// Each returned line keeps its original terminator. Byte-stuffed lines
    /// (`..text`) lose their leading dot.
    pub async fn read_multiline(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();

        loop {
            let line = self.read_line().await?;
            if is_terminator(&line) {
                break;
            }

            let content = if line.starts_with(b"..") {
                &line[1..]
            } else {
                &line[..]
            };

            if body.len() + content.len() > MAX_BODY_SIZE {
                return Err(Error::Protocol(format!(
                    "response body too large (max {MAX_BODY_SIZE} bytes)"
                )));
            }
            body.extend_from_slice(content);
        }

        Ok(body)
    }

    /// Writes a command to the stream.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        Ok(())
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Any buffered, unread data is discarded.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Finds the position of the first LF in a buffer.
fn find_lf(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

fn is_terminator(line: &[u8]) -> bool {
    line == b".\r\n" || line == b".\n"
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

    #[test]
    fn test_find_lf() {
        assert_eq!(find_lf(b"+OK\r\n"), Some(4));
        assert_eq!(find_lf(b"\n"), Some(0));
        assert_eq!(find_lf(b"no newline"), None);
    }

    #[test]
    fn test_is_terminator() {
        assert!(is_terminator(b".\r\n"));
        assert!(is_terminator(b".\n"));
        assert!(!is_terminator(b"..\r\n"));
        assert!(!is_terminator(b". \r\n"));
    }

    #[tokio::test]
    async fn test_read_line_split_across_reads() {
        let mock = Builder::new().read(b"+OK POP3 ").read(b"ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        let line = framed.read_line().await.unwrap();
        assert_eq!(line, b"+OK POP3 ready\r\n");
    }

    #[tokio::test]
    async fn test_read_multiline_unstuffs_dots() {
        let mock = Builder::new()
            .read(b"Subject: dots\r\n\r\n..leading dot\r\n...two\r\nplain\r\n.\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let body = framed.read_multiline().await.unwrap();
        assert_eq!(body, b"Subject: dots\r\n\r\n.leading dot\r\n..two\r\nplain\r\n");
    }

    #[tokio::test]
    async fn test_read_multiline_empty() {
        let mock = Builder::new().read(b".\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert!(framed.read_multiline().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_eof_is_io_error() {
        let mock = Builder::new().read(b"+OK partial").build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_write_command() {
        let mock = Builder::new().write(b"STAT\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_command(b"STAT\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let result = framed.read_line().await;
        assert!(result.unwrap_err().to_string().contains("line too long"));
    }
}
