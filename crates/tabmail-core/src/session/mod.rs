//! Protocol sessions: one connect, authenticate, operate, disconnect cycle
//! per call.
//!
//! [`RemoteMailbox`] is the seam between the engine and the wire.
//! [`Pop3Mailbox`] is the production implementation.

mod pop3;

use std::future::Future;

use chrono::{DateTime, FixedOffset};
use tabmail_mime::Message;
use tracing::warn;

pub use pop3::Pop3Mailbox;

use crate::Result;
use crate::account::CredentialContext;

/// Subject shown when a message has none.
pub const NO_SUBJECT: &str = "(no subject)";

/// Sender shown when a message has no From mailbox.
pub const UNKNOWN_SENDER: &str = "(unknown)";

/// File name used for attachments without one.
pub const DEFAULT_ATTACHMENT_NAME: &str = "attachment";

/// Display format for message dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A lightweight listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// 0-based server index. Only meaningful within one listing snapshot.
    pub index: u32,
    /// Sender display name, falling back to the address.
    pub sender: String,
    /// Subject, or [`NO_SUBJECT`].
    pub subject: String,
    /// Parsed Date header.
    pub timestamp: Option<DateTime<FixedOffset>>,
    /// Whether any part is an attachment.
    pub has_attachments: bool,
}

impl MessageHeader {
    /// Builds the listing entry for a parsed message.
    #[must_use]
    pub fn from_message(index: u32, message: &Message) -> Self {
        let sender = message
            .from_mailboxes()
            .first()
            .map_or_else(|| UNKNOWN_SENDER.to_string(), |mb| mb.display().to_string());

        Self {
            index,
            sender,
            subject: subject_or_placeholder(message),
            timestamp: message.date(),
            has_attachments: !message.attachments().is_empty(),
        }
    }

    /// Timestamp as `YYYY-MM-DD HH:MM`, or empty.
    #[must_use]
    pub fn date_display(&self) -> String {
        format_date(self.timestamp)
    }
}

/// A decoded attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Advisory file name; may collide with others.
    pub filename: String,
    /// Decoded size in bytes.
    pub size: u64,
    /// Decoded bytes.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Size as `"N KB"` from 1024 bytes up, else `"N B"`.
    #[must_use]
    pub fn size_display(&self) -> String {
        if self.size >= 1024 {
            format!("{} KB", self.size / 1024)
        } else {
            format!("{} B", self.size)
        }
    }
}

/// A fully fetched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent {
    /// 0-based server index.
    pub index: u32,
    /// Subject, or [`NO_SUBJECT`].
    pub subject: String,
    /// Full From rendering (`Name <addr>`), or [`UNKNOWN_SENDER`].
    pub from: String,
    /// Date as `YYYY-MM-DD HH:MM`, or empty.
    pub date_display: String,
    /// HTML body. After the engine processes it, resolvable `cid:`
    /// references point at local assets.
    pub html_body: String,
    /// Plain-text body.
    pub text_body: String,
    /// Attachments in document order.
    pub attachments: Vec<Attachment>,
}

impl MessageContent {
    /// Extracts bodies and attachments from a parsed message.
    ///
    /// The HTML body is returned raw; inline images are materialized later.
    #[must_use]
    pub fn from_message(index: u32, message: &Message) -> Self {
        let from = message
            .from_mailboxes()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        let attachments = message
            .attachments()
            .into_iter()
            .map(|part| {
                let data = part.decode_body().unwrap_or_else(|e| {
                    warn!(index, error = %e, "attachment failed to decode, keeping raw bytes");
                    part.raw_body().to_vec()
                });
                Attachment {
                    filename: part
                        .filename()
                        .unwrap_or_else(|| DEFAULT_ATTACHMENT_NAME.to_string()),
                    size: data.len() as u64,
                    data,
                }
            })
            .collect();

        Self {
            index,
            subject: subject_or_placeholder(message),
            from: if from.is_empty() {
                UNKNOWN_SENDER.to_string()
            } else {
                from
            },
            date_display: format_date(message.date()),
            html_body: message.html_body().unwrap_or_default(),
            text_body: message.text_body().unwrap_or_default(),
            attachments,
        }
    }
}

/// Result of fetching one message: the extracted content plus the part tree
/// the inline asset materializer resolves `cid:` references against.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    /// Extracted content with the raw HTML body.
    pub content: MessageContent,
    /// Parsed message.
    pub parsed: Message,
}

impl FetchedMessage {
    /// Parses raw RFC 5322 bytes fetched for `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Protocol`] if the bytes are not a message.
    pub fn parse(index: u32, raw: &[u8]) -> Result<Self> {
        let parsed = Message::parse(raw)?;
        Ok(Self {
            content: MessageContent::from_message(index, &parsed),
            parsed,
        })
    }
}

/// Remote mailbox operations, each running as its own short-lived session.
pub trait RemoteMailbox: Send + Sync {
    /// Connects and authenticates only. Never fails: any error is `false`.
    fn test_credentials(&self, ctx: &CredentialContext) -> impl Future<Output = bool> + Send;

    /// Lists the newest `min(max_count, N)` messages, newest server index
    /// first.
    ///
    /// # Errors
    ///
    /// [`crate::Error::NotAuthenticated`] without I/O for an unready context;
    /// transport or protocol errors otherwise. One failed message fails the
    /// whole listing.
    fn list_headers(
        &self,
        ctx: &CredentialContext,
        max_count: usize,
    ) -> impl Future<Output = Result<Vec<MessageHeader>>> + Send;

    /// Fetches the message at the 0-based `index`.
    ///
    /// # Errors
    ///
    /// As for [`RemoteMailbox::list_headers`].
    fn fetch_message(
        &self,
        ctx: &CredentialContext,
        index: u32,
    ) -> impl Future<Output = Result<FetchedMessage>> + Send;
}

fn subject_or_placeholder(message: &Message) -> String {
    message
        .subject()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NO_SUBJECT.to_string())
}

fn format_date(date: Option<DateTime<FixedOffset>>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
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

    const MIXED: &[u8] = b"From: \"Alice Example\" <alice@example.com>\r\n\
Subject: Report\r\n\
Date: Tue, 5 Mar 2024 09:07:00 +0100\r\n\
Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
See attached.\r\n\
--b1\r\n\
Content-Type: application/pdf; name=\"report.pdf\"\r\n\
Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0x\r\n\
--b1--\r\n";

    #[test]
    fn test_header_from_message() {
        let message = Message::parse(MIXED).unwrap();
        let header = MessageHeader::from_message(4, &message);

        assert_eq!(header.index, 4);
        assert_eq!(header.sender, "Alice Example");
        assert_eq!(header.subject, "Report");
        assert!(header.has_attachments);
        assert_eq!(header.date_display(), "2024-03-05 09:07");
    }

    #[test]
    fn test_header_placeholders() {
        let message = Message::parse(b"X-Empty: yes\r\n\r\nbody\r\n").unwrap();
        let header = MessageHeader::from_message(0, &message);
        assert_eq!(header.sender, UNKNOWN_SENDER);
        assert_eq!(header.subject, NO_SUBJECT);
        assert!(header.timestamp.is_none());
        assert_eq!(header.date_display(), "");
    }

    #[test]
    fn test_sender_falls_back_to_address() {
        let message = Message::parse(b"From: bob@example.com\r\nSubject:   \r\n\r\nx").unwrap();
        let header = MessageHeader::from_message(0, &message);
        assert_eq!(header.sender, "bob@example.com");
        assert_eq!(header.subject, NO_SUBJECT);
    }

    #[test]
    fn test_content_from_message() {
        let fetched = FetchedMessage::parse(7, MIXED).unwrap();
        let content = &fetched.content;

        assert_eq!(content.index, 7);
        assert_eq!(content.from, "Alice Example <alice@example.com>");
        assert_eq!(content.date_display, "2024-03-05 09:07");
        assert_eq!(content.text_body.trim(), "See attached.");
        assert!(content.html_body.is_empty());
        assert_eq!(content.attachments.len(), 1);
        assert_eq!(content.attachments[0].filename, "report.pdf");
        assert_eq!(content.attachments[0].data, b"%PDF-1");
        assert_eq!(content.attachments[0].size, 6);
    }

    #[test]
    fn test_size_display() {
        let mut attachment = Attachment {
            filename: "a".to_string(),
            size: 1023,
            data: Vec::new(),
        };
        assert_eq!(attachment.size_display(), "1023 B");
        attachment.size = 1024;
        assert_eq!(attachment.size_display(), "1 KB");
        attachment.size = 5000;
        assert_eq!(attachment.size_display(), "4 KB");
    }

    #[test]
    fn test_unparseable_message_is_protocol_error() {
        let err = FetchedMessage::parse(0, b"").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Protocol);
    }
}
