//! Outbound replies over SMTP submission.
//!
//! Not part of the cache engine: a one-shot send using the active account's
//! host and credentials on the configured submission port.

use std::fmt::Write as _;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, FixedOffset, Local};
use tabmail_mime::Mailbox;
use tabmail_smtp::Client;
use tabmail_smtp::state::Connected;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::account::{CredentialContext, Security};
use crate::config::EngineConfig;
use crate::session::MessageContent;
use crate::{Error, Result};

/// Separator between a reply and the quoted original.
pub const ORIGINAL_SEPARATOR: &str = "----- Original -----";

/// A plain-text message with one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Sender, bare or `Name <addr>`.
    pub from: String,
    /// Recipient, bare or `Name <addr>`.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
}

impl OutgoingMessage {
    /// Creates a new outgoing message.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Builds a reply to `original`, quoting its text body below `body`.
    #[must_use]
    pub fn reply_to(original: &MessageContent, from: impl Into<String>, body: &str) -> Self {
        let subject = if original.subject.to_lowercase().starts_with("re:") {
            original.subject.clone()
        } else {
            format!("Re: {}", original.subject)
        };

        Self {
            from: from.into(),
            to: bracketed_address(&original.from).to_string(),
            subject,
            body: format!("{body}\n\n{ORIGINAL_SEPARATOR}\n{}", original.text_body),
        }
    }

    /// Renders the message as RFC 5322 text dated `date`.
    #[must_use]
    pub fn to_rfc5322(&self, date: DateTime<FixedOffset>) -> String {
        let mut message = String::new();

        let _ = write!(message, "From: {}\r\n", single_line(&self.from));
        let _ = write!(message, "To: {}\r\n", single_line(&self.to));
        let _ = write!(message, "Subject: {}\r\n", encode_header(&single_line(&self.subject)));
        let _ = write!(message, "Date: {}\r\n", date.to_rfc2822());
        message.push_str("MIME-Version: 1.0\r\n");
        message.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        message.push_str("Content-Transfer-Encoding: 8bit\r\n");
        message.push_str("\r\n");
        message.push_str(&self.body);

        message
    }
}

/// Sends `message` through the submission server of `ctx`'s host.
///
/// Uses STARTTLS when the server offers it unless the account is
/// configured without transport security.
///
/// # Errors
///
/// [`Error::NotAuthenticated`] for an unready context; [`Error::Transport`]
/// for connection failures and timeouts; [`Error::Send`] when the server
/// rejects authentication or the message.
pub async fn send_message(
    ctx: &CredentialContext,
    config: &EngineConfig,
    message: &OutgoingMessage,
) -> Result<()> {
    if !ctx.is_ready() {
        return Err(Error::NotAuthenticated);
    }

    let security = match ctx.security() {
        Security::None => tabmail_smtp::Security::None,
        Security::Tls | Security::StartTls => tabmail_smtp::Security::StartTls,
    };
    let smtp_config = tabmail_smtp::Config::builder(ctx.host())
        .port(config.submission_port)
        .security(security)
        .client_hostname(config.client_hostname.clone())
        .connect_timeout(config.connect_timeout())
        .io_timeout(config.io_timeout())
        .build();

    let limit = config.operation_timeout();
    let payload = message.to_rfc5322(Local::now().fixed_offset());
    tokio::time::timeout(limit, submit(&smtp_config, ctx, message, &payload))
        .await
        .map_err(|_| Error::Transport(format!("send timed out after {limit:?}")))?
}

async fn submit(
    smtp_config: &tabmail_smtp::Config,
    ctx: &CredentialContext,
    message: &OutgoingMessage,
    payload: &str,
) -> Result<()> {
    debug!(host = %smtp_config.host, port = smtp_config.port, "connecting for submission");
    let client = Client::connect(smtp_config).await?;
    deliver(client, ctx, message, payload).await
}

/// Authenticates, runs one transaction and quits.
pub(crate) async fn deliver<S>(
    client: Client<S, Connected>,
    ctx: &CredentialContext,
    message: &OutgoingMessage,
    payload: &str,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let from = envelope_address(&message.from);
    let to = envelope_address(&message.to);

    let client = client.authenticate(ctx.username(), ctx.secret()).await?;
    let client = client.send_mail(&from, &[&to], payload.as_bytes()).await?;
    client.quit().await?;

    info!(to = %to, "reply sent");
    Ok(())
}

/// The part inside `<...>`, or the whole string.
fn bracketed_address(from: &str) -> &str {
    from.find('<')
        .and_then(|start| {
            let rest = &from[start + 1..];
            rest.find('>').map(|end| rest[..end].trim())
        })
        .unwrap_or(from)
}

fn envelope_address(value: &str) -> String {
    Mailbox::parse(value).map_or_else(|_| value.trim().to_string(), |mb| mb.address)
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// RFC 2047 B-encoding for non-ASCII header text.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(value))
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
    use tokio_test::io::Builder;

    fn original(from: &str, subject: &str) -> MessageContent {
        MessageContent {
            index: 2,
            subject: subject.to_string(),
            from: from.to_string(),
            date_display: String::new(),
            html_body: String::new(),
            text_body: "Are we still on?".to_string(),
            attachments: Vec::new(),
        }
    }

    fn date() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-03-05T09:07:00+01:00").unwrap()
    }

    #[test]
    fn test_reply_addresses_bracketed_sender() {
        let reply = OutgoingMessage::reply_to(
            &original("Alice Example <alice@example.com>", "Lunch"),
            "me@example.com",
            "Yes.",
        );
        assert_eq!(reply.to, "alice@example.com");
        assert_eq!(reply.subject, "Re: Lunch");
        assert_eq!(
            reply.body,
            "Yes.\n\n----- Original -----\nAre we still on?"
        );
    }

    #[test]
    fn test_reply_keeps_bare_sender_and_existing_prefix() {
        let reply = OutgoingMessage::reply_to(&original("bob@example.com", "RE: Lunch"), "me", "");
        assert_eq!(reply.to, "bob@example.com");
        assert_eq!(reply.subject, "RE: Lunch");
    }

    #[test]
    fn test_render_headers() {
        let message = OutgoingMessage::new("me@example.com", "you@example.com", "Hi\r\nBcc: x", "body");
        let text = message.to_rfc5322(date());

        assert!(text.starts_with("From: me@example.com\r\nTo: you@example.com\r\n"));
        assert!(text.contains("Subject: Hi  Bcc: x\r\n"));
        assert!(text.contains(&format!("Date: {}\r\n", date().to_rfc2822())));
        assert!(text.ends_with("\r\n\r\nbody"));
    }

    #[test]
    fn test_non_ascii_subject_encoded() {
        let message = OutgoingMessage::new("a", "b", "Grüße", "");
        let text = message.to_rfc5322(date());
        assert!(text.contains("Subject: =?utf-8?B?R3LDvMOfZQ==?=\r\n"));
    }

    #[test]
    fn test_envelope_address() {
        assert_eq!(envelope_address("Alice <alice@example.com>"), "alice@example.com");
        assert_eq!(envelope_address(" bob@example.com "), "bob@example.com");
    }

    #[tokio::test]
    async fn test_unready_context_never_connects() {
        let ctx = CredentialContext::new("", 995, Security::Tls, "a", "x");
        let message = OutgoingMessage::new("a", "b", "s", "b");
        assert!(matches!(
            send_message(&ctx, &EngineConfig::default(), &message).await,
            Err(Error::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_deliver_transaction() {
        let ctx = CredentialContext::new("mail.example.com", 995, Security::Tls, "a@example.com", "x");
        let message = OutgoingMessage::new(
            "A <a@example.com>",
            "bob@example.com",
            "Re: Lunch",
            "Yes.\n.\n",
        );
        let payload = message.to_rfc5322(date());
        let stuffed = tabmail_smtp::dot_stuff(payload.as_bytes());

        let mock = Builder::new()
            .read(b"220 smtp.example.com ESMTP\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-smtp.example.com\r\n250 AUTH PLAIN LOGIN\r\n")
            .write(b"AUTH PLAIN AGFAZXhhbXBsZS5jb20AeA==\r\n")
            .read(b"235 2.7.0 Accepted\r\n")
            .write(b"MAIL FROM:<a@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<bob@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(&stuffed)
            .read(b"250 queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();

        let mut client = Client::from_stream(mock).await.unwrap();
        client.ehlo("localhost").await.unwrap();
        deliver(client, &ctx, &message, &payload).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_auth_is_send_error() {
        let ctx = CredentialContext::new("h", 995, Security::Tls, "a@example.com", "x");
        let message = OutgoingMessage::new("a@example.com", "b@example.com", "s", "b");

        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250 AUTH PLAIN\r\n")
            .write(b"AUTH PLAIN AGFAZXhhbXBsZS5jb20AeA==\r\n")
            .read(b"535 5.7.8 Bad credentials\r\n")
            .build();

        let mut client = Client::from_stream(mock).await.unwrap();
        client.ehlo("localhost").await.unwrap();
        let err = deliver(client, &ctx, &message, "x").await.unwrap_err();
        assert!(matches!(err, Error::Send(_)));
    }
}
