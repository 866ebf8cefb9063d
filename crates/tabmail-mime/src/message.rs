//! Message part tree.

use crate::address::Mailbox;
use crate::content_type::{ContentType, parse_parameterized};
use crate::encoding::{decode_base64, decode_charset, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::{Headers, split_header_body};
use chrono::{DateTime, FixedOffset};
use std::fmt;

/// Nesting limit for multipart bodies; deeper parts are kept as leaves.
const MAX_DEPTH: usize = 32;

/// Content-Transfer-Encoding of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// 7-bit ASCII (the default).
    #[default]
    SevenBit,
    /// 8-bit data.
    EightBit,
    /// Binary data.
    Binary,
    /// Quoted-Printable.
    QuotedPrintable,
    /// Base64.
    Base64,
}

impl TransferEncoding {
    /// Parses a Content-Transfer-Encoding value; unknown values are 7bit.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            "quoted-printable" => Self::QuotedPrintable,
            "base64" => Self::Base64,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Binary => "binary",
            Self::QuotedPrintable => "quoted-printable",
            Self::Base64 => "base64",
        })
    }
}

/// Content-Disposition type (RFC 2183).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Display as part of the message.
    Inline,
    /// Separate from the message body. Unrecognized types map here too.
    Attachment,
}

/// One node of a MIME message.
///
/// Leaf parts carry their raw (still transfer-encoded) body; multipart
/// parts carry their children instead.
#[derive(Debug, Clone, Default)]
pub struct Part {
    headers: Headers,
    body: Vec<u8>,
    children: Vec<Part>,
}

impl Part {
    fn parse(raw: &[u8], depth: usize) -> Self {
        let (head, body) = split_header_body(raw);
        let headers = Headers::parse(head);
        let mut part = Self {
            headers,
            body: Vec::new(),
            children: Vec::new(),
        };

        let content_type = part.content_type();
        match content_type.boundary() {
            Some(boundary) if content_type.is_multipart() && depth < MAX_DEPTH => {
                part.children = split_multipart(body, boundary)
                    .into_iter()
                    .map(|child| Self::parse(child, depth + 1))
                    .collect();
            }
            _ => part.body = body.to_vec(),
        }

        part
    }

    /// Part headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Raw body bytes, before transfer decoding. Empty for multipart parts.
    #[must_use]
    pub fn raw_body(&self) -> &[u8] {
        &self.body
    }

    /// Child parts of a multipart part.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Content type, defaulting to `text/plain` when absent or malformed.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.headers
            .get("content-type")
            .and_then(|v| ContentType::parse(v).ok())
            .unwrap_or_default()
    }

    /// Returns true for `multipart/*` parts.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        !self.children.is_empty() || self.content_type().is_multipart()
    }

    /// Content-Transfer-Encoding of this part.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map(TransferEncoding::parse)
            .unwrap_or_default()
    }

    /// Decodes the body according to its transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if a Base64 body is malformed.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&self.body),
            TransferEncoding::QuotedPrintable => Ok(decode_quoted_printable(&self.body)),
            _ => Ok(self.body.clone()),
        }
    }

    /// Decoded body converted to UTF-8 using the part's charset.
    ///
    /// A body that fails transfer decoding is converted as-is.
    #[must_use]
    pub fn body_text(&self) -> String {
        let bytes = self.decode_body().unwrap_or_else(|_| self.body.clone());
        decode_charset(&bytes, self.content_type().charset())
    }

    /// Content-ID with angle brackets and whitespace removed.
    #[must_use]
    pub fn content_id(&self) -> Option<String> {
        self.headers
            .get("content-id")
            .map(normalize_content_id)
            .filter(|id| !id.is_empty())
    }

    /// Content-Disposition type, if the header is present.
    #[must_use]
    pub fn disposition(&self) -> Option<Disposition> {
        let value = self.headers.get("content-disposition")?;
        let (kind, _) = parse_parameterized(value);
        if kind.eq_ignore_ascii_case("inline") {
            Some(Disposition::Inline)
        } else {
            Some(Disposition::Attachment)
        }
    }

    /// File name from the Content-Disposition `filename` parameter, falling
    /// back to the Content-Type `name` parameter.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        let from_disposition = self
            .headers
            .get("content-disposition")
            .and_then(|v| parse_parameterized(v).1.remove("filename"));

        from_disposition
            .or_else(|| self.content_type().name().map(ToString::to_string))
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
    }

    /// Whether this part is an attachment rather than body content.
    ///
    /// An explicit `attachment` disposition always wins. Text and multipart
    /// parts are otherwise body content. Inline parts are attachments only
    /// when they carry a file name and no Content-ID. Parts without a
    /// disposition are attachments unless they are referenced by Content-ID.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        if self.is_multipart() {
            return false;
        }
        let disposition = self.disposition();
        if disposition == Some(Disposition::Attachment) {
            return true;
        }
        if self.content_type().is_text() {
            return false;
        }
        match disposition {
            Some(_) => self.content_id().is_none() && self.filename().is_some(),
            None => self.content_id().is_none(),
        }
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Self>) {
        if self.children.is_empty() {
            out.push(self);
        } else {
            for child in &self.children {
                child.collect_leaves(out);
            }
        }
    }
}

/// A parsed message: the root part plus convenience accessors.
#[derive(Debug, Clone)]
pub struct Message {
    root: Part,
}

impl Message {
    /// Parses raw RFC 5322 message bytes.
    ///
    /// Parsing is lenient: malformed headers are skipped and malformed
    /// content types fall back to `text/plain`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHeaders`] if the input is empty or contains
    /// no header fields at all.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let root = Part::parse(raw, 0);
        if root.headers.is_empty() {
            return Err(Error::MissingHeaders);
        }
        Ok(Self { root })
    }

    /// The root part.
    #[must_use]
    pub const fn root(&self) -> &Part {
        &self.root
    }

    /// Top-level headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// Decoded Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.root.headers.get_decoded("subject")
    }

    /// Mailboxes in the From header.
    #[must_use]
    pub fn from_mailboxes(&self) -> Vec<Mailbox> {
        self.root
            .headers
            .get("from")
            .map(Mailbox::parse_list)
            .unwrap_or_default()
    }

    /// Mailboxes in the To header.
    #[must_use]
    pub fn to_mailboxes(&self) -> Vec<Mailbox> {
        self.root
            .headers
            .get("to")
            .map(Mailbox::parse_list)
            .unwrap_or_default()
    }

    /// Parsed Date header.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.root.headers.get("date").and_then(parse_date)
    }

    /// First `text/html` body part, depth-first, as UTF-8.
    #[must_use]
    pub fn html_body(&self) -> Option<String> {
        self.first_body("html")
    }

    /// First `text/plain` body part, depth-first, as UTF-8.
    #[must_use]
    pub fn text_body(&self) -> Option<String> {
        self.first_body("plain")
    }

    fn first_body(&self, sub_type: &str) -> Option<String> {
        self.body_parts()
            .into_iter()
            .find(|p| !p.is_attachment() && p.content_type().is("text", sub_type))
            .map(Part::body_text)
    }

    /// All leaf parts in document order.
    #[must_use]
    pub fn body_parts(&self) -> Vec<&Part> {
        let mut out = Vec::new();
        self.root.collect_leaves(&mut out);
        out
    }

    /// Leaf parts that are attachments, in document order.
    #[must_use]
    pub fn attachments(&self) -> Vec<&Part> {
        self.body_parts()
            .into_iter()
            .filter(|p| p.is_attachment())
            .collect()
    }

    /// Finds the leaf part whose Content-ID matches `cid`, ignoring case
    /// and angle brackets.
    #[must_use]
    pub fn find_by_content_id(&self, cid: &str) -> Option<&Part> {
        let wanted = normalize_content_id(cid);
        if wanted.is_empty() {
            return None;
        }
        self.body_parts()
            .into_iter()
            .find(|p| p.content_id().is_some_and(|id| id.eq_ignore_ascii_case(&wanted)))
    }
}

fn normalize_content_id(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_string()
}

/// Parses an RFC 2822 date, tolerating trailing comments like `(UTC)`.
fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let cleaned = value.split('(').next().unwrap_or(value).trim();
    DateTime::parse_from_rfc2822(cleaned).ok()
}

/// Splits a multipart body into its raw child parts.
///
/// The preamble and epilogue are discarded. The line break before each
/// delimiter belongs to the delimiter. A body with no closing delimiter
/// keeps whatever follows the last opening delimiter.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i);
        let line = trim_line_end(&body[pos..line_end]);

        if let Some(rest) = line.strip_prefix(delimiter) {
            let closing = rest.starts_with(b"--");
            if closing || rest.iter().all(u8::is_ascii_whitespace) {
                if let Some(start) = current.take() {
                    parts.push(&body[start..strip_trailing_newline(body, start, pos)]);
                }
                if closing {
                    return parts;
                }
                current = Some((line_end + 1).min(body.len()));
            }
        }

        pos = line_end + 1;
    }

    if let Some(start) = current {
        parts.push(&body[start..]);
    }
    parts
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &line[..end]
}

fn strip_trailing_newline(body: &[u8], start: usize, mut end: usize) -> usize {
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
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
    use chrono::{Datelike, Timelike};

    const RELATED: &str = concat!(
        "From: \"Alice Example\" <alice@example.com>\r\n",
        "To: bob@example.com\r\n",
        "Subject: =?utf-8?Q?Quarterly_r=C3=A9port?=\r\n",
        "Date: Tue, 12 Mar 2024 09:30:00 +0100 (CET)\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
        "\r\n",
        "This is the preamble.\r\n",
        "--outer\r\n",
        "Content-Type: multipart/related; boundary=inner\r\n",
        "\r\n",
        "--inner\r\n",
        "Content-Type: multipart/alternative; boundary=\"alt\"\r\n",
        "\r\n",
        "--alt\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "Content-Transfer-Encoding: quoted-printable\r\n",
        "\r\n",
        "Hello Bob, caf=C3=A9 time.\r\n",
        "--alt\r\n",
        "Content-Type: text/html; charset=utf-8\r\n",
        "\r\n",
        "<p>Hello <img src=\"cid:logo@example.com\"></p>\r\n",
        "--alt--\r\n",
        "--inner\r\n",
        "Content-Type: image/png\r\n",
        "Content-ID: <Logo@Example.com>\r\n",
        "Content-Disposition: inline; filename=\"logo.png\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "iVBORw0K\r\n",
        "--inner--\r\n",
        "--outer\r\n",
        "Content-Type: application/pdf; name=\"report.pdf\"\r\n",
        "Content-Disposition: attachment\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "JVBERi0x\r\n",
        "--outer--\r\n",
        "epilogue\r\n",
    );

    #[test]
    fn test_parse_simple_message() {
        let raw = b"From: alice@example.com\r\nSubject: Hi\r\n\r\nHello there\r\n";
        let message = Message::parse(raw).unwrap();

        assert_eq!(message.subject().as_deref(), Some("Hi"));
        assert_eq!(message.text_body().as_deref(), Some("Hello there\r\n"));
        assert!(message.html_body().is_none());
        assert!(message.attachments().is_empty());
        assert_eq!(message.body_parts().len(), 1);
    }

    #[test]
    fn test_parse_empty_fails() {
        assert!(matches!(Message::parse(b""), Err(Error::MissingHeaders)));
        assert!(matches!(Message::parse(b"\r\nno headers"), Err(Error::MissingHeaders)));
    }

    #[test]
    fn test_nested_multipart_tree() {
        let message = Message::parse(RELATED.as_bytes()).unwrap();

        let root = message.root();
        assert!(root.is_multipart());
        assert_eq!(root.children().len(), 2);
        assert_eq!(root.children()[0].children().len(), 2);
        assert_eq!(message.body_parts().len(), 4);

        assert_eq!(message.subject().as_deref(), Some("Quarterly réport"));
        assert_eq!(message.text_body().as_deref(), Some("Hello Bob, café time."));
        assert_eq!(
            message.html_body().as_deref(),
            Some("<p>Hello <img src=\"cid:logo@example.com\"></p>")
        );
    }

    #[test]
    fn test_attachments_and_inline_images() {
        let message = Message::parse(RELATED.as_bytes()).unwrap();

        let attachments = message.attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename().as_deref(), Some("report.pdf"));
        assert_eq!(attachments[0].decode_body().unwrap(), b"%PDF-1");

        let logo = message.find_by_content_id("<logo@example.com>").unwrap();
        assert!(!logo.is_attachment());
        assert_eq!(logo.content_id().as_deref(), Some("Logo@Example.com"));
        assert_eq!(logo.content_type().sub_type, "png");
        assert_eq!(logo.disposition(), Some(Disposition::Inline));
        assert!(message.find_by_content_id("missing@example.com").is_none());
        assert!(message.find_by_content_id("  ").is_none());
    }

    #[test]
    fn test_from_and_date() {
        let message = Message::parse(RELATED.as_bytes()).unwrap();

        let from = message.from_mailboxes();
        assert_eq!(from.len(), 1);
        assert_eq!(from[0].to_string(), "Alice Example <alice@example.com>");
        assert_eq!(message.to_mailboxes()[0].address, "bob@example.com");

        let date = message.date().unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 3, 12));
        assert_eq!((date.hour(), date.minute()), (9, 30));
    }

    #[test]
    fn test_attachment_rules() {
        let part = |headers: &str| Part::parse(format!("{headers}\r\n\r\nx").as_bytes(), 0);

        assert!(part("Content-Type: image/png").is_attachment());
        assert!(!part("Content-Type: image/png\r\nContent-ID: <a@b>").is_attachment());
        assert!(!part("Content-Type: text/plain").is_attachment());
        assert!(part("Content-Type: text/plain\r\nContent-Disposition: attachment").is_attachment());
        assert!(
            part("Content-Type: image/png\r\nContent-Disposition: inline; filename=a.png")
                .is_attachment()
        );
        assert!(!part("Content-Type: image/png\r\nContent-Disposition: inline").is_attachment());
        assert!(part("Content-Type: image/png\r\nContent-Disposition: x-weird").is_attachment());
    }

    #[test]
    fn test_filename_falls_back_to_content_type_name() {
        let part = Part::parse(
            b"Content-Type: application/zip; name=\"bundle.zip\"\r\n\r\nPK",
            0,
        );
        assert_eq!(part.filename().as_deref(), Some("bundle.zip"));
    }

    #[test]
    fn test_unterminated_multipart_keeps_last_part() {
        let raw = concat!(
            "Subject: cut\r\n",
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "partial body"
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(message.text_body().as_deref(), Some("partial body"));
    }

    #[test]
    fn test_malformed_content_type_defaults_to_text() {
        let raw = b"Subject: x\r\nContent-Type: nonsense\r\n\r\nbody";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.text_body().as_deref(), Some("body"));
    }
}
