//! RFC 5322 header section parsing.

use crate::encoding::decode_rfc2047;

/// Ordered collection of header fields.
///
/// Names are matched case-insensitively; the original order and the
/// original spelling of each name are preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Gets the first value for a header, unfolded but not decoded.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets the first value for a header with RFC 2047 words decoded.
    #[must_use]
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(decode_rfc2047)
    }

    /// Gets every value for a header in document order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the number of header fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no header fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(name, value)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Parses a header section.
    ///
    /// Continuation lines (starting with a space or tab) are unfolded into
    /// the previous field. Lines without a colon are skipped.
    #[must_use]
    pub fn parse(section: &[u8]) -> Self {
        let text = String::from_utf8_lossy(section);
        let mut headers = Self::new();

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                break;
            }

            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = headers.fields.last_mut() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(line.trim());
                }
                continue;
            }

            if let Some((name, value)) = line.split_once(':') {
                headers.add(name.trim(), value.trim());
            }
        }

        headers
    }
}

/// Splits raw message bytes at the blank line ending the header section.
///
/// Returns `(header_section, body)`. A message with no blank line is all
/// headers and has an empty body.
pub(crate) fn split_header_body(raw: &[u8]) -> (&[u8], &[u8]) {
    // Body that starts immediately (no headers at all)
    if raw.starts_with(b"\r\n") {
        return (&[], &raw[2..]);
    }
    if raw.starts_with(b"\n") {
        return (&[], &raw[1..]);
    }

    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\n' {
            let next = &raw[i + 1..];
            if next.starts_with(b"\r\n") {
                return (&raw[..=i], &next[2..]);
            }
            if next.starts_with(b"\n") {
                return (&raw[..=i], &next[1..]);
            }
        }
        i += 1;
    }

    (raw, &[])
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

    #[test]
    fn test_headers_parse_and_unfold() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "Subject: Test\r\n",
            "  Message\r\n",
            "Content-Type: text/plain;\r\n",
            "\tcharset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n"
        );

        let headers = Headers::parse(text.as_bytes());
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("from"), Some("sender@example.com"));
        assert_eq!(headers.get("SUBJECT"), Some("Test Message"));
        assert_eq!(headers.get("Content-Type"), Some("text/plain; charset=utf-8"));
        assert!(headers.get("Body").is_none());
    }

    #[test]
    fn test_headers_keep_order_and_duplicates() {
        let headers = Headers::parse(b"Received: a\nX-Other: 1\nReceived: b\n");
        let received: Vec<_> = headers.get_all("received").collect();
        assert_eq!(received, vec!["a", "b"]);

        let names: Vec<_> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Received", "X-Other", "Received"]);
    }

    #[test]
    fn test_get_decoded() {
        let headers = Headers::parse(b"Subject: =?utf-8?B?SMOpbGxv?=\r\n");
        assert_eq!(headers.get_decoded("Subject").as_deref(), Some("Héllo"));
    }

    #[test]
    fn test_split_header_body() {
        let (head, body) = split_header_body(b"A: 1\r\nB: 2\r\n\r\nhello\r\n");
        assert_eq!(head, b"A: 1\r\nB: 2\r\n");
        assert_eq!(body, b"hello\r\n");

        let (head, body) = split_header_body(b"A: 1\n\nhello");
        assert_eq!(head, b"A: 1\n");
        assert_eq!(body, b"hello");

        let (head, body) = split_header_body(b"A: 1\r\n");
        assert_eq!(head, b"A: 1\r\n");
        assert!(body.is_empty());

        let (head, body) = split_header_body(b"\r\nonly body");
        assert!(head.is_empty());
        assert_eq!(body, b"only body");
    }
}
