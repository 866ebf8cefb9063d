//! Mailbox addresses (`From`, `To`, `Reply-To`).

use crate::encoding::decode_rfc2047;
use crate::error::{Error, Result};
use std::fmt;

/// A single mailbox: optional display name plus address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name, RFC 2047 decoded and unquoted.
    pub name: Option<String>,
    /// The `local@domain` address.
    pub address: String,
}

impl Mailbox {
    /// Creates a mailbox.
    #[must_use]
    pub fn new(name: Option<String>, address: impl Into<String>) -> Self {
        Self {
            name,
            address: address.into(),
        }
    }

    /// Display name when present and non-blank, otherwise the address.
    #[must_use]
    pub fn display(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.address,
        }
    }

    /// Parses one mailbox in `"Name" <addr>`, `Name <addr>` or `addr` form.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is blank or the angle brackets are
    /// unbalanced.
    pub fn parse(s: &str) -> Result<Self> {
        let s = strip_comments(s);
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress(s.to_string()));
        }

        if let Some(open) = s.rfind('<') {
            let close = s[open..]
                .find('>')
                .map(|i| open + i)
                .ok_or_else(|| Error::InvalidAddress(s.to_string()))?;
            let address = s[open + 1..close].trim().to_string();
            let name = s[..open].trim();
            let name = name
                .strip_prefix('"')
                .and_then(|n| n.strip_suffix('"'))
                .unwrap_or(name)
                .replace("\\\"", "\"");
            let name = decode_rfc2047(&name);
            let name = (!name.trim().is_empty()).then(|| name.trim().to_string());
            return Ok(Self::new(name, address));
        }

        Ok(Self::new(None, s))
    }

    /// Parses a comma-separated address list, skipping unparseable entries
    /// and group labels.
    #[must_use]
    pub fn parse_list(s: &str) -> Vec<Self> {
        split_addresses(s)
            .into_iter()
            .map(|entry| {
                // Group syntax: "Team: a@b, c@d;"
                let entry = entry.trim().trim_end_matches(';');
                match (entry.find(':'), entry.find(['<', '"'])) {
                    (Some(colon), None) => &entry[colon + 1..],
                    (Some(colon), Some(other)) if colon < other => &entry[colon + 1..],
                    _ => entry,
                }
            })
            .filter_map(|entry| Self::parse(entry).ok())
            .collect()
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => write!(f, "{name} <{}>", self.address),
            _ => write!(f, "{}", self.address),
        }
    }
}

fn split_addresses(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

/// Removes `(comments)` outside of quoted strings.
fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    let mut in_quotes = false;

    for c in s.chars() {
        match c {
            '"' if depth == 0 => {
                in_quotes = !in_quotes;
                out.push(c);
            }
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes && depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
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
    fn test_parse_forms() {
        let quoted = Mailbox::parse("\"Doe, Jane\" <jane@example.com>").unwrap();
        assert_eq!(quoted.name.as_deref(), Some("Doe, Jane"));
        assert_eq!(quoted.address, "jane@example.com");

        let bare_name = Mailbox::parse("Alice Smith <alice@example.com>").unwrap();
        assert_eq!(bare_name.name.as_deref(), Some("Alice Smith"));

        let bare = Mailbox::parse("bob@example.com").unwrap();
        assert_eq!(bare.name, None);
        assert_eq!(bare.address, "bob@example.com");

        let angle_only = Mailbox::parse("<carol@example.com>").unwrap();
        assert_eq!(angle_only.name, None);
        assert_eq!(angle_only.address, "carol@example.com");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Mailbox::parse("  ").is_err());
        assert!(Mailbox::parse("Broken <x@example.com").is_err());
    }

    #[test]
    fn test_parse_encoded_name_and_comment() {
        let mb = Mailbox::parse("=?utf-8?Q?Ren=C3=A9?= <rene@example.com> (work)").unwrap();
        assert_eq!(mb.name.as_deref(), Some("René"));
        assert_eq!(mb.address, "rene@example.com");
    }

    #[test]
    fn test_parse_list() {
        let list = Mailbox::parse_list(
            "\"Doe, Jane\" <jane@example.com>, bob@example.com, , Team: carol@example.com;",
        );
        let addresses: Vec<_> = list.iter().map(|m| m.address.as_str()).collect();
        assert_eq!(
            addresses,
            vec!["jane@example.com", "bob@example.com", "carol@example.com"]
        );
    }

    #[test]
    fn test_display_and_fallback() {
        let named = Mailbox::new(Some("Alice".into()), "alice@example.com");
        assert_eq!(named.to_string(), "Alice <alice@example.com>");
        assert_eq!(named.display(), "Alice");

        let blank = Mailbox::new(Some("  ".into()), "bob@example.com");
        assert_eq!(blank.to_string(), "bob@example.com");
        assert_eq!(blank.display(), "bob@example.com");
    }
}
