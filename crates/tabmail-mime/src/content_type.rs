//! Content-Type and parameterized header values.

use crate::encoding::{decode_charset, decode_rfc2047};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart"), lowercase.
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "png"), lowercase.
    pub sub_type: String,
    /// Parameters keyed by lowercase name (e.g., charset, boundary, name).
    pub parameters: HashMap<String, String>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// The RFC 2045 default, `text/plain; charset=us-ascii`.
    #[must_use]
    pub fn text_plain() -> Self {
        let mut ct = Self::new("text", "plain");
        ct.parameters
            .insert("charset".to_string(), "us-ascii".to_string());
        ct
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters.get("boundary").map(String::as_str)
    }

    /// Returns the `name` parameter if present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parameters.get("name").map(String::as_str)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type == "multipart"
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type == "text"
    }

    /// Checks the full `type/subtype` pair, ignoring case.
    #[must_use]
    pub fn is(&self, main_type: &str, sub_type: &str) -> bool {
        self.main_type.eq_ignore_ascii_case(main_type) && self.sub_type.eq_ignore_ascii_case(sub_type)
    }

    /// Parses a content type header value.
    ///
    /// Format: `type/subtype; param1=value1; param2="value 2"`
    ///
    /// # Errors
    ///
    /// Returns an error if the `type/subtype` pair is missing or empty.
    pub fn parse(s: &str) -> Result<Self> {
        let (value, parameters) = parse_parameterized(s);

        let (main_type, sub_type) = value
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(s.to_string()))?;
        let main_type = main_type.trim().to_ascii_lowercase();
        let sub_type = sub_type.trim().to_ascii_lowercase();
        if main_type.is_empty() || sub_type.is_empty() {
            return Err(Error::InvalidContentType(s.to_string()));
        }

        Ok(Self {
            main_type,
            sub_type,
            parameters,
        })
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::text_plain()
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)
    }
}

/// Splits `value; key=val; key2="val 2"` into the leading value and a
/// parameter map.
///
/// Keys are lowercased. Quoted values may contain `;`. RFC 2231 extended
/// parameters (`filename*=utf-8''a%20b.pdf`) and continuations
/// (`name*0=`, `name*1=`) are reassembled under their plain key.
pub(crate) fn parse_parameterized(s: &str) -> (String, HashMap<String, String>) {
    let segments = split_unquoted(s, ';');
    let mut iter = segments.into_iter();
    let value = iter.next().unwrap_or_default().trim().to_string();

    let mut parameters = HashMap::new();
    let mut continuations: Vec<(String, usize, bool, String)> = Vec::new();

    for segment in iter {
        let Some((key, raw)) = segment.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let raw = unquote(raw.trim());

        if let Some((base, rest)) = key.split_once('*') {
            // name* | name*0 | name*0*
            let extended = rest.ends_with('*') || rest.is_empty();
            let index = rest.trim_end_matches('*').parse::<usize>().unwrap_or(0);
            continuations.push((base.to_string(), index, extended, raw));
        } else {
            parameters.insert(key, decode_rfc2047(&raw));
        }
    }

    continuations.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    let mut joined: HashMap<String, String> = HashMap::new();
    for (base, index, extended, raw) in continuations {
        let piece = if extended {
            decode_extended(&raw, index == 0)
        } else {
            raw
        };
        joined.entry(base).or_default().push_str(&piece);
    }
    parameters.extend(joined);

    (value, parameters)
}

/// Decodes an RFC 2231 extended value (`charset'lang'percent-encoded`).
fn decode_extended(raw: &str, first: bool) -> String {
    let (charset, encoded) = if first {
        let mut parts = raw.splitn(3, '\'');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(charset), Some(_lang), Some(rest)) => (Some(charset), rest),
            _ => (None, raw),
        }
    } else {
        (None, raw)
    };

    let mut bytes = Vec::with_capacity(encoded.len());
    let mut chars = encoded.bytes();
    while let Some(b) = chars.next() {
        if b == b'%' {
            let hi = chars.next();
            let lo = chars.next();
            let decoded = hi
                .zip(lo)
                .and_then(|(h, l)| u8::from_str_radix(std::str::from_utf8(&[h, l]).ok()?, 16).ok());
            match decoded {
                Some(byte) => bytes.push(byte),
                None => {
                    bytes.push(b'%');
                    bytes.extend(hi);
                    bytes.extend(lo);
                }
            }
        } else {
            bytes.push(b);
        }
    }

    decode_charset(&bytes, charset.filter(|c| !c.is_empty()))
}

fn split_unquoted(s: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn unquote(s: &str) -> String {
    let Some(inner) = s.strip_prefix('"').and_then(|t| t.strip_suffix('"')) else {
        return s.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
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
    fn test_content_type_parse() {
        let ct = ContentType::parse("Text/HTML; charset=UTF-8").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "html");
        assert_eq!(ct.charset(), Some("UTF-8"));
        assert!(ct.is("TEXT", "html"));
        assert_eq!(ct.to_string(), "text/html");
    }

    #[test]
    fn test_content_type_parse_quoted_boundary() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"----=_Part;123\"").unwrap();
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), Some("----=_Part;123"));
    }

    #[test]
    fn test_content_type_parse_invalid() {
        assert!(ContentType::parse("garbage").is_err());
        assert!(ContentType::parse("text/").is_err());
        assert!(ContentType::parse("").is_err());
    }

    #[test]
    fn test_default_is_text_plain() {
        let ct = ContentType::default();
        assert!(ct.is("text", "plain"));
        assert_eq!(ct.charset(), Some("us-ascii"));
    }

    #[test]
    fn test_parameters_name_with_encoded_word() {
        let ct = ContentType::parse("image/png; name=\"=?utf-8?Q?caf=C3=A9.png?=\"").unwrap();
        assert_eq!(ct.name(), Some("café.png"));
    }

    #[test]
    fn test_rfc2231_extended_parameter() {
        let (value, params) =
            parse_parameterized("attachment; filename*=utf-8''r%C3%A9sum%C3%A9.pdf");
        assert_eq!(value, "attachment");
        assert_eq!(params.get("filename").map(String::as_str), Some("résumé.pdf"));
    }

    #[test]
    fn test_rfc2231_continuations() {
        let (_, params) =
            parse_parameterized("attachment; filename*0=\"long\"; filename*1=\"-name.txt\"");
        assert_eq!(params.get("filename").map(String::as_str), Some("long-name.txt"));
    }

    #[test]
    fn test_unquote_escapes() {
        assert_eq!(unquote("\"a \\\"b\\\" c\""), "a \"b\" c");
        assert_eq!(unquote("plain"), "plain");
    }
}
