//! Transfer and header decoding.
//!
//! Base64 and Quoted-Printable body decoding (RFC 2045), RFC 2047
//! encoded-words in header values, and charset conversion to UTF-8.

use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes Base64 body data, ignoring line breaks and other whitespace.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(compact).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Malformed escapes are passed through literally, the way most mail
/// readers treat them, so this never fails.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            out.push(byte);
            i += 1;
            continue;
        }

        // Soft line break: "=" followed by optional whitespace then a newline
        let mut j = i + 1;
        while j < data.len() && (data[j] == b' ' || data[j] == b'\t') {
            j += 1;
        }
        if data.get(j) == Some(&b'\r') && data.get(j + 1) == Some(&b'\n') {
            i = j + 2;
            continue;
        }
        if data.get(j) == Some(&b'\n') {
            i = j + 1;
            continue;
        }

        match (
            data.get(i + 1).copied().and_then(hex_value),
            data.get(i + 2).copied().and_then(hex_value),
        ) {
            (Some(hi), Some(lo)) => {
                out.push((hi << 4) | lo);
                i += 3;
            }
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    out
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Converts bytes in the named charset to a UTF-8 string.
///
/// UTF-8 and US-ASCII are decoded lossily; the ISO-8859-1 and
/// Windows-1252 families map each byte to the matching code point.
/// Unknown charsets are treated as UTF-8.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: Option<&str>) -> String {
    let charset = charset.map(str::to_ascii_lowercase).unwrap_or_default();
    match charset.as_str() {
        "iso-8859-1" | "latin1" | "latin-1" | "iso8859-1" | "windows-1252" | "cp1252" => {
            bytes.iter().map(|&b| char::from(b)).collect()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Decodes every RFC 2047 encoded-word in a header value.
///
/// Whitespace between two adjacent encoded-words is dropped, as RFC 2047
/// section 6.2 requires. Words that fail to decode are kept verbatim.
#[must_use]
pub fn decode_rfc2047(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut pending_space = String::new();
    let mut last_was_encoded = false;

    while !rest.is_empty() {
        let Some(start) = rest.find("=?") else {
            flush_plain(&mut out, &mut pending_space, rest);
            break;
        };

        let (plain, candidate) = rest.split_at(start);
        if let Some((decoded, consumed)) = decode_encoded_word(candidate) {
            if !(last_was_encoded && plain.trim().is_empty()) {
                flush_plain(&mut out, &mut pending_space, plain);
            }
            pending_space.clear();
            out.push_str(&decoded);
            rest = &candidate[consumed..];
            last_was_encoded = true;

            // Hold trailing whitespace until we know what follows it
            let trimmed = rest.trim_start();
            pending_space.push_str(&rest[..rest.len() - trimmed.len()]);
            rest = trimmed;
        } else {
            flush_plain(&mut out, &mut pending_space, plain);
            out.push_str("=?");
            rest = &candidate[2..];
            last_was_encoded = false;
        }
    }

    out
}

fn flush_plain(out: &mut String, pending_space: &mut String, plain: &str) {
    out.push_str(pending_space);
    pending_space.clear();
    out.push_str(plain);
}

/// Decodes one `=?charset?enc?text?=` word at the start of `input`.
///
/// Returns the decoded text and the number of bytes consumed.
fn decode_encoded_word(input: &str) -> Option<(String, usize)> {
    let body = input.strip_prefix("=?")?;
    let (charset, after_charset) = body.split_once('?')?;
    let (encoding, after_encoding) = after_charset.split_once('?')?;
    let end = after_encoding.find("?=")?;
    let encoded = &after_encoding[..end];
    if encoded.contains(char::is_whitespace) {
        return None;
    }

    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);

    let bytes = match encoding {
        "B" | "b" => decode_base64(encoded.as_bytes()).ok()?,
        "Q" | "q" => decode_quoted_printable(encoded.replace('_', " ").as_bytes()),
        _ => return None,
    };

    let consumed = 2 + charset_len(body) + encoding.len() + 1 + end + 2;
    Some((decode_charset(&bytes, Some(charset)), consumed))
}

fn charset_len(body: &str) -> usize {
    body.find('?').map_or(0, |i| i + 1)
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
    use proptest::prelude::*;

    #[test]
    fn test_base64_with_line_breaks() {
        let decoded = decode_base64(b"SGVsbG8s\r\nIFdvcmxk\r\nIQ==\r\n").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_invalid() {
        assert!(decode_base64(b"!!!not base64!!!").is_err());
    }

    #[test]
    fn test_quoted_printable() {
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo"), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello= \nWorld"), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_malformed_passthrough() {
        assert_eq!(decode_quoted_printable(b"100=ZZ"), b"100=ZZ");
        assert_eq!(decode_quoted_printable(b"end="), b"end=");
    }

    #[test]
    fn test_decode_charset_latin1() {
        assert_eq!(decode_charset(&[0x63, 0x61, 0x66, 0xE9], Some("ISO-8859-1")), "café");
        assert_eq!(decode_charset("café".as_bytes(), Some("utf-8")), "café");
        assert_eq!(decode_charset(b"plain", None), "plain");
    }

    #[test]
    fn test_rfc2047_plain_passthrough() {
        assert_eq!(decode_rfc2047("Hello"), "Hello");
        assert_eq!(decode_rfc2047("a =? b"), "a =? b");
    }

    #[test]
    fn test_rfc2047_base64() {
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn test_rfc2047_q() {
        assert_eq!(decode_rfc2047("=?UTF-8?Q?H=C3=A9llo_there?="), "Héllo there");
        assert_eq!(decode_rfc2047("=?iso-8859-1?q?caf=E9?="), "café");
    }

    #[test]
    fn test_rfc2047_adjacent_words_join() {
        let value = "=?utf-8?Q?Quarterly?= =?utf-8?Q?_report?=";
        assert_eq!(decode_rfc2047(value), "Quarterly report");
    }

    #[test]
    fn test_rfc2047_mixed_with_plain_text() {
        let value = "Re: =?utf-8?B?SMOpbGxv?= world";
        assert_eq!(decode_rfc2047(value), "Re: Héllo world");
    }

    proptest! {
        #[test]
        fn quoted_printable_never_grows(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assert!(decode_quoted_printable(&data).len() <= data.len());
        }

        #[test]
        fn quoted_printable_passes_plain_bytes(data in "[^=]*") {
            prop_assert_eq!(decode_quoted_printable(data.as_bytes()), data.as_bytes());
        }

        #[test]
        fn rfc2047_leaves_plain_text_alone(text in "[^=]*") {
            prop_assert_eq!(decode_rfc2047(&text), text);
        }
    }
}
