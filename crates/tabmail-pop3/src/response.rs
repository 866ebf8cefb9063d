//! POP3 response parsing.
//!
//! Sans-I/O: functions here take bytes already read by the framing layer.

use crate::{Error, Result};

/// Answer to `STAT`: the maildrop size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stat {
    /// Number of messages.
    pub count: u32,
    /// Total size in octets.
    pub size: u64,
}

/// One line of a `LIST` answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanListing {
    /// Message number (1-based).
    pub message: u32,
    /// Size in octets.
    pub size: u64,
}

/// One line of a `UIDL` answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueId {
    /// Message number (1-based).
    pub message: u32,
    /// Server-assigned unique id, stable across sessions.
    pub uid: String,
}

/// Parses a status line, returning the text after `+OK`.
///
/// # Errors
///
/// Returns [`Error::Server`] for `-ERR` and [`Error::Protocol`] for
/// anything else.
pub fn parse_status(line: &[u8]) -> Result<String> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\r', '\n']);

    if let Some(rest) = text.strip_prefix("+OK") {
        return Ok(rest.trim_start().to_string());
    }
    if let Some(rest) = text.strip_prefix("-ERR") {
        return Err(Error::Server(rest.trim_start().to_string()));
    }
    Err(Error::Protocol(format!("unexpected status line: {text}")))
}

/// Parses the text after `+OK` of a `STAT` answer (`count size`).
///
/// # Errors
///
/// Returns [`Error::Protocol`] if either number is missing or malformed.
pub fn parse_stat(text: &str) -> Result<Stat> {
    let mut fields = text.split_ascii_whitespace();
    let count = parse_number(fields.next(), "STAT count")?;
    let size = parse_number(fields.next(), "STAT size")?;
    Ok(Stat { count, size })
}

/// Parses `msg size` (a scan listing), as sent by `LIST` and `LIST n`.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the line is malformed.
pub fn parse_scan_listing(text: &str) -> Result<ScanListing> {
    let mut fields = text.split_ascii_whitespace();
    let message = parse_number(fields.next(), "LIST message number")?;
    let size = parse_number(fields.next(), "LIST size")?;
    Ok(ScanListing { message, size })
}

/// Parses `msg uid`, as sent by `UIDL` and `UIDL n`.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the line is malformed.
pub fn parse_unique_id(text: &str) -> Result<UniqueId> {
    let mut fields = text.split_ascii_whitespace();
    let message = parse_number(fields.next(), "UIDL message number")?;
    let uid = fields
        .next()
        .ok_or_else(|| Error::Protocol("UIDL line missing unique id".to_string()))?;
    Ok(UniqueId {
        message,
        uid: uid.to_string(),
    })
}

/// Splits a multi-line body into trimmed, non-empty text lines.
#[must_use]
pub fn body_lines(body: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(body)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Extracts the `<...>` APOP timestamp from a greeting, if present.
#[must_use]
pub fn greeting_timestamp(text: &str) -> Option<String> {
    let start = text.find('<')?;
    let end = start + text[start..].find('>')?;
    let stamp = &text[start..=end];
    stamp.contains('@').then(|| stamp.to_string())
}

fn parse_number<T: std::str::FromStr>(field: Option<&str>, what: &str) -> Result<T> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| Error::Protocol(format!("malformed {what}")))
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
    fn test_parse_status() {
        assert_eq!(parse_status(b"+OK 2 320\r\n").unwrap(), "2 320");
        assert_eq!(parse_status(b"+OK\r\n").unwrap(), "");
        assert!(matches!(
            parse_status(b"-ERR no such message\r\n"),
            Err(Error::Server(text)) if text == "no such message"
        ));
        assert!(matches!(parse_status(b"* OK imap?\r\n"), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_parse_stat() {
        assert_eq!(parse_stat("2 320").unwrap(), Stat { count: 2, size: 320 });
        assert_eq!(parse_stat("0 0 extra").unwrap(), Stat::default());
        assert!(parse_stat("two 320").is_err());
        assert!(parse_stat("").is_err());
    }

    #[test]
    fn test_parse_listings() {
        assert_eq!(
            parse_scan_listing("1 120").unwrap(),
            ScanListing { message: 1, size: 120 }
        );
        assert_eq!(
            parse_unique_id("2 QhdPYR:00WBw1Ph7x7").unwrap(),
            UniqueId {
                message: 2,
                uid: "QhdPYR:00WBw1Ph7x7".to_string()
            }
        );
        assert!(parse_unique_id("2").is_err());
    }

    #[test]
    fn test_body_lines() {
        assert_eq!(body_lines(b"TOP\r\nUIDL\r\n\r\nSTLS\r\n"), vec!["TOP", "UIDL", "STLS"]);
    }

    #[test]
    fn test_greeting_timestamp() {
        assert_eq!(
            greeting_timestamp("POP3 server ready <1896.697170952@dbc.mtview.ca.us>").as_deref(),
            Some("<1896.697170952@dbc.mtview.ca.us>")
        );
        assert_eq!(greeting_timestamp("POP3 ready"), None);
        assert_eq!(greeting_timestamp("ready <not-a-stamp>"), None);
    }

    proptest! {
        #[test]
        fn prop_stat_round_trips_numbers(count in any::<u32>(), size in any::<u64>()) {
            let parsed = parse_stat(&format!("{count} {size}")).unwrap();
            prop_assert_eq!(parsed, Stat { count, size });
        }

        #[test]
        fn prop_status_never_panics(line in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = parse_status(&line);
        }
    }
}
