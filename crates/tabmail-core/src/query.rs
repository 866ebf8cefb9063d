//! Sorting, filtering and grouping of listings.
//!
//! Pure functions over what the engine returns; nothing here touches the
//! caches or the network.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::session::{MessageContent, MessageHeader};

/// Length of [`preview_text`] used by listings.
pub const DEFAULT_PREVIEW_CHARS: usize = 120;

static HTML_TAG: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?s)<.*?>"));

/// Month bucket of a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// Calendar month of the timestamp, in the message's own offset.
    Month {
        /// Year.
        year: i32,
        /// Month, 1-12.
        month: u32,
    },
    /// No timestamp.
    Unknown,
}

impl GroupKey {
    /// Bucket for `header`.
    #[must_use]
    pub fn of(header: &MessageHeader) -> Self {
        header.timestamp.map_or(Self::Unknown, |ts| Self::Month {
            year: ts.year(),
            month: ts.month(),
        })
    }

    /// Display label, e.g. `Mar 2024` or `Unknown`.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Month { year, month } => NaiveDate::from_ymd_opt(*year, *month, 1)
                .map_or_else(|| self.canonical(), |d| d.format("%b %Y").to_string()),
            Self::Unknown => "Unknown".to_string(),
        }
    }

    /// Locale-independent form, e.g. `2024-03`.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Month { year, month } => format!("{year:04}-{month:02}"),
            Self::Unknown => "unknown".to_string(),
        }
    }

    /// Most recent month first, [`GroupKey::Unknown`] last.
    fn display_order(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Month { year: ay, month: am }, Self::Month { year: by, month: bm }) => {
                (by, bm).cmp(&(ay, am))
            }
            (Self::Month { .. }, Self::Unknown) => Ordering::Less,
            (Self::Unknown, Self::Month { .. }) => Ordering::Greater,
            (Self::Unknown, Self::Unknown) => Ordering::Equal,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Headers sharing one [`GroupKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderGroup {
    /// Bucket.
    pub key: GroupKey,
    /// Members, in input order.
    pub headers: Vec<MessageHeader>,
}

/// Sorts by timestamp descending, then server index descending. Headers
/// without a timestamp go last.
pub fn sort_headers(headers: &mut [MessageHeader]) {
    headers.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.index.cmp(&a.index))
    });
}

/// Keeps headers whose subject or sender contains `query`, ignoring case.
/// A blank query keeps everything.
#[must_use]
pub fn filter_headers(headers: &[MessageHeader], query: &str) -> Vec<MessageHeader> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return headers.to_vec();
    }

    headers
        .iter()
        .filter(|h| {
            h.subject.to_lowercase().contains(&needle) || h.sender.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Buckets headers by month, keeping input order within each bucket.
#[must_use]
pub fn group_by_month(headers: &[MessageHeader]) -> Vec<HeaderGroup> {
    let mut groups: Vec<HeaderGroup> = Vec::new();

    for header in headers {
        let key = GroupKey::of(header);
        if let Some(group) = groups.iter_mut().find(|g| g.key == key) {
            group.headers.push(header.clone());
        } else {
            groups.push(HeaderGroup {
                key,
                headers: vec![header.clone()],
            });
        }
    }

    groups.sort_by(|a, b| a.key.display_order(&b.key));
    groups
}

/// Sort, then filter, then group.
#[must_use]
pub fn query_view(headers: &[MessageHeader], filter: &str) -> Vec<HeaderGroup> {
    let mut sorted = headers.to_vec();
    sort_headers(&mut sorted);
    group_by_month(&filter_headers(&sorted, filter))
}

/// Short plain-text excerpt of a message.
///
/// Uses the text body when it has any content, else the HTML body with
/// tags removed. Whitespace runs collapse to one space.
#[must_use]
pub fn preview_text(content: &MessageContent, max_chars: usize) -> String {
    let source = if content.text_body.trim().is_empty() {
        strip_tags(&content.html_body)
    } else {
        content.text_body.clone()
    };

    source
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_chars)
        .collect()
}

fn strip_tags(html: &str) -> String {
    match &*HTML_TAG {
        Ok(re) => re.replace_all(html, " ").into_owned(),
        Err(_) => html.to_string(),
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
    use chrono::{DateTime, FixedOffset};
    use proptest::prelude::*;

    fn at(rfc3339: &str) -> Option<DateTime<FixedOffset>> {
        Some(DateTime::parse_from_rfc3339(rfc3339).unwrap())
    }

    fn header(index: u32, timestamp: Option<DateTime<FixedOffset>>, subject: &str) -> MessageHeader {
        MessageHeader {
            index,
            sender: format!("Sender {index}"),
            subject: subject.to_string(),
            timestamp,
            has_attachments: false,
        }
    }

    fn indices(headers: &[MessageHeader]) -> Vec<u32> {
        headers.iter().map(|h| h.index).collect()
    }

    #[test]
    fn test_sort_by_date_then_index() {
        let mut headers = vec![
            header(1, at("2024-03-01T10:00:00Z"), "a"),
            header(2, None, "b"),
            header(3, at("2024-03-01T10:00:00Z"), "c"),
            header(4, at("2024-04-01T10:00:00Z"), "d"),
            header(5, None, "e"),
        ];
        sort_headers(&mut headers);
        assert_eq!(indices(&headers), vec![4, 3, 1, 5, 2]);
    }

    #[test]
    fn test_sort_compares_instants_across_offsets() {
        let mut headers = vec![
            // 09:30 UTC
            header(1, at("2024-03-01T10:30:00+01:00"), "a"),
            // 10:00 UTC
            header(2, at("2024-03-01T05:00:00-05:00"), "b"),
        ];
        sort_headers(&mut headers);
        assert_eq!(indices(&headers), vec![2, 1]);
    }

    #[test]
    fn test_filter_is_case_insensitive_on_subject_or_sender() {
        let headers = vec![
            header(0, None, "Quarterly REPORT"),
            header(1, None, "lunch"),
            header(7, None, "misc"),
        ];

        assert_eq!(indices(&filter_headers(&headers, "report")), vec![0]);
        assert_eq!(indices(&filter_headers(&headers, "SENDER 7")), vec![7]);
        assert_eq!(filter_headers(&headers, "   ").len(), 3);
        assert!(filter_headers(&headers, "nothing matches").is_empty());
    }

    #[test]
    fn test_group_labels() {
        let key = GroupKey::Month {
            year: 2024,
            month: 3,
        };
        assert_eq!(key.label(), "Mar 2024");
        assert_eq!(key.canonical(), "2024-03");
        assert_eq!(GroupKey::Unknown.label(), "Unknown");
        assert_eq!(GroupKey::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_group_uses_message_offset() {
        // 1 April in UTC, still March locally
        let h = header(0, at("2024-03-31T20:00:00-05:00"), "late");
        assert_eq!(
            GroupKey::of(&h),
            GroupKey::Month {
                year: 2024,
                month: 3
            }
        );
    }

    #[test]
    fn test_query_view_groups_newest_first() {
        let headers = vec![
            header(1, at("2024-01-15T08:00:00Z"), "january"),
            header(2, at("2024-03-02T08:00:00Z"), "early march"),
            header(5, at("2024-03-20T08:00:00Z"), "march five"),
            header(9, at("2024-03-20T08:00:00Z"), "march nine"),
            header(3, None, "undated"),
        ];

        let groups = query_view(&headers, "");
        let labels: Vec<_> = groups.iter().map(|g| g.key.label()).collect();
        assert_eq!(labels, vec!["Mar 2024", "Jan 2024", "Unknown"]);
        assert_eq!(indices(&groups[0].headers), vec![9, 5, 2]);
        assert_eq!(indices(&groups[1].headers), vec![1]);
        assert_eq!(indices(&groups[2].headers), vec![3]);

        assert!(query_view(&headers, "zzz").is_empty());
    }

    #[test]
    fn test_groups_ordered_across_years() {
        let headers = vec![
            header(0, at("2023-12-01T00:00:00Z"), "a"),
            header(1, at("2024-02-01T00:00:00Z"), "b"),
            header(2, at("2023-11-01T00:00:00Z"), "c"),
        ];
        let labels: Vec<_> = group_by_month(&headers)
            .iter()
            .map(|g| g.key.canonical())
            .collect();
        assert_eq!(labels, vec!["2024-02", "2023-12", "2023-11"]);
    }

    fn content(text: &str, html: &str) -> MessageContent {
        MessageContent {
            index: 0,
            subject: String::new(),
            from: String::new(),
            date_display: String::new(),
            html_body: html.to_string(),
            text_body: text.to_string(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_preview_prefers_text() {
        let c = content("  Hello\r\n  world  ", "<p>ignored</p>");
        assert_eq!(preview_text(&c, DEFAULT_PREVIEW_CHARS), "Hello world");
    }

    #[test]
    fn test_preview_strips_html() {
        let c = content(" \r\n", "<div><b>Big</b>\n<span\nclass=\"x\">news</span></div>");
        assert_eq!(preview_text(&c, DEFAULT_PREVIEW_CHARS), "Big news");
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        let c = content(&"é".repeat(200), "");
        assert_eq!(preview_text(&c, DEFAULT_PREVIEW_CHARS).chars().count(), 120);
        assert_eq!(preview_text(&content("", ""), 10), "");
    }

    proptest! {
        #[test]
        fn sorted_listing_is_newest_first(
            stamps in proptest::collection::vec(proptest::option::of(0i64..2_000_000_000), 0..40)
        ) {
            let mut headers: Vec<MessageHeader> = stamps
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let ts = s.and_then(|secs| DateTime::from_timestamp(secs, 0))
                        .map(|d| d.fixed_offset());
                    header(u32::try_from(i).unwrap(), ts, "s")
                })
                .collect();
            sort_headers(&mut headers);

            for pair in headers.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(a.timestamp >= b.timestamp);
                if a.timestamp == b.timestamp {
                    prop_assert!(a.index > b.index);
                }
            }
        }
    }
}
