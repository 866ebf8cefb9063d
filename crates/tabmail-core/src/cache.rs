//! Header and content caches sharing one freshness clock.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::session::{MessageContent, MessageHeader};

/// Listing snapshot plus the content fetched under it.
///
/// Content has no clock of its own: an entry is served only while the
/// header snapshot is fresh. Entries are dropped only on expiry or reset.
#[derive(Debug)]
pub(crate) struct MailCache {
    headers: Vec<MessageHeader>,
    headers_fetched_at: Option<Instant>,
    contents: HashMap<u32, MessageContent>,
    epoch: u64,
    ttl: Duration,
    cache_empty_listing: bool,
}

impl MailCache {
    pub(crate) fn new(ttl: Duration, cache_empty_listing: bool) -> Self {
        Self {
            headers: Vec::new(),
            headers_fetched_at: None,
            contents: HashMap::new(),
            epoch: 0,
            ttl,
            cache_empty_listing,
        }
    }

    /// Bumped by every [`MailCache::reset`].
    pub(crate) const fn epoch(&self) -> u64 {
        self.epoch
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.headers_fetched_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.ttl)
    }

    /// Drops everything once the snapshot has aged out.
    fn expire(&mut self, now: Instant) {
        if self.headers_fetched_at.is_some() && !self.is_fresh(now) {
            self.headers.clear();
            self.headers_fetched_at = None;
            self.contents.clear();
        }
    }

    /// The snapshot, if it may short-circuit a listing.
    pub(crate) fn cached_headers(&mut self, now: Instant) -> Option<Vec<MessageHeader>> {
        self.expire(now);
        let usable = self.is_fresh(now) && (!self.headers.is_empty() || self.cache_empty_listing);
        usable.then(|| self.headers.clone())
    }

    /// Replaces the snapshot and starts a new freshness window.
    pub(crate) fn store_headers(&mut self, headers: Vec<MessageHeader>, now: Instant) {
        self.headers = headers;
        self.headers_fetched_at = Some(now);
    }

    pub(crate) fn cached_content(&mut self, index: u32, now: Instant) -> Option<MessageContent> {
        self.expire(now);
        if !self.is_fresh(now) {
            return None;
        }
        self.contents.get(&index).cloned()
    }

    pub(crate) fn store_content(&mut self, content: MessageContent) {
        self.contents.insert(content.index, content);
    }

    /// Clears both caches and the clock.
    pub(crate) fn reset(&mut self) {
        self.headers.clear();
        self.headers_fetched_at = None;
        self.contents.clear();
        self.epoch = self.epoch.wrapping_add(1);
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

    const TTL: Duration = Duration::from_secs(600);

    fn header(index: u32) -> MessageHeader {
        MessageHeader {
            index,
            sender: "a".to_string(),
            subject: format!("s{index}"),
            timestamp: None,
            has_attachments: false,
        }
    }

    fn content(index: u32) -> MessageContent {
        MessageContent {
            index,
            subject: "s".to_string(),
            from: "a".to_string(),
            date_display: String::new(),
            html_body: String::new(),
            text_body: "body".to_string(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_snapshot_fresh_until_ttl() {
        let start = Instant::now();
        let mut cache = MailCache::new(TTL, false);
        cache.store_headers(vec![header(1), header(0)], start);

        let just_before = start + TTL - Duration::from_millis(1);
        assert_eq!(cache.cached_headers(just_before).unwrap().len(), 2);
        assert!(cache.cached_headers(start + TTL).is_none());
    }

    #[test]
    fn test_empty_snapshot_not_served_by_default() {
        let now = Instant::now();
        let mut cache = MailCache::new(TTL, false);
        cache.store_headers(Vec::new(), now);
        assert!(cache.cached_headers(now).is_none());

        let mut opted_in = MailCache::new(TTL, true);
        opted_in.store_headers(Vec::new(), now);
        assert_eq!(opted_in.cached_headers(now), Some(Vec::new()));
    }

    #[test]
    fn test_content_rides_on_header_clock() {
        let start = Instant::now();
        let mut cache = MailCache::new(TTL, false);

        // Nothing listed yet
        cache.store_content(content(3));
        assert!(cache.cached_content(3, start).is_none());

        cache.store_headers(vec![header(3)], start);
        let later = start + Duration::from_secs(500);
        cache.store_content(content(3));
        assert!(cache.cached_content(3, later).is_some());

        // Fetched at 500s, stale at 600s all the same
        assert!(cache.cached_content(3, start + TTL).is_none());
    }

    #[test]
    fn test_content_survives_relist() {
        let start = Instant::now();
        let mut cache = MailCache::new(TTL, false);
        cache.store_headers(vec![header(0)], start);
        cache.store_content(content(0));

        let relisted = start + Duration::from_secs(300);
        cache.store_headers(vec![header(1), header(0)], relisted);
        assert!(cache.cached_content(0, relisted).is_some());

        // The re-list restarted the clock for content too
        assert!(cache.cached_content(0, start + TTL).is_some());
        assert!(cache.cached_content(0, relisted + TTL).is_none());
    }

    #[test]
    fn test_reset_clears_and_bumps_epoch() {
        let now = Instant::now();
        let mut cache = MailCache::new(TTL, true);
        cache.store_headers(vec![header(0)], now);
        cache.store_content(content(0));

        let before = cache.epoch();
        cache.reset();
        assert_eq!(cache.epoch(), before + 1);
        assert!(cache.cached_headers(now).is_none());
        assert!(cache.cached_content(0, now).is_none());
    }
}
