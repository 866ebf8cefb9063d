//! The sync facade.
//!
//! [`SyncEngine`] owns the active credential context and the caches, and is
//! the only way callers reach the remote mailbox. The context and both
//! caches sit behind one lock and change together, so a reset issued while
//! a fetch is in flight can never be undone by that fetch completing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::account::CredentialContext;
use crate::assets::{AssetStore, materialize};
use crate::cache::MailCache;
use crate::config::EngineConfig;
use crate::session::{FetchedMessage, MessageContent, MessageHeader, Pop3Mailbox, RemoteMailbox};
use crate::{Error, Result};

/// Outcome slot of one in-flight fetch, tagged with the cache epoch it was
/// started in.
type FlightSlot = Arc<Mutex<Option<(u64, Result<MessageContent>)>>>;

#[derive(Debug)]
struct EngineState {
    context: Option<CredentialContext>,
    cache: MailCache,
}

impl EngineState {
    fn ready_context(&self) -> Result<CredentialContext> {
        self.context
            .as_ref()
            .filter(|ctx| ctx.is_ready())
            .cloned()
            .ok_or(Error::NotAuthenticated)
    }
}

/// Mail engine over any [`RemoteMailbox`].
#[derive(Debug)]
pub struct SyncEngine<R> {
    remote: R,
    config: EngineConfig,
    assets: AssetStore,
    state: Mutex<EngineState>,
    listing_gate: Mutex<()>,
    in_flight: StdMutex<HashMap<u32, FlightSlot>>,
}

/// The production engine.
pub type MailEngine = SyncEngine<Pop3Mailbox>;

impl MailEngine {
    /// Builds a POP3-backed engine from `config`.
    #[must_use]
    pub fn from_config(config: EngineConfig) -> Self {
        Self::new(Pop3Mailbox::new(&config), config)
    }
}

impl<R: RemoteMailbox> SyncEngine<R> {
    /// Creates an engine with no active account.
    #[must_use]
    pub fn new(remote: R, config: EngineConfig) -> Self {
        let cache = MailCache::new(config.cache_ttl(), config.cache_empty_listing);
        Self {
            remote,
            assets: AssetStore::from_config(&config),
            config,
            state: Mutex::new(EngineState {
                context: None,
                cache,
            }),
            listing_gate: Mutex::new(()),
            in_flight: StdMutex::new(HashMap::new()),
        }
    }

    /// Engine settings.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Where inline images are written.
    #[must_use]
    pub const fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Checks `ctx` against the server. Never fails.
    pub async fn test_credentials(&self, ctx: &CredentialContext) -> bool {
        self.remote.test_credentials(ctx).await
    }

    /// Makes `ctx` the active account and drops everything cached for the
    /// previous one.
    pub async fn switch_account(&self, ctx: CredentialContext) {
        let mut state = self.state.lock().await;
        info!(host = ctx.host(), user = ctx.username(), "switching account");
        state.context = Some(ctx);
        state.cache.reset();
        self.clear_in_flight();
    }

    /// The active account, if any.
    pub async fn active_context(&self) -> Option<CredentialContext> {
        self.state.lock().await.context.clone()
    }

    /// Drops both caches and the freshness clock. Results of fetches
    /// already in flight are returned to their callers but not stored.
    pub async fn reset_for_account_switch(&self) {
        let mut state = self.state.lock().await;
        state.cache.reset();
        self.clear_in_flight();
        debug!(epoch = state.cache.epoch(), "cache reset");
    }

    /// Lists the newest `max_count` headers, newest first.
    ///
    /// A fresh non-empty snapshot is returned as-is unless `force_refresh`
    /// is set, whatever its size.
    ///
    /// # Errors
    ///
    /// [`Error::NotAuthenticated`] without a ready active account, or the
    /// transport/protocol failure of the remote listing.
    pub async fn list_headers(
        &self,
        force_refresh: bool,
        max_count: usize,
    ) -> Result<Vec<MessageHeader>> {
        if let Some(headers) = self.cached_listing(force_refresh).await? {
            return Ok(headers);
        }

        // Concurrent listings queue here and re-check the cache once in
        let _gate = self.listing_gate.lock().await;
        let (ctx, epoch) = {
            let mut state = self.state.lock().await;
            let ctx = state.ready_context()?;
            if !force_refresh
                && let Some(headers) = state.cache.cached_headers(Instant::now())
            {
                debug!(count = headers.len(), "listing served by concurrent refresh");
                return Ok(headers);
            }
            (ctx, state.cache.epoch())
        };

        let headers = self.remote.list_headers(&ctx, max_count).await?;

        let mut state = self.state.lock().await;
        if state.cache.epoch() == epoch {
            state.cache.store_headers(headers.clone(), Instant::now());
        } else {
            debug!("cache was reset during listing, not storing");
        }
        info!(count = headers.len(), "listed headers");
        Ok(headers)
    }

    async fn cached_listing(&self, force_refresh: bool) -> Result<Option<Vec<MessageHeader>>> {
        let mut state = self.state.lock().await;
        state.ready_context()?;
        if force_refresh {
            return Ok(None);
        }
        let hit = state.cache.cached_headers(Instant::now());
        if let Some(headers) = &hit {
            debug!(count = headers.len(), "header cache hit");
        }
        Ok(hit)
    }

    /// Fetches the message at `index` with its inline images materialized.
    ///
    /// Served from cache while the header snapshot is fresh. Concurrent
    /// calls for the same index share one remote fetch and its outcome,
    /// failures included.
    ///
    /// # Errors
    ///
    /// As for [`SyncEngine::list_headers`]. Unresolvable inline images are
    /// not errors.
    pub async fn get_message(&self, index: u32) -> Result<MessageContent> {
        loop {
            let epoch = match self.lookup(index).await? {
                Lookup::Hit(content) => return Ok(content),
                Lookup::Miss { epoch, .. } => epoch,
            };

            let slot = match self.join_flight(index) {
                Flight::Leader(lead) => return self.lead(index, lead).await,
                Flight::Follower(slot) => slot,
            };

            let shared = slot.lock().await;
            if let Some((started, outcome)) = &*shared
                && *started == epoch
            {
                debug!(index, "joined in-flight fetch");
                return match outcome {
                    Ok(content) => Ok(content.clone()),
                    Err(err) => Err(err.duplicate()),
                };
            }
            // The leader was cancelled or ran under another account
            debug!(index, "in-flight fetch left no result, retrying");
        }
    }

    async fn lookup(&self, index: u32) -> Result<Lookup> {
        let mut state = self.state.lock().await;
        let ctx = state.ready_context()?;
        if let Some(content) = state.cache.cached_content(index, Instant::now()) {
            debug!(index, "content cache hit");
            return Ok(Lookup::Hit(content));
        }
        let epoch = state.cache.epoch();
        Ok(Lookup::Miss { ctx, epoch })
    }

    /// Runs the fetch for a flight this caller leads and publishes the
    /// outcome to its followers.
    async fn lead(&self, index: u32, mut lead: Lead<'_>) -> Result<MessageContent> {
        // A flight that ended since the caller's lookup may have stored it.
        // Followers find it the same way once this lead is dropped.
        let (epoch, outcome) = match self.lookup(index).await? {
            Lookup::Hit(content) => return Ok(content),
            Lookup::Miss { ctx, epoch } => (epoch, self.fetch_and_store(&ctx, epoch, index).await),
        };
        let shared = match &outcome {
            Ok(content) => Ok(content.clone()),
            Err(err) => Err(err.duplicate()),
        };
        *lead.guard = Some((epoch, shared));
        outcome
    }

    async fn fetch_and_store(
        &self,
        ctx: &CredentialContext,
        epoch: u64,
        index: u32,
    ) -> Result<MessageContent> {
        let FetchedMessage {
            mut content,
            parsed,
        } = self.remote.fetch_message(ctx, index).await?;

        let report = materialize(&content.html_body, &parsed, &self.assets).await;
        content.html_body = report.html;

        let mut state = self.state.lock().await;
        if state.cache.epoch() == epoch {
            state.cache.store_content(content.clone());
        } else {
            debug!(index, "cache was reset during fetch, not storing");
        }
        info!(
            index,
            attachments = content.attachments.len(),
            inline_images = report.written.len(),
            "fetched message"
        );
        Ok(content)
    }

    fn join_flight(&self, index: u32) -> Flight<'_> {
        let mut flights = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = flights.get(&index) {
            return Flight::Follower(Arc::clone(slot));
        }

        let slot: FlightSlot = Arc::new(Mutex::new(None));
        match Arc::clone(&slot).try_lock_owned() {
            Ok(guard) => {
                flights.insert(index, Arc::clone(&slot));
                Flight::Leader(Lead {
                    flights: &self.in_flight,
                    index,
                    slot,
                    guard,
                })
            }
            // A fresh mutex is never locked
            Err(_) => Flight::Follower(slot),
        }
    }

    fn clear_in_flight(&self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

enum Lookup {
    Hit(MessageContent),
    Miss { ctx: CredentialContext, epoch: u64 },
}

enum Flight<'a> {
    Leader(Lead<'a>),
    Follower(FlightSlot),
}

/// Held by the caller performing a fetch. Dropping it, on success, error
/// or cancellation, unregisters the flight before followers are released,
/// so a follower that finds no outcome can start a flight of its own.
struct Lead<'a> {
    flights: &'a StdMutex<HashMap<u32, FlightSlot>>,
    index: u32,
    slot: FlightSlot,
    guard: OwnedMutexGuard<Option<(u64, Result<MessageContent>)>>,
}

impl Drop for Lead<'_> {
    fn drop(&mut self) {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        if flights
            .get(&self.index)
            .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot))
        {
            flights.remove(&self.index);
        }
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
    use crate::account::Security;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    struct FakeMailbox {
        size: u32,
        delay: Duration,
        list_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
        started: Notify,
    }

    impl FakeMailbox {
        fn new(size: u32) -> Self {
            Self {
                size,
                delay: Duration::ZERO,
                list_calls: AtomicUsize::new(0),
                fetch_calls: AtomicUsize::new(0),
                started: Notify::new(),
            }
        }

        fn slow(size: u32) -> Self {
            Self {
                delay: Duration::from_secs(1),
                ..Self::new(size)
            }
        }

        async fn pause(&self) {
            self.started.notify_one();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
    }

    fn raw_message(user: &str, index: u32) -> String {
        format!(
            "From: Sender <sender@example.com>\r\n\
Subject: {user} #{index}\r\n\
Content-Type: multipart/related; boundary=\"r\"\r\n\
\r\n\
--r\r\n\
Content-Type: text/html\r\n\
\r\n\
<img src=\"cid:img{index}\">\r\n\
--r\r\n\
Content-Type: image/png\r\n\
Content-ID: <img{index}>\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw0K\r\n\
--r--\r\n"
        )
    }

    impl RemoteMailbox for FakeMailbox {
        async fn test_credentials(&self, ctx: &CredentialContext) -> bool {
            ctx.secret() == "right"
        }

        async fn list_headers(
            &self,
            ctx: &CredentialContext,
            max_count: usize,
        ) -> Result<Vec<MessageHeader>> {
            if !ctx.is_ready() {
                return Err(Error::NotAuthenticated);
            }
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;

            let take = u32::try_from(max_count).unwrap().min(self.size);
            Ok((self.size - take..self.size)
                .rev()
                .map(|index| MessageHeader {
                    index,
                    sender: "Sender".to_string(),
                    subject: format!("{} #{index}", ctx.username()),
                    timestamp: None,
                    has_attachments: false,
                })
                .collect())
        }

        async fn fetch_message(&self, ctx: &CredentialContext, index: u32) -> Result<FetchedMessage> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;
            if index >= self.size {
                return Err(Error::Protocol("-ERR no such message".to_string()));
            }
            FetchedMessage::parse(index, raw_message(ctx.username(), index).as_bytes())
        }
    }

    fn ctx(user: &str) -> CredentialContext {
        CredentialContext::new("mail.example.com", 995, Security::Tls, user, "x")
    }

    fn config(dir: &TempDir) -> EngineConfig {
        EngineConfig {
            asset_dir: dir.path().join("InlineCache"),
            ..EngineConfig::default()
        }
    }

    async fn engine(remote: FakeMailbox, dir: &TempDir) -> SyncEngine<FakeMailbox> {
        let engine = SyncEngine::new(remote, config(dir));
        engine.switch_account(ctx("a@example.com")).await;
        engine
    }

    #[tokio::test]
    async fn test_no_account_is_not_authenticated() {
        let dir = TempDir::new().unwrap();
        let engine = SyncEngine::new(FakeMailbox::new(3), config(&dir));

        assert!(matches!(
            engine.list_headers(false, 50).await,
            Err(Error::NotAuthenticated)
        ));
        assert!(matches!(
            engine.get_message(0).await,
            Err(Error::NotAuthenticated)
        ));
        assert_eq!(engine.remote.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unready_account_is_not_authenticated() {
        let dir = TempDir::new().unwrap();
        let engine = SyncEngine::new(FakeMailbox::new(3), config(&dir));
        engine
            .switch_account(CredentialContext::new("h", 995, Security::Tls, "u", " "))
            .await;

        let err = engine.list_headers(false, 50).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotAuthenticated);
        assert_eq!(engine.remote.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_cached_until_ttl() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::new(5), &dir).await;

        let first = engine.list_headers(false, 3).await.unwrap();
        assert_eq!(
            first.iter().map(|h| h.index).collect::<Vec<_>>(),
            vec![4, 3, 2]
        );

        tokio::time::advance(Duration::from_secs(599)).await;
        // A different size is still served from the snapshot
        let cached = engine.list_headers(false, 50).await.unwrap();
        assert_eq!(cached, first);
        assert_eq!(engine.remote.list_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        let relisted = engine.list_headers(false, 50).await.unwrap();
        assert_eq!(relisted.len(), 5);
        assert_eq!(engine.remote.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::new(2), &dir).await;

        engine.list_headers(false, 50).await.unwrap();
        engine.list_headers(true, 50).await.unwrap();
        engine.list_headers(true, 50).await.unwrap();
        assert_eq!(engine.remote.list_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_mailbox_relists_every_call() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::new(0), &dir).await;

        assert!(engine.list_headers(false, 50).await.unwrap().is_empty());
        assert!(engine.list_headers(false, 50).await.unwrap().is_empty());
        assert_eq!(engine.remote.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_listing_cached_when_enabled() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig {
            cache_empty_listing: true,
            ..config(&dir)
        };
        let engine = SyncEngine::new(FakeMailbox::new(0), config);
        engine.switch_account(ctx("a")).await;

        engine.list_headers(false, 50).await.unwrap();
        engine.list_headers(false, 50).await.unwrap();
        assert_eq!(engine.remote.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_message_materializes_and_caches() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::new(3), &dir).await;
        engine.list_headers(false, 50).await.unwrap();

        let content = engine.get_message(1).await.unwrap();
        assert_eq!(content.subject, "a@example.com #1");
        assert_eq!(
            content.html_body.trim(),
            r#"<img src="https://assets/InlineCache/inline_img1.png">"#
        );
        assert!(dir.path().join("InlineCache").join("inline_img1.png").exists());

        let again = engine.get_message(1).await.unwrap();
        assert_eq!(again, content);
        assert_eq!(engine.remote.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_content_not_cached_without_listing() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::new(3), &dir).await;

        engine.get_message(0).await.unwrap();
        engine.get_message(0).await.unwrap();
        assert_eq!(engine.remote.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_content_expires_with_headers() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::new(3), &dir).await;
        engine.list_headers(false, 50).await.unwrap();

        tokio::time::advance(Duration::from_secs(590)).await;
        engine.get_message(2).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        engine.get_message(2).await.unwrap();

        assert_eq!(engine.remote.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::new(3), &dir).await;

        let err = engine.get_message(9).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn test_switch_never_serves_previous_account() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::new(3), &dir).await;
        engine.list_headers(false, 50).await.unwrap();
        engine.get_message(0).await.unwrap();

        engine.switch_account(ctx("b@example.com")).await;

        let headers = engine.list_headers(false, 50).await.unwrap();
        assert!(headers.iter().all(|h| h.subject.starts_with("b@example.com")));
        let content = engine.get_message(0).await.unwrap();
        assert_eq!(content.subject, "b@example.com #0");
        assert_eq!(engine.remote.list_calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.remote.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reset_keeps_account() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::new(3), &dir).await;
        engine.list_headers(false, 50).await.unwrap();

        engine.reset_for_account_switch().await;
        assert_eq!(
            engine.active_context().await.unwrap().username(),
            "a@example.com"
        );
        engine.list_headers(false, 50).await.unwrap();
        assert_eq!(engine.remote.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_listing_discards_result() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::slow(3), &dir).await;

        let (in_flight, ()) = tokio::join!(engine.list_headers(false, 50), async {
            engine.remote.started.notified().await;
            engine.switch_account(ctx("b@example.com")).await;
        });

        // The caller still gets what it asked for
        assert!(in_flight.unwrap()[0].subject.starts_with("a@example.com"));

        let next = engine.list_headers(false, 50).await.unwrap();
        assert!(next[0].subject.starts_with("b@example.com"));
        assert_eq!(engine.remote.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_gets_share_one_fetch() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::slow(5), &dir).await;

        let (a, b) = tokio::join!(engine.get_message(3), engine.get_message(3));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(engine.remote.fetch_calls.load(Ordering::SeqCst), 1);
        assert!(engine.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_gets_share_one_failure() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::slow(3), &dir).await;

        let (a, b, c) = tokio::join!(
            engine.get_message(9),
            engine.get_message(9),
            engine.get_message(9)
        );
        for result in [a, b, c] {
            assert_eq!(result.unwrap_err().kind(), crate::ErrorKind::Protocol);
        }
        assert_eq!(engine.remote.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_leader_hands_over() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::slow(5), &dir).await;

        let (abandoned, follower) = tokio::join!(
            tokio::time::timeout(Duration::from_millis(500), engine.get_message(3)),
            async {
                engine.remote.started.notified().await;
                engine.get_message(3).await
            }
        );

        assert!(abandoned.is_err());
        assert_eq!(follower.unwrap().subject, "a@example.com #3");
        assert_eq!(engine.remote.fetch_calls.load(Ordering::SeqCst), 2);
        assert!(engine.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_leader_rechecks_cache() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::new(3), &dir).await;
        engine.list_headers(false, 50).await.unwrap();
        engine.get_message(1).await.unwrap();

        // As if the lookup missed just before the previous flight stored
        let Flight::Leader(lead) = engine.join_flight(1) else {
            panic!("expected to lead the flight");
        };
        let content = engine.lead(1, lead).await.unwrap();

        assert_eq!(content.subject, "a@example.com #1");
        assert_eq!(engine.remote.fetch_calls.load(Ordering::SeqCst), 1);
        assert!(engine.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_content_survives_forced_refresh() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::new(3), &dir).await;
        engine.list_headers(false, 50).await.unwrap();
        let opened = engine.get_message(1).await.unwrap();

        engine.list_headers(true, 50).await.unwrap();
        let again = engine.get_message(1).await.unwrap();

        assert_eq!(again, opened);
        assert_eq!(engine.remote.list_calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.remote.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_listings_share_one_call() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::slow(5), &dir).await;

        let (a, b) = tokio::join!(engine.list_headers(false, 5), engine.list_headers(false, 5));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(engine.remote.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_credentials_delegate() {
        let dir = TempDir::new().unwrap();
        let engine = engine(FakeMailbox::new(0), &dir).await;

        let good = CredentialContext::new("h", 995, Security::Tls, "u", "right");
        assert!(engine.test_credentials(&good).await);
        assert!(!engine.test_credentials(&ctx("u")).await);
    }
}
