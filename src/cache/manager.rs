//! Price cache with single-flight refresh
//!
//! Provides a `PriceCache` that keeps the latest [`PriceSnapshot`] in memory with
//! the time it was fetched, and refreshes it through a [`PriceFeed`] once it is
//! older than the configured TTL.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{CacheConfig, StalePolicy};
use crate::data::{PriceFeed, PriceSnapshot, UpstreamError};

type FetchResult = Result<Arc<PriceSnapshot>, UpstreamError>;

/// A refresh every waiting caller polls to the same result
type InFlight = Shared<BoxFuture<'static, FetchResult>>;

/// A cached snapshot and when it was stored
#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: Arc<PriceSnapshot>,
    /// Monotonic fetch time, used for freshness
    fetched_at: Instant,
    /// Wall-clock fetch time, for reporting only
    fetched_at_utc: DateTime<Utc>,
}

impl CacheEntry {
    fn new(snapshot: Arc<PriceSnapshot>) -> Self {
        Self {
            snapshot,
            fetched_at: Instant::now(),
            fetched_at_utc: Utc::now(),
        }
    }

    /// Fresh strictly before `fetched_at + ttl`; at exactly `ttl` it is stale.
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.fetched_at) < ttl
    }
}

#[derive(Default)]
struct CacheState {
    entry: Option<CacheEntry>,
    in_flight: Option<InFlight>,
}

enum Lookup {
    Hit(Arc<PriceSnapshot>),
    Wait(InFlight),
}

/// Freshness of the cached snapshot, as reported by [`PriceCache::status`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    /// Nothing has been fetched successfully yet
    Empty,
    /// The snapshot is younger than the TTL
    Fresh {
        age: Duration,
        fetched_at: DateTime<Utc>,
    },
    /// The snapshot has reached the TTL and will be refetched on next use
    Stale {
        age: Duration,
        fetched_at: DateTime<Utc>,
    },
}

/// In-memory cache for the latest price snapshot
///
/// Cloning is cheap and clones share state. A fresh snapshot is served under a
/// shared read lock. When the snapshot is missing or stale the first caller
/// spawns a refresh task and every concurrent caller awaits that same task, so
/// the feed sees at most one request at a time. The task stores its own result,
/// which means a caller giving up (or being cancelled) never aborts a refresh
/// other callers, or later ones, will benefit from.
#[derive(Clone)]
pub struct PriceCache {
    feed: Arc<dyn PriceFeed>,
    config: CacheConfig,
    state: Arc<RwLock<CacheState>>,
}

impl PriceCache {
    /// Creates an empty cache in front of the given feed
    pub fn new(feed: Arc<dyn PriceFeed>, config: CacheConfig) -> Self {
        Self {
            feed,
            config,
            state: Arc::new(RwLock::new(CacheState::default())),
        }
    }

    /// Returns the configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Returns the current snapshot, refreshing it first if missing or stale
    ///
    /// # Returns
    /// * `Ok(snapshot)` - A snapshot younger than the TTL (or, under
    ///   [`StalePolicy::ServeStale`], the stale one when its refresh failed)
    /// * `Err(UpstreamError)` - If a required refresh failed
    pub async fn get_snapshot(&self) -> Result<Arc<PriceSnapshot>, UpstreamError> {
        if let Some(snapshot) = self.fresh_snapshot() {
            debug!(period = %snapshot.date, "price cache hit");
            return Ok(snapshot);
        }

        let flight = match self.lookup_or_refresh() {
            Lookup::Hit(snapshot) => return Ok(snapshot),
            Lookup::Wait(flight) => flight,
        };

        match flight.await {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => self.on_refresh_error(err),
        }
    }

    /// Reports the cache state without fetching
    pub fn status(&self) -> CacheStatus {
        let state = self.read_state();
        match &state.entry {
            None => CacheStatus::Empty,
            Some(entry) => {
                let age = Instant::now().saturating_duration_since(entry.fetched_at);
                if age < self.config.ttl {
                    CacheStatus::Fresh {
                        age,
                        fetched_at: entry.fetched_at_utc,
                    }
                } else {
                    CacheStatus::Stale {
                        age,
                        fetched_at: entry.fetched_at_utc,
                    }
                }
            }
        }
    }

    /// Whether a refresh is currently in flight
    pub fn is_refreshing(&self) -> bool {
        self.read_state().in_flight.is_some()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh_snapshot(&self) -> Option<Arc<PriceSnapshot>> {
        let state = self.read_state();
        state
            .entry
            .as_ref()
            .filter(|entry| entry.is_fresh(Instant::now(), self.config.ttl))
            .map(|entry| Arc::clone(&entry.snapshot))
    }

    /// Re-checks freshness under the write lock, then joins the running
    /// refresh or starts one.
    fn lookup_or_refresh(&self) -> Lookup {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = &state.entry {
            if entry.is_fresh(Instant::now(), self.config.ttl) {
                return Lookup::Hit(Arc::clone(&entry.snapshot));
            }
        }

        if let Some(flight) = &state.in_flight {
            debug!("joining in-flight price refresh");
            return Lookup::Wait(flight.clone());
        }

        info!(
            cached = state.entry.is_some(),
            "price snapshot missing or stale, refreshing"
        );
        let flight = self.spawn_refresh();
        state.in_flight = Some(flight.clone());
        Lookup::Wait(flight)
    }

    fn spawn_refresh(&self) -> InFlight {
        let feed = Arc::clone(&self.feed);
        let state = Arc::clone(&self.state);
        let timeout = self.config.fetch_timeout;

        let handle = tokio::spawn(async move {
            let fetch = tokio::time::timeout(timeout, feed.fetch());
            let result = match AssertUnwindSafe(fetch).catch_unwind().await {
                Ok(Ok(Ok(snapshot))) => Ok(Arc::new(snapshot)),
                Ok(Ok(Err(err))) => Err(err),
                Ok(Err(_elapsed)) => Err(UpstreamError::Timeout(timeout)),
                Err(_panic) => Err(UpstreamError::Interrupted(
                    "price feed panicked".to_string(),
                )),
            };

            let mut state = state.write().unwrap_or_else(PoisonError::into_inner);
            if let Ok(snapshot) = &result {
                info!(
                    period = %snapshot.date,
                    grades = snapshot.prices.len(),
                    "price snapshot refreshed"
                );
                state.entry = Some(CacheEntry::new(Arc::clone(snapshot)));
            }
            state.in_flight = None;
            result
        });

        async move {
            handle
                .await
                .unwrap_or_else(|err| Err(UpstreamError::Interrupted(err.to_string())))
        }
        .boxed()
        .shared()
    }

    fn on_refresh_error(&self, err: UpstreamError) -> FetchResult {
        if self.config.stale_policy == StalePolicy::ServeStale {
            if let Some(entry) = &self.read_state().entry {
                warn!(
                    error = %err,
                    period = %entry.snapshot.date,
                    "price refresh failed, serving stale snapshot"
                );
                return Ok(Arc::clone(&entry.snapshot));
            }
        }

        warn!(error = %err, "price refresh failed");
        Err(err)
    }
}
