//! Start/finish correlation for in-flight entities.
//!
//! A key is either absent or pending with a start timestamp. Resolving a
//! pending key removes it and yields the elapsed milliseconds; resolving an
//! absent key yields nothing. Keys are independent shards of a `DashMap`,
//! so distinct nodes never wait on each other.
//!
//! Entries whose finish never arrives are evicted once they are older than
//! the configured TTL, and the map is capped so it cannot grow without
//! bound.

use dashmap::DashMap;
use std::time::Duration;
use tracing::{debug, warn};

pub struct CorrelationTracker {
    pending: DashMap<String, i64>,
    ttl: Duration,
    max_pending: usize,
}

impl CorrelationTracker {
    pub fn new(ttl: Duration, max_pending: usize) -> Self {
        Self {
            pending: DashMap::new(),
            ttl,
            max_pending: max_pending.max(1),
        }
    }

    /// Mark `key` as started at `started_at_ms`, observed at `now_ms`. A
    /// second start for the same key replaces the first.
    ///
    /// The start may lie in the past; staleness is always judged against
    /// `now_ms`.
    pub fn record_start(&self, key: impl Into<String>, started_at_ms: i64, now_ms: i64) {
        let key = key.into();
        if !self.pending.contains_key(&key) && self.pending.len() >= self.max_pending {
            self.make_room(now_ms);
        }
        self.pending.insert(key, started_at_ms);
    }

    /// Consume the start of `key` and return the elapsed milliseconds.
    ///
    /// Returns `None` when no start was recorded. A finish earlier than the
    /// start (clock skew) is clamped to zero.
    pub fn resolve_duration(&self, key: &str, ended_at_ms: i64) -> Option<u64> {
        let (_, started_at_ms) = self.pending.remove(key)?;
        let elapsed = ended_at_ms - started_at_ms;
        if elapsed < 0 {
            warn!(key, elapsed_ms = elapsed, "finish precedes start, clamping to zero");
            return Some(0);
        }
        Some(elapsed as u64)
    }

    /// Drop a pending start without measuring it.
    pub fn forget(&self, key: &str) -> bool {
        self.pending.remove(key).is_some()
    }

    /// Remove every entry older than the TTL. Returns how many were dropped.
    pub fn evict_stale(&self, now_ms: i64) -> usize {
        let ttl_ms = self.ttl.as_millis() as i64;
        let before = self.pending.len();
        self.pending
            .retain(|_, started_at_ms| now_ms - *started_at_ms < ttl_ms);
        let evicted = before.saturating_sub(self.pending.len());
        if evicted > 0 {
            debug!(evicted, "evicted stale pending starts");
        }
        evicted
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn make_room(&self, now_ms: i64) {
        if self.evict_stale(now_ms) > 0 && self.pending.len() < self.max_pending {
            return;
        }
        let oldest = self
            .pending
            .iter()
            .min_by_key(|entry| *entry.value())
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            warn!(key = %key, max = self.max_pending, "too many pending starts, dropping oldest");
            self.pending.remove(&key);
        }
    }
}
