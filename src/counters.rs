//! Concurrent event counters keyed by metric name and tag set.
//!
//! One shared `DashMap` serves every listener thread; increments lock a
//! single shard, so counters for unrelated keys never contend. A periodic
//! [`flush`] drains the map into the metrics API.

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::client::ApiClient;

/// Metric name plus tags. Tag order does not matter: keys built from the
/// same tags in any order are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    name: String,
    tags: Vec<String>,
}

impl CounterKey {
    pub fn new<I, S>(name: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        tags.sort_unstable();
        Self {
            name: name.into(),
            tags,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tags in sorted order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

#[derive(Debug, Default)]
pub struct MetricCounterStore {
    counts: DashMap<CounterKey, u64>,
}

impl MetricCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to `key`, creating it at 1. Returns the new value.
    pub fn increment(&self, key: CounterKey) -> u64 {
        self.increment_by(key, 1)
    }

    pub fn increment_by(&self, key: CounterKey, amount: u64) -> u64 {
        let mut count = self.counts.entry(key).or_insert(0);
        *count += amount;
        *count
    }

    pub fn get(&self, key: &CounterKey) -> u64 {
        self.counts.get(key).map(|c| *c).unwrap_or(0)
    }

    /// Remove and return every counter.
    ///
    /// Each key is removed under its shard lock, so an increment either
    /// lands before the removal and is returned here, or after it and
    /// starts a fresh counter for the next drain.
    pub fn drain(&self) -> Vec<(CounterKey, u64)> {
        let keys: Vec<CounterKey> = self.counts.iter().map(|e| e.key().clone()).collect();
        keys.into_iter()
            .filter_map(|key| self.counts.remove(&key))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Drain `store` into `client` as counts reported by `host`.
///
/// Counters whose submission fails are put back for the next flush.
/// Returns the number of counters submitted.
pub fn flush(store: &MetricCounterStore, client: &dyn ApiClient, host: Option<&str>) -> usize {
    let mut submitted = 0;
    for (key, count) in store.drain() {
        match client.count(key.name(), count, host, key.tags()) {
            Ok(()) => submitted += 1,
            Err(e) => {
                warn!(metric = key.name(), error = %e, "counter flush failed, keeping count");
                store.increment_by(key, count);
            }
        }
    }
    if submitted > 0 {
        debug!(submitted, "flushed counters");
    }
    submitted
}
