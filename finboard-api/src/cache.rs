//! Keyed query cache with prefix invalidation.
//!
//! Entries are stored as JSON values so one cache can hold every response
//! type. Invalidation marks entries stale rather than dropping them; the next
//! read through [`QueryCache::get_or_fetch`] refetches.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{ApiError, Result};

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60);

/// Segment path identifying a query, e.g. `["transactions", "list", "all"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

impl From<&str> for QueryKey {
    fn from(s: &str) -> Self {
        Self(vec![s.to_string()])
    }
}

struct Entry {
    value: Value,
    fetched_at: Instant,
    invalidated: bool,
}

pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    stale_after: Duration,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER)
    }
}

impl QueryCache {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stale_after,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Cached value for `key` if present and fresh.
    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let entries = self.lock();
        let entry = entries.get(key)?;
        if self.entry_is_stale(entry) {
            return None;
        }
        serde_json::from_value(entry.value.clone()).ok()
    }

    pub fn put<T: Serialize>(&self, key: QueryKey, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| ApiError::InvalidRequest(format!("cache {key}: {e}")))?;
        self.lock().insert(
            key,
            Entry {
                value,
                fetched_at: Instant::now(),
                invalidated: false,
            },
        );
        Ok(())
    }

    /// Mark every entry under `prefix` stale. Returns how many were marked.
    pub fn invalidate(&self, prefix: impl Into<QueryKey>) -> usize {
        let prefix = prefix.into();
        let mut marked = 0;
        for (key, entry) in self.lock().iter_mut() {
            if key.starts_with(&prefix) && !entry.invalidated {
                entry.invalidated = true;
                marked += 1;
            }
        }
        tracing::debug!(prefix = %prefix, marked, "cache invalidated");
        marked
    }

    pub fn invalidate_all<'a>(&self, prefixes: impl IntoIterator<Item = &'a str>) -> usize {
        prefixes.into_iter().map(|p| self.invalidate(p)).sum()
    }

    /// True when `key` is missing, invalidated, or older than `stale_after`.
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.lock()
            .get(key)
            .is_none_or(|entry| self.entry_is_stale(entry))
    }

    fn entry_is_stale(&self, entry: &Entry) -> bool {
        entry.invalidated || entry.fetched_at.elapsed() >= self.stale_after
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Return the fresh cached value, or run `fetch` and cache its result.
    /// Errors are returned as-is and nothing is cached.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = fetch().await?;
        self.put(key, &value)?;
        Ok(value)
    }
}
