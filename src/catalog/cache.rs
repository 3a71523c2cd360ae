// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Batch cache store.
//!
//! Entries are keyed by `(query key, outer ordinal values)` inside a named
//! region. A cached entry is the full list of inner rows fetched for that
//! key, possibly empty: an empty list is still a hit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::core::{Result, Value};
use crate::tuple::{OrdinalValues, Tuple};

/// Key of one cached inner-row bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Constant key distinguishing queries sharing a region
    pub query_key: Value,
    pub values: OrdinalValues,
}

impl CacheKey {
    pub fn new(query_key: Value, values: OrdinalValues) -> Self {
        Self { query_key, values }
    }
}

/// Cache store SPI used by the batch cache operator
pub trait BatchCacheProvider: Send + Sync {
    /// Look up every key; keys absent from the result are misses.
    fn get_all(&self, region: &str, keys: &[CacheKey]) -> Result<FxHashMap<CacheKey, Vec<Tuple>>>;

    /// Store entries, expiring after `ttl` when given.
    fn put_all(
        &self,
        region: &str,
        entries: Vec<(CacheKey, Vec<Tuple>)>,
        ttl: Option<Duration>,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
struct CachedRows {
    rows: Vec<Tuple>,
    expires_at: Option<Instant>,
}

impl CachedRows {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

type Region = FxHashMap<CacheKey, CachedRows>;

/// Process-local [`BatchCacheProvider`]
///
/// Expired entries are dropped lazily on lookup.
#[derive(Debug, Default)]
pub struct InMemoryBatchCache {
    regions: RwLock<FxHashMap<String, Region>>,
    get_calls: AtomicU64,
    put_calls: AtomicU64,
}

impl InMemoryBatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get_all` calls so far.
    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::Relaxed)
    }

    /// Number of `put_all` calls so far.
    pub fn put_calls(&self) -> u64 {
        self.put_calls.load(Ordering::Relaxed)
    }

    /// Live (unexpired) entries in a region.
    pub fn len(&self, region: &str) -> usize {
        let now = Instant::now();
        self.regions
            .read()
            .get(region)
            .map(|r| r.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, region: &str) -> bool {
        self.len(region) == 0
    }

    /// Drop a whole region.
    pub fn invalidate(&self, region: &str) {
        self.regions.write().remove(region);
    }

    pub fn clear(&self) {
        self.regions.write().clear();
    }
}

impl BatchCacheProvider for InMemoryBatchCache {
    fn get_all(&self, region: &str, keys: &[CacheKey]) -> Result<FxHashMap<CacheKey, Vec<Tuple>>> {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let mut found = FxHashMap::default();
        let mut expired = Vec::new();

        {
            let regions = self.regions.read();
            let Some(entries) = regions.get(region) else {
                return Ok(found);
            };
            for key in keys {
                match entries.get(key) {
                    Some(entry) if entry.is_expired(now) => expired.push(key.clone()),
                    Some(entry) => {
                        found.insert(key.clone(), entry.rows.clone());
                    }
                    None => {}
                }
            }
        }

        if !expired.is_empty() {
            let mut regions = self.regions.write();
            if let Some(entries) = regions.get_mut(region) {
                for key in &expired {
                    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
                        entries.remove(key);
                    }
                }
            }
        }
        Ok(found)
    }

    fn put_all(
        &self,
        region: &str,
        entries: Vec<(CacheKey, Vec<Tuple>)>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.put_calls.fetch_add(1, Ordering::Relaxed);
        // A TTL past the clock's range never expires
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        let mut regions = self.regions.write();
        let target = regions.entry(region.to_string()).or_default();
        for (key, rows) in entries {
            target.insert(key, CachedRows { rows, expires_at });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::test_support::row;

    fn key(v: i64) -> CacheKey {
        CacheKey::new(Value::text("q"), OrdinalValues::new([Value::integer(v)]))
    }

    #[test]
    fn test_put_then_get() {
        let cache = InMemoryBatchCache::new();
        let r = row(1, "b", &[Value::integer(1)]);
        cache
            .put_all("region", vec![(key(1), vec![r]), (key(2), vec![])], None)
            .unwrap();

        let found = cache.get_all("region", &[key(1), key(2), key(3)]).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[&key(1)].len(), 1);
        // Empty bucket is a hit
        assert!(found[&key(2)].is_empty());
        assert!(!found.contains_key(&key(3)));

        assert_eq!(cache.get_calls(), 1);
        assert_eq!(cache.put_calls(), 1);
    }

    #[test]
    fn test_regions_are_separate() {
        let cache = InMemoryBatchCache::new();
        cache.put_all("a", vec![(key(1), vec![])], None).unwrap();
        assert!(cache.get_all("b", &[key(1)]).unwrap().is_empty());
        assert_eq!(cache.len("a"), 1);

        cache.invalidate("a");
        assert!(cache.is_empty("a"));
    }

    #[test]
    fn test_query_key_distinguishes_entries() {
        let cache = InMemoryBatchCache::new();
        cache.put_all("r", vec![(key(1), vec![])], None).unwrap();
        let other = CacheKey::new(Value::text("other"), OrdinalValues::new([Value::integer(1)]));
        assert!(cache.get_all("r", &[other]).unwrap().is_empty());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = InMemoryBatchCache::new();
        cache
            .put_all("r", vec![(key(1), vec![])], Some(Duration::from_millis(0)))
            .unwrap();
        assert!(cache.get_all("r", &[key(1)]).unwrap().is_empty());
        assert_eq!(cache.len("r"), 0);
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let cache = InMemoryBatchCache::new();
        cache
            .put_all("r", vec![(key(1), vec![])], Some(Duration::MAX))
            .unwrap();
        assert_eq!(cache.get_all("r", &[key(1)]).unwrap().len(), 1);
    }
}
