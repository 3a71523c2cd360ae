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

//! Per-batch hash table for the batch hash join.
//!
//! Built from the inner rows returned for one batch and probed by that
//! batch's outer rows. Key points:
//!
//! 1. **Pre-sized**: capacity comes from the batch's distinct key count
//! 2. **Hash reuse**: keys carry their precomputed hash, nothing is rehashed
//! 3. **Singleton buckets**: a bucket holds its first entry inline and only
//!    allocates a list on the second insert
//!
//! # Memory Layout
//!
//! ```text
//! BatchHashTable
//! └── buckets: FxHashMap<u64, OneOrMany<HashEntry>>
//!
//! HashEntry
//! ├── key: OrdinalValues   // inner key, hash precomputed
//! └── tuple: Tuple         // inner row (Arc clone)
//! ```
//!
//! Probing by hash yields every candidate in the bucket. The caller must
//! still evaluate the full join predicate: a hash match is necessary but
//! not sufficient.

use rustc_hash::FxHashMap;

use crate::common::OneOrMany;
use crate::tuple::{OrdinalValues, Tuple};

/// An inner row with its key
#[derive(Debug, Clone)]
pub struct HashEntry {
    pub key: OrdinalValues,
    pub tuple: Tuple,
}

/// Hash table of one batch's inner rows
#[derive(Debug, Default)]
pub struct BatchHashTable {
    buckets: FxHashMap<u64, OneOrMany<HashEntry>>,
    /// Number of entries inserted.
    len: usize,
}

impl BatchHashTable {
    /// Create a table sized for `capacity` distinct keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            len: 0,
        }
    }

    /// Insert an inner row under its key.
    #[inline]
    pub fn insert(&mut self, key: OrdinalValues, tuple: Tuple) {
        self.buckets
            .entry(key.hash_code())
            .or_default()
            .push(HashEntry { key, tuple });
        self.len += 1;
    }

    /// Every entry whose hash matches `key`'s hash.
    ///
    /// Includes hash collisions; the caller must verify matches.
    #[inline]
    pub fn probe(&self, key: &OrdinalValues) -> &[HashEntry] {
        self.buckets
            .get(&key.hash_code())
            .map(OneOrMany::as_slice)
            .unwrap_or(&[])
    }

    /// Entries whose key equals `key`.
    ///
    /// Cheap pre-filter before the full predicate; only valid when the key
    /// expressions are pure equalities.
    pub fn probe_equal<'a>(
        &'a self,
        key: &'a OrdinalValues,
    ) -> impl Iterator<Item = &'a HashEntry> + 'a {
        self.probe(key).iter().filter(move |entry| entry.key == *key)
    }

    /// Get the number of entries in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the table is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct hashes.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drop all entries, keeping the allocation for the next batch.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }
}
