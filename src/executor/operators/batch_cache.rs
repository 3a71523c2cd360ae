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

//! Batch Cache Operator.
//!
//! Sits between a batch hash join and its index-capable inner operator.
//! On `open` it drains the join's outer-values channel, serves the keys it
//! finds in the cache, and opens the inner operator once with only the
//! missing keys. Fetched rows are bucketed per key and written back,
//! including empty buckets so later lookups for those keys are hits.
//!
//! Output order: cached buckets first, then fetched buckets, each in key
//! order. Rows within a bucket keep the order they were fetched in.

use std::sync::Arc;
use std::time::Duration;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::catalog::{BatchCacheProvider, CacheKey};
use crate::common::parse_iso8601_duration;
use crate::core::{Error, Result, Value};
use crate::executor::context::{ExecutionContext, OuterValues};
use crate::executor::expression::ExprRef;
use crate::executor::iterator::{BoxedTupleIterator, TupleIteratorAdapter, TupleListIterator};
use crate::executor::operator::{Operator, OperatorRef};
use crate::executor::statistics::{NodeCounter, NodeId, NodeTimer};
use crate::tuple::{OrdinalValues, OrdinalValuesFactory, Tuple};

/// TTL cache in front of an index-driven inner operator
pub struct BatchCacheOperator {
    node_id: NodeId,
    inner: OperatorRef,
    /// Cache region name; must not evaluate to NULL
    region: ExprRef,
    /// Constant distinguishing queries that share a region
    query_key: ExprRef,
    /// ISO-8601 duration; NULL or absent means no expiry
    ttl: Option<ExprRef>,
    /// Key of an inner row, element-aligned with the submitted outer keys
    inner_key: OrdinalValuesFactory,
    read_only: bool,
}

impl BatchCacheOperator {
    pub fn new(
        node_id: NodeId,
        inner: OperatorRef,
        region: ExprRef,
        query_key: ExprRef,
        inner_key: Vec<ExprRef>,
    ) -> Self {
        Self {
            node_id,
            inner,
            region,
            query_key,
            ttl: None,
            inner_key: OrdinalValuesFactory::new(inner_key),
            read_only: false,
        }
    }

    pub fn with_ttl(mut self, ttl: Option<ExprRef>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Serve from the cache but never write fetched rows back.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    fn resolve_region(&self, ctx: &ExecutionContext) -> Result<String> {
        let region = self.region.evaluate(ctx)?;
        if region.is_null() {
            return Err(Error::null_identity("cache region name"));
        }
        Ok(region.to_string())
    }

    fn resolve_ttl(&self, ctx: &ExecutionContext) -> Result<Option<Duration>> {
        let Some(expr) = &self.ttl else {
            return Ok(None);
        };
        match expr.evaluate(ctx)? {
            v if v.is_null() => Ok(None),
            Value::Text(text) => parse_iso8601_duration(&text).map(Some),
            other => Err(Error::configuration(format!(
                "cache TTL must be an ISO-8601 duration, got {} ({})",
                other,
                other.data_type()
            ))),
        }
    }

    /// Open the inner operator for `missing` keys and return its rows.
    fn fetch(&self, ctx: &mut ExecutionContext, missing: Vec<OrdinalValues>) -> Result<Vec<Tuple>> {
        let submitted = missing.len();
        ctx.set_outer_values(OuterValues::new(missing));
        let inner = self.inner.open(ctx);
        let channel = ctx.take_outer_values();
        let inner = inner?;

        let drained = channel.is_some_and(|c| c.is_exhausted() && !c.over_consumed());
        if !drained {
            let mut inner = inner;
            inner.close();
            return Err(Error::catalog_contract(
                self.inner.name(),
                format!(
                    "batch cache submitted {} keys but the channel was not drained exactly once",
                    submitted
                ),
            ));
        }
        TupleIteratorAdapter::new(inner).materialize(ctx)
    }
}

impl Operator for BatchCacheOperator {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn name(&self) -> &str {
        "BatchCache"
    }

    fn open<'a>(&'a self, ctx: &mut ExecutionContext) -> Result<BoxedTupleIterator<'a>> {
        let region = self.resolve_region(ctx)?;
        let ttl = self.resolve_ttl(ctx)?;
        let query_key = self.query_key.evaluate(ctx)?;

        let Some(mut channel) = ctx.take_outer_values() else {
            return Err(Error::invalid_state(
                "batch cache opened without outer values",
            ));
        };
        let mut seen = FxHashSet::default();
        let keys: Vec<OrdinalValues> = channel
            .drain_all()
            .into_iter()
            .filter(|key| seen.insert(key.clone()))
            .collect();

        let result = self.lookup_and_fetch(ctx, &region, ttl, query_key, keys);
        // Hand the drained channel back for the caller's verification
        ctx.set_outer_values(channel);
        Ok(Box::new(TupleListIterator::new(result?)))
    }
}

impl BatchCacheOperator {
    fn lookup_and_fetch(
        &self,
        ctx: &mut ExecutionContext,
        region: &str,
        ttl: Option<Duration>,
        query_key: Value,
        keys: Vec<OrdinalValues>,
    ) -> Result<Vec<Tuple>> {
        let Some(cache) = ctx.batch_cache().map(Arc::clone) else {
            tracing::debug!(node = self.node_id, "no batch cache configured, passing through");
            return self.fetch(ctx, keys);
        };
        let cache_keys: Vec<CacheKey> = keys
            .iter()
            .map(|k| CacheKey::new(query_key.clone(), k.clone()))
            .collect();

        let start = ctx.start_timer();
        let found = cache.get_all(region, &cache_keys);
        ctx.record_time(self.node_id, NodeTimer::CacheLookup, start);
        let mut found = found?;

        let mut output = Vec::new();
        let mut missing = Vec::new();
        for cache_key in cache_keys {
            match found.remove(&cache_key) {
                Some(rows) => output.extend(rows),
                None => missing.push(cache_key.values),
            }
        }
        let hits = (keys.len() - missing.len()) as u64;
        ctx.increment(self.node_id, NodeCounter::CacheHits, hits);
        ctx.increment(self.node_id, NodeCounter::CacheMisses, missing.len() as u64);
        tracing::debug!(
            node = self.node_id,
            region,
            hits,
            misses = missing.len(),
            "batch cache lookup"
        );

        if missing.is_empty() {
            return Ok(output);
        }

        let fetched = self.fetch(ctx, missing.clone())?;
        let mut buckets: FxHashMap<OrdinalValues, Vec<Tuple>> = missing
            .iter()
            .map(|k| (k.clone(), Vec::new()))
            .collect();
        let mut unkeyed = Vec::new();
        for tuple in fetched {
            let key = self.inner_key.create_for(ctx, &tuple)?;
            match buckets.get_mut(&key) {
                Some(bucket) => bucket.push(tuple),
                // Extra rows are passed on for the join to filter
                None => unkeyed.push(tuple),
            }
        }

        let mut entries = Vec::with_capacity(missing.len());
        for key in missing {
            let rows = buckets.remove(&key).unwrap_or_default();
            output.extend(rows.iter().cloned());
            entries.push((CacheKey::new(query_key.clone(), key), rows));
        }
        output.extend(unkeyed);

        if !(self.read_only || ctx.config().batch_cache_read_only) {
            cache.put_all(region, entries, ttl)?;
        }
        Ok(output)
    }
}
