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

//! Execution Context
//!
//! One context is threaded by `&mut` through every operator call of an
//! execution. It carries the configuration, the statistics collector, the
//! optional batch cache, and three short-lived slots:
//!
//! - the current tuple, read by expressions during evaluation
//! - the outer tuple, read by correlated column references
//! - the outer-values channel, drained by index-capable inner operators
//!
//! Slot discipline is a caller precondition: set a slot immediately before
//! the dependent evaluation and restore it immediately after. Nothing here
//! enforces it beyond the scoping helpers.

use std::fmt;
use std::sync::Arc;

use super::config::ExecutionConfig;
use super::statistics::{
    NodeCounter, NodeId, NodeTimer, NoopStatistics, StatisticsCollector, TimerStart,
};
use crate::catalog::BatchCacheProvider;
use crate::tuple::{OrdinalValues, Tuple};

// ============================================================================
// Outer-values channel
// ============================================================================

/// Single-pass iterator of keys handed to an index-capable inner operator
///
/// The inner operator must drain it completely during its `open`. Reading
/// past the end more than once is recorded as over-consumption.
#[derive(Debug, Clone)]
pub struct OuterValues {
    keys: Vec<OrdinalValues>,
    position: usize,
    /// Number of `next` calls made after the end was reached
    reads_past_end: usize,
}

impl OuterValues {
    pub fn new(keys: Vec<OrdinalValues>) -> Self {
        Self {
            keys,
            position: 0,
            reads_past_end: 0,
        }
    }

    /// Total number of keys submitted.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.keys.len() - self.position
    }

    /// Returns true once every key has been read.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.keys.len()
    }

    /// Returns true if the end was read past more than once, which only a
    /// second pass over the channel does.
    #[inline]
    pub fn over_consumed(&self) -> bool {
        self.reads_past_end > 1
    }

    /// Drain every remaining key.
    pub fn drain_all(&mut self) -> Vec<OrdinalValues> {
        let mut keys = Vec::with_capacity(self.remaining());
        for key in self.by_ref() {
            keys.push(key);
        }
        keys
    }
}

impl Iterator for OuterValues {
    type Item = OrdinalValues;

    fn next(&mut self) -> Option<OrdinalValues> {
        match self.keys.get(self.position) {
            Some(key) => {
                self.position += 1;
                Some(key.clone())
            }
            None => {
                self.reads_past_end += 1;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

// ============================================================================
// ExecutionContext
// ============================================================================

/// Per-execution state shared by all operators
pub struct ExecutionContext {
    config: ExecutionConfig,
    /// Tuple currently being evaluated
    tuple: Option<Tuple>,
    /// Outer tuple for correlated references
    outer_tuple: Option<Tuple>,
    /// Keys for the next index-capable inner open
    outer_values: Option<OuterValues>,
    statistics: Box<dyn StatisticsCollector>,
    batch_cache: Option<Arc<dyn BatchCacheProvider>>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// Create a new context with default configuration
    pub fn new() -> Self {
        Self {
            config: ExecutionConfig::default(),
            tuple: None,
            outer_tuple: None,
            outer_values: None,
            statistics: Box::new(NoopStatistics),
            batch_cache: None,
        }
    }

    /// Create a context with the given configuration
    pub fn with_config(config: ExecutionConfig) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    /// Sets the statistics collector
    pub fn with_statistics(mut self, statistics: Box<dyn StatisticsCollector>) -> Self {
        self.statistics = statistics;
        self
    }

    /// Sets the batch cache provider
    pub fn with_batch_cache(mut self, cache: Arc<dyn BatchCacheProvider>) -> Self {
        self.batch_cache = Some(cache);
        self
    }

    #[inline]
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn batch_cache(&self) -> Option<&Arc<dyn BatchCacheProvider>> {
        self.batch_cache.as_ref()
    }

    // =========================================================================
    // Current tuple
    // =========================================================================

    /// The tuple currently being evaluated.
    #[inline]
    pub fn tuple(&self) -> Option<&Tuple> {
        self.tuple.as_ref()
    }

    #[inline]
    pub fn set_tuple(&mut self, tuple: Option<Tuple>) {
        self.tuple = tuple;
    }

    /// Set the current tuple, returning the previous one.
    #[inline]
    pub fn replace_tuple(&mut self, tuple: Option<Tuple>) -> Option<Tuple> {
        std::mem::replace(&mut self.tuple, tuple)
    }

    /// Run `f` with `tuple` as the current tuple, then restore the previous.
    pub fn with_tuple<R>(&mut self, tuple: Tuple, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.replace_tuple(Some(tuple));
        let result = f(self);
        self.tuple = previous;
        result
    }

    // =========================================================================
    // Outer tuple
    // =========================================================================

    /// Outer tuple visible to correlated references.
    #[inline]
    pub fn outer_tuple(&self) -> Option<&Tuple> {
        self.outer_tuple.as_ref()
    }

    /// Set the outer tuple, returning the previous one.
    #[inline]
    pub fn replace_outer_tuple(&mut self, tuple: Option<Tuple>) -> Option<Tuple> {
        std::mem::replace(&mut self.outer_tuple, tuple)
    }

    // =========================================================================
    // Outer-values channel
    // =========================================================================

    /// Hand keys to the next index-capable open.
    pub fn set_outer_values(&mut self, values: OuterValues) {
        self.outer_values = Some(values);
    }

    /// The channel, for index operators to drain in place.
    pub fn outer_values_mut(&mut self) -> Option<&mut OuterValues> {
        self.outer_values.as_mut()
    }

    /// Remove the channel from the context.
    pub fn take_outer_values(&mut self) -> Option<OuterValues> {
        self.outer_values.take()
    }

    #[inline]
    pub fn has_outer_values(&self) -> bool {
        self.outer_values.is_some()
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    #[inline]
    pub fn statistics_enabled(&self) -> bool {
        self.config.statistics_enabled
    }

    /// Start a timer that is a no-op when statistics are disabled.
    #[inline]
    pub fn start_timer(&self) -> TimerStart {
        TimerStart::start(self.config.statistics_enabled)
    }

    /// Record the time since `start` for a node.
    #[inline]
    pub fn record_time(&mut self, node_id: NodeId, timer: NodeTimer, start: TimerStart) {
        if let Some(elapsed) = start.elapsed() {
            self.statistics.record_time(node_id, timer, elapsed);
        }
    }

    #[inline]
    pub fn increment(&mut self, node_id: NodeId, counter: NodeCounter, amount: u64) {
        if self.config.statistics_enabled {
            self.statistics.increment(node_id, counter, amount);
        }
    }

    pub fn statistics(&self) -> &dyn StatisticsCollector {
        self.statistics.as_ref()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("config", &self.config)
            .field("tuple", &self.tuple.as_ref().map(|t| t.to_string()))
            .field(
                "outer_tuple",
                &self.outer_tuple.as_ref().map(|t| t.to_string()),
            )
            .field("outer_values", &self.outer_values.as_ref().map(|v| v.len()))
            .field("statistics", &self.statistics)
            .field("batch_cache", &self.batch_cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::executor::statistics::NodeStatistics;
    use crate::tuple::test_support::row;

    fn keys(values: &[i64]) -> Vec<OrdinalValues> {
        values
            .iter()
            .map(|v| OrdinalValues::new([Value::integer(*v)]))
            .collect()
    }

    #[test]
    fn test_outer_values_single_pass() {
        let mut channel = OuterValues::new(keys(&[1, 2]));
        assert_eq!(channel.remaining(), 2);
        assert!(!channel.is_exhausted());

        let drained = channel.drain_all();
        assert_eq!(drained.len(), 2);
        assert!(channel.is_exhausted());
        assert!(!channel.over_consumed());

        // A second pass reads past the end again
        assert!(channel.next().is_none());
        assert!(channel.over_consumed());
    }

    #[test]
    fn test_with_tuple_restores_previous() {
        let mut ctx = ExecutionContext::new();
        let outer = row(0, "a", &[Value::integer(1)]);
        let inner = row(1, "b", &[Value::integer(2)]);

        ctx.set_tuple(Some(outer.clone()));
        let seen = ctx.with_tuple(inner.clone(), |ctx| ctx.tuple().unwrap().value(0));
        assert_eq!(seen, Value::integer(2));
        assert!(ctx.tuple().unwrap().ptr_eq(&outer));
    }

    #[test]
    fn test_statistics_only_when_enabled() {
        let mut ctx =
            ExecutionContext::new().with_statistics(Box::new(NodeStatistics::new()));
        ctx.increment(1, NodeCounter::Batches, 1);
        assert!(ctx.statistics().node(1).is_none());

        let mut ctx = ExecutionContext::with_config(ExecutionConfig::new().with_statistics(true))
            .with_statistics(Box::new(NodeStatistics::new()));
        ctx.increment(1, NodeCounter::Batches, 1);
        assert_eq!(
            ctx.statistics().node(1).unwrap().count(NodeCounter::Batches),
            1
        );
    }
}
