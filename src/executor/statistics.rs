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

//! Per-node execution statistics.
//!
//! Operators report timings and counters keyed by the node id assigned when
//! the plan was built. The collector is a swappable collaborator held by
//! the execution context; recording never changes control flow.
//!
//! [`NodeStatistics`] uses plain mutable counters and is meant for the
//! single thread driving one execution.

use std::fmt;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

/// Plan node identifier.
pub type NodeId = usize;

/// Timed phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTimer {
    /// Hashing inner rows into the batch table
    HashInner,
    /// Computing outer row keys while batching
    HashOuter,
    /// Evaluating join predicates during the probe
    Predicate,
    /// Bulk cache lookups
    CacheLookup,
}

/// Counted events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCounter {
    Batches,
    InnerRows,
    OuterRows,
    CacheHits,
    CacheMisses,
    RowsProduced,
}

/// Receives statistics from operators
pub trait StatisticsCollector: fmt::Debug + Send {
    fn record_time(&mut self, node_id: NodeId, timer: NodeTimer, elapsed: Duration);

    fn increment(&mut self, node_id: NodeId, counter: NodeCounter, amount: u64);

    /// Snapshot of one node's data, if the collector keeps any.
    fn node(&self, _node_id: NodeId) -> Option<NodeData> {
        None
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatistics;

impl StatisticsCollector for NoopStatistics {
    #[inline]
    fn record_time(&mut self, _node_id: NodeId, _timer: NodeTimer, _elapsed: Duration) {}

    #[inline]
    fn increment(&mut self, _node_id: NodeId, _counter: NodeCounter, _amount: u64) {}
}

/// Accumulated data for one node
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub timers: FxHashMap<NodeTimer, Duration>,
    pub counters: FxHashMap<NodeCounter, u64>,
}

impl NodeData {
    pub fn time(&self, timer: NodeTimer) -> Duration {
        self.timers.get(&timer).copied().unwrap_or_default()
    }

    pub fn count(&self, counter: NodeCounter) -> u64 {
        self.counters.get(&counter).copied().unwrap_or(0)
    }
}

/// In-memory collector keyed by node id
#[derive(Debug, Default)]
pub struct NodeStatistics {
    nodes: FxHashMap<NodeId, NodeData>,
}

impl NodeStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every node that reported something.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl StatisticsCollector for NodeStatistics {
    fn record_time(&mut self, node_id: NodeId, timer: NodeTimer, elapsed: Duration) {
        *self
            .nodes
            .entry(node_id)
            .or_default()
            .timers
            .entry(timer)
            .or_default() += elapsed;
    }

    fn increment(&mut self, node_id: NodeId, counter: NodeCounter, amount: u64) {
        *self
            .nodes
            .entry(node_id)
            .or_default()
            .counters
            .entry(counter)
            .or_default() += amount;
    }

    fn node(&self, node_id: NodeId) -> Option<NodeData> {
        self.nodes.get(&node_id).cloned()
    }
}

/// Started timer; `None` when statistics are disabled.
#[derive(Debug, Clone, Copy)]
pub struct TimerStart(Option<Instant>);

impl TimerStart {
    #[inline]
    pub fn start(enabled: bool) -> Self {
        TimerStart(enabled.then(Instant::now))
    }

    /// Elapsed time, if the timer was started.
    #[inline]
    pub fn elapsed(&self) -> Option<Duration> {
        self.0.map(|start| start.elapsed())
    }
}
