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

//! Query Executor
//!
//! Physical operators and the protocol they share.
//!
//! # Architecture
//!
//! Operators form a tree. A parent opens each child, pulls tuples with
//! `has_next`/`next`, and closes it; one [`ExecutionContext`] is threaded
//! through every call:
//!
//! ```text
//! GroupByOperator
//!   ↓ pulls
//! BatchHashJoin ── outer-values channel ──► BatchCacheOperator
//!   ↓ pulls                                    ↓ opens once per batch
//! Catalog scan                               Catalog index operator
//! ```
//!
//! # Components
//!
//! - [`TupleIterator`] / [`TupleList`] - Pull protocol and random access
//! - [`Operator`] - Plan node producing iterators
//! - [`ExecutionContext`] - Current/outer tuple slots, outer-values channel,
//!   statistics, batch cache
//! - [`TupleMerger`] - Composite/collection construction for joins
//! - [`operators`] - Joins, grouping, caching and helpers

pub mod config;
pub mod context;
pub mod expression;
pub mod hash_table;
pub mod iterator;
pub mod merger;
pub mod operator;
pub mod operators;
pub mod statistics;

pub use config::ExecutionConfig;
pub use context::{ExecutionContext, OuterValues};
pub use expression::{ExprRef, Expression};
pub use iterator::{
    collect_tuples, BoxedTupleIterator, TupleIterator, TupleIteratorAdapter, TupleList,
    TupleListIterator,
};
pub use merger::{DefaultTupleMerger, TupleMerger};
pub use operator::{EmptyOperator, MaterializedOperator, Operator, OperatorRef};
pub use operators::{
    BatchCacheOperator, BatchHashJoin, BatchSize, ComputedColumnsOperator, FilterOperator,
    GroupByOperator, JoinMode, NestedLoopJoin, TopOperator,
};
pub use statistics::{
    NodeCounter, NodeData, NodeId, NodeStatistics, NodeTimer, NoopStatistics, StatisticsCollector,
};
