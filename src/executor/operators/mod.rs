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

//! Query operators for streaming execution.
//!
//! Every operator implements the `Operator` trait; `open()` returns a
//! pull-based iterator borrowing the operator.
//!
//! # Available Operators
//!
//! ## Join Operators
//!
//! - `NestedLoopJoin` - Re-opens the inner side per outer row; supports
//!   correlated inner plans and any predicate
//! - `BatchHashJoin` - Opens the inner side once per batch of outer rows,
//!   submitting the batch's keys through the outer-values channel
//!
//! ## Others
//!
//! - `GroupByOperator` - Materialize-then-group, emits `GroupedRow`s
//! - `BatchCacheOperator` - TTL cache in front of an index-driven inner side
//! - `FilterOperator`, `TopOperator`, `ComputedColumnsOperator`
//!
//! # Algorithm Selection
//!
//! | Condition | Recommended Operator |
//! |-----------|---------------------|
//! | Equality keys, inner side has an index | `BatchHashJoin` with index |
//! | Equality keys, no index | `BatchHashJoin` without index |
//! | Non-equality conditions | `NestedLoopJoin` |
//! | Correlated inner side | `NestedLoopJoin` |
//! | CROSS JOIN | `NestedLoopJoin` |

pub mod batch_cache;
pub mod batch_hash_join;
pub mod computed;
pub mod filter;
pub mod group_by;
pub mod join;
pub mod nested_loop_join;
pub mod top;

pub use batch_cache::BatchCacheOperator;
pub use batch_hash_join::{BatchHashJoin, BatchSize};
pub use computed::ComputedColumnsOperator;
pub use filter::FilterOperator;
pub use group_by::GroupByOperator;
pub use join::JoinMode;
pub use nested_loop_join::NestedLoopJoin;
pub use top::TopOperator;
