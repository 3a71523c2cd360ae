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

//! # tuplestream - pull-based tuple operators
//!
//! The physical execution core of a query engine: a tree of row-streaming
//! operators over tuples produced by pluggable catalogs.
//!
//! ## Key Features
//!
//! - **Lazy iteration** - `has_next`/`next` pull protocol, with random
//!   access when a child is fully materialized
//! - **Batched hash joins** - outer rows are grouped into batches whose keys
//!   are handed to the inner index operator through one shared channel
//! - **Tuple composition** - composite rows for joins, collections for
//!   populating joins, grouped rows for GROUP BY
//! - **Batch caching** - TTL cache in front of index-driven inner sides
//!
//! ## Quick Start
//!
//! ```rust
//! use tuplestream::catalog::{
//!     Catalog, ColumnsType, Index, MemoryCatalog, OperatorArgs, TableSource,
//! };
//! use tuplestream::executor::expression::{column, eq};
//! use tuplestream::executor::{
//!     collect_tuples, DefaultTupleMerger, ExecutionContext, JoinMode, Operator,
//! };
//! use tuplestream::{IndexPredicateAnalysis, Value};
//!
//! let mut catalog = MemoryCatalog::new("mem");
//! catalog
//!     .add_table("customers", &["id", "name"], vec![
//!         vec![Value::integer(1), Value::text("Ada")],
//!         vec![Value::integer(2), Value::text("Grace")],
//!     ])
//!     .unwrap();
//! catalog
//!     .add_table("orders", &["id", "customer_id"], vec![
//!         vec![Value::integer(10), Value::integer(1)],
//!         vec![Value::integer(11), Value::integer(1)],
//!     ])
//!     .unwrap();
//! catalog
//!     .add_index(Index::new("orders", &["customer_id"], ColumnsType::All, 100))
//!     .unwrap();
//!
//! let outer = catalog
//!     .get_scan_operator(OperatorArgs::new(
//!         1,
//!         TableSource::new("customers", "c", 0),
//!     ))
//!     .unwrap();
//! let condition = eq(column("o", "customer_id", 1), column("c", "id", 0));
//! let analysis =
//!     IndexPredicateAnalysis::analyze(Some(&condition), 1, &catalog.get_indices("orders"))
//!         .unwrap();
//! let join = analysis
//!     .build_join(
//!         &catalog,
//!         2,
//!         outer,
//!         TableSource::new("orders", "o", 1),
//!         JoinMode::inner(),
//!         Box::new(DefaultTupleMerger::new(1, 2)),
//!     )
//!     .unwrap();
//!
//! let mut ctx = ExecutionContext::new();
//! let rows = collect_tuples(join.open(&mut ctx).unwrap(), &mut ctx).unwrap();
//! assert_eq!(rows.len(), 2);
//! ```
//!
//! ## Modules
//!
//! - [`core`] - Core types ([`DataType`], [`Value`], [`Error`])
//! - [`common`] - Small containers and parsing helpers
//! - [`tuple`] - The tuple model ([`Tuple`] and its variants)
//! - [`executor`] - Iterator protocol, context, expressions and operators
//! - [`catalog`] - Catalog and batch-cache SPIs with in-memory implementations
//! - [`analyze`] - Join condition classification against declared indexes

pub mod analyze;
pub mod catalog;
pub mod common;
pub mod core;
pub mod executor;
pub mod tuple;

// Re-export main types for convenience
pub use core::{DataType, Error, Operator, Result, Value};

pub use tuple::{
    CollectionTuple, CompositeTuple, ComputedTuple, GroupedRow, OrdinalValues, RowTuple,
    TableSchema, Tuple,
};

pub use executor::{
    BatchCacheOperator, BatchHashJoin, BatchSize, ExecutionConfig, ExecutionContext,
    GroupByOperator, JoinMode, NestedLoopJoin, TupleIterator, TupleList,
};

pub use catalog::{
    BatchCacheProvider, Catalog, ColumnsType, InMemoryBatchCache, Index, IndexPredicate,
    MemoryCatalog, TableSource,
};

pub use analyze::{AnalyzePair, IndexPredicateAnalysis, JoinStrategy};
