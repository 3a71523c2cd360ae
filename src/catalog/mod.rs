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

//! Data-source catalogs
//!
//! The execution core consumes catalogs only through [`Catalog`]:
//! scan operators for full reads, index operators for keyed reads driven
//! by the outer-values channel, and the list of declared indexes.
//!
//! An index operator must drain the channel completely inside its `open`
//! and produce every row matching any submitted key. Extra non-matching
//! rows are allowed since the join re-checks its predicate.
//!
//! - [`memory`] - in-memory reference catalog
//! - [`cache`] - batch cache SPI and an in-memory implementation

use std::fmt;
use std::str::FromStr;

use crate::core::{Error, Result};
use crate::executor::expression::ExprRef;
use crate::executor::operator::OperatorRef;
use crate::executor::statistics::NodeId;

pub mod cache;
pub mod memory;

pub use cache::{BatchCacheProvider, CacheKey, InMemoryBatchCache};
pub use memory::{FetchRecord, MemoryCatalog};

/// How an index matches join conditions against its columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnsType {
    /// Every declared column must be matched
    All,
    /// Any subset of columns, in index order
    Any,
    /// A prefix of the declared columns
    AnyInOrder,
    /// Accepts any condition columns verbatim
    Wildcard,
}

impl fmt::Display for ColumnsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnsType::All => write!(f, "ALL"),
            ColumnsType::Any => write!(f, "ANY"),
            ColumnsType::AnyInOrder => write!(f, "ANY_IN_ORDER"),
            ColumnsType::Wildcard => write!(f, "WILDCARD"),
        }
    }
}

impl FromStr for ColumnsType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "ALL" => Ok(ColumnsType::All),
            "ANY" => Ok(ColumnsType::Any),
            "ANY_IN_ORDER" => Ok(ColumnsType::AnyInOrder),
            "WILDCARD" => Ok(ColumnsType::Wildcard),
            _ => Err(Error::parse(format!("unknown columns type '{}'", s))),
        }
    }
}

/// An index declared by a catalog for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub table: String,
    /// Declared columns; empty for wildcard indexes
    pub columns: Vec<String>,
    pub columns_type: ColumnsType,
    /// Preferred outer batch size; zero means "use the configured default"
    pub batch_size: usize,
}

impl Index {
    pub fn new(
        table: impl Into<String>,
        columns: &[&str],
        columns_type: ColumnsType,
        batch_size: usize,
    ) -> Self {
        Self {
            table: table.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            columns_type,
            batch_size,
        }
    }

    /// A wildcard index accepting any columns.
    pub fn wildcard(table: impl Into<String>, batch_size: usize) -> Self {
        Self::new(table, &[], ColumnsType::Wildcard, batch_size)
    }

    /// Human readable identity used in diagnostics, e.g. `orders(customer_id) ALL`.
    pub fn identity(&self) -> String {
        format!(
            "{}({}) {}",
            self.table,
            self.columns.join(", "),
            self.columns_type
        )
    }
}

/// The part of a join condition matched against an index
///
/// `columns[i]` is the inner column compared with element `i` of every
/// submitted `OrdinalValues` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPredicate {
    pub index: Index,
    pub columns: Vec<String>,
}

impl IndexPredicate {
    pub fn new(index: Index, columns: Vec<String>) -> Self {
        Self { index, columns }
    }
}

/// A table referenced by the plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSource {
    pub table: String,
    pub alias: String,
    /// Ordinal assigned when the plan was built
    pub tuple_ordinal: usize,
}

impl TableSource {
    pub fn new(table: impl Into<String>, alias: impl Into<String>, tuple_ordinal: usize) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            tuple_ordinal,
        }
    }
}

/// Arguments for creating a scan or index operator
#[derive(Debug, Clone)]
pub struct OperatorArgs {
    pub node_id: NodeId,
    pub table_source: TableSource,
    /// Filter pushed down from the join (constant comparisons)
    pub predicate: Option<ExprRef>,
}

impl OperatorArgs {
    pub fn new(node_id: NodeId, table_source: TableSource) -> Self {
        Self {
            node_id,
            table_source,
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: Option<ExprRef>) -> Self {
        self.predicate = predicate;
        self
    }
}

/// Catalog SPI
pub trait Catalog: Send + Sync {
    fn name(&self) -> &str;

    /// Indexes declared for `table`, in preference order.
    fn get_indices(&self, table: &str) -> Vec<Index>;

    /// Operator reading every row of a table.
    fn get_scan_operator(&self, args: OperatorArgs) -> Result<OperatorRef>;

    /// Operator reading the rows matching keys from the outer-values channel.
    fn get_index_operator(
        &self,
        args: OperatorArgs,
        predicate: IndexPredicate,
    ) -> Result<OperatorRef>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_type_parse() {
        assert_eq!(
            "any_in_order".parse::<ColumnsType>().unwrap(),
            ColumnsType::AnyInOrder
        );
        assert_eq!(ColumnsType::Wildcard.to_string(), "WILDCARD");
        assert!("some".parse::<ColumnsType>().is_err());
    }

    #[test]
    fn test_index_identity() {
        let index = Index::new("orders", &["customer_id", "region"], ColumnsType::All, 100);
        assert_eq!(index.identity(), "orders(customer_id, region) ALL");
    }
}
