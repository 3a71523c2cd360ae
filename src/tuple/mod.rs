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

//! Tuple model
//!
//! A [`Tuple`] is one logical row, possibly spanning several table sources.
//! Every table source in a plan gets a tuple ordinal when the plan is
//! built; [`Tuple::tuple`] navigates a composed row to the part belonging
//! to a given ordinal.
//!
//! ```text
//! Composite [ a(0) , Collection { b(1), b(1) } ]
//!     │                 │
//!     │                 └── populating join: many inner rows, one slot
//!     └── horizontal join: one constituent per table source
//! ```
//!
//! All variants are `Arc`-backed, so cloning a tuple never copies row
//! data. In-place growth (appending to a composite, adding to a
//! collection) goes through `Arc::make_mut`, which mutates directly when
//! the tuple is uniquely held and copies the (shallow) container otherwise.

use std::fmt;
use std::sync::Arc;

pub mod collection;
pub mod composite;
pub mod computed;
pub mod grouped;
pub mod ordinal_values;
pub mod row;

pub use collection::CollectionTuple;
pub use composite::CompositeTuple;
pub use computed::{ComputedTuple, COMPUTED_COLUMN_ORDINAL_BASE};
pub use grouped::{GroupedOrdinalRow, GroupedRow, GroupingOrdinals, ValueSequence};
pub use ordinal_values::{hash_values, OrdinalValues, OrdinalValuesFactory};
pub use row::{RowTuple, TableSchema};

use crate::core::Value;

/// One logical row
#[derive(Debug, Clone)]
pub enum Tuple {
    /// A plain row of one table source
    Row(Arc<RowTuple>),
    /// Horizontal composition of joined table sources
    Composite(Arc<CompositeTuple>),
    /// Inner rows collected under one outer row
    Collection(Arc<CollectionTuple>),
    /// One GROUP BY group
    Grouped(Arc<GroupedRow>),
    /// A group seen through a nested table source
    GroupedOrdinal(Arc<GroupedOrdinalRow>),
    /// A tuple with computed columns
    Computed(Arc<ComputedTuple>),
}

impl Tuple {
    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn row(row: RowTuple) -> Self {
        Tuple::Row(Arc::new(row))
    }

    pub fn composite(composite: CompositeTuple) -> Self {
        Tuple::Composite(Arc::new(composite))
    }

    pub fn collection(collection: CollectionTuple) -> Self {
        Tuple::Collection(Arc::new(collection))
    }

    pub fn grouped(grouped: GroupedRow) -> Self {
        Tuple::Grouped(Arc::new(grouped))
    }

    pub fn computed(computed: ComputedTuple) -> Self {
        Tuple::Computed(Arc::new(computed))
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// The table-source ordinal this tuple belongs to.
    ///
    /// Composites and collections report the ordinal of their first
    /// constituent.
    pub fn tuple_ordinal(&self) -> usize {
        match self {
            Tuple::Row(r) => r.tuple_ordinal(),
            Tuple::Composite(c) => c.first().tuple_ordinal(),
            Tuple::Collection(c) => c.first().tuple_ordinal(),
            Tuple::Grouped(g) => g.tuple_ordinal(),
            Tuple::GroupedOrdinal(g) => g.tuple_ordinal(),
            Tuple::Computed(c) => c.inner().tuple_ordinal(),
        }
    }

    /// Navigate to the tuple of table source `tuple_ordinal`.
    ///
    /// Returns the tuple itself when the ordinal is its own and `None` when
    /// the ordinal is not reachable from here.
    pub fn tuple(&self, tuple_ordinal: usize) -> Option<Tuple> {
        if self.tuple_ordinal() == tuple_ordinal {
            return Some(self.clone());
        }
        match self {
            Tuple::Row(_) => None,
            Tuple::Composite(c) => c.find(tuple_ordinal),
            Tuple::Collection(c) => c.first().tuple(tuple_ordinal),
            Tuple::Grouped(g) => g.nested(tuple_ordinal),
            Tuple::GroupedOrdinal(g) => g.nested(tuple_ordinal),
            Tuple::Computed(c) => c.inner().tuple(tuple_ordinal),
        }
    }

    // =========================================================================
    // Column reflection
    // =========================================================================

    /// Number of schema columns of this tuple's own table source.
    pub fn column_count(&self) -> usize {
        match self {
            Tuple::Row(r) => r.schema().column_count(),
            Tuple::Composite(c) => c.first().column_count(),
            Tuple::Collection(c) => c.first().column_count(),
            Tuple::Grouped(g) => g.first().column_count(),
            Tuple::GroupedOrdinal(g) => g.first().column_count(),
            Tuple::Computed(c) => c.inner().column_count(),
        }
    }

    pub fn column_name(&self, ordinal: usize) -> Option<Arc<str>> {
        match self {
            Tuple::Row(r) => r.schema().column_name(ordinal).cloned(),
            Tuple::Composite(c) => c.first().column_name(ordinal),
            Tuple::Collection(c) => c.first().column_name(ordinal),
            Tuple::Grouped(g) => g.first().column_name(ordinal),
            Tuple::GroupedOrdinal(g) => g.first().column_name(ordinal),
            Tuple::Computed(c) => c.column_name(ordinal),
        }
    }

    pub fn column_ordinal(&self, name: &str) -> Option<usize> {
        match self {
            Tuple::Row(r) => r.schema().column_ordinal(name),
            Tuple::Composite(c) => c.first().column_ordinal(name),
            Tuple::Collection(c) => c.first().column_ordinal(name),
            Tuple::Grouped(g) => g.first().column_ordinal(name),
            Tuple::GroupedOrdinal(g) => g.first().column_ordinal(name),
            Tuple::Computed(c) => c.column_ordinal(name),
        }
    }

    /// Schema of the underlying plain row, when there is exactly one.
    ///
    /// Computed tuples return `None` since their names are not part of the
    /// schema.
    pub fn schema(&self) -> Option<&Arc<TableSchema>> {
        match self {
            Tuple::Row(r) => Some(r.schema()),
            Tuple::Composite(c) => c.first().schema(),
            Tuple::Collection(c) => c.first().schema(),
            Tuple::Grouped(g) => g.first().schema(),
            Tuple::GroupedOrdinal(g) => g.first().schema(),
            Tuple::Computed(_) => None,
        }
    }

    /// Value of column `ordinal` of this tuple's own table source.
    ///
    /// Out-of-range ordinals read as NULL. Grouped tuples return a
    /// [`Value::Sequence`] for non-grouping columns.
    pub fn value(&self, ordinal: usize) -> Value {
        match self {
            Tuple::Row(r) => r.value(ordinal),
            Tuple::Composite(c) => c.first().value(ordinal),
            Tuple::Collection(c) => c.first().value(ordinal),
            Tuple::Grouped(g) => g.value(ordinal),
            Tuple::GroupedOrdinal(g) => g.value(ordinal),
            Tuple::Computed(c) => c.value(ordinal),
        }
    }

    // =========================================================================
    // Variant access
    // =========================================================================

    pub fn as_composite(&self) -> Option<&CompositeTuple> {
        match self {
            Tuple::Composite(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionTuple> {
        match self {
            Tuple::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_grouped(&self) -> Option<&GroupedRow> {
        match self {
            Tuple::Grouped(g) => Some(g),
            _ => None,
        }
    }

    /// Copy-on-write access to a composite.
    pub fn composite_mut(&mut self) -> Option<&mut CompositeTuple> {
        match self {
            Tuple::Composite(c) => Some(Arc::make_mut(c)),
            _ => None,
        }
    }

    /// Copy-on-write access to a collection.
    pub fn collection_mut(&mut self) -> Option<&mut CollectionTuple> {
        match self {
            Tuple::Collection(c) => Some(Arc::make_mut(c)),
            _ => None,
        }
    }

    /// Short variant name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Tuple::Row(_) => "row",
            Tuple::Composite(_) => "composite",
            Tuple::Collection(_) => "collection",
            Tuple::Grouped(_) => "grouped",
            Tuple::GroupedOrdinal(_) => "grouped ordinal",
            Tuple::Computed(_) => "computed",
        }
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Returns true if both handles point at the same tuple.
    pub fn ptr_eq(&self, other: &Tuple) -> bool {
        self.addr() == other.addr()
    }

    /// Address of the shared tuple data.
    pub fn addr(&self) -> usize {
        match self {
            Tuple::Row(r) => Arc::as_ptr(r) as *const () as usize,
            Tuple::Composite(c) => Arc::as_ptr(c) as *const () as usize,
            Tuple::Collection(c) => Arc::as_ptr(c) as *const () as usize,
            Tuple::Grouped(g) => Arc::as_ptr(g) as *const () as usize,
            Tuple::GroupedOrdinal(g) => Arc::as_ptr(g) as *const () as usize,
            Tuple::Computed(c) => Arc::as_ptr(c) as *const () as usize,
        }
    }
}

impl From<RowTuple> for Tuple {
    fn from(row: RowTuple) -> Self {
        Tuple::row(row)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tuple::Row(r) => write!(f, "{}", r),
            Tuple::Composite(c) => write!(f, "{}", c),
            Tuple::Collection(c) => write!(f, "{}", c),
            Tuple::Grouped(g) => write!(f, "{}", g),
            Tuple::GroupedOrdinal(g) => write!(f, "{}", g),
            Tuple::Computed(c) => write!(f, "{}", c),
        }
    }
}
