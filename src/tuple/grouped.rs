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

//! GROUP BY result rows.
//!
//! A [`GroupedRow`] owns the rows of one group. Columns that are grouping
//! ordinals (identical across the whole group) resolve to the first row's
//! scalar; every other column resolves to a [`ValueSequence`] with one value
//! per row, which is what aggregate functions consume.
//!
//! Nested table sources are reached through [`GroupedOrdinalRow`] views.
//! A view shares the group's row list, never the `GroupedRow` itself, so
//! there is no ownership cycle between a row and its cached views.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use super::Tuple;
use crate::core::{Error, Result, Value};

/// Grouping column ordinals per tuple ordinal.
pub type GroupingOrdinals = FxHashMap<usize, FxHashSet<usize>>;

#[inline]
fn is_grouping(grouping: &GroupingOrdinals, tuple_ordinal: usize, column: usize) -> bool {
    grouping
        .get(&tuple_ordinal)
        .is_some_and(|cols| cols.contains(&column))
}

// ============================================================================
// ValueSequence
// ============================================================================

/// Lazy per-row values of one column across a group.
///
/// Iteration restarts from the first row on every [`ValueSequence::iter`]
/// call; nothing is materialized.
#[derive(Clone)]
pub struct ValueSequence {
    rows: Arc<[Tuple]>,
    /// Table source to navigate to in each row; `None` reads the row itself
    tuple_ordinal: Option<usize>,
    column: usize,
}

impl ValueSequence {
    pub fn new(rows: Arc<[Tuple]>, tuple_ordinal: Option<usize>, column: usize) -> Self {
        Self {
            rows,
            tuple_ordinal,
            column,
        }
    }

    /// Number of values (the group size).
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value for row `index`.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.rows.get(index).map(|row| self.resolve(row))
    }

    /// A fresh iterator over the group's values.
    pub fn iter(&self) -> ValueSequenceIter<'_> {
        ValueSequenceIter {
            sequence: self,
            position: 0,
        }
    }

    fn resolve(&self, row: &Tuple) -> Value {
        match self.tuple_ordinal {
            None => row.value(self.column),
            Some(ordinal) => row
                .tuple(ordinal)
                .map(|t| t.value(self.column))
                .unwrap_or_else(Value::null_unknown),
        }
    }
}

impl fmt::Debug for ValueSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSequence")
            .field("len", &self.rows.len())
            .field("tuple_ordinal", &self.tuple_ordinal)
            .field("column", &self.column)
            .finish()
    }
}

/// Iterator returned by [`ValueSequence::iter`].
pub struct ValueSequenceIter<'a> {
    sequence: &'a ValueSequence,
    position: usize,
}

impl Iterator for ValueSequenceIter<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let row = self.sequence.rows.get(self.position)?;
        self.position += 1;
        Some(self.sequence.resolve(row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.sequence.rows.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ValueSequenceIter<'_> {}

// ============================================================================
// GroupedRow
// ============================================================================

/// One group produced by the group-by operator
#[derive(Debug)]
pub struct GroupedRow {
    rows: Arc<[Tuple]>,
    tuple_ordinal: usize,
    grouping_ordinals: Arc<GroupingOrdinals>,
    /// Nested views by tuple ordinal, `None` when unreachable
    views: Mutex<FxHashMap<usize, Option<Tuple>>>,
}

impl GroupedRow {
    /// Create a grouped row. The row list must not be empty.
    pub fn new(rows: Vec<Tuple>, grouping_ordinals: Arc<GroupingOrdinals>) -> Result<Self> {
        let tuple_ordinal = rows
            .first()
            .map(Tuple::tuple_ordinal)
            .ok_or_else(|| Error::invalid_state("a grouped row needs at least one row"))?;
        Ok(Self {
            rows: rows.into(),
            tuple_ordinal,
            grouping_ordinals,
            views: Mutex::new(FxHashMap::default()),
        })
    }

    #[inline]
    pub fn tuple_ordinal(&self) -> usize {
        self.tuple_ordinal
    }

    /// Number of rows in the group.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Tuple] {
        &self.rows
    }

    #[inline]
    pub fn first(&self) -> &Tuple {
        &self.rows[0]
    }

    /// Returns true if `column` of this group's own table source is a
    /// grouping ordinal.
    pub fn is_grouping_ordinal(&self, column: usize) -> bool {
        is_grouping(&self.grouping_ordinals, self.tuple_ordinal, column)
    }

    /// Scalar for grouping ordinals, a per-row sequence otherwise.
    pub fn value(&self, column: usize) -> Value {
        if self.is_grouping_ordinal(column) {
            self.first().value(column)
        } else {
            Value::Sequence(ValueSequence::new(self.rows.clone(), None, column))
        }
    }

    /// Nested view for another table source, built once and cached.
    pub(crate) fn nested(&self, tuple_ordinal: usize) -> Option<Tuple> {
        let mut views = self.views.lock();
        views
            .entry(tuple_ordinal)
            .or_insert_with(|| {
                GroupedOrdinalRow::build(
                    self.rows.clone(),
                    tuple_ordinal,
                    self.grouping_ordinals.clone(),
                )
                .map(|view| Tuple::GroupedOrdinal(Arc::new(view)))
            })
            .clone()
    }
}

impl fmt::Display for GroupedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group<")?;
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", row)?;
        }
        write!(f, ">")
    }
}

// ============================================================================
// GroupedOrdinalRow
// ============================================================================

/// A group seen through one nested table source
#[derive(Debug)]
pub struct GroupedOrdinalRow {
    rows: Arc<[Tuple]>,
    tuple_ordinal: usize,
    grouping_ordinals: Arc<GroupingOrdinals>,
    /// First reachable sub-tuple, used for grouping scalars and reflection
    first: Tuple,
}

impl GroupedOrdinalRow {
    /// Build a view, or `None` when no row reaches `tuple_ordinal`.
    pub(crate) fn build(
        rows: Arc<[Tuple]>,
        tuple_ordinal: usize,
        grouping_ordinals: Arc<GroupingOrdinals>,
    ) -> Option<Self> {
        let first = rows.iter().find_map(|row| row.tuple(tuple_ordinal))?;
        Some(Self {
            rows,
            tuple_ordinal,
            grouping_ordinals,
            first,
        })
    }

    #[inline]
    pub fn tuple_ordinal(&self) -> usize {
        self.tuple_ordinal
    }

    #[inline]
    pub fn first(&self) -> &Tuple {
        &self.first
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, column: usize) -> Value {
        if is_grouping(&self.grouping_ordinals, self.tuple_ordinal, column) {
            self.first.value(column)
        } else {
            Value::Sequence(ValueSequence::new(
                self.rows.clone(),
                Some(self.tuple_ordinal),
                column,
            ))
        }
    }

    /// View for yet another table source (not cached).
    pub(crate) fn nested(&self, tuple_ordinal: usize) -> Option<Tuple> {
        GroupedOrdinalRow::build(
            self.rows.clone(),
            tuple_ordinal,
            self.grouping_ordinals.clone(),
        )
        .map(|view| Tuple::GroupedOrdinal(Arc::new(view)))
    }
}

impl fmt::Display for GroupedOrdinalRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}<{} rows>", self.tuple_ordinal, self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::test_support::{composite, row};

    fn grouping(entries: &[(usize, &[usize])]) -> Arc<GroupingOrdinals> {
        let mut map = GroupingOrdinals::default();
        for (ordinal, cols) in entries {
            map.insert(*ordinal, cols.iter().copied().collect());
        }
        Arc::new(map)
    }

    #[test]
    fn test_empty_group_rejected() {
        assert!(GroupedRow::new(Vec::new(), grouping(&[])).is_err());
    }

    #[test]
    fn test_grouping_column_is_scalar() {
        let rows = vec![
            row(0, "t", &[Value::integer(1), Value::integer(10)]),
            row(0, "t", &[Value::integer(1), Value::integer(20)]),
            row(0, "t", &[Value::integer(1), Value::integer(30)]),
        ];
        let group = GroupedRow::new(rows, grouping(&[(0, &[0])])).unwrap();

        assert_eq!(group.value(0), Value::integer(1));

        let seq = group.value(1);
        let seq = seq.as_sequence().unwrap();
        assert_eq!(seq.len(), 3);
        let values: Vec<_> = seq.iter().collect();
        assert_eq!(
            values,
            vec![Value::integer(10), Value::integer(20), Value::integer(30)]
        );
        // Restartable
        assert_eq!(seq.iter().count(), 3);
    }

    #[test]
    fn test_nested_view_cached_and_scoped() {
        let rows = vec![
            composite(
                row(0, "a", &[Value::integer(1)]),
                row(1, "b", &[Value::integer(7), Value::text("x")]),
            ),
            composite(
                row(0, "a", &[Value::integer(2)]),
                row(1, "b", &[Value::integer(7), Value::text("y")]),
            ),
        ];
        let group = GroupedRow::new(rows, grouping(&[(1, &[0])])).unwrap();

        let view = group.nested(1).unwrap();
        let again = group.nested(1).unwrap();
        assert!(view.ptr_eq(&again));

        assert_eq!(view.value(0), Value::integer(7));
        let names = view.value(1);
        let names: Vec<_> = names.as_sequence().unwrap().iter().collect();
        assert_eq!(names, vec![Value::text("x"), Value::text("y")]);

        // Ordinal 0 has no grouping columns
        assert!(group.value(0).as_sequence().is_some());
        assert!(group.nested(5).is_none());
    }
}
