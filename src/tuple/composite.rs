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

//! Horizontal composition of table-source tuples.
//!
//! A join at one nesting level produces a `CompositeTuple` holding one
//! constituent per joined table source. Unlike the flat `[left, right]`
//! concatenation a relational engine would do, constituents stay separate
//! so column lookups are resolved per table source by tuple ordinal.

use std::fmt;

use super::Tuple;

/// Ordered constituents of one joined row
#[derive(Debug, Clone)]
pub struct CompositeTuple {
    tuples: Vec<Tuple>,
    /// Number of constituents this level expects once fully joined
    composite_tuple_count: usize,
}

impl CompositeTuple {
    /// Create a composite from an outer and an inner tuple.
    ///
    /// Room is reserved for exactly `composite_tuple_count` constituents so
    /// later appends at the same level never reallocate.
    pub fn new(outer: Tuple, inner: Tuple, composite_tuple_count: usize) -> Self {
        let count = composite_tuple_count.max(2);
        let mut tuples = Vec::with_capacity(count);
        tuples.push(outer);
        tuples.push(inner);
        Self {
            tuples,
            composite_tuple_count: count,
        }
    }

    /// Returns true while fewer than the expected constituents are present.
    #[inline]
    pub fn can_append(&self) -> bool {
        self.tuples.len() < self.composite_tuple_count
    }

    /// Append a constituent.
    #[inline]
    pub fn add_tuple(&mut self, tuple: Tuple) {
        self.tuples.push(tuple);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    #[inline]
    pub fn composite_tuple_count(&self) -> usize {
        self.composite_tuple_count
    }

    /// Allocated constituent slots.
    pub fn capacity(&self) -> usize {
        self.tuples.capacity()
    }

    /// Constituent at position `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Tuple> {
        self.tuples.get(index)
    }

    /// The first constituent; column reflection delegates to it.
    #[inline]
    pub fn first(&self) -> &Tuple {
        // Invariant: constructed with two constituents, never shrinks
        &self.tuples[0]
    }

    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }

    /// Position of the constituent whose own ordinal is `tuple_ordinal`.
    pub fn position_of(&self, tuple_ordinal: usize) -> Option<usize> {
        self.tuples
            .iter()
            .position(|t| t.tuple_ordinal() == tuple_ordinal)
    }

    /// Mutable access to a constituent (used by populating merges).
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Tuple> {
        self.tuples.get_mut(index)
    }

    /// First constituent that can reach `tuple_ordinal`.
    pub fn find(&self, tuple_ordinal: usize) -> Option<Tuple> {
        self.tuples.iter().find_map(|t| t.tuple(tuple_ordinal))
    }
}

impl fmt::Display for CompositeTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, t) in self.tuples.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::tuple::test_support::row;

    #[test]
    fn test_append_never_reallocates_beyond_count() {
        let mut composite = CompositeTuple::new(
            row(0, "a", &[Value::integer(1)]),
            row(1, "b", &[Value::integer(2)]),
            4,
        );
        assert_eq!(composite.capacity(), 4);
        assert!(composite.can_append());

        composite.add_tuple(row(2, "c", &[Value::integer(3)]));
        composite.add_tuple(row(3, "d", &[Value::integer(4)]));
        assert!(!composite.can_append());
        assert_eq!(composite.len(), 4);
        assert_eq!(composite.capacity(), 4);
    }

    #[test]
    fn test_find_by_ordinal() {
        let composite = CompositeTuple::new(
            row(0, "a", &[Value::integer(1)]),
            row(1, "b", &[Value::integer(2)]),
            2,
        );
        assert_eq!(composite.position_of(1), Some(1));
        assert_eq!(
            composite.find(1).map(|t| t.value(0)),
            Some(Value::integer(2))
        );
        assert!(composite.find(7).is_none());
        assert_eq!(composite.to_string(), "[a(1), b(2)]");
    }
}
