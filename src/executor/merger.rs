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

//! Combining outer and inner tuples of a join.
//!
//! Non-populating merges produce one composite per match. Populating merges
//! collect every match for an outer row into a single collection slot and
//! grow that slot in place on later matches.

use std::fmt;

use crate::core::{Error, Result};
use crate::tuple::{CollectionTuple, CompositeTuple, Tuple};

/// Builds the joined tuple for one (outer, inner) match
pub trait TupleMerger: Send + Sync + fmt::Debug {
    /// Merge `inner` into `outer`.
    ///
    /// With `populating`, `outer` may be the result of an earlier merge for
    /// the same outer row; the inner tuple is then added to its collection.
    fn merge(&self, outer: Tuple, inner: Tuple, populating: bool) -> Result<Tuple>;
}

/// Composite/collection merger used by both join operators
#[derive(Debug, Clone)]
pub struct DefaultTupleMerger {
    /// Tuple ordinal of the inner table source
    inner_tuple_ordinal: usize,
    /// Constituents expected in a composite at this join level
    composite_tuple_count: usize,
}

impl DefaultTupleMerger {
    pub fn new(inner_tuple_ordinal: usize, composite_tuple_count: usize) -> Self {
        Self {
            inner_tuple_ordinal,
            composite_tuple_count: composite_tuple_count.max(2),
        }
    }

    pub fn inner_tuple_ordinal(&self) -> usize {
        self.inner_tuple_ordinal
    }

    /// Append to an outer composite with room left, else start a new one.
    fn compose(&self, mut outer: Tuple, inner: Tuple) -> Tuple {
        if let Some(composite) = outer.as_composite() {
            if composite.can_append() {
                if let Some(composite) = outer.composite_mut() {
                    composite.add_tuple(inner);
                }
                return outer;
            }
        }
        Tuple::composite(CompositeTuple::new(
            outer,
            inner,
            self.composite_tuple_count,
        ))
    }
}

impl TupleMerger for DefaultTupleMerger {
    fn merge(&self, mut outer: Tuple, inner: Tuple, populating: bool) -> Result<Tuple> {
        if !populating {
            return Ok(self.compose(outer, inner));
        }

        let ordinal = self.inner_tuple_ordinal;
        let position = outer
            .as_composite()
            .and_then(|composite| composite.position_of(ordinal));

        if let Some(position) = position {
            // Uniquely held while the join owns the current outer row, so
            // this mutates in place
            let slot = outer
                .composite_mut()
                .and_then(|composite| composite.get_mut(position))
                .ok_or_else(|| {
                    Error::tuple_merge(format!("composite slot {} vanished", position))
                })?;
            let kind = slot.kind();
            match slot.collection_mut() {
                Some(collection) => collection.add_tuple(inner),
                None => {
                    return Err(Error::tuple_merge(format!(
                        "expected a collection for tuple ordinal {} but found a {} tuple",
                        ordinal, kind
                    )))
                }
            }
            return Ok(outer);
        }

        let collection = Tuple::collection(CollectionTuple::new(inner));
        Ok(self.compose(outer, collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::tuple::test_support::{composite, row};

    fn a(v: i64) -> Tuple {
        row(0, "a", &[Value::integer(v)])
    }

    fn b(v: i64) -> Tuple {
        row(1, "b", &[Value::integer(v)])
    }

    #[test]
    fn test_non_populating_creates_one_row_per_match() {
        let merger = DefaultTupleMerger::new(1, 2);
        let outer = a(1);

        let m1 = merger.merge(outer.clone(), b(10), false).unwrap();
        let m2 = merger.merge(outer.clone(), b(20), false).unwrap();

        assert_eq!(m1.to_string(), "[a(1), b(10)]");
        assert_eq!(m2.to_string(), "[a(1), b(20)]");
    }

    #[test]
    fn test_appends_while_room_left() {
        let merger = DefaultTupleMerger::new(2, 3);
        let outer = Tuple::composite(CompositeTuple::new(a(1), b(2), 3));
        let c = row(2, "c", &[Value::integer(3)]);

        let merged = merger.merge(outer.clone(), c, false).unwrap();
        assert_eq!(merged.as_composite().unwrap().len(), 3);
        // Shared outer untouched
        assert_eq!(outer.as_composite().unwrap().len(), 2);

        // Full composite nests instead
        let d = row(3, "d", &[Value::integer(4)]);
        let nested = DefaultTupleMerger::new(3, 2).merge(merged, d, false).unwrap();
        assert_eq!(nested.as_composite().unwrap().len(), 2);
        assert_eq!(nested.tuple(3).unwrap().value(0), Value::integer(4));
        assert_eq!(nested.tuple(2).unwrap().value(0), Value::integer(3));
    }

    #[test]
    fn test_populating_collects_into_one_slot() {
        let merger = DefaultTupleMerger::new(1, 2);

        let first = merger.merge(a(1), b(10), true).unwrap();
        let second = merger.merge(first, b(20), true).unwrap();
        let third = merger.merge(second, b(30), true).unwrap();

        assert_eq!(third.to_string(), "[a(1), {b(10), b(20), b(30)}]");
        let slot = third.tuple(1).unwrap();
        assert_eq!(slot.as_collection().unwrap().len(), 3);
    }

    #[test]
    fn test_populating_into_non_collection_slot_fails() {
        let merger = DefaultTupleMerger::new(1, 2);
        let outer = composite(a(1), b(10));

        let err = merger.merge(outer, b(20), true).unwrap_err();
        assert!(matches!(err, Error::TupleMerge { .. }));
    }
}
