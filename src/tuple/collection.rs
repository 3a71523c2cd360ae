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

//! Vertical composition: inner rows collected under one outer row

use std::fmt;

use super::Tuple;
use crate::common::OneOrMany;

/// Inner tuples matched to one outer tuple by a populating join.
///
/// Acts as a single tuple by delegating to its first row (all rows share
/// one schema) and as a list for rendering every accumulated row.
#[derive(Debug, Clone)]
pub struct CollectionTuple {
    tuples: OneOrMany<Tuple>,
}

impl CollectionTuple {
    /// Start a collection with its first matched row.
    pub fn new(first: Tuple) -> Self {
        Self {
            tuples: OneOrMany::one(first),
        }
    }

    /// Add another matched row.
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
    pub fn get(&self, index: usize) -> Option<&Tuple> {
        self.tuples.get(index)
    }

    /// The row column lookups delegate to.
    #[inline]
    pub fn first(&self) -> &Tuple {
        // Invariant: created from one row and only ever grows
        &self.tuples.as_slice()[0]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tuple> {
        self.tuples.iter()
    }

    pub fn tuples(&self) -> &[Tuple] {
        self.tuples.as_slice()
    }
}

impl fmt::Display for CollectionTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, t) in self.tuples.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::tuple::test_support::row;

    #[test]
    fn test_add_tuple_keeps_order() {
        let r1 = row(1, "b", &[Value::integer(1)]);
        let r2 = row(1, "b", &[Value::integer(2)]);

        let mut collection = CollectionTuple::new(r1.clone());
        assert_eq!(collection.len(), 1);

        collection.add_tuple(r2.clone());
        assert_eq!(collection.len(), 2);
        assert!(collection.get(0).unwrap().ptr_eq(&r1));
        assert!(collection.get(1).unwrap().ptr_eq(&r2));
        assert_eq!(collection.to_string(), "{b(1), b(2)}");
    }
}
