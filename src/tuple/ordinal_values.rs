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

//! Ordinal values: the fixed-size key used for hash joins, grouping,
//! caching and index lookups.
//!
//! The hash is computed once when the key is built (FxHash over the
//! values, with a fast path for a single integer key like the join hash
//! table uses) and reused by every map the key lands in.

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use smallvec::SmallVec;

use super::Tuple;
use crate::core::value::float_hash_bits;
use crate::core::{Result, Value};
use crate::executor::context::ExecutionContext;
use crate::executor::expression::ExprRef;

/// Fixed, order-significant key values
#[derive(Clone)]
pub struct OrdinalValues {
    values: SmallVec<[Value; 2]>,
    hash: u64,
}

impl OrdinalValues {
    /// Build a key from values, computing its hash.
    pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
        let values: SmallVec<[Value; 2]> = values.into_iter().collect();
        let hash = hash_values(&values);
        Self { values, hash }
    }

    /// Number of key parts.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Key part at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The precomputed hash.
    #[inline]
    pub fn hash_code(&self) -> u64 {
        self.hash
    }

    /// Returns true if any part is NULL; such keys never match anything.
    pub fn has_null(&self) -> bool {
        self.values.iter().any(Value::is_null)
    }
}

impl PartialEq for OrdinalValues {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.values == other.values
    }
}

impl Eq for OrdinalValues {}

impl Hash for OrdinalValues {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for OrdinalValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.iter()).finish()
    }
}

impl fmt::Display for OrdinalValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

/// Hash key values into a single u64.
///
/// Must agree with `Value`'s equality: Integer 5 and Float 5.0 hash alike.
#[inline]
pub fn hash_values(values: &[Value]) -> u64 {
    // Fast path for a single numeric key (most common case: id joins)
    match values {
        [Value::Integer(i)] => return float_hash_bits(*i as f64).wrapping_mul(0x517cc1b727220a95),
        [Value::Float(f)] => return float_hash_bits(*f).wrapping_mul(0x517cc1b727220a95),
        _ => {}
    }

    let mut hasher = FxHasher::default();
    for value in values {
        value.hash(&mut hasher);
    }
    hasher.finish()
}

/// Builds [`OrdinalValues`] by evaluating expressions against a tuple
#[derive(Debug, Clone)]
pub struct OrdinalValuesFactory {
    expressions: Vec<ExprRef>,
}

impl OrdinalValuesFactory {
    pub fn new(expressions: Vec<ExprRef>) -> Self {
        Self { expressions }
    }

    /// Number of key parts produced.
    #[inline]
    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    pub fn expressions(&self) -> &[ExprRef] {
        &self.expressions
    }

    /// Evaluate against the context's current tuple.
    pub fn create(&self, ctx: &ExecutionContext) -> Result<OrdinalValues> {
        let mut values = SmallVec::<[Value; 2]>::with_capacity(self.expressions.len());
        for expr in &self.expressions {
            values.push(expr.evaluate(ctx)?);
        }
        Ok(OrdinalValues::new(values))
    }

    /// Evaluate with `tuple` as the current tuple, restoring the previous
    /// one afterwards.
    pub fn create_for(&self, ctx: &mut ExecutionContext, tuple: &Tuple) -> Result<OrdinalValues> {
        let previous = ctx.replace_tuple(Some(tuple.clone()));
        let result = self.create(ctx);
        ctx.replace_tuple(previous);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_value_equality_and_hash() {
        let a = OrdinalValues::new([Value::integer(1), Value::text("x")]);
        let b = OrdinalValues::new([Value::integer(1), Value::text("x")]);
        let c = OrdinalValues::new([Value::text("x"), Value::integer(1)]);

        assert_eq!(a, b);
        assert_eq!(a.hash_code(), b.hash_code());
        assert_ne!(a, c);

        let set: FxHashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_integer_float_keys_agree() {
        let i = OrdinalValues::new([Value::integer(5)]);
        let f = OrdinalValues::new([Value::float(5.0)]);
        assert_eq!(i.hash_code(), f.hash_code());
        assert_eq!(i, f);
    }

    #[test]
    fn test_signed_zero_and_nan_keys_agree() {
        let zero = OrdinalValues::new([Value::integer(0)]);
        let negative = OrdinalValues::new([Value::float(-0.0)]);
        assert_eq!(zero.hash_code(), negative.hash_code());
        assert_eq!(zero, negative);

        let nan = OrdinalValues::new([Value::float(f64::NAN)]);
        let other_nan = OrdinalValues::new([Value::float(-f64::NAN)]);
        assert_eq!(nan, other_nan);

        let pair = OrdinalValues::new([Value::float(-0.0), Value::text("x")]);
        let other = OrdinalValues::new([Value::integer(0), Value::text("x")]);
        assert_eq!(pair, other);
    }

    #[test]
    fn test_has_null() {
        assert!(OrdinalValues::new([Value::integer(1), Value::null_unknown()]).has_null());
        assert!(!OrdinalValues::new([Value::integer(1)]).has_null());
    }
}
