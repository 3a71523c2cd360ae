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

//! Tuples carrying computed (non-schema) columns

use std::fmt;
use std::sync::Arc;

use super::Tuple;
use crate::core::Value;

/// First ordinal addressing a computed column.
///
/// Computed column `i` of a [`ComputedTuple`] lives at
/// `COMPUTED_COLUMN_ORDINAL_BASE + i`.
pub const COMPUTED_COLUMN_ORDINAL_BASE: usize = 1 << 16;

/// A tuple extended with computed values
#[derive(Debug, Clone)]
pub struct ComputedTuple {
    inner: Tuple,
    names: Arc<[Arc<str>]>,
    values: Vec<Value>,
}

impl ComputedTuple {
    pub fn new(inner: Tuple, names: Arc<[Arc<str>]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self {
            inner,
            names,
            values,
        }
    }

    /// The wrapped tuple.
    #[inline]
    pub fn inner(&self) -> &Tuple {
        &self.inner
    }

    pub fn value(&self, ordinal: usize) -> Value {
        if ordinal >= COMPUTED_COLUMN_ORDINAL_BASE {
            return self
                .values
                .get(ordinal - COMPUTED_COLUMN_ORDINAL_BASE)
                .cloned()
                .unwrap_or_else(Value::null_unknown);
        }
        self.inner.value(ordinal)
    }

    pub fn column_name(&self, ordinal: usize) -> Option<Arc<str>> {
        if ordinal >= COMPUTED_COLUMN_ORDINAL_BASE {
            return self
                .names
                .get(ordinal - COMPUTED_COLUMN_ORDINAL_BASE)
                .cloned();
        }
        self.inner.column_name(ordinal)
    }

    /// Computed names shadow the wrapped tuple's columns.
    pub fn column_ordinal(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .map(|i| COMPUTED_COLUMN_ORDINAL_BASE + i)
            .or_else(|| self.inner.column_ordinal(name))
    }
}

impl fmt::Display for ComputedTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)?;
        for (name, value) in self.names.iter().zip(self.values.iter()) {
            write!(f, " {}={}", name, value)?;
        }
        Ok(())
    }
}
