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

//! Table schemas and the plain row tuples catalogs produce

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::{Error, Result, Value};

/// Column layout of one table source
///
/// Column lookups are case-insensitive; names keep their declared casing.
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Table name (for display and error messages)
    pub name: String,
    columns: Vec<Arc<str>>,
    /// Lower-cased column name -> ordinal
    column_map: FxHashMap<String, usize>,
}

impl TableSchema {
    /// Create a new schema from column names.
    pub fn new<S: AsRef<str>>(name: impl Into<String>, columns: &[S]) -> Self {
        let columns: Vec<Arc<str>> = columns.iter().map(|c| Arc::from(c.as_ref())).collect();
        let mut column_map = FxHashMap::default();
        for (i, col) in columns.iter().enumerate() {
            // First declaration wins on duplicates
            column_map.entry(col.to_lowercase()).or_insert(i);
        }
        Self {
            name: name.into(),
            columns,
            column_map,
        }
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Name of the column at `ordinal`.
    #[inline]
    pub fn column_name(&self, ordinal: usize) -> Option<&Arc<str>> {
        self.columns.get(ordinal)
    }

    /// Ordinal of a column by case-insensitive name.
    pub fn column_ordinal(&self, name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_map.get(name) {
            return Some(idx);
        }
        self.column_map.get(&name.to_lowercase()).copied()
    }

    /// Column names in declared order.
    pub fn columns(&self) -> &[Arc<str>] {
        &self.columns
    }
}

/// One row of one table source
#[derive(Debug, Clone)]
pub struct RowTuple {
    tuple_ordinal: usize,
    schema: Arc<TableSchema>,
    values: Vec<Value>,
}

impl RowTuple {
    /// Create a row, checking the value count against the schema.
    pub fn new(tuple_ordinal: usize, schema: Arc<TableSchema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.column_count() {
            return Err(Error::internal(format!(
                "row for table '{}' has {} values, schema declares {} columns",
                schema.name,
                values.len(),
                schema.column_count()
            )));
        }
        Ok(Self {
            tuple_ordinal,
            schema,
            values,
        })
    }

    #[inline]
    pub fn tuple_ordinal(&self) -> usize {
        self.tuple_ordinal
    }

    #[inline]
    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// Value at `ordinal`, NULL when out of range.
    #[inline]
    pub fn value(&self, ordinal: usize) -> Value {
        self.values
            .get(ordinal)
            .cloned()
            .unwrap_or_else(Value::null_unknown)
    }

    /// Borrow the value at `ordinal`.
    #[inline]
    pub fn get(&self, ordinal: usize) -> Option<&Value> {
        self.values.get(ordinal)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl fmt::Display for RowTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.schema.name)?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lookup_case_insensitive() {
        let schema = TableSchema::new("orders", &["Id", "customer_id"]);
        assert_eq!(schema.column_ordinal("id"), Some(0));
        assert_eq!(schema.column_ordinal("CUSTOMER_ID"), Some(1));
        assert_eq!(schema.column_ordinal("missing"), None);
        assert_eq!(schema.column_name(0).map(|c| c.as_ref()), Some("Id"));
    }

    #[test]
    fn test_row_value_count_checked() {
        let schema = Arc::new(TableSchema::new("t", &["a", "b"]));
        assert!(RowTuple::new(0, schema.clone(), vec![Value::integer(1)]).is_err());

        let row = RowTuple::new(0, schema, vec![Value::integer(1), Value::text("x")]).unwrap();
        assert_eq!(row.value(1), Value::text("x"));
        assert!(row.value(9).is_null());
        assert_eq!(row.to_string(), "t(1, x)");
    }
}
