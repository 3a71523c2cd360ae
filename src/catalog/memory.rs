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

//! In-memory reference catalog.
//!
//! Tables are plain row vectors. Every scan and index fetch is recorded in
//! a fetch log so callers can observe how often, and with which keys, the
//! inner side of a join was opened.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{Catalog, Index, IndexPredicate, OperatorArgs};
use crate::core::{Error, Result, Value};
use crate::executor::context::ExecutionContext;
use crate::executor::expression::ExprRef;
use crate::executor::iterator::{
    next_without_has_next, BoxedTupleIterator, TupleIterator, TupleListIterator,
};
use crate::executor::operator::{Operator, OperatorRef};
use crate::executor::statistics::NodeId;
use crate::tuple::{OrdinalValues, RowTuple, TableSchema, Tuple};

/// One recorded data access
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRecord {
    /// Full table scan
    Scan { table: String },
    /// Index fetch with the keys drained from the outer-values channel
    Index {
        table: String,
        keys: Vec<OrdinalValues>,
    },
}

impl FetchRecord {
    pub fn table(&self) -> &str {
        match self {
            FetchRecord::Scan { table } | FetchRecord::Index { table, .. } => table,
        }
    }

    /// Submitted keys; empty for scans.
    pub fn keys(&self) -> &[OrdinalValues] {
        match self {
            FetchRecord::Scan { .. } => &[],
            FetchRecord::Index { keys, .. } => keys,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, FetchRecord::Index { .. })
    }
}

type FetchLog = Arc<Mutex<Vec<FetchRecord>>>;

#[derive(Debug)]
struct MemoryTable {
    schema: Arc<TableSchema>,
    rows: Vec<Vec<Value>>,
    indices: Vec<Index>,
}

/// Catalog over named in-memory tables
#[derive(Debug)]
pub struct MemoryCatalog {
    name: String,
    tables: FxHashMap<String, MemoryTable>,
    log: FetchLog,
}

impl MemoryCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: FxHashMap::default(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a table. Every row must have one value per column.
    pub fn add_table(
        &mut self,
        name: &str,
        columns: &[&str],
        rows: Vec<Vec<Value>>,
    ) -> Result<&mut Self> {
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(Error::internal(format!(
                "table {} has {} columns but a row has {} values",
                name,
                columns.len(),
                bad.len()
            )));
        }
        self.tables.insert(
            name.to_lowercase(),
            MemoryTable {
                schema: Arc::new(TableSchema::new(name, columns)),
                rows,
                indices: Vec::new(),
            },
        );
        Ok(self)
    }

    /// Declare an index on an existing table.
    pub fn add_index(&mut self, index: Index) -> Result<&mut Self> {
        let table = self.table_mut(&index.table)?;
        for column in &index.columns {
            if table.schema.column_ordinal(column).is_none() {
                return Err(Error::ColumnNotFound(format!("{}.{}", index.table, column)));
            }
        }
        table.indices.push(index);
        Ok(self)
    }

    /// Append a row to an existing table.
    pub fn insert(&mut self, table: &str, row: Vec<Value>) -> Result<()> {
        let target = self.table_mut(table)?;
        if row.len() != target.schema.column_count() {
            return Err(Error::internal(format!(
                "table {} expects {} values, got {}",
                table,
                target.schema.column_count(),
                row.len()
            )));
        }
        target.rows.push(row);
        Ok(())
    }

    /// Every access recorded so far, oldest first.
    pub fn fetch_log(&self) -> Vec<FetchRecord> {
        self.log.lock().clone()
    }

    /// Number of accesses (scans and index fetches) to `table`.
    pub fn fetch_count(&self, table: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|r| r.table().eq_ignore_ascii_case(table))
            .count()
    }

    pub fn clear_fetch_log(&self) {
        self.log.lock().clear();
    }

    fn table(&self, name: &str) -> Result<&MemoryTable> {
        self.tables
            .get(&name.to_lowercase())
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable> {
        self.tables
            .get_mut(&name.to_lowercase())
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// Row tuples tagged with the table source's ordinal.
    fn tuples(&self, table: &MemoryTable, tuple_ordinal: usize) -> Result<Arc<[Tuple]>> {
        table
            .rows
            .iter()
            .map(|values| {
                RowTuple::new(tuple_ordinal, table.schema.clone(), values.clone()).map(Tuple::row)
            })
            .collect()
    }
}

impl Catalog for MemoryCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_indices(&self, table: &str) -> Vec<Index> {
        self.table(table)
            .map(|t| t.indices.clone())
            .unwrap_or_default()
    }

    fn get_scan_operator(&self, args: OperatorArgs) -> Result<OperatorRef> {
        let table = self.table(&args.table_source.table)?;
        Ok(Box::new(MemoryScanOperator {
            node_id: args.node_id,
            table: table.schema.name.clone(),
            tuples: self.tuples(table, args.table_source.tuple_ordinal)?,
            filter: args.predicate,
            log: self.log.clone(),
        }))
    }

    fn get_index_operator(
        &self,
        args: OperatorArgs,
        predicate: IndexPredicate,
    ) -> Result<OperatorRef> {
        let table = self.table(&args.table_source.table)?;
        let key_columns = predicate
            .columns
            .iter()
            .map(|column| {
                table.schema.column_ordinal(column).ok_or_else(|| {
                    Error::ColumnNotFound(format!("{}.{}", table.schema.name, column))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Box::new(MemoryIndexOperator {
            node_id: args.node_id,
            table: table.schema.name.clone(),
            index: predicate.index.identity(),
            tuples: self.tuples(table, args.table_source.tuple_ordinal)?,
            key_columns,
            filter: args.predicate,
            log: self.log.clone(),
        }))
    }
}

fn passes(filter: Option<&ExprRef>, ctx: &mut ExecutionContext, tuple: &Tuple) -> Result<bool> {
    match filter {
        Some(filter) => ctx.with_tuple(tuple.clone(), |ctx| filter.evaluate_predicate(ctx)),
        None => Ok(true),
    }
}

// ============================================================================
// Scan
// ============================================================================

struct MemoryScanOperator {
    node_id: NodeId,
    table: String,
    tuples: Arc<[Tuple]>,
    filter: Option<ExprRef>,
    log: FetchLog,
}

impl Operator for MemoryScanOperator {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn name(&self) -> &str {
        "MemoryScan"
    }

    fn open<'a>(&'a self, _ctx: &mut ExecutionContext) -> Result<BoxedTupleIterator<'a>> {
        self.log.lock().push(FetchRecord::Scan {
            table: self.table.clone(),
        });
        match &self.filter {
            // Unfiltered scans are already a list
            None => Ok(Box::new(TupleListIterator::new(self.tuples.clone()))),
            Some(filter) => Ok(Box::new(FilteredScan {
                tuples: &self.tuples,
                filter,
                position: 0,
                pending: None,
            })),
        }
    }

    fn estimated_rows(&self) -> Option<usize> {
        Some(self.tuples.len())
    }
}

/// Streams the rows passing a pushed-down filter
struct FilteredScan<'a> {
    tuples: &'a [Tuple],
    filter: &'a ExprRef,
    position: usize,
    pending: Option<Tuple>,
}

impl TupleIterator for FilteredScan<'_> {
    fn has_next(&mut self, ctx: &mut ExecutionContext) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        while let Some(tuple) = self.tuples.get(self.position) {
            self.position += 1;
            if passes(Some(self.filter), ctx, tuple)? {
                self.pending = Some(tuple.clone());
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn next(&mut self, _ctx: &mut ExecutionContext) -> Result<Tuple> {
        self.pending
            .take()
            .ok_or_else(|| next_without_has_next("MemoryScan"))
    }

    fn close(&mut self) {
        self.position = self.tuples.len();
        self.pending = None;
    }
}

// ============================================================================
// Index fetch
// ============================================================================

struct MemoryIndexOperator {
    node_id: NodeId,
    table: String,
    index: String,
    tuples: Arc<[Tuple]>,
    /// Schema ordinals compared against each key, in key order
    key_columns: Vec<usize>,
    filter: Option<ExprRef>,
    log: FetchLog,
}

impl Operator for MemoryIndexOperator {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn name(&self) -> &str {
        "MemoryIndex"
    }

    fn open<'a>(&'a self, ctx: &mut ExecutionContext) -> Result<BoxedTupleIterator<'a>> {
        let keys = match ctx.outer_values_mut() {
            Some(channel) => channel.drain_all(),
            None => {
                return Err(Error::invalid_state(format!(
                    "index {} opened without outer values",
                    self.index
                )))
            }
        };
        let wanted: FxHashSet<OrdinalValues> =
            keys.iter().filter(|k| !k.has_null()).cloned().collect();
        self.log.lock().push(FetchRecord::Index {
            table: self.table.clone(),
            keys,
        });

        let mut matches = Vec::new();
        if !wanted.is_empty() {
            for tuple in self.tuples.iter() {
                let key = OrdinalValues::new(self.key_columns.iter().map(|&c| tuple.value(c)));
                if wanted.contains(&key) && passes(self.filter.as_ref(), ctx, tuple)? {
                    matches.push(tuple.clone());
                }
            }
        }
        Ok(Box::new(TupleListIterator::new(matches)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnsType, TableSource};
    use crate::executor::context::OuterValues;
    use crate::executor::expression::{column, eq, literal};
    use crate::executor::iterator::collect_tuples;

    fn catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new("mem");
        catalog
            .add_table(
                "items",
                &["id", "name"],
                vec![
                    vec![Value::integer(1), Value::text("A")],
                    vec![Value::integer(3), Value::text("B")],
                    vec![Value::integer(3), Value::text("C")],
                ],
            )
            .unwrap();
        catalog
            .add_index(Index::new("items", &["id"], ColumnsType::All, 10))
            .unwrap();
        catalog
    }

    fn args(ordinal: usize) -> OperatorArgs {
        OperatorArgs::new(1, TableSource::new("items", "i", ordinal))
    }

    #[test]
    fn test_scan_tags_ordinal_and_logs() {
        let catalog = catalog();
        let op = catalog.get_scan_operator(args(2)).unwrap();
        let mut ctx = ExecutionContext::new();
        let rows = collect_tuples(op.open(&mut ctx).unwrap(), &mut ctx).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.tuple_ordinal() == 2));
        assert_eq!(catalog.fetch_log(), vec![FetchRecord::Scan { table: "items".into() }]);
    }

    #[test]
    fn test_scan_applies_pushed_down_filter() {
        let catalog = catalog();
        let filter = eq(column("i", "name", 0), literal("B"));
        let op = catalog
            .get_scan_operator(args(0).with_predicate(Some(filter)))
            .unwrap();
        let mut ctx = ExecutionContext::new();
        let rows = collect_tuples(op.open(&mut ctx).unwrap(), &mut ctx).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value(1), Value::text("B"));
    }

    #[test]
    fn test_index_drains_channel() {
        let catalog = catalog();
        let index = catalog.get_indices("ITEMS").remove(0);
        let op = catalog
            .get_index_operator(args(1), IndexPredicate::new(index, vec!["id".into()]))
            .unwrap();

        let mut ctx = ExecutionContext::new();
        ctx.set_outer_values(OuterValues::new(vec![
            OrdinalValues::new([Value::integer(3)]),
            OrdinalValues::new([Value::integer(2)]),
        ]));
        let rows = collect_tuples(op.open(&mut ctx).unwrap(), &mut ctx).unwrap();
        assert_eq!(rows.len(), 2);

        let channel = ctx.take_outer_values().unwrap();
        assert!(channel.is_exhausted());
        assert!(!channel.over_consumed());

        let log = catalog.fetch_log();
        assert_eq!(log.len(), 1);
        assert!(log[0].is_index());
        assert_eq!(log[0].keys().len(), 2);
    }

    #[test]
    fn test_index_without_channel_fails() {
        let catalog = catalog();
        let index = catalog.get_indices("items").remove(0);
        let op = catalog
            .get_index_operator(args(1), IndexPredicate::new(index, vec!["id".into()]))
            .unwrap();
        let mut ctx = ExecutionContext::new();
        assert!(op.open(&mut ctx).is_err());
    }

    #[test]
    fn test_unknown_table_and_column() {
        let mut catalog = catalog();
        assert!(matches!(
            catalog.get_scan_operator(OperatorArgs::new(0, TableSource::new("nope", "n", 0))),
            Err(Error::TableNotFound(_))
        ));
        assert!(catalog
            .add_index(Index::new("items", &["missing"], ColumnsType::All, 0))
            .is_err());
    }
}
