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

//! Group By Operator.
//!
//! Drains its child on `open`, assigning every row to a group by its
//! grouping key, and emits one [`GroupedRow`] per distinct key in
//! first-seen order.
//!
//! Grouping ordinals (columns known to be constant within a group) are
//! derived on the first `has_next` from the GROUP BY expressions that are
//! plain column references with at most two name parts.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::common::OneOrMany;
use crate::core::Result;
use crate::executor::context::ExecutionContext;
use crate::executor::expression::ExprRef;
use crate::executor::iterator::{next_without_has_next, BoxedTupleIterator, TupleIterator};
use crate::executor::operator::{Operator, OperatorRef};
use crate::executor::statistics::{NodeCounter, NodeId};
use crate::tuple::{GroupedRow, GroupingOrdinals, OrdinalValues, OrdinalValuesFactory, Tuple};

/// Materialize-then-group aggregation input
pub struct GroupByOperator {
    node_id: NodeId,
    child: OperatorRef,
    keys: OrdinalValuesFactory,
}

impl GroupByOperator {
    pub fn new(node_id: NodeId, child: OperatorRef, group_by: Vec<ExprRef>) -> Self {
        Self {
            node_id,
            child,
            keys: OrdinalValuesFactory::new(group_by),
        }
    }

    /// Grouping ordinals per tuple ordinal, resolved against a sample row.
    fn grouping_ordinals(&self, sample: &Tuple) -> GroupingOrdinals {
        let mut ordinals = GroupingOrdinals::default();
        for expr in self.keys.expressions() {
            let Some(reference) = expr.as_column_reference() else {
                continue;
            };
            if reference.outer || reference.parts.len() > 2 {
                continue;
            }
            let tuple_ordinal = reference.tuple_ordinal.unwrap_or(sample.tuple_ordinal());
            let Some(target) = sample.tuple(tuple_ordinal) else {
                continue;
            };
            if let Some(column) = target.column_ordinal(reference.column()) {
                ordinals.entry(tuple_ordinal).or_default().insert(column);
            }
        }
        ordinals
    }
}

impl Operator for GroupByOperator {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn name(&self) -> &str {
        "GroupBy"
    }

    fn open<'a>(&'a self, ctx: &mut ExecutionContext) -> Result<BoxedTupleIterator<'a>> {
        let mut child = self.child.open(ctx)?;
        let mut index: FxHashMap<OrdinalValues, usize> = FxHashMap::default();
        let mut groups: Vec<OneOrMany<Tuple>> = Vec::new();
        let mut rows = 0u64;

        let drained = (|| -> Result<()> {
            while let Some(tuple) = child.next_tuple(ctx)? {
                rows += 1;
                let key = self.keys.create_for(ctx, &tuple)?;
                match index.get(&key) {
                    Some(&group) => groups[group].push(tuple),
                    None => {
                        index.insert(key, groups.len());
                        groups.push(OneOrMany::One(tuple));
                    }
                }
            }
            Ok(())
        })();
        child.close();
        drained?;

        ctx.increment(self.node_id, NodeCounter::InnerRows, rows);
        tracing::debug!(node = self.node_id, rows, groups = groups.len(), "group by drained");

        Ok(Box::new(GroupByIterator {
            operator: self,
            groups: groups.into_iter(),
            ordinals: None,
            pending: None,
        }))
    }
}

struct GroupByIterator<'a> {
    operator: &'a GroupByOperator,
    groups: std::vec::IntoIter<OneOrMany<Tuple>>,
    /// Resolved on first use, shared by every group
    ordinals: Option<Arc<GroupingOrdinals>>,
    pending: Option<Tuple>,
}

impl TupleIterator for GroupByIterator<'_> {
    fn has_next(&mut self, _ctx: &mut ExecutionContext) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        let Some(rows) = self.groups.next() else {
            return Ok(false);
        };
        let rows = rows.into_vec();

        let ordinals = match &self.ordinals {
            Some(ordinals) => ordinals.clone(),
            None => {
                let resolved = match rows.first() {
                    Some(sample) => Arc::new(self.operator.grouping_ordinals(sample)),
                    None => Arc::new(GroupingOrdinals::default()),
                };
                self.ordinals = Some(resolved.clone());
                resolved
            }
        };

        self.pending = Some(Tuple::grouped(GroupedRow::new(rows, ordinals)?));
        Ok(true)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Tuple> {
        let row = self
            .pending
            .take()
            .ok_or_else(|| next_without_has_next("GroupBy"))?;
        ctx.increment(self.operator.node_id, NodeCounter::RowsProduced, 1);
        Ok(row)
    }

    fn close(&mut self) {
        self.groups = Vec::new().into_iter();
        self.pending = None;
    }
}
