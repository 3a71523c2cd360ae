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

//! Computed columns: wraps each child row in a [`ComputedTuple`] holding
//! the values of named expressions evaluated against that row.

use std::sync::Arc;

use crate::core::Result;
use crate::executor::context::ExecutionContext;
use crate::executor::expression::ExprRef;
use crate::executor::iterator::{next_without_has_next, BoxedTupleIterator, TupleIterator};
use crate::executor::operator::{Operator, OperatorRef};
use crate::executor::statistics::{NodeCounter, NodeId};
use crate::tuple::{ComputedTuple, Tuple};

pub struct ComputedColumnsOperator {
    node_id: NodeId,
    child: OperatorRef,
    names: Arc<[Arc<str>]>,
    expressions: Vec<ExprRef>,
}

impl ComputedColumnsOperator {
    pub fn new(node_id: NodeId, child: OperatorRef, columns: Vec<(&str, ExprRef)>) -> Self {
        let (names, expressions): (Vec<Arc<str>>, Vec<ExprRef>) = columns
            .into_iter()
            .map(|(name, expr)| (Arc::from(name), expr))
            .unzip();
        Self {
            node_id,
            child,
            names: names.into(),
            expressions,
        }
    }

    fn compute(&self, ctx: &mut ExecutionContext, tuple: Tuple) -> Result<Tuple> {
        let values = ctx.with_tuple(tuple.clone(), |ctx| {
            self.expressions
                .iter()
                .map(|expr| expr.evaluate(ctx))
                .collect::<Result<Vec<_>>>()
        })?;
        Ok(Tuple::computed(ComputedTuple::new(
            tuple,
            self.names.clone(),
            values,
        )))
    }
}

impl Operator for ComputedColumnsOperator {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn name(&self) -> &str {
        "ComputedColumns"
    }

    fn open<'a>(&'a self, ctx: &mut ExecutionContext) -> Result<BoxedTupleIterator<'a>> {
        Ok(Box::new(ComputedIterator {
            operator: self,
            child: self.child.open(ctx)?,
            confirmed: false,
        }))
    }

    fn estimated_rows(&self) -> Option<usize> {
        self.child.estimated_rows()
    }
}

struct ComputedIterator<'a> {
    operator: &'a ComputedColumnsOperator,
    child: BoxedTupleIterator<'a>,
    confirmed: bool,
}

impl TupleIterator for ComputedIterator<'_> {
    fn has_next(&mut self, ctx: &mut ExecutionContext) -> Result<bool> {
        self.confirmed = self.child.has_next(ctx)?;
        Ok(self.confirmed)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Tuple> {
        if !self.confirmed {
            return Err(next_without_has_next("ComputedColumns"));
        }
        self.confirmed = false;
        let tuple = self.child.next(ctx)?;
        ctx.increment(self.operator.node_id, NodeCounter::RowsProduced, 1);
        self.operator.compute(ctx, tuple)
    }

    fn close(&mut self) {
        self.confirmed = false;
        self.child.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::executor::expression::{arithmetic, bare_column, literal, ArithmeticOperator};
    use crate::executor::iterator::collect_tuples;
    use crate::executor::operator::MaterializedOperator;
    use crate::tuple::test_support::row;
    use crate::tuple::COMPUTED_COLUMN_ORDINAL_BASE;

    #[test]
    fn test_computed_values_addressable() {
        let rows = vec![row(0, "t", &[Value::integer(2)]), row(0, "t", &[Value::integer(5)])];
        let op = ComputedColumnsOperator::new(
            2,
            Box::new(MaterializedOperator::new(1, rows)),
            vec![(
                "doubled",
                arithmetic(bare_column("c0"), ArithmeticOperator::Multiply, literal(2i64)),
            )],
        );
        let mut ctx = ExecutionContext::new();
        let out = collect_tuples(op.open(&mut ctx).unwrap(), &mut ctx).unwrap();

        assert_eq!(out[1].value(0), Value::integer(5));
        assert_eq!(out[1].value(COMPUTED_COLUMN_ORDINAL_BASE), Value::integer(10));
        assert_eq!(out[0].column_ordinal("doubled"), Some(COMPUTED_COLUMN_ORDINAL_BASE));
    }
}
