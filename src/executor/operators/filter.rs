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

//! Filter operator: passes the child rows for which a predicate is true.

use crate::core::Result;
use crate::executor::context::ExecutionContext;
use crate::executor::expression::ExprRef;
use crate::executor::iterator::{next_without_has_next, BoxedTupleIterator, TupleIterator};
use crate::executor::operator::{Operator, OperatorRef};
use crate::executor::statistics::{NodeCounter, NodeId};
use crate::tuple::Tuple;

pub struct FilterOperator {
    node_id: NodeId,
    child: OperatorRef,
    predicate: ExprRef,
}

impl FilterOperator {
    pub fn new(node_id: NodeId, child: OperatorRef, predicate: ExprRef) -> Self {
        Self {
            node_id,
            child,
            predicate,
        }
    }
}

impl Operator for FilterOperator {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn name(&self) -> &str {
        "Filter"
    }

    fn open<'a>(&'a self, ctx: &mut ExecutionContext) -> Result<BoxedTupleIterator<'a>> {
        Ok(Box::new(FilterIterator {
            operator: self,
            child: self.child.open(ctx)?,
            pending: None,
        }))
    }
}

struct FilterIterator<'a> {
    operator: &'a FilterOperator,
    child: BoxedTupleIterator<'a>,
    pending: Option<Tuple>,
}

impl TupleIterator for FilterIterator<'_> {
    fn has_next(&mut self, ctx: &mut ExecutionContext) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        while let Some(tuple) = self.child.next_tuple(ctx)? {
            let predicate = &self.operator.predicate;
            if ctx.with_tuple(tuple.clone(), |ctx| predicate.evaluate_predicate(ctx))? {
                self.pending = Some(tuple);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Tuple> {
        let tuple = self
            .pending
            .take()
            .ok_or_else(|| next_without_has_next("Filter"))?;
        ctx.increment(self.operator.node_id, NodeCounter::RowsProduced, 1);
        Ok(tuple)
    }

    fn close(&mut self) {
        self.pending = None;
        self.child.close();
    }
}
