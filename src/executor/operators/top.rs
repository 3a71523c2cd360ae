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

//! Top operator: emits at most N child rows.
//!
//! N is evaluated once per `open`. The child is closed as soon as the
//! limit is reached, so upstream joins stop fetching.

use crate::core::{Error, Result, Value};
use crate::executor::context::ExecutionContext;
use crate::executor::expression::ExprRef;
use crate::executor::iterator::{next_without_has_next, BoxedTupleIterator, TupleIterator};
use crate::executor::operator::{Operator, OperatorRef};
use crate::executor::statistics::{NodeCounter, NodeId};
use crate::tuple::Tuple;

pub struct TopOperator {
    node_id: NodeId,
    child: OperatorRef,
    limit: ExprRef,
}

impl TopOperator {
    pub fn new(node_id: NodeId, child: OperatorRef, limit: ExprRef) -> Self {
        Self {
            node_id,
            child,
            limit,
        }
    }

    fn resolve_limit(&self, ctx: &ExecutionContext) -> Result<usize> {
        match self.limit.evaluate(ctx)? {
            Value::Integer(n) if n >= 0 => Ok(n as usize),
            other => Err(Error::configuration(format!(
                "top must be a non-negative integer, got {} ({})",
                other,
                other.data_type()
            ))),
        }
    }
}

impl Operator for TopOperator {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn name(&self) -> &str {
        "Top"
    }

    fn open<'a>(&'a self, ctx: &mut ExecutionContext) -> Result<BoxedTupleIterator<'a>> {
        let remaining = self.resolve_limit(ctx)?;
        Ok(Box::new(TopIterator {
            node_id: self.node_id,
            child: self.child.open(ctx)?,
            remaining,
            confirmed: false,
            closed: false,
        }))
    }

    fn estimated_rows(&self) -> Option<usize> {
        self.child.estimated_rows()
    }
}

struct TopIterator<'a> {
    node_id: NodeId,
    child: BoxedTupleIterator<'a>,
    remaining: usize,
    confirmed: bool,
    closed: bool,
}

impl TupleIterator for TopIterator<'_> {
    fn has_next(&mut self, ctx: &mut ExecutionContext) -> Result<bool> {
        if self.confirmed {
            return Ok(true);
        }
        if self.closed {
            return Ok(false);
        }
        if self.remaining == 0 {
            self.close();
            return Ok(false);
        }
        self.confirmed = self.child.has_next(ctx)?;
        Ok(self.confirmed)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Tuple> {
        if !self.confirmed {
            return Err(next_without_has_next("Top"));
        }
        self.confirmed = false;
        let tuple = self.child.next(ctx)?;
        self.remaining -= 1;
        ctx.increment(self.node_id, NodeCounter::RowsProduced, 1);
        Ok(tuple)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.confirmed = false;
            self.child.close();
        }
    }
}
