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

//! Nested Loop Join Operator.
//!
//! This operator implements the classic nested loop join with O(N*M) complexity.
//! It's the fallback algorithm used when:
//! - The join condition is not a pure equi-join
//! - The inner side is correlated with the outer row
//! - CROSS JOIN is requested (no predicate)
//!
//! The inner operator is re-opened for every outer row. While the inner side
//! is being pulled, the outer row sits in the context's outer-tuple slot so
//! correlated references inside the inner plan can read it.

use crate::core::Result;
use crate::executor::context::ExecutionContext;
use crate::executor::expression::ExprRef;
use crate::executor::iterator::{next_without_has_next, BoxedTupleIterator, TupleIterator};
use crate::executor::merger::TupleMerger;
use crate::executor::operator::{Operator, OperatorRef};
use crate::executor::statistics::{NodeCounter, NodeId, NodeTimer};
use crate::tuple::Tuple;

use super::join::{JoinMode, OuterRowMatches};

/// Nested Loop Join Operator.
///
/// For each outer row, opens a fresh inner iterator and merges every inner
/// row passing the predicate.
pub struct NestedLoopJoin {
    node_id: NodeId,
    outer: OperatorRef,
    inner: OperatorRef,
    /// Join predicate; `None` joins every pair
    predicate: Option<ExprRef>,
    merger: Box<dyn TupleMerger>,
    mode: JoinMode,
}

impl NestedLoopJoin {
    /// Create a new nested loop join operator.
    ///
    /// # Arguments
    /// * `outer` - Driving input, pulled once
    /// * `inner` - Input re-opened per outer row
    /// * `merger` - Builds joined rows
    pub fn new(
        node_id: NodeId,
        outer: OperatorRef,
        inner: OperatorRef,
        merger: Box<dyn TupleMerger>,
    ) -> Self {
        Self {
            node_id,
            outer,
            inner,
            predicate: None,
            merger,
            mode: JoinMode::default(),
        }
    }

    pub fn with_predicate(mut self, predicate: Option<ExprRef>) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn with_mode(mut self, mode: JoinMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> JoinMode {
        self.mode
    }
}

impl Operator for NestedLoopJoin {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn name(&self) -> &str {
        "NestedLoopJoin"
    }

    fn open<'a>(&'a self, ctx: &mut ExecutionContext) -> Result<BoxedTupleIterator<'a>> {
        let outer = self.outer.open(ctx)?;
        Ok(Box::new(NestedLoopJoinIterator {
            join: self,
            outer,
            inner: None,
            current: None,
            pending: None,
            closed: false,
        }))
    }
}

struct NestedLoopJoinIterator<'a> {
    join: &'a NestedLoopJoin,
    outer: BoxedTupleIterator<'a>,
    /// Inner iterator for the current outer row
    inner: Option<BoxedTupleIterator<'a>>,
    current: Option<OuterRowMatches>,
    pending: Option<Tuple>,
    closed: bool,
}

impl NestedLoopJoinIterator<'_> {
    /// Advance the outer side and open the inner side for it.
    fn start_outer_row(&mut self, ctx: &mut ExecutionContext) -> Result<bool> {
        let Some(outer) = self.outer.next_tuple(ctx)? else {
            return Ok(false);
        };
        ctx.increment(self.join.node_id, NodeCounter::OuterRows, 1);

        let previous = ctx.replace_outer_tuple(Some(outer.clone()));
        let inner = self.join.inner.open(ctx);
        ctx.replace_outer_tuple(previous);

        self.inner = Some(inner?);
        self.current = Some(OuterRowMatches::new(outer));
        Ok(true)
    }

    /// Pull the next inner row with the outer row visible to correlated
    /// references.
    fn next_inner(&mut self, ctx: &mut ExecutionContext) -> Result<Option<Tuple>> {
        let (Some(inner), Some(current)) = (self.inner.as_mut(), self.current.as_ref()) else {
            return Ok(None);
        };
        let previous = ctx.replace_outer_tuple(Some(current.outer().clone()));
        let result = inner.next_tuple(ctx);
        ctx.replace_outer_tuple(previous);
        result
    }

    fn finish_outer_row(&mut self) -> Option<Tuple> {
        if let Some(mut inner) = self.inner.take() {
            inner.close();
        }
        self.current
            .take()
            .and_then(|matches| matches.finish(self.join.mode))
    }
}

impl TupleIterator for NestedLoopJoinIterator<'_> {
    fn has_next(&mut self, ctx: &mut ExecutionContext) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        if self.closed {
            return Ok(false);
        }

        loop {
            if self.current.is_none() && !self.start_outer_row(ctx)? {
                return Ok(false);
            }

            match self.next_inner(ctx)? {
                Some(inner) => {
                    ctx.increment(self.join.node_id, NodeCounter::InnerRows, 1);
                    let Some(current) = self.current.as_mut() else {
                        continue;
                    };
                    let start = ctx.start_timer();
                    let emitted = current.offer(
                        self.join.merger.as_ref(),
                        self.join.predicate.as_ref(),
                        self.join.mode,
                        ctx,
                        inner,
                    );
                    ctx.record_time(self.join.node_id, NodeTimer::Predicate, start);
                    if let Some(row) = emitted? {
                        self.pending = Some(row);
                        return Ok(true);
                    }
                }
                None => {
                    if let Some(row) = self.finish_outer_row() {
                        self.pending = Some(row);
                        return Ok(true);
                    }
                }
            }
        }
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Tuple> {
        let row = self
            .pending
            .take()
            .ok_or_else(|| next_without_has_next("NestedLoopJoin"))?;
        ctx.increment(self.join.node_id, NodeCounter::RowsProduced, 1);
        Ok(row)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(mut inner) = self.inner.take() {
            inner.close();
        }
        self.current = None;
        self.pending = None;
        self.outer.close();
    }
}
