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

//! Batch Hash Join Operator.
//!
//! Groups outer rows into batches and opens the inner side once per batch,
//! handing it the batch's distinct join keys through the context's
//! outer-values channel. An index-capable inner operator answers with the
//! matching rows, which are hashed and probed by the batch's outer rows.
//!
//! # Algorithm
//!
//! 1. **Batch**: pull outer rows until the outer side ends, or the batch is
//!    full and the next row's key is not already in the batch. That boundary
//!    row is carried over into the next batch, so a run of equal keys is
//!    never split across two inner fetches.
//! 2. **Fetch**: submit the distinct non-NULL keys, open the inner side and
//!    hash every returned row by its inner key. The channel must have been
//!    drained exactly once when the inner `open` returns.
//! 3. **Probe**: in input order, look up each outer row's bucket and
//!    re-check the full predicate on every candidate before merging.
//!
//! Without an index the inner side gets no channel; it is opened once and
//! the whole outer side is probed as one batch.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::catalog::Index;
use crate::core::{Error, Result, Value};
use crate::executor::context::{ExecutionContext, OuterValues};
use crate::executor::expression::ExprRef;
use crate::executor::hash_table::BatchHashTable;
use crate::executor::iterator::{next_without_has_next, BoxedTupleIterator, TupleIterator};
use crate::executor::merger::TupleMerger;
use crate::executor::operator::{Operator, OperatorRef};
use crate::executor::statistics::{NodeCounter, NodeId, NodeTimer};
use crate::tuple::{OrdinalValues, OrdinalValuesFactory, Tuple};

use super::join::{JoinMode, OuterRowMatches};

/// Where the batch size comes from
#[derive(Debug, Clone)]
pub enum BatchSize {
    /// Index default; zero falls back to the configured default
    Fixed(usize),
    /// Evaluated once per open; must yield a positive integer
    Expression(ExprRef),
}

/// Batched, index-driven hash join
pub struct BatchHashJoin {
    node_id: NodeId,
    outer: OperatorRef,
    inner: OperatorRef,
    /// Key extracted from outer rows, element-aligned with `inner_key`
    outer_key: OrdinalValuesFactory,
    inner_key: OrdinalValuesFactory,
    /// Full join predicate, re-checked after every hash match
    predicate: Option<ExprRef>,
    merger: Box<dyn TupleMerger>,
    mode: JoinMode,
    /// Index the inner side was built from; `None` disables the channel
    index: Option<Index>,
    batch_size: Option<BatchSize>,
}

impl BatchHashJoin {
    /// Create a join from aligned outer/inner key expressions.
    pub fn new(
        node_id: NodeId,
        outer: OperatorRef,
        inner: OperatorRef,
        outer_key: Vec<ExprRef>,
        inner_key: Vec<ExprRef>,
        merger: Box<dyn TupleMerger>,
    ) -> Result<Self> {
        if outer_key.is_empty() || outer_key.len() != inner_key.len() {
            return Err(Error::configuration(format!(
                "hash join needs matching key lists, got {} outer and {} inner",
                outer_key.len(),
                inner_key.len()
            )));
        }
        Ok(Self {
            node_id,
            outer,
            inner,
            outer_key: OrdinalValuesFactory::new(outer_key),
            inner_key: OrdinalValuesFactory::new(inner_key),
            predicate: None,
            merger,
            mode: JoinMode::default(),
            index: None,
            batch_size: None,
        })
    }

    pub fn with_predicate(mut self, predicate: Option<ExprRef>) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn with_mode(mut self, mode: JoinMode) -> Self {
        self.mode = mode;
        self
    }

    /// Drive the inner side through `index`, batching by its default size
    /// unless a batch size was set explicitly.
    pub fn with_index(mut self, index: Index) -> Self {
        if self.batch_size.is_none() {
            self.batch_size = Some(BatchSize::Fixed(index.batch_size));
        }
        self.index = Some(index);
        self
    }

    pub fn with_batch_size(mut self, batch_size: BatchSize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn index(&self) -> Option<&Index> {
        self.index.as_ref()
    }

    fn index_identity(&self) -> String {
        match &self.index {
            Some(index) => index.identity(),
            None => self.inner.name().to_string(),
        }
    }

    /// Resolve the batch size for one execution.
    fn resolve_batch_size(&self, ctx: &ExecutionContext) -> Result<usize> {
        if self.index.is_none() {
            return Ok(usize::MAX);
        }
        let fallback = ctx.config().default_batch_size.max(1);
        match &self.batch_size {
            None => Ok(fallback),
            Some(BatchSize::Fixed(0)) => {
                tracing::warn!(
                    index = %self.index_identity(),
                    fallback,
                    "index declares no batch size, using configured default"
                );
                Ok(fallback)
            }
            Some(BatchSize::Fixed(size)) => Ok(*size),
            Some(BatchSize::Expression(expr)) => match expr.evaluate(ctx)? {
                Value::Integer(size) if size > 0 => Ok(size as usize),
                other => Err(Error::configuration(format!(
                    "batch size must be a positive integer, got {} ({})",
                    other,
                    other.data_type()
                ))),
            },
        }
    }
}

impl Operator for BatchHashJoin {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn name(&self) -> &str {
        "BatchHashJoin"
    }

    fn open<'a>(&'a self, ctx: &mut ExecutionContext) -> Result<BoxedTupleIterator<'a>> {
        let batch_size = self.resolve_batch_size(ctx)?;
        let outer = self.outer.open(ctx)?;
        Ok(Box::new(BatchHashJoinIterator {
            join: self,
            outer,
            batch_size,
            carry: None,
            outer_done: false,
            table: BatchHashTable::default(),
            inner_loaded: false,
            batch: VecDeque::new(),
            output: VecDeque::new(),
            pending: None,
            closed: false,
        }))
    }
}

struct BatchHashJoinIterator<'a> {
    join: &'a BatchHashJoin,
    outer: BoxedTupleIterator<'a>,
    batch_size: usize,
    /// Boundary row held back for the next batch
    carry: Option<(Tuple, OrdinalValues)>,
    outer_done: bool,
    table: BatchHashTable,
    /// Without an index the table is built once and kept
    inner_loaded: bool,
    /// Outer rows of the current batch still to probe
    batch: VecDeque<(Tuple, OrdinalValues)>,
    /// Joined rows of the current outer row
    output: VecDeque<Tuple>,
    pending: Option<Tuple>,
    closed: bool,
}

impl BatchHashJoinIterator<'_> {
    /// Pull the next batch of outer rows; returns the distinct keys to submit.
    fn fill_batch(&mut self, ctx: &mut ExecutionContext) -> Result<Vec<OrdinalValues>> {
        let node_id = self.join.node_id;
        let mut keys = BatchKeys::default();

        if let Some((tuple, key)) = self.carry.take() {
            keys.admit(&key);
            self.batch.push_back((tuple, key));
        }

        while !self.outer_done {
            let Some(tuple) = self.outer.next_tuple(ctx)? else {
                self.outer_done = true;
                break;
            };
            ctx.increment(node_id, NodeCounter::OuterRows, 1);

            let start = ctx.start_timer();
            let key = self.join.outer_key.create_for(ctx, &tuple);
            ctx.record_time(node_id, NodeTimer::HashOuter, start);
            let key = key?;

            // Carry-over: a full batch still takes keys it already holds
            if self.batch.len() >= self.batch_size && !keys.contains(&key) {
                self.carry = Some((tuple, key));
                break;
            }
            keys.admit(&key);
            self.batch.push_back((tuple, key));
        }
        Ok(keys.distinct)
    }

    /// Open the inner side for `keys` and hash everything it returns.
    fn load_inner(&mut self, ctx: &mut ExecutionContext, keys: Vec<OrdinalValues>) -> Result<()> {
        let join = self.join;
        if join.index.is_none() {
            if self.inner_loaded {
                return Ok(());
            }
            self.inner_loaded = true;
            let inner = join.inner.open(ctx)?;
            return self.hash_inner(ctx, inner);
        }

        self.table = BatchHashTable::with_capacity(
            keys.len().max(ctx.config().hash_table_min_capacity),
        );
        if keys.is_empty() {
            return Ok(());
        }

        let submitted = keys.len();
        let previous = ctx.take_outer_values();
        ctx.set_outer_values(OuterValues::new(keys));
        let inner = join.inner.open(ctx);
        let channel = ctx.take_outer_values();
        if let Some(previous) = previous {
            ctx.set_outer_values(previous);
        }

        let inner = inner?;
        if let Err(e) = verify_drained(&join.index_identity(), channel, submitted) {
            let mut inner = inner;
            inner.close();
            return Err(e);
        }
        self.hash_inner(ctx, inner)
    }

    fn hash_inner(
        &mut self,
        ctx: &mut ExecutionContext,
        mut inner: BoxedTupleIterator<'_>,
    ) -> Result<()> {
        let node_id = self.join.node_id;
        let start = ctx.start_timer();
        let result = self.insert_all(ctx, inner.as_mut());
        inner.close();
        ctx.record_time(node_id, NodeTimer::HashInner, start);
        ctx.increment(node_id, NodeCounter::InnerRows, result?);
        Ok(())
    }

    fn insert_all(
        &mut self,
        ctx: &mut ExecutionContext,
        inner: &mut dyn TupleIterator,
    ) -> Result<u64> {
        let mut rows = 0u64;
        while let Some(tuple) = inner.next_tuple(ctx)? {
            rows += 1;
            let key = self.join.inner_key.create_for(ctx, &tuple)?;
            // NULL keys never match
            if !key.has_null() {
                self.table.insert(key, tuple);
            }
        }
        Ok(rows)
    }

    /// Join one outer row against the current table.
    fn probe(&mut self, ctx: &mut ExecutionContext, outer: Tuple, key: OrdinalValues) -> Result<()> {
        let join = self.join;
        let mut matches = OuterRowMatches::new(outer);
        if !key.has_null() {
            for entry in self.table.probe_equal(&key) {
                let start = ctx.start_timer();
                let emitted = matches.offer(
                    join.merger.as_ref(),
                    join.predicate.as_ref(),
                    join.mode,
                    ctx,
                    entry.tuple.clone(),
                );
                ctx.record_time(join.node_id, NodeTimer::Predicate, start);
                if let Some(row) = emitted? {
                    self.output.push_back(row);
                }
            }
        }
        if let Some(row) = matches.finish(join.mode) {
            self.output.push_back(row);
        }
        Ok(())
    }

    /// Start the next batch; returns false when the outer side is done.
    fn next_batch(&mut self, ctx: &mut ExecutionContext) -> Result<bool> {
        let keys = self.fill_batch(ctx)?;
        if self.batch.is_empty() {
            return Ok(false);
        }
        let distinct = keys.len();
        self.load_inner(ctx, keys)?;
        ctx.increment(self.join.node_id, NodeCounter::Batches, 1);
        tracing::debug!(
            node = self.join.node_id,
            outer_rows = self.batch.len(),
            distinct_keys = distinct,
            inner_rows = self.table.len(),
            "batch hash join batch loaded"
        );
        Ok(true)
    }
}

/// Keys seen in one batch
#[derive(Default)]
struct BatchKeys {
    seen: FxHashSet<OrdinalValues>,
    /// Non-NULL keys in first-seen order
    distinct: Vec<OrdinalValues>,
}

impl BatchKeys {
    fn admit(&mut self, key: &OrdinalValues) {
        if self.seen.insert(key.clone()) && !key.has_null() {
            self.distinct.push(key.clone());
        }
    }

    fn contains(&self, key: &OrdinalValues) -> bool {
        self.seen.contains(key)
    }
}

/// Check that the inner operator consumed the channel exactly once.
fn verify_drained(index: &str, channel: Option<OuterValues>, submitted: usize) -> Result<()> {
    let Some(channel) = channel else {
        return Err(Error::catalog_contract(
            index,
            "the outer-values channel was removed by the inner operator",
        ));
    };
    if !channel.is_exhausted() {
        return Err(Error::catalog_contract(
            index,
            format!(
                "consumed {} of {} outer values",
                submitted - channel.remaining(),
                submitted
            ),
        ));
    }
    if channel.over_consumed() {
        return Err(Error::catalog_contract(
            index,
            "outer values were read past the end more than once",
        ));
    }
    Ok(())
}

impl TupleIterator for BatchHashJoinIterator<'_> {
    fn has_next(&mut self, ctx: &mut ExecutionContext) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        if self.closed {
            return Ok(false);
        }

        loop {
            if let Some(row) = self.output.pop_front() {
                self.pending = Some(row);
                return Ok(true);
            }
            match self.batch.pop_front() {
                Some((outer, key)) => self.probe(ctx, outer, key)?,
                None => {
                    if !self.next_batch(ctx)? {
                        return Ok(false);
                    }
                }
            }
        }
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Tuple> {
        let row = self
            .pending
            .take()
            .ok_or_else(|| next_without_has_next("BatchHashJoin"))?;
        ctx.increment(self.join.node_id, NodeCounter::RowsProduced, 1);
        Ok(row)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.batch.clear();
        self.output.clear();
        self.table.clear();
        self.carry = None;
        self.pending = None;
        self.outer.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnsType;
    use crate::executor::expression::{column, eq, literal};
    use crate::executor::iterator::{collect_tuples, TupleListIterator};
    use crate::executor::merger::DefaultTupleMerger;
    use crate::executor::operator::test_support::{count, CloseCounting};
    use crate::executor::operator::MaterializedOperator;
    use crate::tuple::test_support::row;

    fn outer(keys: &[Option<i64>]) -> OperatorRef {
        Box::new(MaterializedOperator::new(
            1,
            keys.iter()
                .map(|k| row(0, "a", &[Value::from(*k)]))
                .collect(),
        ))
    }

    /// Serves fixed rows, draining (or misusing) the channel
    struct ChannelInner {
        rows: Vec<Tuple>,
        /// Keys to read; `None` drains everything
        drain: Option<usize>,
        extra_reads: usize,
    }

    impl Operator for ChannelInner {
        fn node_id(&self) -> NodeId {
            2
        }
        fn name(&self) -> &str {
            "ChannelInner"
        }
        fn open<'a>(&'a self, ctx: &mut ExecutionContext) -> Result<BoxedTupleIterator<'a>> {
            if let Some(channel) = ctx.outer_values_mut() {
                match self.drain {
                    Some(n) => {
                        channel.by_ref().take(n).for_each(drop);
                    }
                    None => {
                        channel.drain_all();
                    }
                }
                for _ in 0..self.extra_reads {
                    channel.next();
                }
            }
            Ok(Box::new(TupleListIterator::new(self.rows.clone())))
        }
    }

    fn inner_rows() -> Vec<Tuple> {
        vec![
            row(1, "b", &[Value::integer(1), Value::text("A")]),
            row(1, "b", &[Value::integer(3), Value::text("B")]),
            row(1, "b", &[Value::integer(3), Value::text("C")]),
        ]
    }

    fn join_with(inner: OperatorRef, keys: &[Option<i64>], batch_size: usize) -> BatchHashJoin {
        BatchHashJoin::new(
            3,
            outer(keys),
            inner,
            vec![column("a", "c0", 0)],
            vec![column("b", "c0", 1)],
            Box::new(DefaultTupleMerger::new(1, 2)),
        )
        .unwrap()
        .with_predicate(Some(eq(column("a", "c0", 0), column("b", "c0", 1))))
        .with_index(Index::new("b", &["c0"], ColumnsType::All, batch_size))
    }

    fn run(op: &dyn Operator, ctx: &mut ExecutionContext) -> Result<Vec<String>> {
        let iter = op.open(ctx)?;
        Ok(collect_tuples(iter, ctx)?
            .iter()
            .map(|t| t.to_string())
            .collect())
    }

    fn well_behaved() -> OperatorRef {
        Box::new(ChannelInner {
            rows: inner_rows(),
            drain: None,
            extra_reads: 0,
        })
    }

    #[test]
    fn test_join_matches_and_rechecks_predicate() {
        let op = join_with(well_behaved(), &[Some(1), Some(2), Some(3)], 2);
        let mut ctx = ExecutionContext::new();
        assert_eq!(
            run(&op, &mut ctx).unwrap(),
            vec!["[a(1), b(1, A)]", "[a(3), b(3, B)]", "[a(3), b(3, C)]"]
        );
    }

    #[test]
    fn test_null_keys_never_match() {
        let op = join_with(well_behaved(), &[None, Some(1)], 10).with_mode(JoinMode::left());
        let mut ctx = ExecutionContext::new();
        assert_eq!(run(&op, &mut ctx).unwrap(), vec!["a(NULL)", "[a(1), b(1, A)]"]);
    }

    #[test]
    fn test_partial_drain_is_contract_violation() {
        let inner = Box::new(ChannelInner {
            rows: inner_rows(),
            drain: Some(1),
            extra_reads: 0,
        });
        let op = join_with(inner, &[Some(1), Some(3)], 10);
        let mut ctx = ExecutionContext::new();
        let err = run(&op, &mut ctx).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(err.to_string().contains("b(c0) ALL"));
    }

    #[test]
    fn test_over_consumption_is_contract_violation() {
        let inner = Box::new(ChannelInner {
            rows: inner_rows(),
            drain: None,
            extra_reads: 2,
        });
        let op = join_with(inner, &[Some(1)], 10);
        let mut ctx = ExecutionContext::new();
        assert!(run(&op, &mut ctx).unwrap_err().is_contract_violation());
    }

    #[test]
    fn test_batch_size_expression() {
        let mut ctx = ExecutionContext::new();
        let op = join_with(well_behaved(), &[Some(1)], 0)
            .with_batch_size(BatchSize::Expression(literal(0i64)));
        assert!(run(&op, &mut ctx).unwrap_err().is_configuration_error());

        let op = join_with(well_behaved(), &[Some(1)], 0)
            .with_batch_size(BatchSize::Expression(literal("ten")));
        assert!(run(&op, &mut ctx).unwrap_err().is_configuration_error());

        let op = join_with(well_behaved(), &[Some(1)], 0)
            .with_batch_size(BatchSize::Expression(literal(4i64)));
        assert_eq!(run(&op, &mut ctx).unwrap().len(), 1);
    }

    #[test]
    fn test_zero_index_batch_size_uses_default() {
        let op = join_with(well_behaved(), &[Some(1), Some(3)], 0);
        let mut ctx = ExecutionContext::new();
        assert_eq!(op.resolve_batch_size(&ctx).unwrap(), 500);
        assert_eq!(run(&op, &mut ctx).unwrap().len(), 3);
    }

    #[test]
    fn test_without_index_opens_inner_once() {
        let op = BatchHashJoin::new(
            3,
            outer(&[Some(3), Some(1), Some(3)]),
            Box::new(MaterializedOperator::new(2, inner_rows())),
            vec![column("a", "c0", 0)],
            vec![column("b", "c0", 1)],
            Box::new(DefaultTupleMerger::new(1, 2)),
        )
        .unwrap();
        let mut ctx = ExecutionContext::new();
        let rows = run(&op, &mut ctx).unwrap();
        assert_eq!(rows.len(), 5);
        assert!(!ctx.has_outer_values());
    }

    #[test]
    fn test_mismatched_keys_rejected() {
        let result = BatchHashJoin::new(
            3,
            outer(&[Some(1)]),
            well_behaved(),
            vec![column("a", "c0", 0)],
            vec![],
            Box::new(DefaultTupleMerger::new(1, 2)),
        );
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_close_mid_stream_closes_children_once() {
        for indexed in [true, false] {
            let outer = CloseCounting::new(
                1,
                [1, 1, 3]
                    .iter()
                    .map(|k| row(0, "a", &[Value::integer(*k)]))
                    .collect(),
            );
            let inner = CloseCounting::new(2, inner_rows());
            let (_, outer_closes) = outer.counters();
            let (inner_opens, inner_closes) = inner.counters();

            let mut op = BatchHashJoin::new(
                3,
                Box::new(outer),
                Box::new(inner),
                vec![column("a", "c0", 0)],
                vec![column("b", "c0", 1)],
                Box::new(DefaultTupleMerger::new(1, 2)),
            )
            .unwrap();
            if indexed {
                op = op.with_index(Index::new("b", &["c0"], ColumnsType::All, 1));
            }

            let mut ctx = ExecutionContext::new();
            let mut iter = op.open(&mut ctx).unwrap();
            assert!(iter.next_tuple(&mut ctx).unwrap().is_some());
            // The inner side is drained and closed while the batch loads
            assert_eq!(count(&inner_opens), 1);
            assert_eq!(count(&inner_closes), 1);
            assert_eq!(count(&outer_closes), 0);

            iter.close();
            iter.close();
            assert_eq!(count(&outer_closes), 1, "indexed {}", indexed);
            assert_eq!(count(&inner_closes), 1, "indexed {}", indexed);
            assert!(!iter.has_next(&mut ctx).unwrap());
        }
    }
}
