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

//! Volcano-style operator interface for streaming query execution.
//!
//! An operator is an immutable plan node. Every `open` call produces a new
//! iterator borrowing the operator, so a join can re-open its inner side
//! once per outer row (or once per batch) without rebuilding the plan.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ Consumer     │ ← Pulls tuples via has_next()/next()
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │ Join Op      │ ← Outer side streamed, inner side opened per batch
//! └──────┬───────┘
//!        │
//! ┌──────┴──────┐
//! │             │
//! ▼             ▼
//! ┌─────┐   ┌─────┐
//! │Scan │   │Index│ ← Drains the outer-values channel on open
//! └─────┘   └─────┘
//! ```
//!
//! The execution context is passed to `open` and to every iterator call;
//! it is never stored inside an operator or iterator.

use std::sync::Arc;

use super::context::ExecutionContext;
use super::iterator::{BoxedTupleIterator, TupleListIterator};
use super::statistics::NodeId;
use crate::core::Result;
use crate::tuple::Tuple;

/// A plan node that produces tuples.
///
/// # Thread Safety
///
/// Operators are `Send + Sync` so a built plan can be shared, but a single
/// execution (one context and its iterators) runs on one thread.
pub trait Operator: Send + Sync {
    /// Plan node id used for statistics.
    fn node_id(&self) -> NodeId;

    /// Get a descriptive name for this operator.
    fn name(&self) -> &str;

    /// Start a new iteration.
    fn open<'a>(&'a self, ctx: &mut ExecutionContext) -> Result<BoxedTupleIterator<'a>>;

    /// Get an estimate of the number of tuples this operator will produce.
    fn estimated_rows(&self) -> Option<usize> {
        None
    }
}

/// Owned operator handle
pub type OperatorRef = Box<dyn Operator>;

// ============================================================================
// Helper Operators
// ============================================================================

/// An empty operator that produces no tuples.
///
/// Useful as a placeholder or for empty result sets.
#[derive(Debug, Default)]
pub struct EmptyOperator {
    node_id: NodeId,
}

impl EmptyOperator {
    pub fn new(node_id: NodeId) -> Self {
        Self { node_id }
    }
}

impl Operator for EmptyOperator {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn name(&self) -> &str {
        "Empty"
    }

    fn open<'a>(&'a self, _ctx: &mut ExecutionContext) -> Result<BoxedTupleIterator<'a>> {
        Ok(Box::new(TupleListIterator::empty()))
    }

    fn estimated_rows(&self) -> Option<usize> {
        Some(0)
    }
}

/// An operator that yields tuples from a pre-materialized list.
///
/// This is useful for:
/// - Feeding fixed rows into a join or group-by
/// - Results that were computed elsewhere
/// - Tests
///
/// Every `open` hands out a [`TupleListIterator`], so parents get list
/// access for free.
#[derive(Debug)]
pub struct MaterializedOperator {
    node_id: NodeId,
    tuples: Arc<[Tuple]>,
}

impl MaterializedOperator {
    /// Create an operator from a vector of tuples.
    pub fn new(node_id: NodeId, tuples: Vec<Tuple>) -> Self {
        Self {
            node_id,
            tuples: tuples.into(),
        }
    }

    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }
}

impl Operator for MaterializedOperator {
    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn name(&self) -> &str {
        "Materialized"
    }

    fn open<'a>(&'a self, _ctx: &mut ExecutionContext) -> Result<BoxedTupleIterator<'a>> {
        Ok(Box::new(TupleListIterator::new(self.tuples.clone())))
    }

    fn estimated_rows(&self) -> Option<usize> {
        Some(self.tuples.len())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::executor::iterator::TupleIterator;

    /// Fixed rows that count how often their iterators are opened and closed
    ///
    /// Drains the outer-values channel when one is set, like an index scan.
    pub(crate) struct CloseCounting {
        node_id: NodeId,
        tuples: Vec<Tuple>,
        opens: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    impl CloseCounting {
        pub(crate) fn new(node_id: NodeId, tuples: Vec<Tuple>) -> Self {
            Self {
                node_id,
                tuples,
                opens: Arc::default(),
                closes: Arc::default(),
            }
        }

        /// Shared (opens, closes) counters, readable after the operator is boxed.
        pub(crate) fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
            (self.opens.clone(), self.closes.clone())
        }
    }

    impl Operator for CloseCounting {
        fn node_id(&self) -> NodeId {
            self.node_id
        }

        fn name(&self) -> &str {
            "CloseCounting"
        }

        fn open<'a>(&'a self, ctx: &mut ExecutionContext) -> Result<BoxedTupleIterator<'a>> {
            if let Some(channel) = ctx.outer_values_mut() {
                channel.drain_all();
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingIterator {
                inner: TupleListIterator::new(self.tuples.clone()),
                closes: self.closes.clone(),
            }))
        }
    }

    struct CountingIterator {
        inner: TupleListIterator,
        closes: Arc<AtomicUsize>,
    }

    impl TupleIterator for CountingIterator {
        fn has_next(&mut self, ctx: &mut ExecutionContext) -> Result<bool> {
            self.inner.has_next(ctx)
        }

        fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Tuple> {
            self.inner.next(ctx)
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.inner.close();
        }
    }

    pub(crate) fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::executor::iterator::collect_tuples;
    use crate::tuple::test_support::row;

    #[test]
    fn test_empty_operator() {
        let mut ctx = ExecutionContext::new();
        let op = EmptyOperator::new(0);
        let mut iter = op.open(&mut ctx).unwrap();

        assert!(!iter.has_next(&mut ctx).unwrap());
        assert!(!iter.has_next(&mut ctx).unwrap());

        iter.close();
    }

    #[test]
    fn test_materialized_operator() {
        let mut ctx = ExecutionContext::new();
        let tuples = vec![
            row(0, "t", &[Value::integer(1)]),
            row(0, "t", &[Value::integer(2)]),
            row(0, "t", &[Value::integer(3)]),
        ];
        let op = MaterializedOperator::new(1, tuples);

        let mut iter = op.open(&mut ctx).unwrap();
        assert_eq!(iter.as_tuple_list().map(|l| l.size()), Some(3));

        let t1 = iter.next_tuple(&mut ctx).unwrap().unwrap();
        assert_eq!(t1.value(0), Value::integer(1));
        let t2 = iter.next_tuple(&mut ctx).unwrap().unwrap();
        assert_eq!(t2.value(0), Value::integer(2));
        let t3 = iter.next_tuple(&mut ctx).unwrap().unwrap();
        assert_eq!(t3.value(0), Value::integer(3));
        assert!(iter.next_tuple(&mut ctx).unwrap().is_none());
        iter.close();

        // Re-opening starts over
        let again = collect_tuples(op.open(&mut ctx).unwrap(), &mut ctx).unwrap();
        assert_eq!(again.len(), 3);
    }
}
