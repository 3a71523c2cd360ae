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

//! Pull-based tuple iteration.
//!
//! ```text
//! parent ── has_next(ctx) ──► child
//!        ◄── true ───────────
//!        ── next(ctx) ──────►
//!        ◄── Tuple ──────────
//!        ── close() ────────► (propagates to grandchildren)
//! ```
//!
//! `has_next` may do work but is idempotent until the following `next`.
//! `next` without a confirmed `has_next` is an [`Error::InvalidState`].
//! `close` is idempotent and releases children.
//!
//! A [`TupleList`] is a fully materialized, randomly indexable result.
//! Iterators that hold everything in memory expose one through
//! [`TupleIterator::as_tuple_list`] so a parent can index instead of pull.

use std::sync::Arc;

use super::context::ExecutionContext;
use crate::core::{Error, Result};
use crate::tuple::Tuple;

/// Streaming tuple source returned by `Operator::open`
pub trait TupleIterator {
    /// Returns true if another tuple is available.
    fn has_next(&mut self, ctx: &mut ExecutionContext) -> Result<bool>;

    /// The next tuple; only valid after `has_next` returned true.
    fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Tuple>;

    /// Release resources and close children. Safe to call repeatedly.
    fn close(&mut self);

    /// Random access view when every tuple is already in memory.
    fn as_tuple_list(&self) -> Option<&dyn TupleList> {
        None
    }

    /// `has_next` + `next` in one call.
    fn next_tuple(&mut self, ctx: &mut ExecutionContext) -> Result<Option<Tuple>> {
        if self.has_next(ctx)? {
            Ok(Some(self.next(ctx)?))
        } else {
            Ok(None)
        }
    }
}

/// Boxed iterator borrowing its operator
pub type BoxedTupleIterator<'a> = Box<dyn TupleIterator + 'a>;

/// A finite, randomly indexable result
pub trait TupleList {
    fn size(&self) -> usize;

    fn get(&self, index: usize) -> Option<&Tuple>;
}

/// Error for `next` without a confirmed `has_next`.
pub fn next_without_has_next(operator: &str) -> Error {
    Error::invalid_state(format!(
        "{}: next() called without has_next() returning true",
        operator
    ))
}

// ============================================================================
// TupleListIterator
// ============================================================================

/// A materialized list that also speaks the iterator protocol
pub struct TupleListIterator {
    tuples: Arc<[Tuple]>,
    position: usize,
    confirmed: bool,
}

impl TupleListIterator {
    pub fn new(tuples: impl Into<Arc<[Tuple]>>) -> Self {
        Self {
            tuples: tuples.into(),
            position: 0,
            confirmed: false,
        }
    }

    /// An empty list.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }
}

impl TupleList for TupleListIterator {
    fn size(&self) -> usize {
        self.tuples.len()
    }

    fn get(&self, index: usize) -> Option<&Tuple> {
        self.tuples.get(index)
    }
}

impl TupleIterator for TupleListIterator {
    fn has_next(&mut self, _ctx: &mut ExecutionContext) -> Result<bool> {
        self.confirmed = self.position < self.tuples.len();
        Ok(self.confirmed)
    }

    fn next(&mut self, _ctx: &mut ExecutionContext) -> Result<Tuple> {
        if !self.confirmed {
            return Err(next_without_has_next("TupleList"));
        }
        self.confirmed = false;
        let tuple = self.tuples[self.position].clone();
        self.position += 1;
        Ok(tuple)
    }

    fn close(&mut self) {
        self.position = self.tuples.len();
        self.confirmed = false;
    }

    fn as_tuple_list(&self) -> Option<&dyn TupleList> {
        Some(self)
    }
}

// ============================================================================
// TupleIteratorAdapter
// ============================================================================

/// Wraps any iterator, switching to index access when it is a list
pub struct TupleIteratorAdapter<'a> {
    inner: BoxedTupleIterator<'a>,
    /// Next list index, used only when `inner` is a list
    index: usize,
    confirmed: bool,
    closed: bool,
}

impl<'a> TupleIteratorAdapter<'a> {
    pub fn new(inner: BoxedTupleIterator<'a>) -> Self {
        Self {
            inner,
            index: 0,
            confirmed: false,
            closed: false,
        }
    }

    /// Returns true if the wrapped iterator is a list.
    pub fn is_list(&self) -> bool {
        self.inner.as_tuple_list().is_some()
    }

    /// Collect every remaining tuple and close.
    ///
    /// A wrapped list is copied by index rather than pulled through the
    /// iterator protocol.
    pub fn materialize(mut self, ctx: &mut ExecutionContext) -> Result<Vec<Tuple>> {
        if let Some(list) = self.inner.as_tuple_list() {
            let tuples = (self.index..list.size())
                .filter_map(|i| list.get(i).cloned())
                .collect();
            self.close();
            return Ok(tuples);
        }

        let mut tuples = Vec::new();
        let result = loop {
            match self.inner.next_tuple(ctx) {
                Ok(Some(tuple)) => tuples.push(tuple),
                Ok(None) => break Ok(tuples),
                Err(e) => break Err(e),
            }
        };
        self.close();
        result
    }
}

impl TupleIterator for TupleIteratorAdapter<'_> {
    fn has_next(&mut self, ctx: &mut ExecutionContext) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        if let Some(list) = self.inner.as_tuple_list() {
            self.confirmed = self.index < list.size();
            return Ok(self.confirmed);
        }
        self.inner.has_next(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Tuple> {
        if let Some(list) = self.inner.as_tuple_list() {
            if !self.confirmed {
                return Err(next_without_has_next("TupleIteratorAdapter"));
            }
            self.confirmed = false;
            let tuple = list
                .get(self.index)
                .cloned()
                .ok_or_else(|| Error::internal("tuple list shrank during iteration"))?;
            self.index += 1;
            return Ok(tuple);
        }
        self.inner.next(ctx)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.close();
        }
    }

    fn as_tuple_list(&self) -> Option<&dyn TupleList> {
        self.inner.as_tuple_list()
    }
}

/// Drain an iterator into a `Vec`, closing it afterwards.
pub fn collect_tuples(
    iter: BoxedTupleIterator<'_>,
    ctx: &mut ExecutionContext,
) -> Result<Vec<Tuple>> {
    TupleIteratorAdapter::new(iter).materialize(ctx)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::core::Value;
    use crate::tuple::test_support::row;

    /// Streams tuples without exposing a list
    struct Streaming {
        inner: TupleListIterator,
        closes: Arc<AtomicUsize>,
    }

    impl TupleIterator for Streaming {
        fn has_next(&mut self, ctx: &mut ExecutionContext) -> Result<bool> {
            self.inner.has_next(ctx)
        }
        fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Tuple> {
            self.inner.next(ctx)
        }
        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn rows(n: i64) -> Vec<Tuple> {
        (0..n).map(|i| row(0, "t", &[Value::integer(i)])).collect()
    }

    #[test]
    fn test_list_iterator_protocol() {
        let mut ctx = ExecutionContext::new();
        let mut iter = TupleListIterator::new(rows(2));

        assert!(iter.has_next(&mut ctx).unwrap());
        assert!(iter.has_next(&mut ctx).unwrap());
        assert_eq!(iter.next(&mut ctx).unwrap().value(0), Value::integer(0));

        // next without has_next is a state error
        assert!(iter.next(&mut ctx).unwrap_err().is_state_error());

        assert!(iter.has_next(&mut ctx).unwrap());
        assert_eq!(iter.next(&mut ctx).unwrap().value(0), Value::integer(1));
        assert!(!iter.has_next(&mut ctx).unwrap());

        iter.close();
        iter.close();
    }

    #[test]
    fn test_adapter_uses_list_access() {
        let mut ctx = ExecutionContext::new();
        let adapter = TupleIteratorAdapter::new(Box::new(TupleListIterator::new(rows(3))));
        assert!(adapter.is_list());
        assert_eq!(adapter.materialize(&mut ctx).unwrap().len(), 3);
    }

    #[test]
    fn test_adapter_streams_and_closes_once() {
        let mut ctx = ExecutionContext::new();
        let closes = Arc::new(AtomicUsize::new(0));
        let mut adapter = TupleIteratorAdapter::new(Box::new(Streaming {
            inner: TupleListIterator::new(rows(2)),
            closes: closes.clone(),
        }));
        assert!(!adapter.is_list());

        let mut seen = 0;
        while let Some(_tuple) = adapter.next_tuple(&mut ctx).unwrap() {
            seen += 1;
        }
        assert_eq!(seen, 2);
        adapter.close();
        adapter.close();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(!adapter.has_next(&mut ctx).unwrap());
    }
}
