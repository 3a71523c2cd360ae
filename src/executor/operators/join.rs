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

//! Match handling shared by the join operators.

use crate::core::Result;
use crate::executor::context::ExecutionContext;
use crate::executor::expression::ExprRef;
use crate::executor::merger::TupleMerger;
use crate::tuple::Tuple;

/// Output shape of a join
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinMode {
    /// Collect all matches of an outer row under one output row
    pub populating: bool,
    /// Emit outer rows without any match (LEFT semantics)
    pub emit_empty_outer_rows: bool,
}

impl JoinMode {
    pub fn inner() -> Self {
        Self::default()
    }

    pub fn left() -> Self {
        Self {
            populating: false,
            emit_empty_outer_rows: true,
        }
    }

    pub fn with_populating(mut self, populating: bool) -> Self {
        self.populating = populating;
        self
    }

    pub fn with_emit_empty_outer_rows(mut self, emit: bool) -> Self {
        self.emit_empty_outer_rows = emit;
        self
    }
}

/// Evaluate the join predicate against a merged candidate.
///
/// No predicate means a cross join: every candidate matches.
pub(crate) fn predicate_matches(
    predicate: Option<&ExprRef>,
    ctx: &mut ExecutionContext,
    candidate: &Tuple,
) -> Result<bool> {
    match predicate {
        Some(predicate) => {
            ctx.with_tuple(candidate.clone(), |ctx| predicate.evaluate_predicate(ctx))
        }
        None => Ok(true),
    }
}

/// Matches recorded for the outer row currently being joined
#[derive(Debug)]
pub(crate) struct OuterRowMatches {
    outer: Tuple,
    /// Populating result grown in place across matches
    populated: Option<Tuple>,
    matched: bool,
}

impl OuterRowMatches {
    pub(crate) fn new(outer: Tuple) -> Self {
        Self {
            outer,
            populated: None,
            matched: false,
        }
    }

    pub(crate) fn outer(&self) -> &Tuple {
        &self.outer
    }

    /// Test `inner` against the predicate and record it on success.
    ///
    /// Returns the merged row to emit right away in non-populating mode.
    pub(crate) fn offer(
        &mut self,
        merger: &dyn TupleMerger,
        predicate: Option<&ExprRef>,
        mode: JoinMode,
        ctx: &mut ExecutionContext,
        inner: Tuple,
    ) -> Result<Option<Tuple>> {
        let candidate = merger.merge(self.outer.clone(), inner.clone(), false)?;
        if !predicate_matches(predicate, ctx, &candidate)? {
            return Ok(None);
        }
        self.matched = true;
        if !mode.populating {
            return Ok(Some(candidate));
        }

        let base = match self.populated.take() {
            Some(populated) => populated,
            None => self.outer.clone(),
        };
        self.populated = Some(merger.merge(base, inner, true)?);
        Ok(None)
    }

    /// The row to emit once every inner candidate has been offered.
    pub(crate) fn finish(self, mode: JoinMode) -> Option<Tuple> {
        if let Some(populated) = self.populated {
            return Some(populated);
        }
        if !self.matched && mode.emit_empty_outer_rows {
            return Some(self.outer);
        }
        None
    }
}
