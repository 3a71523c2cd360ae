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

//! Join condition analysis against declared indexes.
//!
//! A join condition is split into its AND-ed conjuncts. Every conjunct of
//! the form `inner.col = <expr not reading the inner source>` becomes an
//! [`AnalyzePair`]; anything else is residual. The pairs are then matched
//! against the inner table's indexes in declaration order and the first
//! usable index wins:
//!
//! | Columns type | Match rule |
//! |--------------|------------|
//! | `ALL` | every declared column has a pair |
//! | `ANY` | declared columns with a pair, misses skipped |
//! | `ANY_IN_ORDER` | longest matched prefix of the declared columns |
//! | `WILDCARD` | every pair, in condition order |
//!
//! Pairs not consumed by the index are leftovers: condition pairs when the
//! outer side is dynamic, push-down pairs when it folds to a constant.

use std::fmt;

use crate::catalog::{Catalog, ColumnsType, Index, IndexPredicate, OperatorArgs, TableSource};
use crate::core::{Error, Operator as CompareOp, Result};
use crate::executor::expression::{and, eq, fold_constant, ExprRef, LogicalOperator};
use crate::executor::merger::TupleMerger;
use crate::executor::operator::OperatorRef;
use crate::executor::operators::{BatchHashJoin, JoinMode, NestedLoopJoin};
use crate::executor::statistics::NodeId;

/// An equality between one inner column and an expression that does not
/// read the inner table source
#[derive(Debug, Clone)]
pub struct AnalyzePair {
    /// Column name on the inner side
    pub inner_column: String,
    /// Expression reading `inner_column` from the inner tuple
    pub inner_expression: ExprRef,
    /// The other side, constant-folded when possible
    pub outer_expression: ExprRef,
}

impl AnalyzePair {
    /// True when the outer side folded to a literal.
    pub fn is_constant(&self) -> bool {
        self.outer_expression.is_constant()
    }

    /// The pair as an equality predicate.
    pub fn to_predicate(&self) -> ExprRef {
        eq(self.inner_expression.clone(), self.outer_expression.clone())
    }
}

impl fmt::Display for AnalyzePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {:?}", self.inner_column, self.outer_expression)
    }
}

/// How a join with an analyzed condition should be executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    /// `BatchHashJoin` with keys pushed to the inner index operator
    IndexedHashJoin,
    /// `BatchHashJoin` over a single inner scan
    HashJoin,
    /// `NestedLoopJoin` re-opening the inner side per outer row
    NestedLoop,
}

/// Classification of a join condition for one inner table source
#[derive(Debug, Clone, Default)]
pub struct IndexPredicateAnalysis {
    /// The matched index and the inner columns it is probed with
    pub index_predicate: Option<IndexPredicate>,
    /// Pairs consumed by the index, aligned with `index_predicate.columns`
    pub index_pairs: Vec<AnalyzePair>,
    /// Leftover equalities whose outer side is dynamic
    pub condition_pairs: Vec<AnalyzePair>,
    /// Leftover equalities against constants
    pub push_down_pairs: Vec<AnalyzePair>,
    /// Conjuncts that are not inner-column equalities
    pub residual: Vec<ExprRef>,
    /// The condition reads the enclosing query's outer tuple
    pub correlated: bool,
}

impl IndexPredicateAnalysis {
    /// Analyze `condition` for the inner source at `inner_ordinal`.
    ///
    /// `indices` are tried in order. A missing condition yields an empty
    /// analysis (a cross join).
    pub fn analyze(
        condition: Option<&ExprRef>,
        inner_ordinal: usize,
        indices: &[Index],
    ) -> Result<Self> {
        let mut analysis = Self::default();
        let Some(condition) = condition else {
            return Ok(analysis);
        };
        analysis.correlated = reads_outer_tuple(condition);

        let mut pairs = Vec::new();
        for conjunct in flatten_conjunction(condition) {
            match extract_pair(&conjunct, inner_ordinal)? {
                Some(pair) => pairs.push(pair),
                None => analysis.residual.push(conjunct),
            }
        }

        let mut consumed = vec![false; pairs.len()];
        for index in indices {
            if let Some(matched) = match_index(index, &pairs) {
                let columns = matched
                    .iter()
                    .map(|&i| pairs[i].inner_column.clone())
                    .collect();
                for &i in &matched {
                    consumed[i] = true;
                }
                analysis.index_pairs = matched.iter().map(|&i| pairs[i].clone()).collect();
                analysis.index_predicate = Some(IndexPredicate::new(index.clone(), columns));
                break;
            }
        }

        for (pair, consumed) in pairs.into_iter().zip(consumed) {
            if consumed {
                continue;
            }
            if pair.is_constant() {
                analysis.push_down_pairs.push(pair);
            } else {
                analysis.condition_pairs.push(pair);
            }
        }

        tracing::debug!(
            index = ?analysis.index_predicate.as_ref().map(|p| p.index.identity()),
            index_pairs = analysis.index_pairs.len(),
            condition_pairs = analysis.condition_pairs.len(),
            push_down_pairs = analysis.push_down_pairs.len(),
            residual = analysis.residual.len(),
            "analyzed join condition"
        );
        Ok(analysis)
    }

    pub fn strategy(&self) -> JoinStrategy {
        if self.correlated {
            JoinStrategy::NestedLoop
        } else if self.index_predicate.is_some() {
            JoinStrategy::IndexedHashJoin
        } else if !self.condition_pairs.is_empty() {
            JoinStrategy::HashJoin
        } else {
            JoinStrategy::NestedLoop
        }
    }

    /// Pairs providing the hash key for the chosen strategy.
    fn key_pairs(&self) -> &[AnalyzePair] {
        match self.strategy() {
            JoinStrategy::IndexedHashJoin => &self.index_pairs,
            JoinStrategy::HashJoin => &self.condition_pairs,
            JoinStrategy::NestedLoop => &[],
        }
    }

    /// Key expressions evaluated on outer rows.
    pub fn outer_key_expressions(&self) -> Vec<ExprRef> {
        self.key_pairs()
            .iter()
            .map(|p| p.outer_expression.clone())
            .collect()
    }

    /// Key expressions evaluated on inner rows, aligned with
    /// [`outer_key_expressions`](Self::outer_key_expressions).
    pub fn inner_key_expressions(&self) -> Vec<ExprRef> {
        self.key_pairs()
            .iter()
            .map(|p| p.inner_expression.clone())
            .collect()
    }

    /// Filter for the inner scan built from the push-down pairs.
    pub fn push_down_predicate(&self) -> Option<ExprRef> {
        conjunction(self.push_down_pairs.iter().map(AnalyzePair::to_predicate).collect())
    }

    /// Predicate re-checked on every merged candidate: index and condition
    /// pairs plus the residual conjuncts. Push-down pairs are applied by
    /// the inner scan instead.
    pub fn join_predicate(&self) -> Option<ExprRef> {
        let mut conjuncts: Vec<ExprRef> = self
            .index_pairs
            .iter()
            .chain(&self.condition_pairs)
            .map(AnalyzePair::to_predicate)
            .collect();
        conjuncts.extend(self.residual.iter().cloned());
        conjunction(conjuncts)
    }

    /// Build the join operator for this analysis.
    ///
    /// The inner operator gets `node_id + 1`.
    pub fn build_join(
        &self,
        catalog: &dyn Catalog,
        node_id: NodeId,
        outer: OperatorRef,
        inner_source: TableSource,
        mode: JoinMode,
        merger: Box<dyn TupleMerger>,
    ) -> Result<OperatorRef> {
        let args = OperatorArgs::new(node_id + 1, inner_source)
            .with_predicate(self.push_down_predicate());

        match self.strategy() {
            JoinStrategy::IndexedHashJoin => {
                let predicate = self.index_predicate.clone().ok_or_else(|| {
                    Error::internal("indexed join strategy without an index predicate")
                })?;
                let index = predicate.index.clone();
                let inner = catalog.get_index_operator(args, predicate)?;
                Ok(Box::new(
                    BatchHashJoin::new(
                        node_id,
                        outer,
                        inner,
                        self.outer_key_expressions(),
                        self.inner_key_expressions(),
                        merger,
                    )?
                    .with_index(index)
                    .with_predicate(self.join_predicate())
                    .with_mode(mode),
                ))
            }
            JoinStrategy::HashJoin => {
                let inner = catalog.get_scan_operator(args)?;
                Ok(Box::new(
                    BatchHashJoin::new(
                        node_id,
                        outer,
                        inner,
                        self.outer_key_expressions(),
                        self.inner_key_expressions(),
                        merger,
                    )?
                    .with_predicate(self.join_predicate())
                    .with_mode(mode),
                ))
            }
            JoinStrategy::NestedLoop => {
                let inner = catalog.get_scan_operator(args)?;
                Ok(Box::new(
                    NestedLoopJoin::new(node_id, outer, inner, merger)
                        .with_predicate(self.join_predicate())
                        .with_mode(mode),
                ))
            }
        }
    }
}

/// Split `a AND (b AND c)` into `[a, b, c]`.
pub fn flatten_conjunction(expr: &ExprRef) -> Vec<ExprRef> {
    match expr.as_logical() {
        Some(logical) if logical.op == LogicalOperator::And => logical
            .operands
            .iter()
            .flat_map(flatten_conjunction)
            .collect(),
        _ => vec![expr.clone()],
    }
}

fn conjunction(mut conjuncts: Vec<ExprRef>) -> Option<ExprRef> {
    match conjuncts.len() {
        0 => None,
        1 => conjuncts.pop(),
        _ => Some(and(conjuncts)),
    }
}

/// Column name if `expr` reads a column of the inner source directly.
fn inner_column(expr: &ExprRef, inner_ordinal: usize) -> Option<String> {
    let reference = expr.as_column_reference()?;
    (!reference.outer && reference.tuple_ordinal == Some(inner_ordinal))
        .then(|| reference.column().to_string())
}

/// True if evaluating `expr` may read the inner source. Unqualified
/// columns count as inner reads.
fn reads_inner(expr: &ExprRef, inner_ordinal: usize) -> bool {
    if let Some(reference) = expr.as_column_reference() {
        return !reference.outer
            && reference.tuple_ordinal.map_or(true, |o| o == inner_ordinal);
    }
    expr.children()
        .into_iter()
        .any(|child| reads_inner(child, inner_ordinal))
}

fn reads_outer_tuple(expr: &ExprRef) -> bool {
    if let Some(reference) = expr.as_column_reference() {
        return reference.outer;
    }
    expr.children().into_iter().any(reads_outer_tuple)
}

fn extract_pair(conjunct: &ExprRef, inner_ordinal: usize) -> Result<Option<AnalyzePair>> {
    let Some(comparison) = conjunct.as_comparison() else {
        return Ok(None);
    };
    if comparison.op != CompareOp::Eq {
        return Ok(None);
    }

    let sides = [
        (&comparison.left, &comparison.right),
        (&comparison.right, &comparison.left),
    ];
    for (inner, other) in sides {
        if let Some(column) = inner_column(inner, inner_ordinal) {
            if !reads_inner(other, inner_ordinal) {
                return Ok(Some(AnalyzePair {
                    inner_column: column,
                    inner_expression: inner.clone(),
                    outer_expression: fold_constant(other)?,
                }));
            }
        }
    }
    Ok(None)
}

/// Indices into `pairs` consumed by `index`, in key order; `None` if the
/// index is not usable.
fn match_index(index: &Index, pairs: &[AnalyzePair]) -> Option<Vec<usize>> {
    if index.columns_type == ColumnsType::Wildcard {
        return (!pairs.is_empty()).then(|| (0..pairs.len()).collect());
    }

    let mut matched = Vec::with_capacity(index.columns.len());
    for column in &index.columns {
        let found = pairs
            .iter()
            .enumerate()
            .find(|(i, p)| !matched.contains(i) && p.inner_column.eq_ignore_ascii_case(column))
            .map(|(i, _)| i);
        match (found, index.columns_type) {
            (Some(i), _) => matched.push(i),
            (None, ColumnsType::All) => return None,
            (None, ColumnsType::AnyInOrder) => break,
            (None, _) => {}
        }
    }
    (!matched.is_empty()).then_some(matched)
}
