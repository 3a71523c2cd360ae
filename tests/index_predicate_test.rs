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

//! Index Predicate Tests
//!
//! Tests for join condition analysis against catalog indexes:
//! - Index pairs, condition pairs, push-down pairs and residual conjuncts
//! - Join strategy selection
//! - Joins built from an analysis produce the nested-loop result

use tuplestream::catalog::{Catalog, FetchRecord, OperatorArgs};
use tuplestream::executor::expression::{
    and, column, compare, eq, literal, outer_column, ExprRef,
};
use tuplestream::executor::{
    collect_tuples, DefaultTupleMerger, ExecutionContext, JoinMode, NestedLoopJoin, Operator,
    OperatorRef,
};
use tuplestream::{
    ColumnsType, Index, IndexPredicateAnalysis, JoinStrategy, MemoryCatalog,
    Operator as CompareOp, TableSource, Value,
};

fn catalog(indices: &[Index]) -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new("mem");
    catalog
        .add_table(
            "customers",
            &["id", "region"],
            vec![
                vec![Value::integer(1), Value::text("eu")],
                vec![Value::integer(2), Value::text("us")],
                vec![Value::integer(3), Value::text("eu")],
            ],
        )
        .unwrap();
    catalog
        .add_table(
            "orders",
            &["id", "customer_id", "region", "status"],
            vec![
                vec![Value::integer(10), Value::integer(1), Value::text("eu"), Value::text("open")],
                vec![Value::integer(11), Value::integer(1), Value::text("eu"), Value::text("closed")],
                vec![Value::integer(12), Value::integer(2), Value::text("us"), Value::text("open")],
                vec![Value::integer(13), Value::integer(3), Value::text("us"), Value::text("open")],
                vec![Value::integer(14), Value::integer(3), Value::text("eu"), Value::text("open")],
            ],
        )
        .unwrap();
    for index in indices {
        catalog.add_index(index.clone()).unwrap();
    }
    catalog
}

fn o(name: &str) -> ExprRef {
    column("o", name, 1)
}

fn c(name: &str) -> ExprRef {
    column("c", name, 0)
}

/// `o.customer_id = c.id AND o.region = c.region AND o.status = 'open'`
fn condition() -> ExprRef {
    and(vec![
        eq(o("customer_id"), c("id")),
        eq(c("region"), o("region")),
        eq(o("status"), literal("open")),
    ])
}

fn outer(catalog: &MemoryCatalog) -> OperatorRef {
    catalog
        .get_scan_operator(OperatorArgs::new(1, TableSource::new("customers", "c", 0)))
        .unwrap()
}

fn inner_source() -> TableSource {
    TableSource::new("orders", "o", 1)
}

fn run(op: OperatorRef) -> Vec<String> {
    let mut ctx = ExecutionContext::new();
    let rows = collect_tuples(op.open(&mut ctx).unwrap(), &mut ctx).unwrap();
    let mut rendered: Vec<String> = rows.iter().map(|t| t.to_string()).collect();
    rendered.sort();
    rendered
}

fn build(
    catalog: &MemoryCatalog,
    analysis: &IndexPredicateAnalysis,
    mode: JoinMode,
) -> OperatorRef {
    analysis
        .build_join(
            catalog,
            2,
            outer(catalog),
            inner_source(),
            mode,
            Box::new(DefaultTupleMerger::new(1, 2)),
        )
        .unwrap()
}

fn reference(catalog: &MemoryCatalog, mode: JoinMode) -> Vec<String> {
    let inner = catalog
        .get_scan_operator(OperatorArgs::new(3, inner_source()))
        .unwrap();
    run(Box::new(
        NestedLoopJoin::new(2, outer(catalog), inner, Box::new(DefaultTupleMerger::new(1, 2)))
            .with_predicate(Some(condition()))
            .with_mode(mode),
    ))
}

#[test]
fn test_classification_with_composite_index() {
    let index = Index::new("orders", &["customer_id", "region"], ColumnsType::All, 10);
    let catalog = catalog(&[index]);
    let analysis =
        IndexPredicateAnalysis::analyze(Some(&condition()), 1, &catalog.get_indices("orders"))
            .unwrap();

    let predicate = analysis.index_predicate.as_ref().unwrap();
    assert_eq!(predicate.columns, vec!["customer_id", "region"]);
    assert_eq!(analysis.index_pairs.len(), 2);
    assert!(analysis.condition_pairs.is_empty());
    assert_eq!(analysis.push_down_pairs.len(), 1);
    assert_eq!(analysis.push_down_pairs[0].inner_column, "status");
    assert!(analysis.residual.is_empty());
    assert_eq!(analysis.strategy(), JoinStrategy::IndexedHashJoin);
    assert_eq!(analysis.outer_key_expressions().len(), 2);
}

#[test]
fn test_indexed_join_matches_nested_loop() {
    let index = Index::new("orders", &["customer_id", "region"], ColumnsType::All, 2);
    let catalog = catalog(&[index]);
    let analysis =
        IndexPredicateAnalysis::analyze(Some(&condition()), 1, &catalog.get_indices("orders"))
            .unwrap();

    for mode in [JoinMode::inner(), JoinMode::left(), JoinMode::left().with_populating(true)] {
        let expected = reference(&catalog, mode);
        catalog.clear_fetch_log();
        assert_eq!(run(build(&catalog, &analysis, mode)), expected);

        let index_fetches = catalog
            .fetch_log()
            .into_iter()
            .filter(FetchRecord::is_index)
            .count();
        assert_eq!(index_fetches, 2);
    }

    let rows = run(build(&catalog, &analysis, JoinMode::inner()));
    assert_eq!(
        rows,
        vec![
            "[customers(1, eu), orders(10, 1, eu, open)]",
            "[customers(2, us), orders(12, 2, us, open)]",
            "[customers(3, eu), orders(14, 3, eu, open)]",
        ]
    );
}

#[test]
fn test_unusable_index_falls_back_to_hash_join() {
    // ANY_IN_ORDER needs a pair for its first column
    let index = Index::new("orders", &["id", "customer_id"], ColumnsType::AnyInOrder, 10);
    let catalog = catalog(&[index]);
    let analysis =
        IndexPredicateAnalysis::analyze(Some(&condition()), 1, &catalog.get_indices("orders"))
            .unwrap();

    assert!(analysis.index_predicate.is_none());
    assert!(analysis.index_pairs.is_empty());
    assert_eq!(analysis.condition_pairs.len(), 2);
    assert_eq!(analysis.strategy(), JoinStrategy::HashJoin);

    let expected = reference(&catalog, JoinMode::left());
    catalog.clear_fetch_log();
    assert_eq!(run(build(&catalog, &analysis, JoinMode::left())), expected);
    // One scan of each side
    assert_eq!(catalog.fetch_count("orders"), 1);
    assert_eq!(catalog.fetch_count("customers"), 1);
}

#[test]
fn test_wildcard_index_takes_every_pair() {
    let catalog = catalog(&[Index::wildcard("orders", 5)]);
    let analysis =
        IndexPredicateAnalysis::analyze(Some(&condition()), 1, &catalog.get_indices("orders"))
            .unwrap();
    let predicate = analysis.index_predicate.as_ref().unwrap();
    assert_eq!(predicate.columns, vec!["customer_id", "region", "status"]);
    assert!(analysis.push_down_pairs.is_empty());

    let expected = reference(&catalog, JoinMode::inner());
    assert_eq!(run(build(&catalog, &analysis, JoinMode::inner())), expected);
}

#[test]
fn test_non_equi_condition_uses_nested_loop() {
    let catalog = catalog(&[]);
    let condition = and(vec![
        compare(o("customer_id"), CompareOp::Lt, c("id")),
        eq(o("status"), literal("open")),
    ]);
    let analysis = IndexPredicateAnalysis::analyze(Some(&condition), 1, &[]).unwrap();
    assert_eq!(analysis.strategy(), JoinStrategy::NestedLoop);
    assert_eq!(analysis.residual.len(), 1);
    assert_eq!(analysis.push_down_pairs.len(), 1);

    let rows = run(build(&catalog, &analysis, JoinMode::inner()));
    // (2, 1-open) (3, 1-open) (3, 2-open)
    assert_eq!(rows.len(), 3);
}

#[test]
fn test_correlated_condition() {
    let index = Index::new("orders", &["customer_id"], ColumnsType::All, 10);
    let catalog = catalog(&[index]);
    let condition = and(vec![
        eq(o("customer_id"), c("id")),
        eq(o("region"), outer_column("q", "region", 0)),
    ]);
    let analysis =
        IndexPredicateAnalysis::analyze(Some(&condition), 1, &catalog.get_indices("orders"))
            .unwrap();
    assert!(analysis.correlated);
    assert_eq!(analysis.strategy(), JoinStrategy::NestedLoop);
}
