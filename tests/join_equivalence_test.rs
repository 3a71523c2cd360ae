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

//! Join Equivalence Tests
//!
//! BatchHashJoin must produce the same rows as NestedLoopJoin for:
//! - Every batch size from 1 to the outer row count
//! - Populating and non-populating merges
//! - INNER and LEFT semantics
//! - Duplicate and NULL keys on both sides, with a residual predicate

use tuplestream::catalog::{Catalog, OperatorArgs};
use tuplestream::executor::expression::{and, column, compare, eq, literal};
use tuplestream::executor::{
    collect_tuples, BatchSize, DefaultTupleMerger, ExecutionContext, ExprRef, JoinMode, Operator,
    OperatorRef,
};
use tuplestream::{
    BatchHashJoin, ColumnsType, Index, IndexPredicate, MemoryCatalog, NestedLoopJoin,
    Operator as CompareOp, TableSource, Value,
};

const OUTER_ROWS: usize = 9;

fn catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new("mem");
    catalog
        .add_table(
            "customers",
            &["id", "name"],
            vec![
                vec![Value::integer(1), Value::text("ada")],
                vec![Value::integer(1), Value::text("ada-dup")],
                vec![Value::integer(2), Value::text("grace")],
                vec![Value::null_unknown(), Value::text("nobody")],
                vec![Value::integer(3), Value::text("edsger")],
                vec![Value::integer(4), Value::text("barbara")],
                vec![Value::integer(2), Value::text("grace-dup")],
                vec![Value::integer(5), Value::text("alan")],
                vec![Value::integer(3), Value::text("edsger-dup")],
            ],
        )
        .unwrap();
    catalog
        .add_table(
            "orders",
            &["id", "customer_id", "amount"],
            vec![
                vec![Value::integer(100), Value::integer(1), Value::integer(10)],
                vec![Value::integer(101), Value::integer(2), Value::integer(3)],
                vec![Value::integer(102), Value::integer(1), Value::integer(7)],
                vec![Value::integer(103), Value::null_unknown(), Value::integer(50)],
                vec![Value::integer(104), Value::integer(3), Value::integer(1)],
                vec![Value::integer(105), Value::integer(5), Value::integer(20)],
                vec![Value::integer(106), Value::integer(2), Value::integer(9)],
                vec![Value::integer(107), Value::integer(9), Value::integer(99)],
            ],
        )
        .unwrap();
    catalog
        .add_index(Index::new("orders", &["customer_id"], ColumnsType::All, 0))
        .unwrap();
    catalog
}

fn outer_key() -> ExprRef {
    column("c", "id", 0)
}

fn inner_key() -> ExprRef {
    column("o", "customer_id", 1)
}

/// `o.customer_id = c.id AND o.amount > 5`
fn predicate() -> ExprRef {
    and(vec![
        eq(inner_key(), outer_key()),
        compare(column("o", "amount", 1), CompareOp::Gt, literal(5i64)),
    ])
}

fn scan(
    catalog: &MemoryCatalog,
    node_id: usize,
    table: &str,
    alias: &str,
    ordinal: usize,
) -> OperatorRef {
    let source = TableSource::new(table, alias, ordinal);
    catalog
        .get_scan_operator(OperatorArgs::new(node_id, source))
        .unwrap()
}

fn index_inner(catalog: &MemoryCatalog) -> (Index, OperatorRef) {
    let index = catalog.get_indices("orders").remove(0);
    let inner = catalog
        .get_index_operator(
            OperatorArgs::new(3, TableSource::new("orders", "o", 1)),
            IndexPredicate::new(index.clone(), vec!["customer_id".to_string()]),
        )
        .unwrap();
    (index, inner)
}

fn merger() -> Box<DefaultTupleMerger> {
    Box::new(DefaultTupleMerger::new(1, 2))
}

fn run(op: &dyn Operator) -> Vec<String> {
    let mut ctx = ExecutionContext::new();
    let rows = collect_tuples(op.open(&mut ctx).unwrap(), &mut ctx).unwrap();
    let mut rendered: Vec<String> = rows.iter().map(|t| t.to_string()).collect();
    rendered.sort();
    rendered
}

fn modes() -> Vec<JoinMode> {
    let mut modes = Vec::new();
    for populating in [false, true] {
        for emit_empty in [false, true] {
            modes.push(
                JoinMode::inner()
                    .with_populating(populating)
                    .with_emit_empty_outer_rows(emit_empty),
            );
        }
    }
    modes
}

fn nested_loop(catalog: &MemoryCatalog, mode: JoinMode) -> NestedLoopJoin {
    NestedLoopJoin::new(
        2,
        scan(catalog, 1, "customers", "c", 0),
        scan(catalog, 3, "orders", "o", 1),
        merger(),
    )
    .with_predicate(Some(predicate()))
    .with_mode(mode)
}

#[test]
fn test_indexed_batch_hash_join_matches_nested_loop() {
    let catalog = catalog();
    for mode in modes() {
        let expected = run(&nested_loop(&catalog, mode));
        assert!(!expected.is_empty());

        for batch_size in 1..=OUTER_ROWS {
            let (index, inner) = index_inner(&catalog);
            let join = BatchHashJoin::new(
                2,
                scan(&catalog, 1, "customers", "c", 0),
                inner,
                vec![outer_key()],
                vec![inner_key()],
                merger(),
            )
            .unwrap()
            .with_index(index)
            .with_batch_size(BatchSize::Fixed(batch_size))
            .with_predicate(Some(predicate()))
            .with_mode(mode);

            assert_eq!(
                run(&join),
                expected,
                "batch size {} populating {} emit_empty {}",
                batch_size,
                mode.populating,
                mode.emit_empty_outer_rows
            );
        }
    }
}

#[test]
fn test_unindexed_batch_hash_join_matches_nested_loop() {
    let catalog = catalog();
    for mode in modes() {
        let expected = run(&nested_loop(&catalog, mode));
        let join = BatchHashJoin::new(
            2,
            scan(&catalog, 1, "customers", "c", 0),
            scan(&catalog, 3, "orders", "o", 1),
            vec![outer_key()],
            vec![inner_key()],
            merger(),
        )
        .unwrap()
        .with_predicate(Some(predicate()))
        .with_mode(mode);
        assert_eq!(run(&join), expected);
    }
}

#[test]
fn test_expected_row_shapes() {
    let catalog = catalog();

    // INNER, non-populating: one composite per passing match
    let rows = run(&nested_loop(&catalog, JoinMode::inner()));
    assert_eq!(
        rows,
        vec![
            "[customers(1, ada), orders(100, 1, 10)]",
            "[customers(1, ada), orders(102, 1, 7)]",
            "[customers(1, ada-dup), orders(100, 1, 10)]",
            "[customers(1, ada-dup), orders(102, 1, 7)]",
            "[customers(2, grace), orders(106, 2, 9)]",
            "[customers(2, grace-dup), orders(106, 2, 9)]",
            "[customers(5, alan), orders(105, 5, 20)]",
        ]
    );

    // LEFT, populating: one row per outer row, matches collected
    let rows = run(&nested_loop(&catalog, JoinMode::left().with_populating(true)));
    assert_eq!(rows.len(), OUTER_ROWS);
    let ada = "[customers(1, ada), {orders(100, 1, 10), orders(102, 1, 7)}]";
    assert!(rows.contains(&ada.to_string()));
    assert!(rows.contains(&"customers(NULL, nobody)".to_string()));
    assert!(rows.contains(&"customers(3, edsger)".to_string()));
}

#[test]
fn test_signed_zero_and_nan_keys_match_nested_loop() {
    let mut catalog = MemoryCatalog::new("mem");
    catalog
        .add_table(
            "a",
            &["k"],
            vec![
                vec![Value::float(-0.0)],
                vec![Value::float(f64::NAN)],
                vec![Value::integer(7)],
            ],
        )
        .unwrap();
    catalog
        .add_table(
            "b",
            &["k"],
            vec![
                vec![Value::integer(0)],
                vec![Value::float(-f64::NAN)],
                vec![Value::float(7.0)],
            ],
        )
        .unwrap();

    let predicate = eq(column("a", "k", 0), column("b", "k", 1));
    let nested = NestedLoopJoin::new(
        2,
        scan(&catalog, 1, "a", "a", 0),
        scan(&catalog, 3, "b", "b", 1),
        merger(),
    )
    .with_predicate(Some(predicate.clone()));
    let hashed = BatchHashJoin::new(
        2,
        scan(&catalog, 1, "a", "a", 0),
        scan(&catalog, 3, "b", "b", 1),
        vec![column("a", "k", 0)],
        vec![column("b", "k", 1)],
        merger(),
    )
    .unwrap()
    .with_predicate(Some(predicate));

    let expected = run(&nested);
    assert!(expected.iter().any(|row| row.starts_with("[a(-0")), "{:?}", expected);
    assert_eq!(run(&hashed), expected);
}
