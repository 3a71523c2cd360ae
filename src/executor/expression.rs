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

//! Expression evaluation capability.
//!
//! Operators only ever call [`Expression::evaluate`] and
//! [`Expression::is_constant`]; the small built-in set below covers what
//! joins, filters, grouping and caching need. Anything richer (a parser's
//! AST, a compiled program) plugs in by implementing the trait.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::context::ExecutionContext;
use crate::core::{Error, Operator, Result, Value};
use crate::tuple::{TableSchema, Tuple};

/// Shared expression handle
pub type ExprRef = Arc<dyn Expression>;

/// Something that evaluates to a value against the execution context
pub trait Expression: Send + Sync + fmt::Debug {
    /// Evaluate against the context's current (and outer) tuple.
    fn evaluate(&self, ctx: &ExecutionContext) -> Result<Value>;

    /// Returns true if the result does not depend on any tuple.
    fn is_constant(&self) -> bool {
        false
    }

    /// The column this expression reads, if it is a bare column reference.
    fn as_column_reference(&self) -> Option<&ColumnReference> {
        None
    }

    fn as_comparison(&self) -> Option<&ComparisonExpression> {
        None
    }

    fn as_logical(&self) -> Option<&LogicalExpression> {
        None
    }

    /// Direct sub-expressions, for plan analysis.
    fn children(&self) -> Vec<&ExprRef> {
        Vec::new()
    }

    /// Evaluate as a predicate: only TRUE passes, NULL does not.
    fn evaluate_predicate(&self, ctx: &ExecutionContext) -> Result<bool> {
        Ok(self.evaluate(ctx)?.as_boolean().unwrap_or(false))
    }
}

// ============================================================================
// Literal
// ============================================================================

/// A constant value
#[derive(Debug, Clone)]
pub struct LiteralExpression {
    value: Value,
}

impl LiteralExpression {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Expression for LiteralExpression {
    fn evaluate(&self, _ctx: &ExecutionContext) -> Result<Value> {
        Ok(self.value.clone())
    }

    fn is_constant(&self) -> bool {
        true
    }
}

// ============================================================================
// Column reference
// ============================================================================

/// A qualified column name resolved against a tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnReference {
    /// Qualification parts, e.g. `["o", "customer_id"]`; the last part is
    /// the column name
    pub parts: Vec<String>,
    /// Table source to navigate to; `None` reads the tuple itself
    pub tuple_ordinal: Option<usize>,
    /// Resolve against the outer tuple (correlated reference)
    pub outer: bool,
}

impl ColumnReference {
    /// The column name (last part).
    pub fn column(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for ColumnReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.outer {
            write!(f, "outer.")?;
        }
        write!(f, "{}", self.parts.join("."))
    }
}

/// Reads one column of the current (or outer) tuple
#[derive(Debug)]
pub struct ColumnExpression {
    reference: ColumnReference,
    /// Last resolved schema and column ordinal; the weak handle keeps the
    /// allocation alive so its address is never reused by another schema
    cached_ordinal: Mutex<Option<(Weak<TableSchema>, usize)>>,
}

impl ColumnExpression {
    pub fn new(reference: ColumnReference) -> Self {
        Self {
            reference,
            cached_ordinal: Mutex::new(None),
        }
    }

    pub fn reference(&self) -> &ColumnReference {
        &self.reference
    }

    fn resolve_ordinal(&self, tuple: &Tuple) -> Option<usize> {
        let name = self.reference.column();
        let Some(schema) = tuple.schema() else {
            return tuple.column_ordinal(name);
        };

        let mut cached = self.cached_ordinal.lock();
        if let Some((known, ordinal)) = cached.as_ref() {
            if std::ptr::eq(known.as_ptr(), Arc::as_ptr(schema)) {
                return Some(*ordinal);
            }
        }
        let ordinal = tuple.column_ordinal(name)?;
        *cached = Some((Arc::downgrade(schema), ordinal));
        Some(ordinal)
    }
}

impl Expression for ColumnExpression {
    fn evaluate(&self, ctx: &ExecutionContext) -> Result<Value> {
        let source = if self.reference.outer {
            ctx.outer_tuple()
        } else {
            ctx.tuple()
        };
        let Some(source) = source else {
            return Ok(Value::null_unknown());
        };

        let target = match self.reference.tuple_ordinal {
            Some(ordinal) => match source.tuple(ordinal) {
                Some(t) => t,
                // Unmatched outer join side
                None => return Ok(Value::null_unknown()),
            },
            None => source.clone(),
        };

        match self.resolve_ordinal(&target) {
            Some(ordinal) => Ok(target.value(ordinal)),
            None => Err(Error::ColumnNotFound(self.reference.to_string())),
        }
    }

    fn as_column_reference(&self) -> Option<&ColumnReference> {
        Some(&self.reference)
    }
}

// ============================================================================
// Comparison
// ============================================================================

/// Binary comparison with SQL NULL semantics (NULL compares false)
#[derive(Debug)]
pub struct ComparisonExpression {
    pub left: ExprRef,
    pub op: Operator,
    pub right: ExprRef,
}

impl ComparisonExpression {
    pub fn new(left: ExprRef, op: Operator, right: ExprRef) -> Self {
        Self { left, op, right }
    }
}

impl Expression for ComparisonExpression {
    fn evaluate(&self, ctx: &ExecutionContext) -> Result<Value> {
        let left = self.left.evaluate(ctx)?;
        let right = self.right.evaluate(ctx)?;

        if left.is_null() || right.is_null() {
            return Ok(Value::boolean(false));
        }

        let result = match self.op {
            Operator::Eq => left == right,
            Operator::Ne => left != right,
            Operator::Gt => left.compare(&right)? == Ordering::Greater,
            Operator::Gte => left.compare(&right)? != Ordering::Less,
            Operator::Lt => left.compare(&right)? == Ordering::Less,
            Operator::Lte => left.compare(&right)? != Ordering::Greater,
        };
        Ok(Value::boolean(result))
    }

    fn is_constant(&self) -> bool {
        self.left.is_constant() && self.right.is_constant()
    }

    fn as_comparison(&self) -> Option<&ComparisonExpression> {
        Some(self)
    }

    fn children(&self) -> Vec<&ExprRef> {
        vec![&self.left, &self.right]
    }
}

// ============================================================================
// Logical
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// Short-circuiting AND / OR over any number of operands
#[derive(Debug)]
pub struct LogicalExpression {
    pub op: LogicalOperator,
    pub operands: Vec<ExprRef>,
}

impl LogicalExpression {
    pub fn new(op: LogicalOperator, operands: Vec<ExprRef>) -> Self {
        Self { op, operands }
    }
}

impl Expression for LogicalExpression {
    fn evaluate(&self, ctx: &ExecutionContext) -> Result<Value> {
        match self.op {
            LogicalOperator::And => {
                for operand in &self.operands {
                    if !operand.evaluate_predicate(ctx)? {
                        return Ok(Value::boolean(false));
                    }
                }
                Ok(Value::boolean(true))
            }
            LogicalOperator::Or => {
                for operand in &self.operands {
                    if operand.evaluate_predicate(ctx)? {
                        return Ok(Value::boolean(true));
                    }
                }
                Ok(Value::boolean(false))
            }
        }
    }

    fn is_constant(&self) -> bool {
        self.operands.iter().all(|o| o.is_constant())
    }

    fn as_logical(&self) -> Option<&LogicalExpression> {
        Some(self)
    }

    fn children(&self) -> Vec<&ExprRef> {
        self.operands.iter().collect()
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl fmt::Display for ArithmeticOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithmeticOperator::Add => write!(f, "+"),
            ArithmeticOperator::Subtract => write!(f, "-"),
            ArithmeticOperator::Multiply => write!(f, "*"),
            ArithmeticOperator::Divide => write!(f, "/"),
        }
    }
}

/// Integer/float arithmetic; NULL in, NULL out
#[derive(Debug)]
pub struct ArithmeticExpression {
    pub left: ExprRef,
    pub op: ArithmeticOperator,
    pub right: ExprRef,
}

impl ArithmeticExpression {
    pub fn new(left: ExprRef, op: ArithmeticOperator, right: ExprRef) -> Self {
        Self { left, op, right }
    }
}

impl Expression for ArithmeticExpression {
    fn evaluate(&self, ctx: &ExecutionContext) -> Result<Value> {
        let left = self.left.evaluate(ctx)?;
        let right = self.right.evaluate(ctx)?;
        if left.is_null() || right.is_null() {
            return Ok(Value::null_unknown());
        }

        if let (Value::Integer(a), Value::Integer(b)) = (&left, &right) {
            let (a, b) = (*a, *b);
            let result = match self.op {
                ArithmeticOperator::Add => a.checked_add(b),
                ArithmeticOperator::Subtract => a.checked_sub(b),
                ArithmeticOperator::Multiply => a.checked_mul(b),
                ArithmeticOperator::Divide => {
                    if b == 0 {
                        return Err(Error::DivisionByZero);
                    }
                    a.checked_div(b)
                }
            };
            return result.map(Value::integer).ok_or_else(|| {
                Error::expression_evaluation(format!("integer overflow in {} {} {}", a, self.op, b))
            });
        }

        let (Some(a), Some(b)) = (numeric(&left), numeric(&right)) else {
            return Err(Error::Type(format!(
                "cannot apply '{}' to {} and {}",
                self.op,
                left.data_type(),
                right.data_type()
            )));
        };
        let result = match self.op {
            ArithmeticOperator::Add => a + b,
            ArithmeticOperator::Subtract => a - b,
            ArithmeticOperator::Multiply => a * b,
            ArithmeticOperator::Divide => {
                if b == 0.0 {
                    return Err(Error::DivisionByZero);
                }
                a / b
            }
        };
        Ok(Value::float(result))
    }

    fn is_constant(&self) -> bool {
        self.left.is_constant() && self.right.is_constant()
    }

    fn children(&self) -> Vec<&ExprRef> {
        vec![&self.left, &self.right]
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

// ============================================================================
// Constructors
// ============================================================================

/// A literal expression.
pub fn literal(value: impl Into<Value>) -> ExprRef {
    Arc::new(LiteralExpression::new(value.into()))
}

/// A column of table source `tuple_ordinal`, qualified by `alias`.
pub fn column(alias: &str, name: &str, tuple_ordinal: usize) -> ExprRef {
    Arc::new(ColumnExpression::new(ColumnReference {
        parts: vec![alias.to_string(), name.to_string()],
        tuple_ordinal: Some(tuple_ordinal),
        outer: false,
    }))
}

/// A column of the current tuple itself.
pub fn bare_column(name: &str) -> ExprRef {
    Arc::new(ColumnExpression::new(ColumnReference {
        parts: vec![name.to_string()],
        tuple_ordinal: None,
        outer: false,
    }))
}

/// A correlated column read from the outer tuple.
pub fn outer_column(alias: &str, name: &str, tuple_ordinal: usize) -> ExprRef {
    Arc::new(ColumnExpression::new(ColumnReference {
        parts: vec![alias.to_string(), name.to_string()],
        tuple_ordinal: Some(tuple_ordinal),
        outer: true,
    }))
}

pub fn compare(left: ExprRef, op: Operator, right: ExprRef) -> ExprRef {
    Arc::new(ComparisonExpression::new(left, op, right))
}

pub fn eq(left: ExprRef, right: ExprRef) -> ExprRef {
    compare(left, Operator::Eq, right)
}

/// AND of all operands; a single operand is returned as is.
pub fn and(mut operands: Vec<ExprRef>) -> ExprRef {
    if operands.len() == 1 {
        if let Some(only) = operands.pop() {
            return only;
        }
    }
    Arc::new(LogicalExpression::new(LogicalOperator::And, operands))
}

pub fn or(operands: Vec<ExprRef>) -> ExprRef {
    Arc::new(LogicalExpression::new(LogicalOperator::Or, operands))
}

pub fn arithmetic(left: ExprRef, op: ArithmeticOperator, right: ExprRef) -> ExprRef {
    Arc::new(ArithmeticExpression::new(left, op, right))
}

/// Fold a constant expression into a literal.
///
/// Non-constant expressions are returned unchanged.
pub fn fold_constant(expr: &ExprRef) -> Result<ExprRef> {
    if expr.is_constant() {
        let value = expr.evaluate(&ExecutionContext::new())?;
        Ok(literal(value))
    } else {
        Ok(expr.clone())
    }
}
