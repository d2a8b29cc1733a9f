//! Comparison and arithmetic over two operands.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{PipelineError, PipelineResult};
use crate::function::{EvalFunction, Expr, RowEvaluator};
use crate::types::{DataSet, Schema, Value};

/// Binary operator applied by [`Binary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        };
        f.write_str(symbol)
    }
}

impl BinaryOp {
    /// Apply the operator to two already evaluated operands.
    ///
    /// Comparisons never fail. Numbers compare across integer and float; any comparison
    /// with `Null` is `false`, as is ordering against an incompatible type. Arithmetic
    /// propagates `Null` and fails on overflow, division by zero or non-numeric operands
    /// (`+` also concatenates strings).
    pub fn apply(self, lhs: &Value, rhs: &Value) -> PipelineResult<Value> {
        match self {
            Self::Eq => Ok(Value::Bool(values_equal(lhs, rhs) == Some(true))),
            Self::Ne => Ok(Value::Bool(values_equal(lhs, rhs) == Some(false))),
            Self::Lt => Ok(Value::Bool(compare(lhs, rhs) == Some(Ordering::Less))),
            Self::Le => Ok(Value::Bool(matches!(
                compare(lhs, rhs),
                Some(Ordering::Less | Ordering::Equal)
            ))),
            Self::Gt => Ok(Value::Bool(compare(lhs, rhs) == Some(Ordering::Greater))),
            Self::Ge => Ok(Value::Bool(matches!(
                compare(lhs, rhs),
                Some(Ordering::Greater | Ordering::Equal)
            ))),
            Self::Add | Self::Sub | Self::Mul | Self::Div => self.arithmetic(lhs, rhs),
        }
    }

    fn arithmetic(self, lhs: &Value, rhs: &Value) -> PipelineResult<Value> {
        match (lhs, rhs) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            (Value::Utf8(a), Value::Utf8(b)) if self == Self::Add => {
                Ok(Value::Utf8(format!("{a}{b}")))
            }
            (Value::Int64(a), Value::Int64(b)) if self != Self::Div => {
                let out = match self {
                    Self::Add => a.checked_add(*b),
                    Self::Sub => a.checked_sub(*b),
                    _ => a.checked_mul(*b),
                };
                out.map(Value::Int64).ok_or_else(|| {
                    PipelineError::evaluation(format!("integer overflow in {a} {self} {b}"))
                })
            }
            _ => match (lhs.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => match self {
                    Self::Add => Ok(Value::Float64(a + b)),
                    Self::Sub => Ok(Value::Float64(a - b)),
                    Self::Mul => Ok(Value::Float64(a * b)),
                    _ if b == 0.0 => Err(PipelineError::evaluation(format!(
                        "division by zero in {lhs} / {rhs}"
                    ))),
                    _ => Ok(Value::Float64(a / b)),
                },
                _ => Err(PipelineError::evaluation(format!(
                    "unsupported operands for '{self}': {} and {}",
                    lhs.type_name(),
                    rhs.type_name()
                ))),
            },
        }
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> Option<bool> {
    if lhs.is_null() || rhs.is_null() {
        return None;
    }
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => Some(a == b),
        _ => Some(lhs == rhs),
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Utf8(a), Value::Utf8(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Tuple(_), Value::Tuple(_)) => Some(lhs.total_cmp(rhs)),
        _ => lhs.as_f64()?.partial_cmp(&rhs.as_f64()?),
    }
}

/// A binary operator over two sub-expressions.
#[derive(Debug, Clone)]
pub struct Binary {
    op: BinaryOp,
    lhs: Expr,
    rhs: Expr,
}

impl Binary {
    pub fn new(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self { op, lhs, rhs }
    }
}

impl EvalFunction for Binary {
    fn prepare(&self, schema: &Schema) -> PipelineResult<RowEvaluator> {
        let op = self.op;
        let lhs = self.lhs.prepare(schema)?;
        let rhs = self.rhs.prepare(schema)?;
        Ok(RowEvaluator::new(schema, move |values| {
            op.apply(&lhs.eval_values(values)?, &rhs.eval_values(values)?)
        }))
    }

    fn eval(&self, table: &DataSet) -> PipelineResult<Vec<Value>> {
        let lhs = self.lhs.eval(table)?;
        let rhs = self.rhs.eval(table)?;
        lhs.iter()
            .zip(&rhs)
            .map(|(a, b)| self.op.apply(a, b))
            .collect()
    }

    fn streamable(&self) -> bool {
        self.lhs.streamable() && self.rhs.streamable()
    }
}
