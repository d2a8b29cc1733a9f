//! Evaluation functions: declarative, reusable expressions over one or more columns.
//!
//! Every evaluation function supports two modes:
//!
//! - [`EvalFunction::eval`] evaluates the function against a complete in-memory
//!   [`DataSet`] and returns one value per row (a [`Value::Tuple`] for multi-column
//!   functions).
//! - [`EvalFunction::prepare`] binds the function to the [`Schema`] of a row stream and
//!   returns a [`RowEvaluator`] that evaluates one [`Row`] at a time. Column references are
//!   resolved to fixed positions once, at prepare time.
//!
//! Functions that need a whole-column aggregate (see [`aggregate`]) are not streamable:
//! preparing them, or any expression that contains them, fails with
//! [`PipelineError::NotStreamable`](crate::error::PipelineError::NotStreamable).
//!
//! ## Example
//!
//! ```rust
//! use rust_data_pipeline::function::{col, lit, EvalFunction};
//! use rust_data_pipeline::types::{DataSet, DataType, Field, Row, Schema, Value};
//!
//! let schema = Schema::new(vec![
//!     Field::new("borough", DataType::Utf8),
//!     Field::new("count", DataType::Int64),
//! ]);
//! let expr = col("borough").upper().eq(lit("BRONX")) & col("count").gt(lit(10));
//!
//! let ds = DataSet::new(
//!     schema.clone(),
//!     vec![
//!         vec![Value::Utf8("bronx".into()), Value::Int64(12)],
//!         vec![Value::Utf8("queens".into()), Value::Int64(40)],
//!     ],
//! );
//! assert_eq!(expr.eval(&ds).unwrap(), vec![Value::Bool(true), Value::Bool(false)]);
//!
//! let evaluator = expr.prepare(&schema).unwrap();
//! let row = Row::new(0, vec![Value::Utf8("bronx".into()), Value::Int64(3)]);
//! assert_eq!(evaluator.eval(&row).unwrap(), Value::Bool(false));
//! ```

pub mod aggregate;
pub mod column;
pub mod logic;
pub mod ops;
pub mod value;

use std::fmt;
use std::ops::{Add, BitAnd, BitOr, Div, Mul, Not, Sub};
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::PipelineResult;
use crate::types::{check_width, ColumnRef, DataSet, Row, Schema, Value};

pub use aggregate::{count, max, mean, min, sum, Aggregate};
pub use column::{col, cols, lit, Col, Cols, Const};
pub use logic::{all, any, And, Not as Negate, Or};
pub use ops::{Binary, BinaryOp};
pub use value::{apply, try_apply, Apply};

/// A declarative expression over the columns of a table or row stream.
pub trait EvalFunction: fmt::Debug + Send + Sync {
    /// Bind the function to the schema of a row stream.
    ///
    /// Fails with [`PipelineError::SchemaMismatch`](crate::error::PipelineError::SchemaMismatch) if a referenced column is absent and with
    /// [`PipelineError::NotStreamable`](crate::error::PipelineError::NotStreamable) if the function needs whole-table aggregation.
    fn prepare(&self, schema: &Schema) -> PipelineResult<RowEvaluator>;

    /// Evaluate the function over every row of `table`, in row order.
    ///
    /// The default implementation prepares the function against `table.schema` and evaluates
    /// the rows in parallel; the result keeps row order. The table is never modified.
    fn eval(&self, table: &DataSet) -> PipelineResult<Vec<Value>> {
        eval_rows(self, table)
    }

    /// Whether [`EvalFunction::prepare`] can succeed for this function.
    fn streamable(&self) -> bool {
        true
    }
}

pub(crate) fn eval_rows<F>(func: &F, table: &DataSet) -> PipelineResult<Vec<Value>>
where
    F: EvalFunction + ?Sized,
{
    let evaluator = func.prepare(&table.schema)?;
    table
        .rows
        .par_iter()
        .map(|values| evaluator.eval_values(values))
        .collect()
}

type RowFn = dyn Fn(&[Value]) -> PipelineResult<Value> + Send + Sync;

/// An evaluation function bound to a concrete schema.
///
/// Created by [`EvalFunction::prepare`]; each call to `prepare` returns a fresh evaluator.
/// Evaluating a row whose width differs from the prepared schema fails with
/// [`PipelineError::SchemaMismatch`](crate::error::PipelineError::SchemaMismatch).
pub struct RowEvaluator {
    width: usize,
    func: Box<RowFn>,
}

impl RowEvaluator {
    /// Create an evaluator for rows of `schema`.
    pub fn new<F>(schema: &Schema, func: F) -> Self
    where
        F: Fn(&[Value]) -> PipelineResult<Value> + Send + Sync + 'static,
    {
        Self {
            width: schema.len(),
            func: Box::new(func),
        }
    }

    /// Number of columns the evaluator was prepared for.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Evaluate a single row.
    pub fn eval(&self, row: &Row) -> PipelineResult<Value> {
        self.eval_values(row.values())
    }

    /// Evaluate a row given as a value slice.
    pub fn eval_values(&self, values: &[Value]) -> PipelineResult<Value> {
        check_width(values, self.width)?;
        (self.func)(values)
    }
}

impl fmt::Debug for RowEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowEvaluator")
            .field("width", &self.width)
            .finish()
    }
}

/// Shareable handle to an evaluation function.
///
/// Cloning is cheap; the same expression can be used by many processors and pipelines.
/// Combinators build new expressions and never modify the receiver.
#[derive(Clone)]
pub struct Expr(Arc<dyn EvalFunction>);

impl Expr {
    /// Wrap an evaluation function.
    pub fn new(func: impl EvalFunction + 'static) -> Self {
        Self(Arc::new(func))
    }

    /// Logical conjunction.
    pub fn and(self, other: Expr) -> Expr {
        all([self, other])
    }

    /// Logical disjunction.
    pub fn or(self, other: Expr) -> Expr {
        any([self, other])
    }

    /// Logical negation.
    pub fn not(self) -> Expr {
        Expr::new(logic::Not::new(self))
    }

    pub fn eq(self, other: impl Into<Expr>) -> Expr {
        Expr::new(Binary::new(BinaryOp::Eq, self, other.into()))
    }

    pub fn neq(self, other: impl Into<Expr>) -> Expr {
        Expr::new(Binary::new(BinaryOp::Ne, self, other.into()))
    }

    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        Expr::new(Binary::new(BinaryOp::Lt, self, other.into()))
    }

    pub fn lt_eq(self, other: impl Into<Expr>) -> Expr {
        Expr::new(Binary::new(BinaryOp::Le, self, other.into()))
    }

    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        Expr::new(Binary::new(BinaryOp::Gt, self, other.into()))
    }

    pub fn gt_eq(self, other: impl Into<Expr>) -> Expr {
        Expr::new(Binary::new(BinaryOp::Ge, self, other.into()))
    }

    /// Apply an infallible value function to the result of this expression.
    pub fn apply<F>(self, name: impl Into<String>, func: F) -> Expr
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Expr::new(Apply::infallible(name, self, func))
    }

    /// Apply a fallible value function; errors abort the run as [`PipelineError::Evaluation`](crate::error::PipelineError::Evaluation).
    pub fn try_apply<F, E>(self, name: impl Into<String>, func: F) -> Expr
    where
        F: Fn(&Value) -> Result<Value, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        Expr::new(Apply::fallible(name, self, func))
    }

    /// Upper-case string values (other values pass through).
    pub fn upper(self) -> Expr {
        value::upper(self)
    }

    /// Lower-case string values (other values pass through).
    pub fn lower(self) -> Expr {
        value::lower(self)
    }

    /// Trim whitespace around string values (other values pass through).
    pub fn trim(self) -> Expr {
        value::trim(self)
    }

    /// `true` for `Null` and the empty string.
    pub fn is_empty(self) -> Expr {
        value::is_empty(self, false)
    }

    /// `true` for everything except `Null` and the empty string.
    pub fn is_not_empty(self) -> Expr {
        value::is_empty(self, false).not()
    }

    /// Like [`Expr::is_empty`] but whitespace-only strings count as empty.
    pub fn is_blank(self) -> Expr {
        value::is_empty(self, true)
    }

    pub fn is_null(self) -> Expr {
        value::is_null(self)
    }

    pub fn is_not_null(self) -> Expr {
        value::is_null(self).not()
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl EvalFunction for Expr {
    fn prepare(&self, schema: &Schema) -> PipelineResult<RowEvaluator> {
        self.0.prepare(schema)
    }

    fn eval(&self, table: &DataSet) -> PipelineResult<Vec<Value>> {
        self.0.eval(table)
    }

    fn streamable(&self) -> bool {
        self.0.streamable()
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        lit(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        lit(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        lit(value)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        lit(value)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        lit(value)
    }
}

impl From<ColumnRef> for Expr {
    fn from(column: ColumnRef) -> Self {
        Expr::new(Col::new(column))
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::not(self)
    }
}

impl BitAnd for Expr {
    type Output = Expr;

    fn bitand(self, rhs: Expr) -> Expr {
        self.and(rhs)
    }
}

impl BitOr for Expr {
    type Output = Expr;

    fn bitor(self, rhs: Expr) -> Expr {
        self.or(rhs)
    }
}

macro_rules! arithmetic_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<T: Into<Expr>> $trait<T> for Expr {
            type Output = Expr;

            fn $method(self, rhs: T) -> Expr {
                Expr::new(Binary::new($op, self, rhs.into()))
            }
        }
    };
}

arithmetic_operator!(Add, add, BinaryOp::Add);
arithmetic_operator!(Sub, sub, BinaryOp::Sub);
arithmetic_operator!(Mul, mul, BinaryOp::Mul);
arithmetic_operator!(Div, div, BinaryOp::Div);
