//! Leaf evaluation functions: column lookups and constants.

use crate::error::PipelineResult;
use crate::function::{EvalFunction, Expr, RowEvaluator};
use crate::types::{ColumnRef, Schema, Value};

/// The value of a single column.
#[derive(Debug, Clone)]
pub struct Col {
    column: ColumnRef,
}

impl Col {
    pub fn new(column: ColumnRef) -> Self {
        Self { column }
    }
}

impl EvalFunction for Col {
    fn prepare(&self, schema: &Schema) -> PipelineResult<RowEvaluator> {
        let idx = schema.resolve(&self.column)?;
        Ok(RowEvaluator::new(schema, move |values| {
            Ok(values[idx].clone())
        }))
    }
}

/// The values of several columns as a [`Value::Tuple`].
///
/// A single column yields its plain value rather than a one-element tuple.
#[derive(Debug, Clone)]
pub struct Cols {
    columns: Vec<ColumnRef>,
}

impl Cols {
    pub fn new(columns: Vec<ColumnRef>) -> Self {
        Self { columns }
    }
}

impl EvalFunction for Cols {
    fn prepare(&self, schema: &Schema) -> PipelineResult<RowEvaluator> {
        let indices = schema.resolve_all(&self.columns)?;
        if let [idx] = indices[..] {
            return Ok(RowEvaluator::new(schema, move |values| {
                Ok(values[idx].clone())
            }));
        }
        Ok(RowEvaluator::new(schema, move |values| {
            Ok(Value::Tuple(
                indices.iter().map(|&i| values[i].clone()).collect(),
            ))
        }))
    }
}

/// A constant, independent of the row.
#[derive(Debug, Clone)]
pub struct Const {
    value: Value,
}

impl Const {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl EvalFunction for Const {
    fn prepare(&self, schema: &Schema) -> PipelineResult<RowEvaluator> {
        let value = self.value.clone();
        Ok(RowEvaluator::new(schema, move |_| Ok(value.clone())))
    }
}

/// Reference a column by name or position.
pub fn col(column: impl Into<ColumnRef>) -> Expr {
    Expr::new(Col::new(column.into()))
}

/// Reference several columns; evaluates to a tuple of their values.
pub fn cols<I, C>(columns: I) -> Expr
where
    I: IntoIterator<Item = C>,
    C: Into<ColumnRef>,
{
    Expr::new(Cols::new(crate::types::column_refs(columns)))
}

/// A literal value.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::new(Const::new(value.into()))
}
