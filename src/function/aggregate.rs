//! Column aggregates.
//!
//! An aggregate needs every value of its column before it can produce a result, so it only
//! supports eager evaluation: [`EvalFunction::eval`] computes the aggregate once and
//! repeats it for every row. Preparing an aggregate, or any expression containing one,
//! fails with [`PipelineError::NotStreamable`].

use crate::error::{PipelineError, PipelineResult};
use crate::function::{EvalFunction, Expr, RowEvaluator};
use crate::processing::reduce::{Accumulator, ReduceOp};
use crate::types::{check_width, ColumnRef, DataSet, Schema, Value};

/// A [`ReduceOp`] over one column, broadcast to every row.
#[derive(Debug, Clone)]
pub struct Aggregate {
    column: ColumnRef,
    op: ReduceOp,
}

impl Aggregate {
    pub fn new(column: ColumnRef, op: ReduceOp) -> Self {
        Self { column, op }
    }
}

impl EvalFunction for Aggregate {
    fn prepare(&self, _schema: &Schema) -> PipelineResult<RowEvaluator> {
        Err(PipelineError::NotStreamable {
            function: format!("{}({})", self.op, self.column),
        })
    }

    fn eval(&self, table: &DataSet) -> PipelineResult<Vec<Value>> {
        let idx = table.schema.resolve(&self.column)?;
        let mut acc = Accumulator::new(self.op, &table.schema.fields[idx].data_type);
        for row in &table.rows {
            check_width(row, table.schema.len())?;
            acc.push(&row[idx])?;
        }
        Ok(vec![acc.finish(); table.row_count()])
    }

    fn streamable(&self) -> bool {
        false
    }
}

fn aggregate(column: impl Into<ColumnRef>, op: ReduceOp) -> Expr {
    Expr::new(Aggregate::new(column.into(), op))
}

/// Maximum of a column.
pub fn max(column: impl Into<ColumnRef>) -> Expr {
    aggregate(column, ReduceOp::Max)
}

/// Minimum of a column.
pub fn min(column: impl Into<ColumnRef>) -> Expr {
    aggregate(column, ReduceOp::Min)
}

/// Sum of a column.
pub fn sum(column: impl Into<ColumnRef>) -> Expr {
    aggregate(column, ReduceOp::Sum)
}

/// Mean of a column.
pub fn mean(column: impl Into<ColumnRef>) -> Expr {
    aggregate(column, ReduceOp::Mean)
}

/// Number of rows.
pub fn count(column: impl Into<ColumnRef>) -> Expr {
    aggregate(column, ReduceOp::Count)
}
