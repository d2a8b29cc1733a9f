//! Boolean combinators.
//!
//! Operands must evaluate to [`Value::Bool`]; `Null` is treated as `false`. Any other value
//! fails with [`PipelineError::Evaluation`].

use rayon::prelude::*;

use crate::error::{PipelineError, PipelineResult};
use crate::function::{EvalFunction, Expr, RowEvaluator};
use crate::types::{DataSet, Schema, Value};

pub(crate) fn is_truthy(value: &Value) -> PipelineResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(PipelineError::evaluation(format!(
            "expected a boolean, got {} value '{other}'",
            other.type_name()
        ))),
    }
}

fn prepare_all(exprs: &[Expr], schema: &Schema) -> PipelineResult<Vec<RowEvaluator>> {
    exprs.iter().map(|e| e.prepare(schema)).collect()
}

/// Eager short-circuit over `table`: each operand only sees the rows that no earlier operand
/// decided with a `stop_on` value.
///
/// Streamable operands are evaluated row by row on the undecided rows, so eager and prepared
/// evaluation fail on exactly the same rows. Aggregating operands see the whole table.
fn short_circuit(exprs: &[Expr], table: &DataSet, stop_on: bool) -> PipelineResult<Vec<Value>> {
    let mut result = vec![Value::Bool(!stop_on); table.row_count()];
    let mut undecided: Vec<usize> = (0..table.row_count()).collect();
    for expr in exprs {
        if undecided.is_empty() {
            break;
        }
        let values: Vec<Value> = if expr.streamable() {
            let evaluator = expr.prepare(&table.schema)?;
            undecided
                .par_iter()
                .map(|&i| evaluator.eval_values(&table.rows[i]))
                .collect::<PipelineResult<_>>()?
        } else {
            let column = expr.eval(table)?;
            undecided.iter().map(|&i| column[i].clone()).collect()
        };
        let mut open = Vec::with_capacity(undecided.len());
        for (i, value) in undecided.into_iter().zip(values) {
            if is_truthy(&value)? == stop_on {
                result[i] = Value::Bool(stop_on);
            } else {
                open.push(i);
            }
        }
        undecided = open;
    }
    Ok(result)
}

/// `true` when every operand is `true`. Evaluation stops at the first `false`.
#[derive(Debug, Clone)]
pub struct And {
    exprs: Vec<Expr>,
}

impl EvalFunction for And {
    fn prepare(&self, schema: &Schema) -> PipelineResult<RowEvaluator> {
        let evaluators = prepare_all(&self.exprs, schema)?;
        Ok(RowEvaluator::new(schema, move |values| {
            for evaluator in &evaluators {
                if !is_truthy(&evaluator.eval_values(values)?)? {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }))
    }

    fn eval(&self, table: &DataSet) -> PipelineResult<Vec<Value>> {
        short_circuit(&self.exprs, table, false)
    }

    fn streamable(&self) -> bool {
        self.exprs.iter().all(|e| e.streamable())
    }
}

/// `true` when any operand is `true`. Evaluation stops at the first `true`.
#[derive(Debug, Clone)]
pub struct Or {
    exprs: Vec<Expr>,
}

impl EvalFunction for Or {
    fn prepare(&self, schema: &Schema) -> PipelineResult<RowEvaluator> {
        let evaluators = prepare_all(&self.exprs, schema)?;
        Ok(RowEvaluator::new(schema, move |values| {
            for evaluator in &evaluators {
                if is_truthy(&evaluator.eval_values(values)?)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }))
    }

    fn eval(&self, table: &DataSet) -> PipelineResult<Vec<Value>> {
        short_circuit(&self.exprs, table, true)
    }

    fn streamable(&self) -> bool {
        self.exprs.iter().all(|e| e.streamable())
    }
}

/// Logical negation.
#[derive(Debug, Clone)]
pub struct Not {
    expr: Expr,
}

impl Not {
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }
}

impl EvalFunction for Not {
    fn prepare(&self, schema: &Schema) -> PipelineResult<RowEvaluator> {
        let inner = self.expr.prepare(schema)?;
        Ok(RowEvaluator::new(schema, move |values| {
            Ok(Value::Bool(!is_truthy(&inner.eval_values(values)?)?))
        }))
    }

    fn eval(&self, table: &DataSet) -> PipelineResult<Vec<Value>> {
        self.expr
            .eval(table)?
            .iter()
            .map(|v| Ok(Value::Bool(!is_truthy(v)?)))
            .collect()
    }

    fn streamable(&self) -> bool {
        self.expr.streamable()
    }
}

/// Conjunction of all `exprs`. An empty conjunction is `true`.
pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::new(And {
        exprs: exprs.into_iter().collect(),
    })
}

/// Disjunction of all `exprs`. An empty disjunction is `false`.
pub fn any(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::new(Or {
        exprs: exprs.into_iter().collect(),
    })
}
