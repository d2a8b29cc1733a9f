use crate::consumer::{Downstream, Flow, Producer};
use crate::error::PipelineResult;
use crate::function::logic::is_truthy;
use crate::function::{EvalFunction, Expr, RowEvaluator};
use crate::processor::{Opened, Processor};
use crate::types::{Row, Schema};

/// Keeps the rows that satisfy a predicate, or drops them when negated.
#[derive(Debug, Clone)]
pub struct Filter {
    predicate: Expr,
    negated: bool,
}

impl Filter {
    /// Keep rows where `predicate` is `true`.
    pub fn new(predicate: Expr) -> Self {
        Self {
            predicate,
            negated: false,
        }
    }

    /// Drop rows where `predicate` is `true`.
    pub fn delete(predicate: Expr) -> Self {
        Self {
            predicate,
            negated: true,
        }
    }
}

impl Processor for Filter {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        let predicate = self.predicate.prepare(schema)?;
        Ok(Opened::producer(
            FilterRows {
                predicate,
                negated: self.negated,
            },
            schema.clone(),
        ))
    }
}

struct FilterRows {
    predicate: RowEvaluator,
    negated: bool,
}

impl Producer for FilterRows {
    fn handle(&mut self, row: Row, downstream: &mut Downstream<'_>) -> PipelineResult<Flow> {
        let matched = is_truthy(&self.predicate.eval(&row)?)?;
        if matched != self.negated {
            downstream.forward(row)
        } else {
            Ok(Flow::Continue)
        }
    }
}
