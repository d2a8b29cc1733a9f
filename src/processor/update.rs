use crate::consumer::{Downstream, Flow, Producer};
use crate::error::PipelineResult;
use crate::function::{EvalFunction, Expr, RowEvaluator};
use crate::processing::update::assign;
use crate::processor::{Opened, Processor};
use crate::types::{ColumnRef, Row, Schema};

/// Replaces the values of `columns` with the result of `func`.
///
/// Updating several columns expects `func` to return a tuple with one value per column.
#[derive(Debug, Clone)]
pub struct Update {
    columns: Vec<ColumnRef>,
    func: Expr,
}

impl Update {
    pub fn new(columns: Vec<ColumnRef>, func: Expr) -> Self {
        Self { columns, func }
    }
}

impl Processor for Update {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        let indices = schema.resolve_all(&self.columns)?;
        let func = self.func.prepare(schema)?;
        Ok(Opened::producer(UpdateColumns { indices, func }, schema.clone()))
    }
}

struct UpdateColumns {
    indices: Vec<usize>,
    func: RowEvaluator,
}

impl Producer for UpdateColumns {
    fn handle(&mut self, row: Row, downstream: &mut Downstream<'_>) -> PipelineResult<Flow> {
        let result = self.func.eval(&row)?;
        let mut values = row.values().to_vec();
        assign(&mut values, &self.indices, result)?;
        downstream.forward(row.with_values(values))
    }
}
