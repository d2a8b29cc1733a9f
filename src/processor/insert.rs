use crate::consumer::{Downstream, Flow, Producer};
use crate::error::{PipelineError, PipelineResult};
use crate::function::{EvalFunction, Expr, RowEvaluator};
use crate::processing::update::assign;
use crate::processor::{Opened, Processor};
use crate::types::{check_width, DataType, Field, Row, Schema, Value};

/// Inserts new columns at a fixed position.
///
/// Values come from one function per new column, or from a single function that returns a
/// [`Value::Tuple`] with one value per column. Without functions the new columns are
/// `Null`. The new columns are typed `Utf8`.
#[derive(Debug, Clone)]
pub struct Insert {
    names: Vec<String>,
    pos: Option<usize>,
    values: Vec<Expr>,
}

impl Insert {
    /// Append `names` as `Null` columns.
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            pos: None,
            values: Vec::new(),
        }
    }

    /// Insert at `pos` instead of appending.
    pub fn at(mut self, pos: usize) -> Self {
        self.pos = Some(pos);
        self
    }

    /// Compute the new column values with `values`.
    pub fn with_values(mut self, values: Vec<Expr>) -> Self {
        self.values = values;
        self
    }
}

impl Processor for Insert {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        let pos = self.pos.unwrap_or(schema.len());
        if pos > schema.len() {
            return Err(PipelineError::schema_mismatch(format!(
                "invalid insert position {pos} for {} columns",
                schema.len()
            )));
        }
        let width = self.names.len();
        let values = match self.values.len() {
            0 => NewValues::Nulls,
            1 if width > 1 => NewValues::Unpack(self.values[0].prepare(schema)?),
            n if n == width => NewValues::PerColumn(
                self.values
                    .iter()
                    .map(|f| f.prepare(schema))
                    .collect::<PipelineResult<_>>()?,
            ),
            n => {
                return Err(PipelineError::schema_mismatch(format!(
                    "{width} new columns but {n} value functions"
                )));
            }
        };

        let mut fields = schema.fields.clone();
        let new_fields = self.names.iter().map(|n| Field::new(n.as_str(), DataType::Utf8));
        fields.splice(pos..pos, new_fields);
        Ok(Opened::producer(
            InsertColumns {
                input_width: schema.len(),
                pos,
                width,
                values,
            },
            Schema::try_new(fields)?,
        ))
    }
}

enum NewValues {
    Nulls,
    PerColumn(Vec<RowEvaluator>),
    Unpack(RowEvaluator),
}

struct InsertColumns {
    input_width: usize,
    pos: usize,
    width: usize,
    values: NewValues,
}

impl InsertColumns {
    fn new_values(&self, row: &Row) -> PipelineResult<Vec<Value>> {
        match &self.values {
            NewValues::Nulls => Ok(vec![Value::Null; self.width]),
            NewValues::PerColumn(evaluators) => evaluators.iter().map(|e| e.eval(row)).collect(),
            NewValues::Unpack(evaluator) => {
                let mut out = vec![Value::Null; self.width];
                let indices: Vec<usize> = (0..self.width).collect();
                assign(&mut out, &indices, evaluator.eval(row)?)?;
                Ok(out)
            }
        }
    }
}

impl Producer for InsertColumns {
    fn handle(&mut self, row: Row, downstream: &mut Downstream<'_>) -> PipelineResult<Flow> {
        check_width(row.values(), self.input_width)?;
        let inserted = self.new_values(&row)?;
        let mut values = row.values().to_vec();
        values.splice(self.pos..self.pos, inserted);
        downstream.forward(row.with_values(values))
    }
}
