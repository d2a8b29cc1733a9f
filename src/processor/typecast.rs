use crate::consumer::{Downstream, Flow, Producer};
use crate::error::{PipelineError, PipelineResult};
use crate::processor::{Opened, Processor};
use crate::source::csv::cast_text;
use crate::types::{check_width, ColumnRef, DataType, Row, Schema, Value};

/// Converts the values of columns to new types and retypes the output schema.
///
/// Text is parsed the way typed CSV cells are: surrounding whitespace is ignored, blank
/// text becomes `Null`, and booleans accept `true/false/1/0/yes/no`. Integers widen to
/// floats and any value can become text. A value that cannot be converted fails the run
/// with [`PipelineError::Evaluation`].
#[derive(Debug, Clone, Default)]
pub struct Typecast {
    casts: Vec<(ColumnRef, DataType)>,
}

impl Typecast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert `column` to `data_type`.
    pub fn column(mut self, column: impl Into<ColumnRef>, data_type: DataType) -> Self {
        self.casts.push((column.into(), data_type));
        self
    }
}

impl Processor for Typecast {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        let mut fields = schema.fields.clone();
        let mut casts = Vec::with_capacity(self.casts.len());
        for (column, data_type) in &self.casts {
            let idx = schema.resolve(column)?;
            fields[idx].data_type = data_type.clone();
            casts.push((idx, data_type.clone()));
        }
        Ok(Opened::producer(
            CastValues {
                width: schema.len(),
                casts,
                names: schema.field_names().map(str::to_string).collect(),
            },
            Schema::try_new(fields)?,
        ))
    }
}

struct CastValues {
    width: usize,
    casts: Vec<(usize, DataType)>,
    names: Vec<String>,
}

impl Producer for CastValues {
    fn handle(&mut self, row: Row, downstream: &mut Downstream<'_>) -> PipelineResult<Flow> {
        check_width(row.values(), self.width)?;
        let mut values = row.values().to_vec();
        for (idx, data_type) in &self.casts {
            values[*idx] = cast_value(&values[*idx], data_type).map_err(|message| {
                PipelineError::evaluation(format!(
                    "cannot cast row {} column '{}' to {data_type:?}: {message}",
                    row.id(),
                    self.names[*idx]
                ))
            })?;
        }
        downstream.forward(row.with_values(values))
    }
}

fn cast_value(value: &Value, data_type: &DataType) -> Result<Value, String> {
    match (value, data_type) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Utf8(text), _) => cast_text(data_type, text),
        (Value::Int64(v), DataType::Float64) => Ok(Value::Float64(*v as f64)),
        (Value::Int64(_), DataType::Int64)
        | (Value::Float64(_), DataType::Float64)
        | (Value::Bool(_), DataType::Bool) => Ok(value.clone()),
        (other, DataType::Utf8) => Ok(Value::Utf8(other.to_string())),
        (other, _) => Err(format!("unsupported {} value '{other}'", other.type_name())),
    }
}
