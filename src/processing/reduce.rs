//! Reduction operations for [`crate::types::DataSet`] and row streams.
//!
//! [`Accumulator`] folds one column value at a time so the same reduction backs the eager
//! [`reduce`] helper, the aggregate evaluation functions and the streaming reduce
//! collector.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::types::{check_width, ColumnRef, DataSet, DataType, Value};

/// Built-in reduction operations over a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReduceOp {
    /// Count all rows (including nulls).
    Count,
    /// Sum numeric values, ignoring nulls.
    Sum,
    /// Minimum value, ignoring nulls.
    Min,
    /// Maximum value, ignoring nulls.
    Max,
    /// Arithmetic mean of numeric values as `Float64`, ignoring nulls.
    Mean,
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Mean => "mean",
        })
    }
}

#[derive(Debug, Clone)]
enum State {
    Count(i64),
    Int(Option<i64>),
    Float(Option<f64>),
    Mean { sum: f64, n: u64 },
    Ordered(Option<Value>),
    Unsupported,
}

/// Incremental state of one [`ReduceOp`] over a column of a known [`DataType`].
///
/// Sum/min/max keep the column type: `Int64` columns reduce to `Int64`, `Float64` columns
/// to `Float64`. An `Int64` sum that overflows fails with [`PipelineError::Evaluation`]. Min/max over other types use [`Value::total_cmp`].
/// Summing a non-numeric column yields `Null`.
#[derive(Debug, Clone)]
pub struct Accumulator {
    op: ReduceOp,
    state: State,
}

impl Accumulator {
    pub fn new(op: ReduceOp, data_type: &DataType) -> Self {
        let state = match (op, data_type) {
            (ReduceOp::Count, _) => State::Count(0),
            (ReduceOp::Mean, _) => State::Mean { sum: 0.0, n: 0 },
            (_, DataType::Int64) => State::Int(None),
            (_, DataType::Float64) => State::Float(None),
            (ReduceOp::Min | ReduceOp::Max, _) => State::Ordered(None),
            (ReduceOp::Sum, _) => State::Unsupported,
        };
        Self { op, state }
    }

    pub fn op(&self) -> ReduceOp {
        self.op
    }

    /// Fold the next value of the column.
    pub fn push(&mut self, value: &Value) -> PipelineResult<()> {
        let op = self.op;
        match &mut self.state {
            State::Count(n) => *n += 1,
            State::Int(acc) => {
                if let Value::Int64(v) = value {
                    *acc = Some(match (*acc, op) {
                        (None, _) => *v,
                        (Some(a), ReduceOp::Sum) => a.checked_add(*v).ok_or_else(|| {
                            PipelineError::evaluation(format!("integer overflow in sum: {a} + {v}"))
                        })?,
                        (Some(a), ReduceOp::Min) => a.min(*v),
                        (Some(a), _) => a.max(*v),
                    });
                }
            }
            State::Float(acc) => {
                if let Some(v) = numeric(value) {
                    *acc = Some(match (*acc, op) {
                        (None, _) => v,
                        (Some(a), ReduceOp::Sum) => a + v,
                        (Some(a), ReduceOp::Min) => a.min(v),
                        (Some(a), _) => a.max(v),
                    });
                }
            }
            State::Mean { sum, n } => {
                if let Some(v) = numeric(value) {
                    *sum += v;
                    *n += 1;
                }
            }
            State::Ordered(acc) => {
                if value.is_null() {
                    return Ok(());
                }
                let wanted = if op == ReduceOp::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let replace = match acc {
                    None => true,
                    Some(current) => value.total_cmp(current) == wanted,
                };
                if replace {
                    *acc = Some(value.clone());
                }
            }
            State::Unsupported => {}
        }
        Ok(())
    }

    /// The reduction result for the values pushed so far.
    pub fn finish(&self) -> Value {
        match &self.state {
            State::Count(n) => Value::Int64(*n),
            State::Int(acc) => acc.map(Value::Int64).unwrap_or(Value::Null),
            State::Float(acc) => acc.map(Value::Float64).unwrap_or(Value::Null),
            State::Mean { n: 0, .. } => Value::Null,
            State::Mean { sum, n } => Value::Float64(*sum / *n as f64),
            State::Ordered(acc) => acc.clone().unwrap_or(Value::Null),
            State::Unsupported => Value::Null,
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int64(_) | Value::Float64(_) => value.as_f64(),
        _ => None,
    }
}

/// Reduce a column using a built-in [`ReduceOp`].
///
/// - Fails with [`PipelineError::SchemaMismatch`] if `column` does not resolve against the
///   schema or a row has the wrong width.
/// - For `Sum`/`Min`/`Max`/`Mean`, returns `Value::Null` if there are no non-null values.
/// - For `Count`, always returns `Value::Int64(row_count)`.
pub fn reduce(
    dataset: &DataSet,
    column: impl Into<ColumnRef>,
    op: ReduceOp,
) -> PipelineResult<Value> {
    let idx = dataset.schema.resolve(&column.into())?;
    let mut acc = Accumulator::new(op, &dataset.schema.fields[idx].data_type);
    for row in &dataset.rows {
        check_width(row, dataset.schema.len())?;
        acc.push(&row[idx])?;
    }
    Ok(acc.finish())
}

#[cfg(test)]
mod tests {
    use super::{reduce, Accumulator, ReduceOp};
    use crate::error::PipelineError;
    use crate::types::{ColumnRef, DataSet, DataType, Field, Schema, Value};

    fn numeric_dataset_with_nulls() -> DataSet {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("score", DataType::Float64),
            Field::new("city", DataType::Utf8),
        ]);

        let rows = vec![
            vec![Value::Int64(1), Value::Float64(10.0), Value::Utf8("Oslo".into())],
            vec![Value::Int64(2), Value::Null, Value::Null],
            vec![Value::Int64(3), Value::Float64(5.5), Value::Utf8("Bergen".into())],
        ];

        DataSet::new(schema, rows)
    }

    #[test]
    fn reduce_count_counts_rows() {
        let ds = numeric_dataset_with_nulls();
        assert_eq!(reduce(&ds, "score", ReduceOp::Count).unwrap(), Value::Int64(3));
        assert_eq!(reduce(&ds, "id", ReduceOp::Count).unwrap(), Value::Int64(3));
    }

    #[test]
    fn reduce_sum_ignores_nulls_and_preserves_type() {
        let ds = numeric_dataset_with_nulls();
        assert_eq!(
            reduce(&ds, "score", ReduceOp::Sum).unwrap(),
            Value::Float64(15.5)
        );
        assert_eq!(reduce(&ds, "id", ReduceOp::Sum).unwrap(), Value::Int64(6));
        assert_eq!(reduce(&ds, "city", ReduceOp::Sum).unwrap(), Value::Null);
    }

    #[test]
    fn reduce_min_max_ignore_nulls() {
        let ds = numeric_dataset_with_nulls();
        assert_eq!(
            reduce(&ds, "score", ReduceOp::Min).unwrap(),
            Value::Float64(5.5)
        );
        assert_eq!(
            reduce(&ds, "score", ReduceOp::Max).unwrap(),
            Value::Float64(10.0)
        );
        assert_eq!(reduce(&ds, "id", ReduceOp::Min).unwrap(), Value::Int64(1));
        assert_eq!(reduce(&ds, "id", ReduceOp::Max).unwrap(), Value::Int64(3));
        assert_eq!(
            reduce(&ds, "city", ReduceOp::Min).unwrap(),
            Value::Utf8("Bergen".into())
        );
    }

    #[test]
    fn reduce_mean_is_float() {
        let ds = numeric_dataset_with_nulls();
        assert_eq!(reduce(&ds, "id", ReduceOp::Mean).unwrap(), Value::Float64(2.0));
        assert_eq!(
            reduce(&ds, "score", ReduceOp::Mean).unwrap(),
            Value::Float64(7.75)
        );
    }

    #[test]
    fn reduce_fails_for_missing_column() {
        let ds = numeric_dataset_with_nulls();
        for op in [ReduceOp::Count, ReduceOp::Sum] {
            let err = reduce(&ds, "missing", op).unwrap_err();
            assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
        }
        assert!(reduce(&ds, 3usize, ReduceOp::Max).is_err());
    }

    #[test]
    fn reduce_accepts_positional_columns() {
        let ds = numeric_dataset_with_nulls();
        assert_eq!(reduce(&ds, 0usize, ReduceOp::Sum).unwrap(), Value::Int64(6));
        assert_eq!(
            reduce(&ds, ColumnRef::from(1usize), ReduceOp::Max).unwrap(),
            Value::Float64(10.0)
        );
    }

    #[test]
    fn reduce_numeric_returns_null_if_all_values_null() {
        let schema = Schema::new(vec![Field::new("score", DataType::Float64)]);
        let ds = DataSet::new(schema, vec![vec![Value::Null], vec![Value::Null]]);
        for op in [ReduceOp::Sum, ReduceOp::Min, ReduceOp::Max, ReduceOp::Mean] {
            assert_eq!(reduce(&ds, "score", op).unwrap(), Value::Null);
        }
    }

    #[test]
    fn integer_sum_overflow_is_an_error() {
        let mut acc = Accumulator::new(ReduceOp::Sum, &DataType::Int64);
        acc.push(&Value::Int64(i64::MAX)).unwrap();
        let err = acc.push(&Value::Int64(1)).unwrap_err();
        assert!(matches!(err, PipelineError::Evaluation { .. }));
        assert!(err.to_string().contains("integer overflow"));

        let schema = Schema::new(vec![Field::new("n", DataType::Int64)]);
        let ds = DataSet::new(
            schema,
            vec![vec![Value::Int64(i64::MAX)], vec![Value::Int64(1)]],
        );
        assert!(reduce(&ds, "n", ReduceOp::Sum).is_err());
        assert_eq!(reduce(&ds, "n", ReduceOp::Max).unwrap(), Value::Int64(i64::MAX));
    }
}
