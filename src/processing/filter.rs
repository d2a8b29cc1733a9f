//! Row filtering for [`crate::types::DataSet`].

use crate::error::PipelineResult;
use crate::function::logic::is_truthy;
use crate::function::{EvalFunction, Expr};
use crate::types::DataSet;

/// Returns a new [`DataSet`] containing only rows for which `predicate` evaluates to `true`.
///
/// The predicate is evaluated eagerly, so it may reference column aggregates.
pub fn filter(dataset: &DataSet, predicate: &Expr) -> PipelineResult<DataSet> {
    select_rows(dataset, predicate, false)
}

/// Returns a new [`DataSet`] without the rows for which `predicate` evaluates to `true`.
pub fn delete(dataset: &DataSet, predicate: &Expr) -> PipelineResult<DataSet> {
    select_rows(dataset, predicate, true)
}

fn select_rows(dataset: &DataSet, predicate: &Expr, negated: bool) -> PipelineResult<DataSet> {
    let mask = predicate.eval(dataset)?;
    let mut rows = Vec::new();
    for (values, keep) in dataset.rows.iter().zip(&mask) {
        if is_truthy(keep)? != negated {
            rows.push(values.clone());
        }
    }
    Ok(DataSet::new(dataset.schema.clone(), rows))
}

#[cfg(test)]
mod tests {
    use super::{delete, filter};
    use crate::function::{col, lit, max};
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    fn sample_dataset() -> DataSet {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("active", DataType::Bool),
            Field::new("name", DataType::Utf8),
        ]);

        let rows = vec![
            vec![Value::Int64(1), Value::Bool(true), Value::Utf8("a".to_string())],
            vec![Value::Int64(2), Value::Bool(false), Value::Utf8("b".to_string())],
            vec![Value::Int64(3), Value::Bool(true), Value::Utf8("c".to_string())],
        ];

        DataSet::new(schema, rows)
    }

    #[test]
    fn filter_rows_by_numeric_predicate() {
        let ds = sample_dataset();

        let out = filter(&ds, &col("id").gt(lit(1))).unwrap();

        assert_eq!(out.schema, ds.schema);
        assert_eq!(
            out.rows,
            vec![
                vec![Value::Int64(2), Value::Bool(false), Value::Utf8("b".to_string())],
                vec![Value::Int64(3), Value::Bool(true), Value::Utf8("c".to_string())],
            ]
        );
        // Original unchanged
        assert_eq!(ds.row_count(), 3);
    }

    #[test]
    fn filter_rows_by_bool_column() {
        let ds = sample_dataset();
        let out = filter(&ds, &col("active")).unwrap();
        assert_eq!(out.row_count(), 2);
        assert_eq!(delete(&ds, &col("active")).unwrap().row_count(), 1);
    }

    #[test]
    fn filter_may_use_aggregates_eagerly() {
        let ds = sample_dataset();
        let out = filter(&ds, &col("id").eq(max("id"))).unwrap();
        assert_eq!(out.rows[0][2], Value::Utf8("c".to_string()));
    }

    #[test]
    fn filter_rows_can_return_empty_dataset() {
        let ds = sample_dataset();
        let out = filter(&ds, &lit(false)).unwrap();
        assert_eq!(out.schema, ds.schema);
        assert!(out.rows.is_empty());
    }

    #[test]
    fn non_boolean_predicate_is_an_error() {
        let ds = sample_dataset();
        assert!(filter(&ds, &col("name")).is_err());
    }
}
