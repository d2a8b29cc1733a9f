//! Column updates for [`crate::types::DataSet`].

use crate::error::{PipelineError, PipelineResult};
use crate::function::{EvalFunction, Expr};
use crate::types::{ColumnRef, DataSet, Value};

/// Returns a new [`DataSet`] where `columns` hold the result of `func` for each row.
///
/// A single updated column takes the result as is. Several columns expect a
/// [`Value::Tuple`] with one value per column, assigned in order.
pub fn update(dataset: &DataSet, columns: &[ColumnRef], func: &Expr) -> PipelineResult<DataSet> {
    let indices = dataset.schema.resolve_all(columns)?;
    let results = func.eval(dataset)?;
    let mut rows = dataset.rows.clone();
    for (values, result) in rows.iter_mut().zip(results) {
        assign(values, &indices, result)?;
    }
    Ok(DataSet::new(dataset.schema.clone(), rows))
}

/// Write an update result into `values` at `indices`.
pub(crate) fn assign(values: &mut [Value], indices: &[usize], result: Value) -> PipelineResult<()> {
    if let [idx] = indices[..] {
        return set(values, idx, result);
    }
    match result {
        Value::Tuple(parts) if parts.len() == indices.len() => {
            for (&idx, value) in indices.iter().zip(parts) {
                set(values, idx, value)?;
            }
            Ok(())
        }
        Value::Tuple(parts) => Err(PipelineError::evaluation(format!(
            "expected {} values instead of {}",
            indices.len(),
            parts.len()
        ))),
        other => Err(PipelineError::evaluation(format!(
            "expected {} values instead of a single {} value",
            indices.len(),
            other.type_name()
        ))),
    }
}

fn set(values: &mut [Value], idx: usize, value: Value) -> PipelineResult<()> {
    let width = values.len();
    let slot = values.get_mut(idx).ok_or_else(|| {
        PipelineError::schema_mismatch(format!("row has {width} values, no column #{idx}"))
    })?;
    *slot = value;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::update;
    use crate::error::PipelineError;
    use crate::function::{col, cols};
    use crate::types::{column_refs, DataSet, DataType, Field, Schema, Value};

    fn names() -> DataSet {
        let schema = Schema::new(vec![
            Field::new("first", DataType::Utf8),
            Field::new("last", DataType::Utf8),
        ]);
        DataSet::new(
            schema,
            vec![vec![Value::Utf8("ada".into()), Value::Utf8("lovelace".into())]],
        )
    }

    #[test]
    fn update_single_column() {
        let ds = names();
        let out = update(&ds, &column_refs(["first"]), &col("first").upper()).unwrap();
        assert_eq!(out.rows[0][0], Value::Utf8("ADA".into()));
        assert_eq!(ds.rows[0][0], Value::Utf8("ada".into()));
    }

    #[test]
    fn update_swaps_columns_with_a_tuple() {
        let ds = names();
        let out = update(&ds, &column_refs(["first", "last"]), &cols(["last", "first"])).unwrap();
        assert_eq!(
            out.rows[0],
            vec![Value::Utf8("lovelace".into()), Value::Utf8("ada".into())]
        );
    }

    #[test]
    fn update_rejects_arity_mismatch() {
        let ds = names();
        let err = update(&ds, &column_refs(["first", "last"]), &col("first")).unwrap_err();
        assert!(matches!(err, PipelineError::Evaluation { .. }));
    }
}
