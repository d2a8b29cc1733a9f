//! Per-value transforms: user callbacks, string normalization and emptiness checks.

use std::fmt;
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};
use crate::function::{EvalFunction, Expr, RowEvaluator};
use crate::types::{DataSet, Schema, Value};

type ValueFn = dyn Fn(&Value) -> PipelineResult<Value> + Send + Sync;

/// Applies a named function to the result of another expression.
#[derive(Clone)]
pub struct Apply {
    name: String,
    input: Expr,
    func: Arc<ValueFn>,
}

impl Apply {
    /// Wrap a function that cannot fail.
    pub fn infallible<F>(name: impl Into<String>, input: Expr, func: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            input,
            func: Arc::new(move |v: &Value| Ok(func(v))),
        }
    }

    /// Wrap a fallible function; its error message becomes a [`PipelineError::Evaluation`].
    pub fn fallible<F, E>(name: impl Into<String>, input: Expr, func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        let name = name.into();
        let label = name.clone();
        Self {
            name,
            input,
            func: Arc::new(move |v: &Value| {
                func(v).map_err(|e| PipelineError::evaluation(format!("{label}({v}): {e}")))
            }),
        }
    }
}

impl fmt::Debug for Apply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Apply")
            .field("name", &self.name)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

impl EvalFunction for Apply {
    fn prepare(&self, schema: &Schema) -> PipelineResult<RowEvaluator> {
        let input = self.input.prepare(schema)?;
        let func = Arc::clone(&self.func);
        Ok(RowEvaluator::new(schema, move |values| {
            func(&input.eval_values(values)?)
        }))
    }

    fn eval(&self, table: &DataSet) -> PipelineResult<Vec<Value>> {
        self.input
            .eval(table)?
            .iter()
            .map(|v| (self.func)(v))
            .collect()
    }

    fn streamable(&self) -> bool {
        self.input.streamable()
    }
}

/// Apply an infallible function to the result of `input`.
pub fn apply<F>(name: impl Into<String>, input: Expr, func: F) -> Expr
where
    F: Fn(&Value) -> Value + Send + Sync + 'static,
{
    Expr::new(Apply::infallible(name, input, func))
}

/// Apply a fallible function to the result of `input`.
pub fn try_apply<F, E>(name: impl Into<String>, input: Expr, func: F) -> Expr
where
    F: Fn(&Value) -> Result<Value, E> + Send + Sync + 'static,
    E: fmt::Display,
{
    Expr::new(Apply::fallible(name, input, func))
}

fn map_str(name: &str, input: Expr, f: fn(&str) -> String) -> Expr {
    apply(name, input, move |v| match v {
        Value::Utf8(s) => Value::Utf8(f(s)),
        other => other.clone(),
    })
}

pub(crate) fn upper(input: Expr) -> Expr {
    map_str("upper", input, str::to_uppercase)
}

pub(crate) fn lower(input: Expr) -> Expr {
    map_str("lower", input, str::to_lowercase)
}

pub(crate) fn trim(input: Expr) -> Expr {
    map_str("trim", input, |s| s.trim().to_string())
}

pub(crate) fn is_empty(input: Expr, ignore_whitespace: bool) -> Expr {
    let name = if ignore_whitespace { "is_blank" } else { "is_empty" };
    apply(name, input, move |v| {
        Value::Bool(match v {
            Value::Null => true,
            Value::Utf8(s) if ignore_whitespace => s.trim().is_empty(),
            Value::Utf8(s) => s.is_empty(),
            _ => false,
        })
    })
}

pub(crate) fn is_null(input: Expr) -> Expr {
    apply("is_null", input, |v| Value::Bool(v.is_null()))
}

#[cfg(test)]
mod tests {
    use super::try_apply;
    use crate::error::PipelineError;
    use crate::function::{col, EvalFunction};
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    fn boroughs() -> DataSet {
        let schema = Schema::new(vec![Field::new("borough", DataType::Utf8)]);
        DataSet::new(
            schema,
            vec![
                vec![Value::Utf8(" Bronx ".into())],
                vec![Value::Utf8("".into())],
                vec![Value::Utf8("   ".into())],
                vec![Value::Null],
            ],
        )
    }

    #[test]
    fn string_transforms_pass_non_strings_through() {
        let ds = boroughs();
        assert_eq!(
            col("borough").trim().upper().eval(&ds).unwrap(),
            vec![
                Value::Utf8("BRONX".into()),
                Value::Utf8("".into()),
                Value::Utf8("".into()),
                Value::Null,
            ]
        );
        assert_eq!(
            col("borough").lower().eval(&ds).unwrap()[0],
            Value::Utf8(" bronx ".into())
        );
    }

    #[test]
    fn emptiness_checks() {
        let ds = boroughs();
        let b = Value::Bool;
        assert_eq!(
            col("borough").is_empty().eval(&ds).unwrap(),
            vec![b(false), b(true), b(false), b(true)]
        );
        assert_eq!(
            col("borough").is_not_empty().eval(&ds).unwrap(),
            vec![b(true), b(false), b(true), b(false)]
        );
        assert_eq!(
            col("borough").is_blank().eval(&ds).unwrap(),
            vec![b(false), b(true), b(true), b(true)]
        );
        assert_eq!(
            col("borough").is_null().eval(&ds).unwrap(),
            vec![b(false), b(false), b(false), b(true)]
        );
    }

    #[test]
    fn fallible_apply_reports_the_function_name() {
        let ds = boroughs();
        let parse = try_apply("parse_int", col("borough"), |v| match v {
            Value::Utf8(s) => s.trim().parse::<i64>().map(Value::Int64).map_err(|e| e.to_string()),
            other => Ok(other.clone()),
        });
        let err = parse.eval(&ds).unwrap_err();
        assert!(matches!(err, PipelineError::Evaluation { .. }));
        assert!(err.to_string().contains("parse_int"));
    }
}
