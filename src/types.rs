//! Core data model types shared by sources, evaluation functions and processors.
//!
//! Rows flowing through a pipeline are described by a [`Schema`] (a list of uniquely named,
//! typed [`Field`]s). Each [`Row`] carries its values in schema order plus the identifier the
//! source assigned to it. The eager, in-memory counterpart of a row stream is a [`DataSet`].

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Logical data type for a schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Reference to a column, either by name or by position in a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnRef {
    /// Column name.
    Name(String),
    /// Zero-based column position.
    Index(usize),
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "'{name}'"),
            Self::Index(idx) => write!(f, "#{idx}"),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&String> for ColumnRef {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

impl From<usize> for ColumnRef {
    fn from(idx: usize) -> Self {
        Self::Index(idx)
    }
}

/// Collect column references from anything that converts into [`ColumnRef`].
pub fn column_refs<I, C>(columns: I) -> Vec<ColumnRef>
where
    I: IntoIterator<Item = C>,
    C: Into<ColumnRef>,
{
    columns.into_iter().map(Into::into).collect()
}

/// An ordered list of uniquely named fields describing the shape of rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    ///
    /// Use [`Schema::try_new`] when the field names are not known to be unique.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Create a new schema, rejecting duplicate field names.
    pub fn try_new(fields: Vec<Field>) -> PipelineResult<Self> {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(PipelineError::schema_mismatch(format!(
                    "duplicate column name '{}'",
                    field.name
                )));
            }
        }
        Ok(Self { fields })
    }

    /// Create an all-[`DataType::Utf8`] schema from column names.
    pub fn from_names<I, S>(names: I) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::try_new(
            names
                .into_iter()
                .map(|n| Field::new(n, DataType::Utf8))
                .collect(),
        )
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Resolve a column reference to its position in this schema.
    pub fn resolve(&self, column: &ColumnRef) -> PipelineResult<usize> {
        let idx = match column {
            ColumnRef::Name(name) => self.index_of(name),
            ColumnRef::Index(idx) => Some(*idx).filter(|i| *i < self.fields.len()),
        };
        idx.ok_or_else(|| {
            PipelineError::schema_mismatch(format!(
                "unknown column {column}. columns={:?}",
                self.field_names().collect::<Vec<_>>()
            ))
        })
    }

    /// Resolve a list of column references to positions (order preserved).
    pub fn resolve_all(&self, columns: &[ColumnRef]) -> PipelineResult<Vec<usize>> {
        columns.iter().map(|c| self.resolve(c)).collect()
    }

    /// Schema containing only the fields at `indices`, in that order.
    pub fn project(&self, indices: &[usize]) -> PipelineResult<Self> {
        Self::try_new(indices.iter().map(|&i| self.fields[i].clone()).collect())
    }
}

/// Fails with [`PipelineError::SchemaMismatch`] unless `values` holds exactly `width` values.
pub(crate) fn check_width(values: &[Value], width: usize) -> PipelineResult<()> {
    if values.len() != width {
        return Err(PipelineError::schema_mismatch(format!(
            "row has {} values but the schema has {} columns",
            values.len(),
            width
        )));
    }
    Ok(())
}

/// A single typed value in a [`Row`] or [`DataSet`].
///
/// Floats compare and hash by their bit pattern so values can be used as keys in
/// frequency counters. Use [`Value::total_cmp`] for ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
    /// Composite result of a multi-column evaluation function.
    Tuple(Vec<Value>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// String slice for [`Value::Utf8`] values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Utf8(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric view of integer and float values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int64(v) => Some(*v as f64),
            Self::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Short type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int64(_) => "int64",
            Self::Float64(_) => "float64",
            Self::Bool(_) => "bool",
            Self::Utf8(_) => "utf8",
            Self::Tuple(_) => "tuple",
        }
    }

    /// Total order over all values.
    ///
    /// `Null` sorts first, then booleans, numbers, strings and tuples (element-wise).
    /// Integers and floats are compared exactly by numeric value. When an `Int64` and a
    /// `Float64` are numerically equal the integer sorts first, so `total_cmp` returns
    /// `Equal` only for values that are also `==`.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Int64(_) | Value::Float64(_) => 2,
                Value::Utf8(_) => 3,
                Value::Tuple(_) => 4,
            }
        }

        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int64(a), Self::Int64(b)) => a.cmp(b),
            (Self::Utf8(a), Self::Utf8(b)) => a.cmp(b),
            (Self::Tuple(a), Self::Tuple(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.total_cmp(y) {
                        Ordering::Equal => {}
                        ord => return ord,
                    }
                }
                a.len().cmp(&b.len())
            }
            (Self::Float64(a), Self::Float64(b)) => a.total_cmp(b),
            (Self::Int64(a), Self::Float64(b)) => cmp_int_float(*a, *b).then(Ordering::Less),
            (Self::Float64(a), Self::Int64(b)) => {
                cmp_int_float(*b, *a).reverse().then(Ordering::Greater)
            }
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

/// Exact numeric comparison of an integer with a float, ordering NaN like `f64::total_cmp`.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    // 2^63, the first float past i64::MAX.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if f >= LIMIT {
        return Ordering::Less;
    }
    if f < -LIMIT {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    // `whole` is integral and within range, so the cast is exact.
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)).unwrap_or(Ordering::Equal),
        ord => ord,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Int64(v) => v.hash(state),
            Self::Float64(v) => v.to_bits().hash(state),
            Self::Bool(v) => v.hash(state),
            Self::Utf8(v) => v.hash(state),
            Self::Tuple(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Utf8(v) => f.write_str(v),
            Self::Tuple(values) => {
                f.write_str("(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int64(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Utf8(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Utf8(v)
    }
}

/// A single row in a data stream.
///
/// Rows are value objects: transformations consume a row and produce a new one. The `id` is
/// assigned by the row source (the row position for the built-in sources) and is kept by
/// every transformation so collected rows can be traced back to their input.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    id: usize,
    values: Vec<Value>,
}

impl Row {
    /// Create a row.
    pub fn new(id: usize, values: Vec<Value>) -> Self {
        Self { id, values }
    }

    /// Source-assigned row identifier.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Values in schema order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value at position `idx`.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the row has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// New row with the same identifier and different values.
    pub fn with_values(self, values: Vec<Value>) -> Self {
        Self { id: self.id, values }
    }

    /// Take ownership of the values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Values of the column named `name`, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().filter_map(|row| row.get(idx)).collect())
    }

    /// Iterate the dataset as stream rows (row ids are row positions).
    pub fn iter_rows(&self) -> impl Iterator<Item = Row> + '_ {
        self.rows
            .iter()
            .enumerate()
            .map(|(id, values)| Row::new(id, values.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnRef, DataSet, DataType, Field, Row, Schema, Value};
    use crate::error::PipelineError;

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("name", DataType::Utf8),
        ])
    }

    #[test]
    fn resolve_by_name_and_position() {
        let s = schema();
        assert_eq!(s.resolve(&ColumnRef::from("name")).unwrap(), 1);
        assert_eq!(s.resolve(&ColumnRef::from(0usize)).unwrap(), 0);
        let err = s.resolve(&ColumnRef::from("missing")).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
        assert!(err.to_string().contains("unknown column 'missing'"));
        assert!(s.resolve(&ColumnRef::from(2usize)).is_err());
    }

    #[test]
    fn try_new_rejects_duplicate_names() {
        let err = Schema::try_new(vec![
            Field::new("a", DataType::Utf8),
            Field::new("a", DataType::Int64),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate column name 'a'"));
    }

    #[test]
    fn total_cmp_orders_nulls_first_and_numbers_across_types() {
        let mut values = vec![
            Value::Utf8("b".into()),
            Value::Float64(2.5),
            Value::Null,
            Value::Int64(2),
            Value::Bool(true),
        ];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Int64(2),
                Value::Float64(2.5),
                Value::Utf8("b".into()),
            ]
        );
    }

    #[test]
    fn mixed_numbers_compare_exactly_and_tie_break_by_type() {
        use std::cmp::Ordering;

        assert_eq!(Value::Int64(1).total_cmp(&Value::Float64(1.0)), Ordering::Less);
        assert_eq!(Value::Float64(1.0).total_cmp(&Value::Int64(1)), Ordering::Greater);
        assert_eq!(Value::Int64(-2).total_cmp(&Value::Float64(-1.5)), Ordering::Less);
        assert_eq!(Value::Int64(-1).total_cmp(&Value::Float64(-1.5)), Ordering::Greater);

        // 2^53 + 1 has no exact f64; a lossy cast would make these equal.
        let big = (1i64 << 53) + 1;
        let near = (1i64 << 53) as f64;
        assert_eq!(Value::Int64(big).total_cmp(&Value::Float64(near)), Ordering::Greater);
        assert_eq!(Value::Int64(i64::MAX).total_cmp(&Value::Float64(9.3e18)), Ordering::Less);
        assert_eq!(
            Value::Int64(i64::MIN).total_cmp(&Value::Float64(f64::NEG_INFINITY)),
            Ordering::Greater
        );
        assert_eq!(Value::Int64(0).total_cmp(&Value::Float64(f64::NAN)), Ordering::Less);
    }

    #[test]
    fn row_with_values_keeps_identifier() {
        let row = Row::new(7, vec![Value::Int64(1)]);
        let next = row.with_values(vec![Value::Int64(2)]);
        assert_eq!(next.id(), 7);
        assert_eq!(next.values(), &[Value::Int64(2)]);
    }

    #[test]
    fn dataset_serializes_to_json() {
        let ds = DataSet::new(schema(), vec![vec![Value::Int64(1), Value::Utf8("Ada".into())]]);
        let json = serde_json::to_string(&ds).unwrap();
        let back: DataSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ds);
        assert_eq!(ds.column("name").unwrap(), vec![&Value::Utf8("Ada".into())]);
    }
}
