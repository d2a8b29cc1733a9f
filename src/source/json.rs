//! JSON row source.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - A single JSON object (one row)
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! Nested fields are supported using dot paths in schema field names (e.g. `user.name`).
//! NDJSON and single objects are parsed one document at a time as rows are pulled; an
//! array is parsed as a whole when the source is opened.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use crate::error::{ParseError, PipelineError, PipelineResult};
use crate::source::{RowSource, RowStream};
use crate::types::{DataType, Row, Schema, Value};

#[derive(Debug, Clone)]
enum Input {
    Path(PathBuf),
    Text(String),
}

/// Rows of a JSON document, parsed according to a schema.
///
/// A file-backed source re-reads the file on every [`RowSource::open`]. A field absent
/// from an object is an error; an explicit `null` is [`Value::Null`].
#[derive(Debug, Clone)]
pub struct JsonSource {
    input: Input,
    schema: Schema,
}

impl JsonSource {
    /// Read rows from the file at `path`.
    pub fn from_path(path: impl Into<PathBuf>, schema: Schema) -> Self {
        Self {
            input: Input::Path(path.into()),
            schema,
        }
    }

    /// Read rows from an in-memory JSON document.
    pub fn from_text(text: impl Into<String>, schema: Schema) -> Self {
        Self {
            input: Input::Text(text.into()),
            schema,
        }
    }

    fn documents(&self) -> PipelineResult<Documents<'_>> {
        match &self.input {
            Input::Path(path) => stream_documents(BufReader::new(File::open(path)?)),
            Input::Text(text) => stream_documents(text.as_bytes()),
        }
    }
}

type Documents<'a> = Box<dyn Iterator<Item = PipelineResult<serde_json::Value>> + 'a>;

impl RowSource for JsonSource {
    fn schema(&self) -> PipelineResult<Schema> {
        Ok(self.schema.clone())
    }

    fn open(&self) -> PipelineResult<RowStream<'_>> {
        let rows = self
            .documents()?
            .enumerate()
            .map(move |(id, doc)| json_row(id, &doc?, &self.schema));
        Ok(Box::new(rows))
    }
}

fn stream_documents<'a, R: BufRead + 'a>(mut reader: R) -> PipelineResult<Documents<'a>> {
    match first_byte(&mut reader)? {
        None => Ok(Box::new(std::iter::empty())),
        Some(b'[') => {
            let items = match serde_json::from_reader::<_, serde_json::Value>(reader)? {
                serde_json::Value::Array(items) => items,
                other => vec![other],
            };
            Ok(Box::new(items.into_iter().map(Ok)))
        }
        Some(_) => Ok(Box::new(
            serde_json::Deserializer::from_reader(reader)
                .into_iter::<serde_json::Value>()
                .map(|doc| doc.map_err(PipelineError::from)),
        )),
    }
}

/// First non-whitespace byte, leaving it unread.
fn first_byte(reader: &mut impl BufRead) -> PipelineResult<Option<u8>> {
    loop {
        let (skip, found) = {
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(None);
            }
            match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(pos) => (pos, Some(buf[pos])),
                None => (buf.len(), None),
            }
        };
        reader.consume(skip);
        if found.is_some() {
            return Ok(found);
        }
    }
}

fn json_row(id: usize, doc: &serde_json::Value, schema: &Schema) -> PipelineResult<Row> {
    let row_num = id + 1;
    let obj = doc.as_object().ok_or_else(|| {
        PipelineError::schema_mismatch(format!("row {row_num} is not a json object"))
    })?;

    let values = schema
        .fields
        .iter()
        .map(|field| {
            let jv = get_by_dot_path(obj, &field.name).ok_or_else(|| {
                PipelineError::schema_mismatch(format!(
                    "row {row_num} missing required field '{}'",
                    field.name
                ))
            })?;
            convert_json_value(row_num, &field.name, &field.data_type, jv)
        })
        .collect::<PipelineResult<Vec<_>>>()?;
    Ok(Row::new(id, values))
}

fn get_by_dot_path<'a>(
    root: &'a serde_json::Map<String, serde_json::Value>,
    path: &str,
) -> Option<&'a serde_json::Value> {
    if let Some(v) = root.get(path) {
        return Some(v);
    }
    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn convert_json_value(
    row: usize,
    column: &str,
    data_type: &DataType,
    v: &serde_json::Value,
) -> PipelineResult<Value> {
    if v.is_null() {
        return Ok(Value::Null);
    }

    let parse_error = |message: &str| -> PipelineError {
        ParseError {
            row,
            column: column.to_string(),
            raw: v.to_string(),
            message: message.to_string(),
        }
        .into()
    };

    match data_type {
        DataType::Utf8 => v
            .as_str()
            .map(|s| Value::Utf8(s.to_string()))
            .ok_or_else(|| parse_error("expected string")),
        DataType::Bool => v
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| parse_error("expected bool")),
        DataType::Int64 => {
            if let Some(n) = v.as_i64() {
                Ok(Value::Int64(n))
            } else if let Some(n) = v.as_u64() {
                i64::try_from(n)
                    .map(Value::Int64)
                    .map_err(|_| parse_error("u64 out of range for i64"))
            } else {
                Err(parse_error("expected integer number"))
            }
        }
        DataType::Float64 => v
            .as_f64()
            .map(Value::Float64)
            .ok_or_else(|| parse_error("expected number")),
    }
}
