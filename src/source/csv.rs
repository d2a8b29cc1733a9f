//! CSV row source.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{ParseError, PipelineError, PipelineResult};
use crate::source::{RowSource, RowStream};
use crate::types::{DataType, Row, Schema, Value};

/// Options shared by the CSV source and the CSV writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    /// Field delimiter.
    pub delimiter: u8,
    /// Whether the first record is a header row.
    pub has_headers: bool,
    /// Cell text read as (and written for) `Null`. Empty cells are always `Null` when
    /// reading.
    pub null_value: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_headers: true,
            null_value: String::new(),
        }
    }
}

impl CsvOptions {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    pub fn with_null_value(mut self, null_value: impl Into<String>) -> Self {
        self.null_value = null_value.into();
        self
    }
}

/// Rows of a CSV file. The file is re-read on every [`RowSource::open`].
///
/// Rules:
///
/// - Without a schema every column is `Utf8` and named after its header (`column_<i>`
///   when the file has no header row).
/// - With a schema, fields are matched to headers by name (order can differ) or, without
///   a header row, by position. Each value is parsed according to the field type.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    schema: Option<Schema>,
    options: CsvOptions,
}

impl CsvSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            schema: None,
            options: CsvOptions::default(),
        }
    }

    /// Parse values according to `schema`.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_options(mut self, options: CsvOptions) -> Self {
        self.options = options;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reader(&self) -> PipelineResult<csv::Reader<File>> {
        Ok(csv::ReaderBuilder::new()
            .has_headers(self.options.has_headers)
            .delimiter(self.options.delimiter)
            .flexible(true)
            .from_path(&self.path)?)
    }

    fn file_columns(&self, rdr: &mut csv::Reader<File>) -> PipelineResult<Vec<String>> {
        if self.options.has_headers {
            return Ok(rdr.headers()?.iter().map(|h| h.trim().to_string()).collect());
        }
        let width = match rdr.records().next() {
            Some(record) => record?.len(),
            None => 0,
        };
        Ok((0..width).map(|i| format!("column_{i}")).collect())
    }

    /// Map schema fields to CSV column positions.
    fn column_positions(&self, schema: &Schema, rdr: &mut csv::Reader<File>) -> PipelineResult<Vec<usize>> {
        if !self.options.has_headers {
            return Ok((0..schema.len()).collect());
        }
        let headers = rdr.headers()?.clone();
        schema
            .fields
            .iter()
            .map(|field| {
                headers
                    .iter()
                    .position(|h| h.trim() == field.name)
                    .ok_or_else(|| {
                        PipelineError::schema_mismatch(format!(
                            "missing required column '{}'. headers={:?}",
                            field.name,
                            headers.iter().collect::<Vec<_>>()
                        ))
                    })
            })
            .collect()
    }
}

impl RowSource for CsvSource {
    fn schema(&self) -> PipelineResult<Schema> {
        if let Some(schema) = &self.schema {
            return Ok(schema.clone());
        }
        let mut rdr = self.reader()?;
        Schema::from_names(self.file_columns(&mut rdr)?)
    }

    fn open(&self) -> PipelineResult<RowStream<'_>> {
        let schema = self.schema()?;
        let mut rdr = self.reader()?;
        let positions = self.column_positions(&schema, &mut rdr)?;
        let first_line = if self.options.has_headers { 2 } else { 1 };
        let null_value = self.options.null_value.clone();

        let rows = rdr.into_records().enumerate().map(move |(id, record)| {
            let record = record?;
            let line = id + first_line;
            let values = schema
                .fields
                .iter()
                .zip(&positions)
                .map(|(field, &pos)| {
                    let raw = record.get(pos).unwrap_or("");
                    if raw == null_value {
                        return Ok(Value::Null);
                    }
                    parse_typed_value(line, &field.name, &field.data_type, raw)
                })
                .collect::<PipelineResult<Vec<_>>>()?;
            Ok(Row::new(id, values))
        });
        Ok(Box::new(rows))
    }
}

fn parse_typed_value(
    row: usize,
    column: &str,
    data_type: &DataType,
    raw: &str,
) -> PipelineResult<Value> {
    cast_text(data_type, raw).map_err(|message| {
        ParseError {
            row,
            column: column.to_owned(),
            raw: raw.to_owned(),
            message,
        }
        .into()
    })
}

/// Parse a text cell as `data_type`. Blank text is `Null`.
pub(crate) fn cast_text(data_type: &DataType, raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(trimmed.to_owned())),
        DataType::Int64 => trimmed
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|e| e.to_string()),
        DataType::Float64 => trimmed
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|e| e.to_string()),
        DataType::Bool => parse_bool(trimmed).map(Value::Bool),
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}
