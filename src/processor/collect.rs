//! Terminal steps that turn a row stream into a result.

use std::fs::File;
use std::path::PathBuf;

use indexmap::IndexMap;

use crate::consumer::{Consumer, Flow, Output};
use crate::error::{PipelineError, PipelineResult};
use crate::processing::reduce::{Accumulator, ReduceOp};
use crate::processor::{Opened, Processor};
use crate::source::csv::CsvOptions;
use crate::types::{check_width, ColumnRef, DataSet, Row, Schema, Value};

/// Materializes the stream into a [`DataSet`]. This is the default terminal step.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectDataSet;

impl CollectDataSet {
    pub(crate) fn collector(schema: &Schema) -> Box<dyn Consumer> {
        Box::new(DataSetCollector {
            schema: schema.clone(),
            rows: Vec::new(),
        })
    }
}

impl Processor for CollectDataSet {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        Ok(Opened::Collector(Self::collector(schema)))
    }
}

struct DataSetCollector {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

impl Consumer for DataSetCollector {
    fn consume(&mut self, row: Row) -> PipelineResult<Flow> {
        check_width(row.values(), self.schema.len())?;
        self.rows.push(row.into_values());
        Ok(Flow::Continue)
    }

    fn close(&mut self) -> PipelineResult<Option<Output>> {
        let rows = std::mem::take(&mut self.rows);
        Ok(Some(Output::DataSet(DataSet::new(self.schema.clone(), rows))))
    }
}

/// Counts rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountRows;

impl Processor for CountRows {
    fn open(&self, _schema: &Schema) -> PipelineResult<Opened> {
        Ok(Opened::collector(RowCounter(0)))
    }
}

struct RowCounter(usize);

impl Consumer for RowCounter {
    fn consume(&mut self, _row: Row) -> PipelineResult<Flow> {
        self.0 += 1;
        Ok(Flow::Continue)
    }

    fn close(&mut self) -> PipelineResult<Option<Output>> {
        Ok(Some(Output::Count(self.0)))
    }
}

/// Counts how often each distinct value occurs.
///
/// With one column the keys are its values; with several (or none, meaning every column)
/// the keys are tuples. Keys keep first-seen order.
#[derive(Debug, Clone, Default)]
pub struct Distinct {
    columns: Vec<ColumnRef>,
}

impl Distinct {
    pub fn new(columns: Vec<ColumnRef>) -> Self {
        Self { columns }
    }
}

impl Processor for Distinct {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        let indices = if self.columns.is_empty() {
            (0..schema.len()).collect()
        } else {
            schema.resolve_all(&self.columns)?
        };
        Ok(Opened::collector(DistinctCounter {
            width: schema.len(),
            indices,
            counts: IndexMap::new(),
        }))
    }
}

struct DistinctCounter {
    width: usize,
    indices: Vec<usize>,
    counts: IndexMap<Value, usize>,
}

impl Consumer for DistinctCounter {
    fn consume(&mut self, row: Row) -> PipelineResult<Flow> {
        check_width(row.values(), self.width)?;
        let values = row.values();
        let key = match self.indices[..] {
            [idx] => values[idx].clone(),
            _ => Value::Tuple(self.indices.iter().map(|&i| values[i].clone()).collect()),
        };
        *self.counts.entry(key).or_insert(0) += 1;
        Ok(Flow::Continue)
    }

    fn close(&mut self) -> PipelineResult<Option<Output>> {
        Ok(Some(Output::Distinct(std::mem::take(&mut self.counts))))
    }
}

/// Collects the rows themselves, keeping their source identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectRows;

impl Processor for CollectRows {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        Ok(Opened::collector(RowCollector {
            width: schema.len(),
            rows: Vec::new(),
        }))
    }
}

struct RowCollector {
    width: usize,
    rows: Vec<Row>,
}

impl Consumer for RowCollector {
    fn consume(&mut self, row: Row) -> PipelineResult<Flow> {
        check_width(row.values(), self.width)?;
        self.rows.push(row);
        Ok(Flow::Continue)
    }

    fn close(&mut self) -> PipelineResult<Option<Output>> {
        Ok(Some(Output::Rows(std::mem::take(&mut self.rows))))
    }
}

/// Reduces one column to a single value.
#[derive(Debug, Clone)]
pub struct Reduce {
    column: ColumnRef,
    op: ReduceOp,
}

impl Reduce {
    pub fn new(column: ColumnRef, op: ReduceOp) -> Self {
        Self { column, op }
    }
}

impl Processor for Reduce {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        let idx = schema.resolve(&self.column)?;
        let acc = Accumulator::new(self.op, &schema.fields[idx].data_type);
        Ok(Opened::collector(Reducer {
            width: schema.len(),
            idx,
            acc,
        }))
    }
}

struct Reducer {
    width: usize,
    idx: usize,
    acc: Accumulator,
}

impl Consumer for Reducer {
    fn consume(&mut self, row: Row) -> PipelineResult<Flow> {
        check_width(row.values(), self.width)?;
        self.acc.push(&row.values()[self.idx])?;
        Ok(Flow::Continue)
    }

    fn close(&mut self) -> PipelineResult<Option<Output>> {
        Ok(Some(Output::Value(self.acc.finish())))
    }
}

/// Writes the stream to a CSV file. Produces no result.
///
/// The file is created (or truncated) when the first row arrives, or at close for an empty
/// stream. `Null` values are written as [`CsvOptions::null_value`].
#[derive(Debug, Clone)]
pub struct WriteCsv {
    path: PathBuf,
    options: CsvOptions,
}

impl WriteCsv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: CsvOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CsvOptions) -> Self {
        self.options = options;
        self
    }
}

impl Processor for WriteCsv {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        let header = if self.options.has_headers {
            Some(schema.field_names().map(str::to_string).collect())
        } else {
            None
        };
        Ok(Opened::collector(CsvWriter {
            width: schema.len(),
            path: self.path.clone(),
            delimiter: self.options.delimiter,
            null_value: self.options.null_value.clone(),
            header,
            writer: None,
        }))
    }
}

struct CsvWriter {
    width: usize,
    path: PathBuf,
    delimiter: u8,
    null_value: String,
    header: Option<Vec<String>>,
    writer: Option<csv::Writer<File>>,
}

impl CsvWriter {
    fn writer(&mut self) -> PipelineResult<&mut csv::Writer<File>> {
        if self.writer.is_none() {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(self.delimiter)
                .from_path(&self.path)?;
            if let Some(header) = self.header.take() {
                writer.write_record(&header)?;
            }
            self.writer = Some(writer);
        }
        self.writer
            .as_mut()
            .ok_or_else(|| PipelineError::consumer_state("csv writer is not open"))
    }
}

impl Consumer for CsvWriter {
    fn consume(&mut self, row: Row) -> PipelineResult<Flow> {
        check_width(row.values(), self.width)?;
        let record: Vec<String> = row
            .values()
            .iter()
            .map(|v| match v {
                Value::Null => self.null_value.clone(),
                other => other.to_string(),
            })
            .collect();
        self.writer()?.write_record(&record)?;
        Ok(Flow::Continue)
    }

    fn close(&mut self) -> PipelineResult<Option<Output>> {
        self.writer()?.flush()?;
        Ok(None)
    }
}
