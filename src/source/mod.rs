//! Row sources.
//!
//! A [`RowSource`] reports the schema of its rows and opens a fresh row iterator for each
//! run. Re-readable sources ([`DataSet`], [`CsvSource`], [`JsonSource`]) can back any
//! number of runs; [`IterSource`] wraps a one-shot iterator and fails a second run with
//! [`PipelineError::SourceExhausted`].

pub mod csv;
pub mod json;

use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, Row, Schema, Value};

pub use self::csv::{CsvOptions, CsvSource};
pub use self::json::JsonSource;

/// Iterator over the rows of one run.
pub type RowStream<'a> = Box<dyn Iterator<Item = PipelineResult<Row>> + 'a>;

/// Something a pipeline can read rows from.
pub trait RowSource: fmt::Debug + Send + Sync {
    /// Schema of the rows yielded by [`RowSource::open`].
    fn schema(&self) -> PipelineResult<Schema>;

    /// Start a new pass over the rows.
    fn open(&self) -> PipelineResult<RowStream<'_>>;
}

impl RowSource for DataSet {
    fn schema(&self) -> PipelineResult<Schema> {
        Ok(self.schema.clone())
    }

    fn open(&self) -> PipelineResult<RowStream<'_>> {
        Ok(Box::new(self.iter_rows().map(Ok)))
    }
}

type OneShot = Box<dyn Iterator<Item = PipelineResult<Row>> + Send>;

/// Single-pass source over an iterator.
pub struct IterSource {
    schema: Schema,
    rows: Mutex<Option<OneShot>>,
}

impl IterSource {
    /// Wrap an iterator of row values; row ids are positions.
    pub fn new<I>(schema: Schema, rows: I) -> Self
    where
        I: IntoIterator<Item = Vec<Value>>,
        I::IntoIter: Send + 'static,
    {
        Self::from_rows(
            schema,
            rows.into_iter()
                .enumerate()
                .map(|(id, values)| Ok(Row::new(id, values))),
        )
    }

    /// Wrap an iterator of rows that may fail.
    pub fn from_rows<I>(schema: Schema, rows: I) -> Self
    where
        I: IntoIterator<Item = PipelineResult<Row>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            schema,
            rows: Mutex::new(Some(Box::new(rows.into_iter()))),
        }
    }
}

impl fmt::Debug for IterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exhausted = self
            .rows
            .lock()
            .map(|rows| rows.is_none())
            .unwrap_or(true);
        f.debug_struct("IterSource")
            .field("schema", &self.schema)
            .field("exhausted", &exhausted)
            .finish()
    }
}

impl RowSource for IterSource {
    fn schema(&self) -> PipelineResult<Schema> {
        Ok(self.schema.clone())
    }

    fn open(&self) -> PipelineResult<RowStream<'_>> {
        let rows = self
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(PipelineError::SourceExhausted)?;
        Ok(rows)
    }
}
