//! Reusable stream pipelines.
//!
//! A [`Pipeline`] is a row source plus an ordered list of [`Processor`] steps. It is an
//! immutable value: every builder method returns a new pipeline and leaves the original
//! untouched, so one definition can be extended in several directions and run any number
//! of times.
//!
//! Each run:
//!
//! 1. opens every step against the output schema of its predecessor (the first step sees
//!    the source schema). Unknown columns and non-streamable functions fail here, before a
//!    single row is read;
//! 2. connects the opened steps into a consumer chain ending in a collector
//!    ([`CollectDataSet`] unless the chain already ends in one);
//! 3. pulls rows from the source one at a time and pushes each through the chain, stopping
//!    early when a consumer answers [`crate::consumer::Flow::Stop`];
//! 4. closes the chain exactly once and returns the collector's result.
//!
//! ## Example
//!
//! ```rust
//! use rust_data_pipeline::function::col;
//! use rust_data_pipeline::pipeline::Pipeline;
//! use rust_data_pipeline::types::{DataSet, Schema, Value};
//!
//! let ds = DataSet::new(
//!     Schema::from_names(["borough", "street"]).unwrap(),
//!     vec![
//!         vec![Value::from("Brooklyn"), Value::from("Atlantic Ave")],
//!         vec![Value::from(""), Value::from("Broadway")],
//!         vec![Value::from("Bronx"), Value::from("Grand Concourse")],
//!     ],
//! );
//!
//! let pipeline = Pipeline::from_dataset(ds)
//!     .filter(col("borough").is_not_empty())
//!     .update(["borough"], col("borough").upper());
//!
//! let out = pipeline.to_dataset().unwrap();
//! assert_eq!(
//!     out.column("borough").unwrap(),
//!     vec![&Value::from("BROOKLYN"), &Value::from("BRONX")]
//! );
//! ```

pub mod observer;
mod runner;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::consumer::Output;
use crate::error::{PipelineError, PipelineResult};
use crate::function::Expr;
use crate::processing::ReduceOp;
use crate::processor::{
    CollectDataSet, CollectRows, CountRows, Distinct, Filter, Insert, Limit, MoveColumns,
    Processor, Reduce, Rename, Sample, Select, Sort, Typecast, Update, WriteCsv,
};
use crate::source::{CsvSource, JsonSource, RowSource};
use crate::types::{column_refs, ColumnRef, DataSet, DataType, Row, Schema, Value};

pub use observer::{
    CompositeObserver, PipelineEvent, PipelineObserver, PipelineSeverity, RunMetrics,
    RunMetricsSnapshot, StdErrObserver,
};

pub use runner::RowIter;

use runner::{instantiate, Runner};

/// Options applied to every run of a [`Pipeline`].
#[derive(Clone)]
pub struct PipelineOptions {
    /// Receives run events and failures.
    pub observer: Option<Arc<dyn PipelineObserver>>,
    /// Failures at or above this severity are reported through
    /// [`PipelineObserver::on_alert`] in addition to [`PipelineObserver::on_failure`].
    pub alert_at_or_above: PipelineSeverity,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            observer: None,
            alert_at_or_above: PipelineSeverity::Critical,
        }
    }
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("observer", &self.observer.as_ref().map(|_| "<observer>"))
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl PipelineOptions {
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_alert_at_or_above(mut self, severity: PipelineSeverity) -> Self {
        self.alert_at_or_above = severity;
        self
    }
}

/// A row source and the steps applied to its rows.
#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn RowSource>,
    steps: Vec<Arc<dyn Processor>>,
    options: PipelineOptions,
    metrics: Arc<RunMetrics>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source)
            .field("steps", &self.steps)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// A pipeline without steps over `source`.
    pub fn new(source: impl RowSource + 'static) -> Self {
        Self::from_source(Arc::new(source))
    }

    /// A pipeline over a shared source.
    pub fn from_source(source: Arc<dyn RowSource>) -> Self {
        Self {
            source,
            steps: Vec::new(),
            options: PipelineOptions::default(),
            metrics: Arc::new(RunMetrics::new()),
        }
    }

    /// A pipeline over the rows of an in-memory table.
    pub fn from_dataset(dataset: DataSet) -> Self {
        Self::new(dataset)
    }

    /// A pipeline over a CSV file with a header row; every column is read as text.
    ///
    /// Use [`CsvSource`] with [`Pipeline::new`] for typed columns or other CSV options.
    pub fn from_csv(path: impl AsRef<Path>) -> Self {
        Self::new(CsvSource::new(path))
    }

    /// A pipeline over a JSON array, object or NDJSON file.
    pub fn from_json(path: impl Into<PathBuf>, schema: Schema) -> Self {
        Self::new(JsonSource::from_path(path, schema))
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Count runs into `metrics` instead of this pipeline's own counters.
    pub fn with_metrics(mut self, metrics: Arc<RunMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Handle to the run counters. Pipelines derived from this one share them.
    pub fn metrics(&self) -> Arc<RunMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// A new pipeline with `step` appended. `self` is unchanged.
    pub fn append(&self, step: impl Processor + 'static) -> Pipeline {
        self.append_shared(Arc::new(step))
    }

    pub fn append_shared(&self, step: Arc<dyn Processor>) -> Pipeline {
        let mut next = self.clone();
        next.steps.push(step);
        next
    }

    /// Keep rows for which `predicate` is true.
    pub fn filter(&self, predicate: Expr) -> Pipeline {
        self.append(Filter::new(predicate))
    }

    /// Keep at most `limit` rows for which `predicate` is true.
    pub fn filter_limit(&self, predicate: Expr, limit: usize) -> Pipeline {
        self.filter(predicate).limit(limit)
    }

    /// Drop rows for which `predicate` is true.
    pub fn delete(&self, predicate: Expr) -> Pipeline {
        self.append(Filter::delete(predicate))
    }

    /// Keep the first `rows` rows.
    pub fn limit(&self, rows: usize) -> Pipeline {
        self.append(Limit::new(rows))
    }

    /// Keep and reorder columns.
    pub fn select<I, C>(&self, columns: I) -> Pipeline
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        self.append(Select::new(column_refs(columns)))
    }

    /// Keep and reorder columns, renaming them to `names`.
    pub fn select_as<I, C, N, S>(&self, columns: I, names: N) -> Pipeline
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.append(Select::with_names(
            column_refs(columns),
            names.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn rename<I, C, N, S>(&self, columns: I, names: N) -> Pipeline
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.append(Rename::new(
            column_refs(columns),
            names.into_iter().map(Into::into).collect(),
        ))
    }

    /// Move `columns` so the first of them lands at position `pos`.
    pub fn move_columns<I, C>(&self, columns: I, pos: usize) -> Pipeline
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        self.append(MoveColumns::new(column_refs(columns), pos))
    }

    pub fn insert(&self, insert: Insert) -> Pipeline {
        self.append(insert)
    }

    /// Replace the values of `columns` with the result of `func`.
    pub fn update<I, C>(&self, columns: I, func: Expr) -> Pipeline
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        self.append(Update::new(column_refs(columns), func))
    }

    /// Random sample of `n` rows; a seed makes the sample repeatable.
    pub fn sample(&self, n: usize, seed: Option<u64>) -> Pipeline {
        let sample = Sample::new(n);
        match seed {
            Some(seed) => self.append(sample.with_seed(seed)),
            None => self.append(sample),
        }
    }

    /// Stable sort by `keys`.
    pub fn sort<I, C>(&self, keys: I, descending: bool) -> Pipeline
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        let sort = Sort::new(column_refs(keys));
        if descending {
            self.append(sort.descending())
        } else {
            self.append(sort)
        }
    }

    /// Convert columns to new types, parsing text values.
    ///
    /// Untyped CSV sources yield text; cast the columns that comparisons or arithmetic need.
    pub fn typecast<I, C>(&self, columns: I) -> Pipeline
    where
        I: IntoIterator<Item = (C, DataType)>,
        C: Into<ColumnRef>,
    {
        let cast = columns
            .into_iter()
            .fold(Typecast::new(), |cast, (column, data_type)| cast.column(column, data_type));
        self.append(cast)
    }

    /// Schema of the rows reaching the last step, computed without reading any rows.
    pub fn output_schema(&self) -> PipelineResult<Schema> {
        let steps = self.step_refs();
        Ok(instantiate(self.source.schema()?, &steps)?.schema)
    }

    /// Run the pipeline.
    ///
    /// Without a terminal collector the rows are collected into a [`DataSet`].
    pub fn run(&self) -> PipelineResult<Option<Output>> {
        self.runner(None).run()
    }

    /// Run the pipeline with `terminal` as the collector.
    ///
    /// Fails with [`PipelineError::SchemaMismatch`] if the pipeline already ends in a
    /// collector.
    pub fn run_with(&self, terminal: impl Processor) -> PipelineResult<Option<Output>> {
        self.runner(Some(&terminal)).run()
    }

    pub fn to_dataset(&self) -> PipelineResult<DataSet> {
        expect_output(self.run_with(CollectDataSet)?, Output::into_dataset, "a data set")
    }

    /// The first `n` rows as a data set.
    pub fn head(&self, n: usize) -> PipelineResult<DataSet> {
        self.limit(n).to_dataset()
    }

    pub fn count(&self) -> PipelineResult<usize> {
        expect_output(self.run_with(CountRows)?, Output::into_count, "a row count")
    }

    /// Frequency of each distinct value (a tuple for several columns, none meaning all).
    pub fn distinct<I, C>(&self, columns: I) -> PipelineResult<IndexMap<Value, usize>>
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        expect_output(
            self.run_with(Distinct::new(column_refs(columns)))?,
            Output::into_distinct,
            "distinct values",
        )
    }

    /// Distinct values of one column in first-seen order.
    pub fn distinct_values(&self, column: impl Into<ColumnRef>) -> PipelineResult<Vec<Value>> {
        Ok(self.distinct([column.into()])?.into_keys().collect())
    }

    pub fn reduce(&self, column: impl Into<ColumnRef>, op: ReduceOp) -> PipelineResult<Value> {
        expect_output(
            self.run_with(Reduce::new(column.into(), op))?,
            Output::into_value,
            "a reduced value",
        )
    }

    /// Write the rows to a CSV file with a header row.
    pub fn write_csv(&self, path: impl Into<PathBuf>) -> PipelineResult<()> {
        self.run_with(WriteCsv::new(path))?;
        Ok(())
    }

    pub fn collect_rows(&self) -> PipelineResult<Vec<Row>> {
        expect_output(self.run_with(CollectRows)?, Output::into_rows, "rows")
    }

    /// Lazily iterate the rows that reach the end of the pipeline.
    ///
    /// Source rows are read only as the iterator is advanced, and reading stops once a step
    /// answers [`crate::consumer::Flow::Stop`]. Fails like [`Pipeline::run`] when the steps
    /// cannot be opened, or with [`PipelineError::SchemaMismatch`] if the pipeline ends in a
    /// collector.
    pub fn iter_rows(&self) -> PipelineResult<RowIter<'_>> {
        self.runner(None).iter()
    }

    fn step_refs(&self) -> Vec<&dyn Processor> {
        self.steps.iter().map(|step| &**step).collect()
    }

    fn runner<'a>(&'a self, terminal: Option<&'a dyn Processor>) -> Runner<'a> {
        let mut steps = self.step_refs();
        steps.extend(terminal);
        Runner {
            source: self.source.as_ref(),
            steps,
            options: &self.options,
            metrics: &self.metrics,
        }
    }
}

fn expect_output<T>(
    output: Option<Output>,
    extract: fn(Output) -> Option<T>,
    expected: &str,
) -> PipelineResult<T> {
    output.and_then(extract).ok_or_else(|| {
        PipelineError::consumer_state(format!("pipeline did not produce {expected}"))
    })
}
