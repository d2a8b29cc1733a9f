//! Pipeline steps.
//!
//! A [`Processor`] is an immutable description of one step. It holds no row state and can
//! be shared by any number of pipelines and runs. [`Processor::open`] binds the step to
//! the schema of its input and returns a fresh consumer for a single run:
//!
//! - [`Opened::Producer`] for steps that emit rows, together with the schema of the rows
//!   they emit. The pipeline passes that schema to the next step.
//! - [`Opened::Collector`] for terminal steps that turn the stream into a result.

pub mod collect;
pub mod filter;
pub mod insert;
pub mod limit;
pub mod sample;
pub mod select;
pub mod sort;
pub mod typecast;
pub mod update;

use std::fmt;

use crate::consumer::{Consumer, Downstream, Flow, Producer};
use crate::error::PipelineResult;
use crate::types::{Row, Schema};

pub use collect::{CollectDataSet, CollectRows, CountRows, Distinct, Reduce, WriteCsv};
pub use filter::Filter;
pub use insert::Insert;
pub use limit::Limit;
pub use sample::Sample;
pub use select::{MoveColumns, Rename, Select};
pub use sort::Sort;
pub use typecast::Typecast;
pub use update::Update;

/// A reusable, schema-agnostic pipeline step.
pub trait Processor: fmt::Debug + Send + Sync {
    /// Bind the step to its input schema.
    ///
    /// Fails with [`crate::error::PipelineError::SchemaMismatch`] if the step references
    /// columns that `schema` lacks or would produce an invalid schema.
    fn open(&self, schema: &Schema) -> PipelineResult<Opened>;
}

/// A processor bound to a schema, ready for one run.
pub enum Opened {
    /// Emits rows of `schema` to a downstream consumer.
    Producer {
        producer: Box<dyn Producer>,
        schema: Schema,
    },
    /// Consumes rows and produces the run result.
    Collector(Box<dyn Consumer>),
}

impl Opened {
    pub(crate) fn producer(producer: impl Producer + 'static, schema: Schema) -> Self {
        Self::Producer {
            producer: Box::new(producer),
            schema,
        }
    }

    pub(crate) fn collector(consumer: impl Consumer + 'static) -> Self {
        Self::Collector(Box::new(consumer))
    }

    /// Output schema of a producing step.
    pub fn schema(&self) -> Option<&Schema> {
        match self {
            Self::Producer { schema, .. } => Some(schema),
            Self::Collector(_) => None,
        }
    }
}

impl fmt::Debug for Opened {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer { schema, .. } => f
                .debug_struct("Producer")
                .field("columns", &schema.field_names().collect::<Vec<_>>())
                .finish_non_exhaustive(),
            Self::Collector(_) => f.write_str("Collector"),
        }
    }
}

/// Forwards rows unchanged.
pub(crate) struct PassThrough;

impl Producer for PassThrough {
    fn handle(&mut self, row: Row, downstream: &mut Downstream<'_>) -> PipelineResult<Flow> {
        downstream.forward(row)
    }
}

/// Forwards `rows` until the downstream consumer stops.
pub(crate) fn forward_all(
    rows: impl IntoIterator<Item = Row>,
    downstream: &mut Downstream<'_>,
) -> PipelineResult<()> {
    for row in rows {
        if downstream.forward(row)?.is_stop() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{CollectRows, Opened, Processor};
    use crate::consumer::{Consumer, ProducingConsumer};
    use crate::types::{Row, Schema, Value};

    /// Push `values` through `step` until it stops and collect what it emits.
    pub(crate) fn run_step(step: &dyn Processor, schema: &Schema, values: Vec<Vec<Value>>) -> Vec<Row> {
        let Opened::Producer { producer, .. } = step.open(schema).unwrap() else {
            panic!("expected a producing step");
        };
        let Opened::Collector(sink) = CollectRows.open(schema).unwrap() else {
            panic!("expected a collector");
        };
        let mut chain = ProducingConsumer::new(producer, sink);
        for (id, values) in values.into_iter().enumerate() {
            if chain.consume(Row::new(id, values)).unwrap().is_stop() {
                break;
            }
        }
        chain.close().unwrap().unwrap().into_rows().unwrap()
    }

    pub(crate) fn ints(n: i64) -> Vec<Vec<Value>> {
        (0..n).map(|i| vec![Value::Int64(i)]).collect()
    }
}
