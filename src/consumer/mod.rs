//! Schema-bound, stateful row consumers.
//!
//! A consumer receives rows through [`Consumer::consume`] and is finished with exactly one
//! call to [`Consumer::close`]. There are two kinds:
//!
//! - a **producing consumer** ([`ProducingConsumer`]) transforms each row and forwards zero,
//!   one or many rows to its downstream consumer. Closing it closes the downstream and
//!   returns the downstream's result.
//! - a **collector** consumes rows without forwarding anything and produces a result
//!   ([`Output`]) at close.
//!
//! Any consumer may answer [`Flow::Stop`] to signal that it will not accept more rows. The
//! signal travels upstream to the pipeline runner, which stops pulling from the source and
//! closes the chain.

use std::fmt;

use indexmap::IndexMap;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, Row, Value};

/// Answer of a consumer after receiving a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep sending rows.
    Continue,
    /// No further rows are needed; the chain should be closed.
    Stop,
}

impl Flow {
    pub fn is_stop(self) -> bool {
        self == Self::Stop
    }
}

/// Final result of a collector.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Materialized rows with their schema.
    DataSet(DataSet),
    /// Number of rows.
    Count(usize),
    /// Frequency of each distinct value, in first-seen order.
    Distinct(IndexMap<Value, usize>),
    /// Rows with their source identifiers.
    Rows(Vec<Row>),
    /// A single value (reductions).
    Value(Value),
}

impl Output {
    pub fn into_dataset(self) -> Option<DataSet> {
        match self {
            Self::DataSet(ds) => Some(ds),
            _ => None,
        }
    }

    pub fn into_count(self) -> Option<usize> {
        match self {
            Self::Count(n) => Some(n),
            _ => None,
        }
    }

    pub fn into_distinct(self) -> Option<IndexMap<Value, usize>> {
        match self {
            Self::Distinct(counts) => Some(counts),
            _ => None,
        }
    }

    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            Self::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// A stateful row consumer bound to one schema.
pub trait Consumer: Send {
    /// Receive the next row.
    fn consume(&mut self, row: Row) -> PipelineResult<Flow>;

    /// Signal end of stream and return the result, if any.
    fn close(&mut self) -> PipelineResult<Option<Output>>;
}

impl<C: Consumer + ?Sized> Consumer for Box<C> {
    fn consume(&mut self, row: Row) -> PipelineResult<Flow> {
        (**self).consume(row)
    }

    fn close(&mut self) -> PipelineResult<Option<Output>> {
        (**self).close()
    }
}

/// Handle to the consumer that follows a producer in the chain.
pub struct Downstream<'a> {
    consumer: &'a mut dyn Consumer,
    stopped: &'a mut bool,
}

impl Downstream<'_> {
    /// Forward a row. Once the downstream consumer answered [`Flow::Stop`] further rows are
    /// dropped and `Stop` is returned.
    pub fn forward(&mut self, row: Row) -> PipelineResult<Flow> {
        if *self.stopped {
            return Ok(Flow::Stop);
        }
        let flow = self.consumer.consume(row)?;
        if flow.is_stop() {
            *self.stopped = true;
        }
        Ok(flow)
    }

    /// Whether the downstream consumer refused further rows.
    pub fn is_stopped(&self) -> bool {
        *self.stopped
    }
}

/// Row handler of a producing consumer.
pub trait Producer: Send {
    /// Handle one input row, forwarding any output rows to `downstream`.
    fn handle(&mut self, row: Row, downstream: &mut Downstream<'_>) -> PipelineResult<Flow>;

    /// Forward buffered rows at end of stream. Called once, before the downstream is closed.
    fn drain(&mut self, _downstream: &mut Downstream<'_>) -> PipelineResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Open,
    Consuming,
    Closed,
}

impl Lifecycle {
    fn consume(&mut self) -> PipelineResult<()> {
        if *self == Self::Closed {
            return Err(PipelineError::consumer_state("consume() called after close()"));
        }
        *self = Self::Consuming;
        Ok(())
    }

    fn close(&mut self) -> PipelineResult<()> {
        if *self == Self::Closed {
            return Err(PipelineError::consumer_state("close() called more than once"));
        }
        *self = Self::Closed;
        Ok(())
    }
}

/// A [`Producer`] connected to its downstream consumer.
pub struct ProducingConsumer {
    producer: Box<dyn Producer>,
    downstream: Box<dyn Consumer>,
    state: Lifecycle,
    stopped: bool,
}

impl ProducingConsumer {
    pub fn new(producer: Box<dyn Producer>, downstream: Box<dyn Consumer>) -> Self {
        Self {
            producer,
            downstream,
            state: Lifecycle::Open,
            stopped: false,
        }
    }
}

impl fmt::Debug for ProducingConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducingConsumer")
            .field("state", &self.state)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl Consumer for ProducingConsumer {
    fn consume(&mut self, row: Row) -> PipelineResult<Flow> {
        self.state.consume()?;
        if self.stopped {
            return Ok(Flow::Stop);
        }
        let mut downstream = Downstream {
            consumer: &mut *self.downstream,
            stopped: &mut self.stopped,
        };
        self.producer.handle(row, &mut downstream)
    }

    fn close(&mut self) -> PipelineResult<Option<Output>> {
        self.state.close()?;
        if !self.stopped {
            let mut downstream = Downstream {
                consumer: &mut *self.downstream,
                stopped: &mut self.stopped,
            };
            self.producer.drain(&mut downstream)?;
        }
        self.downstream.close()
    }
}

/// Lifecycle guard for a collector.
///
/// Rejects rows after close and a second close with [`PipelineError::ConsumerState`].
#[derive(Debug)]
pub struct Checked<C> {
    inner: C,
    state: Lifecycle,
}

impl<C: Consumer> Checked<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            state: Lifecycle::Open,
        }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Consumer> Consumer for Checked<C> {
    fn consume(&mut self, row: Row) -> PipelineResult<Flow> {
        self.state.consume()?;
        self.inner.consume(row)
    }

    fn close(&mut self) -> PipelineResult<Option<Output>> {
        self.state.close()?;
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::{Checked, Consumer, Downstream, Flow, Output, Producer, ProducingConsumer};
    use crate::error::{PipelineError, PipelineResult};
    use crate::types::{Row, Value};

    #[derive(Default)]
    struct Collect {
        rows: Vec<Row>,
        capacity: Option<usize>,
    }

    impl Consumer for Collect {
        fn consume(&mut self, row: Row) -> PipelineResult<Flow> {
            self.rows.push(row);
            match self.capacity {
                Some(cap) if self.rows.len() >= cap => Ok(Flow::Stop),
                _ => Ok(Flow::Continue),
            }
        }

        fn close(&mut self) -> PipelineResult<Option<Output>> {
            Ok(Some(Output::Rows(std::mem::take(&mut self.rows))))
        }
    }

    /// Forwards every row twice.
    struct Twice;

    impl Producer for Twice {
        fn handle(&mut self, row: Row, downstream: &mut Downstream<'_>) -> PipelineResult<Flow> {
            downstream.forward(row.clone())?;
            downstream.forward(row)
        }
    }

    /// Holds every row until close.
    #[derive(Default)]
    struct Hold(Vec<Row>);

    impl Producer for Hold {
        fn handle(&mut self, row: Row, _downstream: &mut Downstream<'_>) -> PipelineResult<Flow> {
            self.0.push(row);
            Ok(Flow::Continue)
        }

        fn drain(&mut self, downstream: &mut Downstream<'_>) -> PipelineResult<()> {
            for row in self.0.drain(..) {
                if downstream.forward(row)?.is_stop() {
                    break;
                }
            }
            Ok(())
        }
    }

    fn row(id: usize) -> Row {
        Row::new(id, vec![Value::Int64(id as i64)])
    }

    #[test]
    fn close_returns_the_downstream_result() {
        let mut chain = ProducingConsumer::new(Box::new(Twice), Box::new(Collect::default()));
        chain.consume(row(0)).unwrap();
        chain.consume(row(1)).unwrap();
        let rows = chain.close().unwrap().unwrap().into_rows().unwrap();
        let ids: Vec<usize> = rows.iter().map(Row::id).collect();
        assert_eq!(ids, vec![0, 0, 1, 1]);
    }

    #[test]
    fn stop_from_downstream_reaches_the_caller() {
        let sink = Collect {
            rows: Vec::new(),
            capacity: Some(3),
        };
        let mut chain = ProducingConsumer::new(Box::new(Twice), Box::new(sink));
        assert_eq!(chain.consume(row(0)).unwrap(), Flow::Continue);
        assert_eq!(chain.consume(row(1)).unwrap(), Flow::Stop);
        assert_eq!(chain.consume(row(2)).unwrap(), Flow::Stop);
        let rows = chain.close().unwrap().unwrap().into_rows().unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn drain_forwards_buffered_rows_before_downstream_close() {
        let sink = Collect {
            rows: Vec::new(),
            capacity: Some(2),
        };
        let mut chain = ProducingConsumer::new(Box::new(Hold::default()), Box::new(sink));
        for id in 0..5 {
            assert_eq!(chain.consume(row(id)).unwrap(), Flow::Continue);
        }
        let rows = chain.close().unwrap().unwrap().into_rows().unwrap();
        assert_eq!(rows.iter().map(Row::id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn lifecycle_misuse_is_rejected() {
        let mut chain = ProducingConsumer::new(Box::new(Twice), Box::new(Collect::default()));
        chain.close().unwrap();
        assert!(matches!(
            chain.consume(row(0)).unwrap_err(),
            PipelineError::ConsumerState { .. }
        ));
        assert!(matches!(
            chain.close().unwrap_err(),
            PipelineError::ConsumerState { .. }
        ));

        let mut collector = Checked::new(Collect::default());
        collector.consume(row(0)).unwrap();
        assert!(collector.close().unwrap().is_some());
        assert!(collector.close().is_err());
    }
}
