use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;

use crate::consumer::{Checked, Consumer, Flow, Output, Producer, ProducingConsumer};
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::observer::{PipelineEvent, PipelineSeverity, RunMetrics};
use crate::pipeline::PipelineOptions;
use crate::processor::{CollectDataSet, Opened, Processor};
use crate::source::{RowSource, RowStream};
use crate::types::{check_width, Row, Schema};

/// Steps of a pipeline bound to the schema of their input.
pub(crate) struct Instantiated {
    producers: Vec<Box<dyn Producer>>,
    collector: Option<Box<dyn Consumer>>,
    /// Schema of the rows reaching the collector.
    pub(crate) schema: Schema,
}

/// Open `steps` in order, handing each step the output schema of its predecessor.
pub(crate) fn instantiate(
    schema: Schema,
    steps: &[&dyn Processor],
) -> PipelineResult<Instantiated> {
    let mut chain = Instantiated {
        producers: Vec::with_capacity(steps.len()),
        collector: None,
        schema,
    };
    for (pos, step) in steps.iter().enumerate() {
        if chain.collector.is_some() {
            return Err(PipelineError::schema_mismatch(format!(
                "step {} ({:?}) follows a collector; a collector emits no rows and must be the last step",
                pos,
                step
            )));
        }
        match step.open(&chain.schema)? {
            Opened::Producer { producer, schema } => {
                chain.producers.push(producer);
                chain.schema = schema;
            }
            Opened::Collector(collector) => chain.collector = Some(collector),
        }
    }
    Ok(chain)
}

/// Counts the rows that reach the terminal collector.
struct Counted {
    inner: Box<dyn Consumer>,
    metrics: Arc<RunMetrics>,
}

impl Consumer for Counted {
    fn consume(&mut self, row: Row) -> PipelineResult<Flow> {
        self.metrics.on_row_collected();
        self.inner.consume(row)
    }

    fn close(&mut self) -> PipelineResult<Option<Output>> {
        self.inner.close()
    }
}

impl Instantiated {
    /// Connect the producers to the collector, last step first.
    fn connect(self, metrics: &Arc<RunMetrics>) -> Box<dyn Consumer> {
        let collector = self
            .collector
            .unwrap_or_else(|| CollectDataSet::collector(&self.schema));
        let mut head: Box<dyn Consumer> = Box::new(Checked::new(Counted {
            inner: collector,
            metrics: Arc::clone(metrics),
        }));
        for producer in self.producers.into_iter().rev() {
            head = Box::new(ProducingConsumer::new(producer, head));
        }
        head
    }
}

pub(crate) struct Runner<'a> {
    pub(crate) source: &'a dyn RowSource,
    pub(crate) steps: Vec<&'a dyn Processor>,
    pub(crate) options: &'a PipelineOptions,
    pub(crate) metrics: &'a Arc<RunMetrics>,
}

impl<'a> Runner<'a> {
    pub(crate) fn run(self) -> PipelineResult<Option<Output>> {
        let start = self.begin();
        let result = self.execute();
        self.finish(start, result)
    }

    /// Start a run whose rows are pulled on demand by the returned iterator.
    ///
    /// Rows reaching the end of the chain are handed to the caller in order. Instantiation
    /// and source errors are returned here, before any row is read. A run abandoned before
    /// its last row is not reported as finished.
    pub(crate) fn iter(self) -> PipelineResult<RowIter<'a>> {
        let start = self.begin();
        let (sender, buffer) = mpsc::channel();
        let tail = Tail(sender);
        let mut steps = self.steps.clone();
        steps.push(&tail);
        let source = self.source;
        let opened = self.open(&steps).and_then(|(head, width)| {
            let rows = source.open()?;
            Ok((head, width, rows))
        });
        let (head, width, rows) = match opened {
            Ok(opened) => opened,
            Err(e) => return self.finish(start, Err(e)),
        };
        Ok(RowIter {
            runner: self,
            start,
            rows: Some(rows),
            head: Some(head),
            width,
            pulled: 0,
            buffer,
        })
    }

    fn begin(&self) -> Instant {
        self.metrics.begin_run();
        self.emit(PipelineEvent::RunStarted);
        Instant::now()
    }

    fn finish<T>(&self, start: Instant, result: PipelineResult<T>) -> PipelineResult<T> {
        match result {
            Ok(output) => {
                let elapsed = start.elapsed();
                self.metrics.end_run(elapsed, false);
                self.emit(PipelineEvent::RunFinished {
                    elapsed,
                    metrics: self.metrics.snapshot(),
                });
                Ok(output)
            }
            Err(e) => {
                self.metrics.end_run(start.elapsed(), true);
                let severity = PipelineSeverity::of(&e);
                self.emit(PipelineEvent::RunFailed {
                    severity,
                    message: e.to_string(),
                });
                if let Some(observer) = &self.options.observer {
                    observer.on_failure(severity, &e);
                    if severity >= self.options.alert_at_or_above {
                        observer.on_alert(severity, &e);
                    }
                }
                Err(e)
            }
        }
    }

    /// Instantiate the steps and connect them. Returns the chain head and the source width.
    fn open(&self, steps: &[&dyn Processor]) -> PipelineResult<(Box<dyn Consumer>, usize)> {
        let schema = self.source.schema()?;
        let width = schema.len();
        let chain = instantiate(schema, steps)?;
        self.emit(PipelineEvent::ChainOpened {
            steps: steps.len(),
            schema: chain.schema.clone(),
        });
        Ok((chain.connect(self.metrics), width))
    }

    /// Push one source row into the chain. `pulled` counts rows read so far.
    fn push(
        &self,
        head: &mut dyn Consumer,
        row: Row,
        width: usize,
        pulled: &mut u64,
    ) -> PipelineResult<Flow> {
        check_width(row.values(), width)?;
        *pulled += 1;
        self.metrics.on_row_pulled();
        let flow = head.consume(row)?;
        if flow.is_stop() {
            self.metrics.on_early_stop();
            self.emit(PipelineEvent::EarlyStop {
                rows_pulled: *pulled,
            });
        }
        Ok(flow)
    }

    /// One pull-then-push pass. An error drops the chain without closing it.
    fn execute(&self) -> PipelineResult<Option<Output>> {
        let (mut head, width) = self.open(&self.steps)?;
        let mut pulled = 0u64;
        for row in self.source.open()? {
            if self.push(&mut *head, row?, width, &mut pulled)?.is_stop() {
                break;
            }
        }
        head.close()
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(observer) = &self.options.observer {
            observer.on_event(&event);
        }
    }
}

/// Collector handing every row it receives to a [`RowIter`].
#[derive(Debug)]
struct Tail(Sender<Row>);

impl Processor for Tail {
    fn open(&self, _schema: &Schema) -> PipelineResult<Opened> {
        Ok(Opened::Collector(Box::new(TailConsumer(self.0.clone()))))
    }
}

struct TailConsumer(Sender<Row>);

impl Consumer for TailConsumer {
    fn consume(&mut self, row: Row) -> PipelineResult<Flow> {
        self.0
            .send(row)
            .map_err(|_| PipelineError::consumer_state("row iterator was dropped"))?;
        Ok(Flow::Continue)
    }

    fn close(&mut self) -> PipelineResult<Option<Output>> {
        Ok(None)
    }
}

/// Lazy iterator over the rows that reach the end of a pipeline.
///
/// Source rows are pulled only when the caller asks for more output. The chain is closed
/// once the source is exhausted or a step answers [`Flow::Stop`], so rows buffered by
/// steps such as sort are yielded last. After the first error the iterator is finished.
pub struct RowIter<'a> {
    runner: Runner<'a>,
    start: Instant,
    rows: Option<RowStream<'a>>,
    head: Option<Box<dyn Consumer>>,
    width: usize,
    pulled: u64,
    buffer: Receiver<Row>,
}

impl RowIter<'_> {
    /// Pull the next source row through the chain, closing it at end of stream.
    fn advance(&mut self, mut head: Box<dyn Consumer>) -> PipelineResult<()> {
        let next = match self.rows.as_mut() {
            Some(rows) => rows.next().transpose()?,
            None => None,
        };
        match next {
            Some(row) => {
                let flow = self.runner.push(&mut *head, row, self.width, &mut self.pulled)?;
                if flow.is_stop() {
                    self.rows = None;
                }
                self.head = Some(head);
            }
            None => {
                self.rows = None;
                head.close()?;
                self.runner.finish(self.start, Ok(()))?;
            }
        }
        Ok(())
    }
}

impl Iterator for RowIter<'_> {
    type Item = PipelineResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Ok(row) = self.buffer.try_recv() {
                return Some(Ok(row));
            }
            let head = self.head.take()?;
            if let Err(e) = self.advance(head) {
                self.rows = None;
                self.head = None;
                return Some(self.runner.finish(self.start, Err(e)));
            }
        }
    }
}

impl fmt::Debug for RowIter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowIter")
            .field("open", &self.head.is_some())
            .field("pulled", &self.pulled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::instantiate;
    use crate::error::PipelineError;
    use crate::processor::{CountRows, Limit, Processor, Select};
    use crate::types::{column_refs, Schema};

    #[test]
    fn schemas_are_threaded_through_producers() {
        let schema = Schema::from_names(["a", "b", "c"]).unwrap();
        let select = Select::new(column_refs(["c", "a"]));
        let limit = Limit::new(1);
        let steps: Vec<&dyn Processor> = vec![&select, &limit];
        let chain = instantiate(schema, &steps).unwrap();
        assert_eq!(chain.schema.field_names().collect::<Vec<_>>(), vec!["c", "a"]);
    }

    #[test]
    fn collector_must_be_last() {
        let schema = Schema::from_names(["a"]).unwrap();
        let limit = Limit::new(1);
        let steps: Vec<&dyn Processor> = vec![&CountRows, &limit];
        let err = instantiate(schema, &steps).err().unwrap();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
        assert!(err.to_string().contains("step 1"));
    }
}
