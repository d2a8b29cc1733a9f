use crate::consumer::{Downstream, Flow, Producer};
use crate::error::PipelineResult;
use crate::processor::{Opened, Processor};
use crate::types::{Row, Schema};

/// Forwards at most `rows` rows.
///
/// The consumer answers [`Flow::Stop`] together with the last admitted row, so the runner
/// never pulls a row that would be discarded.
#[derive(Debug, Clone, Copy)]
pub struct Limit {
    rows: usize,
}

impl Limit {
    pub fn new(rows: usize) -> Self {
        Self { rows }
    }
}

impl Processor for Limit {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        Ok(Opened::producer(
            LimitRows {
                limit: self.rows,
                seen: 0,
            },
            schema.clone(),
        ))
    }
}

struct LimitRows {
    limit: usize,
    seen: usize,
}

impl Producer for LimitRows {
    fn handle(&mut self, row: Row, downstream: &mut Downstream<'_>) -> PipelineResult<Flow> {
        if self.seen >= self.limit {
            return Ok(Flow::Stop);
        }
        self.seen += 1;
        let flow = downstream.forward(row)?;
        if self.seen == self.limit {
            Ok(Flow::Stop)
        } else {
            Ok(flow)
        }
    }
}
