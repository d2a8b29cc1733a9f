use std::cmp::Ordering;

use crate::consumer::{Downstream, Flow, Producer};
use crate::error::PipelineResult;
use crate::processor::{forward_all, Opened, Processor};
use crate::types::{check_width, ColumnRef, Row, Schema};

/// Sorts the stream by `keys` (compared with [`crate::types::Value::total_cmp`]).
///
/// Rows are buffered and forwarded at end of stream. The sort is stable.
#[derive(Debug, Clone)]
pub struct Sort {
    keys: Vec<ColumnRef>,
    descending: bool,
}

impl Sort {
    pub fn new(keys: Vec<ColumnRef>) -> Self {
        Self {
            keys,
            descending: false,
        }
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }
}

impl Processor for Sort {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        let keys = schema.resolve_all(&self.keys)?;
        Ok(Opened::producer(
            SortRows {
                width: schema.len(),
                keys,
                descending: self.descending,
                rows: Vec::new(),
            },
            schema.clone(),
        ))
    }
}

struct SortRows {
    width: usize,
    keys: Vec<usize>,
    descending: bool,
    rows: Vec<Row>,
}

impl SortRows {
    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for &k in &self.keys {
            let ord = a.values()[k].total_cmp(&b.values()[k]);
            if ord != Ordering::Equal {
                return if self.descending { ord.reverse() } else { ord };
            }
        }
        Ordering::Equal
    }
}

impl Producer for SortRows {
    fn handle(&mut self, row: Row, _downstream: &mut Downstream<'_>) -> PipelineResult<Flow> {
        check_width(row.values(), self.width)?;
        self.rows.push(row);
        Ok(Flow::Continue)
    }

    fn drain(&mut self, downstream: &mut Downstream<'_>) -> PipelineResult<()> {
        let mut rows = std::mem::take(&mut self.rows);
        rows.sort_by(|a, b| self.compare(a, b));
        forward_all(rows, downstream)
    }
}
