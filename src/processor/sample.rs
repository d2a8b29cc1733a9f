use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::consumer::{Downstream, Flow, Producer};
use crate::error::PipelineResult;
use crate::processor::{forward_all, Opened, Processor};
use crate::types::{Row, Schema};

/// Random sample of `n` rows without replacement (reservoir sampling).
///
/// The sample is forwarded at end of stream, in the order the sampled rows arrived. With a
/// seed, every run over the same input yields the same sample.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    n: usize,
    seed: Option<u64>,
}

impl Sample {
    pub fn new(n: usize) -> Self {
        Self { n, seed: None }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Processor for Sample {
    fn open(&self, schema: &Schema) -> PipelineResult<Opened> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Opened::producer(
            Reservoir {
                size: self.n,
                seen: 0,
                rows: Vec::with_capacity(self.n.min(1024)),
                rng,
            },
            schema.clone(),
        ))
    }
}

struct Reservoir {
    size: usize,
    seen: usize,
    rows: Vec<(usize, Row)>,
    rng: StdRng,
}

impl Producer for Reservoir {
    fn handle(&mut self, row: Row, _downstream: &mut Downstream<'_>) -> PipelineResult<Flow> {
        let seq = self.seen;
        self.seen += 1;
        if self.rows.len() < self.size {
            self.rows.push((seq, row));
        } else if self.size > 0 {
            let j = self.rng.random_range(0..=seq);
            if j < self.size {
                self.rows[j] = (seq, row);
            }
        }
        Ok(Flow::Continue)
    }

    fn drain(&mut self, downstream: &mut Downstream<'_>) -> PipelineResult<()> {
        let mut rows = std::mem::take(&mut self.rows);
        rows.sort_by_key(|(seq, _)| *seq);
        forward_all(rows.into_iter().map(|(_, row)| row), downstream)
    }
}
