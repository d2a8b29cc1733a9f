use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{error_chain_contains_io, PipelineError};
use crate::types::Schema;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (the run failed).
    Error,
    /// Critical error (I/O or other infrastructure failures).
    Critical,
}

impl PipelineSeverity {
    /// Classify a run failure.
    pub fn of(error: &PipelineError) -> Self {
        match error {
            PipelineError::Source(err) if error_chain_contains_io(&**err) => Self::Critical,
            _ => Self::Error,
        }
    }
}

/// Events emitted while running a pipeline.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RunStarted,
    /// The chain was instantiated; `schema` is the schema reaching the terminal collector.
    ChainOpened { steps: usize, schema: Schema },
    /// A consumer asked to stop before the source was exhausted.
    EarlyStop { rows_pulled: u64 },
    RunFinished {
        elapsed: Duration,
        metrics: RunMetricsSnapshot,
    },
    RunFailed {
        severity: PipelineSeverity,
        message: String,
    },
}

/// Observer hook for pipeline runs.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait PipelineObserver: Send + Sync {
    /// Called for every run event.
    fn on_event(&self, _event: &PipelineEvent) {}

    /// Called when a run fails.
    fn on_failure(&self, _severity: PipelineSeverity, _error: &PipelineError) {}

    /// Called when a run failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, severity: PipelineSeverity, error: &PipelineError) {
        self.on_failure(severity, error)
    }
}

/// Logs run events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl PipelineObserver for StdErrObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunFinished { elapsed, metrics } => {
                eprintln!("[pipeline][ok] elapsed={elapsed:?} {metrics}")
            }
            other => eprintln!("[pipeline] {other:?}"),
        }
    }

    fn on_failure(&self, severity: PipelineSeverity, error: &PipelineError) {
        eprintln!("[pipeline][{severity:?}] err={error}");
    }

    fn on_alert(&self, severity: PipelineSeverity, error: &PipelineError) {
        eprintln!("[ALERT][pipeline][{severity:?}] err={error}");
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_event(&self, event: &PipelineEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }

    fn on_failure(&self, severity: PipelineSeverity, error: &PipelineError) {
        for o in &self.observers {
            o.on_failure(severity, error);
        }
    }

    fn on_alert(&self, severity: PipelineSeverity, error: &PipelineError) {
        for o in &self.observers {
            o.on_alert(severity, error);
        }
    }
}

/// Counters for pipeline runs.
///
/// Counters accumulate over every run that shares this value; callers can snapshot them at
/// any time, including while a run is in progress.
#[derive(Debug, Default)]
pub struct RunMetrics {
    runs: AtomicU64,
    failed_runs: AtomicU64,
    rows_pulled: AtomicU64,
    rows_collected: AtomicU64,
    early_stops: AtomicU64,
    elapsed_ns: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin_run(&self) {
        self.runs.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn end_run(&self, elapsed: Duration, failed: bool) {
        let add = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        self.elapsed_ns.fetch_add(add, Ordering::SeqCst);
        if failed {
            self.failed_runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn on_row_pulled(&self) {
        self.rows_pulled.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn on_row_collected(&self) {
        self.rows_collected.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn on_early_stop(&self) {
        self.early_stops.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> RunMetricsSnapshot {
        RunMetricsSnapshot {
            runs: self.runs.load(Ordering::SeqCst),
            failed_runs: self.failed_runs.load(Ordering::SeqCst),
            rows_pulled: self.rows_pulled.load(Ordering::SeqCst),
            rows_collected: self.rows_collected.load(Ordering::SeqCst),
            early_stops: self.early_stops.load(Ordering::SeqCst),
            elapsed: Duration::from_nanos(self.elapsed_ns.load(Ordering::SeqCst)),
        }
    }
}

/// Immutable snapshot of [`RunMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMetricsSnapshot {
    pub runs: u64,
    pub failed_runs: u64,
    /// Rows read from sources.
    pub rows_pulled: u64,
    /// Rows that reached a terminal collector.
    pub rows_collected: u64,
    pub early_stops: u64,
    /// Total time spent in runs.
    pub elapsed: Duration,
}

impl fmt::Display for RunMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "runs={} (failed={}), rows_pulled={}, rows_collected={}, early_stops={}, elapsed={:?}",
            self.runs,
            self.failed_runs,
            self.rows_pulled,
            self.rows_collected,
            self.early_stops,
            self.elapsed
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{PipelineSeverity, RunMetrics};
    use crate::error::PipelineError;

    #[test]
    fn io_failures_are_critical() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(
            PipelineSeverity::of(&PipelineError::from(io)),
            PipelineSeverity::Critical
        );
        assert_eq!(
            PipelineSeverity::of(&PipelineError::SourceExhausted),
            PipelineSeverity::Error
        );
    }

    #[test]
    fn snapshot_reports_counters() {
        let metrics = RunMetrics::new();
        metrics.begin_run();
        metrics.on_row_pulled();
        metrics.on_row_pulled();
        metrics.on_row_collected();
        metrics.end_run(Duration::from_millis(5), false);

        let snap = metrics.snapshot();
        assert_eq!(snap.runs, 1);
        assert_eq!(snap.rows_pulled, 2);
        assert_eq!(snap.rows_collected, 1);
        assert!(snap.to_string().contains("rows_pulled=2"));
    }
}
