use std::error::Error as StdError;

use thiserror::Error;

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Boxed error raised by a row source or sink.
pub type SourceError = Box<dyn StdError + Send + Sync + 'static>;

/// Error type returned by pipeline definition, instantiation and execution.
///
/// This is the only error type surfaced by [`crate::pipeline::Pipeline::run`]. Errors raised by
/// row sources and sinks (I/O, CSV, JSON) are wrapped into [`PipelineError::Source`] instead of
/// leaking their concrete types.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A processor or evaluation function references a column that is absent from the schema
    /// it was given, or a computed schema is structurally invalid (duplicate names, bad
    /// insert position, collector in the middle of a chain).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// An evaluation function that needs whole-table aggregation was asked to run on a stream.
    #[error("evaluation function '{function}' is not streamable: it requires the full table")]
    NotStreamable { function: String },

    /// A single-pass row source was asked for a second iteration.
    #[error("row source exhausted: the source does not support re-iteration")]
    SourceExhausted,

    /// A consumer was used outside of its `consume* -> close` lifecycle.
    #[error("consumer state error: {message}")]
    ConsumerState { message: String },

    /// A value-level failure while evaluating a row (user-supplied function, type error).
    #[error("evaluation error: {message}")]
    Evaluation { message: String },

    /// Failure raised by the underlying row source or sink.
    #[error("source error: {0}")]
    Source(#[source] SourceError),
}

impl PipelineError {
    pub(crate) fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }

    pub(crate) fn consumer_state(message: impl Into<String>) -> Self {
        Self::ConsumerState {
            message: message.into(),
        }
    }

    pub(crate) fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    /// Wrap an arbitrary source/sink error.
    pub fn source(err: impl Into<SourceError>) -> Self {
        Self::Source(err.into())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Source(Box::new(err))
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        Self::Source(Box::new(err))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Source(Box::new(err))
    }
}

/// A value in a source file could not be parsed into the required [`crate::types::DataType`].
///
/// Raised by the file-backed row sources and wrapped into [`PipelineError::Source`].
#[derive(Debug, Error)]
#[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
pub struct ParseError {
    pub row: usize,
    pub column: String,
    pub raw: String,
    pub message: String,
}

impl From<ParseError> for PipelineError {
    fn from(err: ParseError) -> Self {
        Self::Source(Box::new(err))
    }
}

pub(crate) fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        if let Some(csv_err) = err.downcast_ref::<csv::Error>() {
            if matches!(csv_err.kind(), csv::ErrorKind::Io(_)) {
                return true;
            }
        }
        cur = err.source();
    }
    false
}
