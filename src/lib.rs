//! `rust-data-pipeline` composes row-oriented data transformations that run either eagerly
//! against an in-memory [`types::DataSet`] or lazily, row by row, over a stream read from a
//! table or a file, without rewriting the transformation logic.
//!
//! The central type is [`pipeline::Pipeline`]: a row source plus an ordered list of
//! reusable [`processor::Processor`] steps. Defining a pipeline reads nothing. Each run binds
//! every step to the schema produced by its predecessor, pulls rows from the source one at a
//! time and pushes them through the resulting chain of [`consumer::Consumer`]s.
//!
//! ## Building blocks
//!
//! - [`function`]: evaluation functions ([`function::Expr`]) that compute a value per row,
//!   usable both on streams ([`function::EvalFunction::prepare`]) and on whole tables
//!   ([`function::EvalFunction::eval`])
//! - [`consumer`]: the consumer contract, [`consumer::Flow`] and run results
//!   ([`consumer::Output`])
//! - [`processor`]: pipeline steps (filter, limit, select, rename, move, insert, update,
//!   sample, sort) and collectors (data set, count, distinct, rows, reduce, CSV writer)
//! - [`source`]: row sources (in-memory tables, CSV, JSON/NDJSON, one-shot iterators)
//! - [`pipeline`]: pipeline definition, runs, observers and run metrics
//! - [`processing`]: eager helpers that apply the same functions to a [`types::DataSet`]
//! - [`types`]: schema, values, rows and the in-memory table
//! - [`error`]: the crate-wide error type
//!
//! ## Example: a reusable pipeline
//!
//! ```rust
//! use rust_data_pipeline::function::{col, lit};
//! use rust_data_pipeline::pipeline::Pipeline;
//! use rust_data_pipeline::processing::ReduceOp;
//! use rust_data_pipeline::types::{DataSet, DataType, Field, Schema, Value};
//!
//! # fn main() -> Result<(), rust_data_pipeline::PipelineError> {
//! let schema = Schema::new(vec![
//!     Field::new("borough", DataType::Utf8),
//!     Field::new("units", DataType::Int64),
//! ]);
//! let ds = DataSet::new(
//!     schema,
//!     vec![
//!         vec![Value::from("Brooklyn"), Value::Int64(12)],
//!         vec![Value::from("Bronx"), Value::Int64(3)],
//!         vec![Value::from("Queens"), Value::Int64(40)],
//!     ],
//! );
//!
//! let large = Pipeline::from_dataset(ds)
//!     .filter(col("units").gt(lit(5)))
//!     .update(["borough"], col("borough").upper());
//!
//! // The same definition backs several independent runs.
//! assert_eq!(large.count()?, 2);
//! assert_eq!(large.reduce("units", ReduceOp::Sum)?, Value::Int64(52));
//! assert_eq!(
//!     large.distinct_values("borough")?,
//!     vec![Value::from("BROOKLYN"), Value::from("QUEENS")]
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: stream a CSV file
//!
//! ```no_run
//! use rust_data_pipeline::function::col;
//! use rust_data_pipeline::pipeline::Pipeline;
//!
//! # fn main() -> Result<(), rust_data_pipeline::PipelineError> {
//! // Stops reading the file after the tenth non-empty borough.
//! let first = Pipeline::from_csv("complaints.csv")
//!     .filter_limit(col("Borough").is_not_empty(), 10)
//!     .to_dataset()?;
//! println!("rows={}", first.row_count());
//! # Ok(())
//! # }
//! ```

pub mod consumer;
pub mod error;
pub mod function;
pub mod pipeline;
pub mod processing;
pub mod processor;
pub mod source;
pub mod types;

pub use error::{PipelineError, PipelineResult};
pub use pipeline::Pipeline;
