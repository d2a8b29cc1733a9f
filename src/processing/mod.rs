//! Eager, in-memory transformations of a [`crate::types::DataSet`].
//!
//! These helpers evaluate the same [`crate::function::Expr`] values that stream pipelines
//! use, but over a complete table. Aggregate functions are allowed here.
//!
//! - [`filter()`] / [`delete()`]: keep or drop rows by predicate
//! - [`update()`]: replace column values with a function result
//! - [`reduce()`]: common reductions (count/sum/min/max/mean)
//!
//! ## Example: filter → update → reduce
//!
//! ```rust
//! use rust_data_pipeline::function::{col, lit};
//! use rust_data_pipeline::processing::{filter, reduce, update, ReduceOp};
//! use rust_data_pipeline::types::{column_refs, DataSet, DataType, Field, Schema, Value};
//!
//! let schema = Schema::new(vec![
//!     Field::new("id", DataType::Int64),
//!     Field::new("active", DataType::Bool),
//!     Field::new("score", DataType::Float64),
//! ]);
//! let ds = DataSet::new(
//!     schema,
//!     vec![
//!         vec![Value::Int64(1), Value::Bool(true), Value::Float64(10.0)],
//!         vec![Value::Int64(2), Value::Bool(false), Value::Float64(20.0)],
//!         vec![Value::Int64(3), Value::Bool(true), Value::Null],
//!     ],
//! );
//!
//! let active = filter(&ds, &col("active")).unwrap();
//! let scaled = update(&active, &column_refs(["score"]), &(col("score") * lit(1.5))).unwrap();
//!
//! let sum = reduce(&scaled, "score", ReduceOp::Sum).unwrap();
//! assert_eq!(sum, Value::Float64(15.0));
//! ```

pub mod filter;
pub mod reduce;
pub mod update;

pub use filter::{delete, filter};
pub use reduce::{reduce, Accumulator, ReduceOp};
pub use update::update;
