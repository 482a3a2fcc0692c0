//! loq engine
//!
//! A SQL query engine over log sources: CSV, TSV, JSON, plain text and
//! in-memory tables are queried with one SQL dialect and written to CSV,
//! JSON, aligned tables or discarded.
//!
//! # Modules
//!
//! - [`sql`] - Lexer, parser and syntax tree
//! - [`catalog`] - Source lookup, schema inference and row normalization
//! - [`binder`] - Name resolution and semantic checks
//! - [`plan`] - Logical plans and the plan builder
//! - [`exec`] - Pull-based operators and expression evaluation
//! - [`functions`] - Scalar, aggregate and window function library
//! - [`adapter`] - Input formats
//! - [`sink`] - Output formats
//!
//! # Example
//!
//! ```
//! use engine::adapter::{InputFormat, SourceDescriptor};
//! use engine::sink::{OutputFormat, SinkDescriptor};
//! use engine::{run_query, QueryOptions, RowCount};
//!
//! let sources = vec![(
//!     "src".to_string(),
//!     SourceDescriptor::text("src", "a,b\n1,x\n2,y\n1,z\n", InputFormat::Csv),
//! )];
//! let (sink, buffer) = SinkDescriptor::memory(OutputFormat::Csv);
//! let written = run_query(
//!     "SELECT a, COUNT(*) AS hits FROM src GROUP BY a",
//!     &sources,
//!     &sink,
//!     QueryOptions::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(written, RowCount(2));
//! assert_eq!(buffer.contents(), "a,hits\n1,2\n2,1\n");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod adapter;
pub mod binder;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod functions;
pub mod plan;
pub mod schema;
pub mod sink;
pub mod sql;
pub mod value;

pub use config::EngineConfig;
pub use engine::{run_query, Engine, PreparedQuery, QueryOptions, QueryStream, QuerySummary, RowCount};
pub use error::{BindError, CancelReason, QueryError};
pub use exec::CancellationHandle;
pub use schema::{Column, Schema};
pub use value::{DataType, Row, Value};

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde_json;
