//! Core library for insertbench
//!
//! Measures insert throughput for a single table under different batching
//! strategies: rows per statement, statements per transaction and
//! transactions per connection, or a single bulk load of a staged file.
//!
//! The database itself is reached through the [`sink::DataSink`] trait so the
//! control loop in [`controller`] runs unchanged against a real server or
//! against [`sink::NoopSink`].

pub mod config;
pub mod controller;
pub mod error;
pub mod metrics;
pub mod report;
pub mod row;
pub mod schema;
pub mod sink;
pub mod staging;

pub use config::{DbConfig, LoadMode, RunConfig, RunConfigBuilder};
pub use controller::{run, RunController};
pub use error::{BenchError, Result};
pub use metrics::{Counters, RunResult, StopReason};
pub use row::{Md5RowGenerator, RowGenerator, SyntheticRow};
pub use sink::{BulkFormat, Connection, DataSink, NoopSink, Statement};
