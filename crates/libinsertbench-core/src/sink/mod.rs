//! Data sink abstraction: where generated rows are sent
//!
//! The controller only talks to [`DataSink`] and [`Connection`]. The no-op
//! sink lives here; the MySQL sink lives in `libinsertbench-mysql`.

mod noop;

use std::path::Path;

pub use noop::{NoopConnection, NoopSink};

use crate::error::Result;
use crate::row::{SyntheticRow, COLUMNS};

/// Staging file format for bulk loads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkFormat {
    Csv,
    Xml,
}

impl BulkFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkFormat::Csv => "CSV",
            BulkFormat::Xml => "XML",
        }
    }
}

/// A statement returned by [`Connection::prepare`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of `?` placeholders the statement expects
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

/// Opens connections to the target database
pub trait DataSink {
    type Conn: Connection;

    fn connect(&mut self) -> Result<Self::Conn>;

    /// Human readable name for logs
    fn describe(&self) -> String;
}

/// One open connection.
///
/// Every method is fatal on error; callers do not retry.
pub trait Connection {
    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn prepare(&mut self, sql: &str) -> Result<Statement>;

    /// Execute `statement` with the fields of `rows`, returning affected rows
    fn execute(&mut self, statement: &Statement, rows: &[SyntheticRow]) -> Result<u64>;

    /// Ingest a staged file into `table` with a single statement
    fn bulk_load(&mut self, path: &Path, format: BulkFormat, table: &str) -> Result<()>;

    /// Run a schema statement (DROP/CREATE/ALTER/TRIGGER)
    fn execute_ddl(&mut self, sql: &str) -> Result<()>;

    /// Read server variables by name; sinks without a server return nothing
    fn server_settings(&mut self, _names: &[&str]) -> Result<Vec<(String, String)>> {
        Ok(Vec::new())
    }

    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// `INSERT INTO <table> (id,intCol,stringCol,textCol) VALUES (?, ?, ?, ?), ...`
pub fn insert_sql(table: &str, tuples: usize) -> String {
    let placeholders = vec!["?"; COLUMNS.len()].join(", ");
    let tuple = format!("({})", placeholders);
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        COLUMNS.join(","),
        vec![tuple; tuples].join(", ")
    )
}
