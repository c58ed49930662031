use std::path::Path;

use tracing::debug;

use super::{BulkFormat, Connection, DataSink, Statement};
use crate::error::Result;
use crate::row::SyntheticRow;

/// Sink that performs no I/O.
///
/// Every statement reports all of its rows as affected, so a no-op run
/// produces the same counters as a successful real run.
#[derive(Debug, Default)]
pub struct NoopSink {
    connections: u64,
}

impl NoopSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections handed out so far
    pub fn connections(&self) -> u64 {
        self.connections
    }
}

impl DataSink for NoopSink {
    type Conn = NoopConnection;

    fn connect(&mut self) -> Result<NoopConnection> {
        self.connections += 1;
        Ok(NoopConnection)
    }

    fn describe(&self) -> String {
        "no-op".to_string()
    }
}

#[derive(Debug)]
pub struct NoopConnection;

impl Connection for NoopConnection {
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement> {
        Ok(Statement::new(sql))
    }

    fn execute(&mut self, _statement: &Statement, rows: &[SyntheticRow]) -> Result<u64> {
        Ok(rows.len() as u64)
    }

    fn bulk_load(&mut self, path: &Path, format: BulkFormat, table: &str) -> Result<()> {
        debug!(path = %path.display(), format = format.as_str(), table, "skipping bulk load");
        Ok(())
    }

    fn execute_ddl(&mut self, _sql: &str) -> Result<()> {
        Ok(())
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}
