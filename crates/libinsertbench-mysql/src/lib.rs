//! MySQL data sink for insertbench
//!
//! Wraps an `sqlx` MySQL connection behind the blocking
//! [`libinsertbench_core::sink::Connection`] interface. Each sink owns a
//! current-thread tokio runtime; every call blocks on it, so the control loop
//! stays single-threaded and strictly sequential.
//!
//! Bulk loads use server-side `LOAD DATA INFILE` / `LOAD XML INFILE` with an
//! absolute path: the staging directory must be readable by the server
//! (`secure_file_priv`) and the user needs the `FILE` privilege.

pub mod sql;

use std::path::Path;
use std::rc::Rc;

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection as SqlxConnection, Executor, Row};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use libinsertbench_core::sink::{BulkFormat, Connection, DataSink, Statement};
use libinsertbench_core::{BenchError, DbConfig, Result, SyntheticRow};

fn connection_error(e: sqlx::Error) -> BenchError {
    BenchError::Connection(e.to_string())
}

fn statement_error(e: sqlx::Error) -> BenchError {
    BenchError::Statement(e.to_string())
}

/// Opens real MySQL connections
pub struct MySqlSink {
    options: MySqlConnectOptions,
    endpoint: String,
    emulate_prepares: bool,
    runtime: Rc<Runtime>,
}

impl MySqlSink {
    pub fn new(db: &DbConfig, emulate_prepares: bool) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let options = MySqlConnectOptions::new()
            .host(&db.host)
            .port(db.port)
            .username(&db.user)
            .password(&db.password)
            .database(&db.database)
            .disable_statement_logging();

        Ok(Self {
            options,
            endpoint: format!("mysql://{}@{}:{}/{}", db.user, db.host, db.port, db.database),
            emulate_prepares,
            runtime: Rc::new(runtime),
        })
    }
}

impl DataSink for MySqlSink {
    type Conn = MySqlConn;

    fn connect(&mut self) -> Result<MySqlConn> {
        let conn = self
            .runtime
            .block_on(self.options.connect())
            .map_err(connection_error)?;
        Ok(MySqlConn {
            conn,
            emulate_prepares: self.emulate_prepares,
            runtime: Rc::clone(&self.runtime),
        })
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

/// One open MySQL connection
pub struct MySqlConn {
    conn: MySqlConnection,
    emulate_prepares: bool,
    runtime: Rc<Runtime>,
}

impl MySqlConn {
    /// Run SQL over the text protocol, returning affected rows
    fn execute_text(&mut self, sql: &str) -> Result<u64> {
        let result = self
            .runtime
            .block_on(sqlx::raw_sql(sql).execute(&mut self.conn))
            .map_err(statement_error)?;
        Ok(result.rows_affected())
    }
}

impl Connection for MySqlConn {
    fn begin(&mut self) -> Result<()> {
        self.execute_text("START TRANSACTION").map(|_| ())
    }

    fn commit(&mut self) -> Result<()> {
        self.execute_text("COMMIT").map(|_| ())
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement> {
        if !self.emulate_prepares {
            // Server-side prepare; sqlx caches it for the executes that follow
            self.runtime
                .block_on((&mut self.conn).prepare(sql))
                .map_err(statement_error)?;
        }
        Ok(Statement::new(sql))
    }

    fn execute(&mut self, statement: &Statement, rows: &[SyntheticRow]) -> Result<u64> {
        if self.emulate_prepares {
            let text = sql::interpolate(statement.sql(), rows)?;
            return self.execute_text(&text);
        }

        let mut query = sqlx::query(statement.sql());
        for row in rows {
            query = query
                .bind(row.id)
                .bind(row.int_col)
                .bind(row.string_col.as_str())
                .bind(row.text_col.as_str());
        }
        let result = self
            .runtime
            .block_on(query.execute(&mut self.conn))
            .map_err(statement_error)?;
        Ok(result.rows_affected())
    }

    fn bulk_load(&mut self, path: &Path, format: BulkFormat, table: &str) -> Result<()> {
        let path = std::fs::canonicalize(path)?;
        let sql = sql::bulk_load_sql(&path, format, table);
        debug!(%sql, "bulk load");
        let affected = self.execute_text(&sql)?;
        debug!(affected, "bulk load finished");
        Ok(())
    }

    fn execute_ddl(&mut self, sql: &str) -> Result<()> {
        debug!(%sql, "ddl");
        self.execute_text(sql).map(|_| ())
    }

    fn server_settings(&mut self, names: &[&str]) -> Result<Vec<(String, String)>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let sql = sql::server_settings_sql(names.len());
        let mut query = sqlx::query(&sql);
        for name in names {
            query = query.bind(*name);
        }
        let rows = self
            .runtime
            .block_on(query.fetch_all(&mut self.conn))
            .map_err(statement_error)?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get(0).map_err(statement_error)?;
                let value: String = row.try_get(1).map_err(statement_error)?;
                Ok((name, value))
            })
            .collect()
    }

    fn close(self) -> Result<()> {
        let MySqlConn { conn, runtime, .. } = self;
        runtime.block_on(conn.close()).map_err(connection_error)
    }
}
