//! Run and connection configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Upper bound (exclusive) for the row target; ids are `int unsigned`
pub const MAX_TOTAL_ROWS: u64 = 4_294_967_296;

/// Name of the table every mode writes into
pub const TABLE_NAME: &str = "TestTable";

/// How rows reach the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadMode {
    /// Prepared INSERT statements composed into transactions and connections
    #[default]
    Insert,
    /// Stage a CSV file, then `LOAD DATA INFILE`
    LoadData,
    /// Stage an XML file, then `LOAD XML INFILE`
    LoadXml,
}

impl LoadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadMode::Insert => "insert",
            LoadMode::LoadData => "load-data",
            LoadMode::LoadXml => "load-xml",
        }
    }
}

/// Parameters of a single benchmark run.
///
/// Built once through [`RunConfigBuilder`] and shared by reference afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub total_rows: u64,
    pub rows_per_stmt: usize,
    pub stmts_per_txn: usize,
    pub txns_per_conn: usize,
    #[serde(with = "serde_duration")]
    pub max_time: Duration,
    #[serde(with = "serde_duration")]
    pub report_interval: Duration,
    pub mode: LoadMode,
    /// Skip all database I/O while keeping the counter arithmetic
    pub noop: bool,
    /// Inline values into the SQL text instead of binding parameters
    pub emulate_prepares: bool,
    /// Secondary indexes to create: 0, 1 (intCol) or 2 (intCol, stringCol)
    pub indexes: u8,
    /// Create a BEFORE INSERT trigger on the table
    pub trigger: bool,
    pub verbose: bool,
    /// Directory that receives `data.csv` / `data.xml`
    pub staging_dir: PathBuf,
    #[serde(skip)]
    pub json_report_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            total_rows: 100_000,
            rows_per_stmt: 1,
            stmts_per_txn: 1,
            txns_per_conn: 1,
            max_time: Duration::from_secs(30 * 60),
            report_interval: Duration::from_secs(10),
            mode: LoadMode::Insert,
            noop: false,
            emulate_prepares: false,
            indexes: 0,
            trigger: false,
            verbose: false,
            staging_dir: PathBuf::from("."),
            json_report_path: None,
        }
    }
}

impl RunConfig {
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// Check every bound a run depends on
    pub fn validate(&self) -> Result<()> {
        if self.total_rows == 0 || self.total_rows >= MAX_TOTAL_ROWS {
            return Err(BenchError::InvalidArgs(format!(
                "total-rows must be between 1 and {}, got {}",
                MAX_TOTAL_ROWS - 1,
                self.total_rows
            )));
        }
        for (name, value) in [
            ("rows-per-stmt", self.rows_per_stmt),
            ("stmts-per-txn", self.stmts_per_txn),
            ("txns-per-conn", self.txns_per_conn),
        ] {
            if value == 0 {
                return Err(BenchError::InvalidArgs(format!("{} must be at least 1", name)));
            }
        }
        if self.indexes > 2 {
            return Err(BenchError::InvalidArgs(format!(
                "indexes must be 0, 1 or 2, got {}",
                self.indexes
            )));
        }
        if self.max_time.is_zero() {
            return Err(BenchError::InvalidArgs("max-time must be positive".to_string()));
        }
        if self.report_interval.is_zero() {
            return Err(BenchError::InvalidArgs("report-interval must be positive".to_string()));
        }
        Ok(())
    }

    /// Rows a full connection cycle writes when nothing stops it early
    pub fn rows_per_conn(&self) -> u64 {
        (self.rows_per_stmt as u64)
            .saturating_mul(self.stmts_per_txn as u64)
            .saturating_mul(self.txns_per_conn as u64)
    }

    /// Staging file for the bulk modes, `None` in insert mode
    pub fn staging_path(&self) -> Option<PathBuf> {
        match self.mode {
            LoadMode::Insert => None,
            LoadMode::LoadData => Some(self.staging_dir.join("data.csv")),
            LoadMode::LoadXml => Some(self.staging_dir.join("data.xml")),
        }
    }
}

/// Builder that validates a [`RunConfig`] before handing it out
#[derive(Debug, Clone, Default)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn total_rows(mut self, rows: u64) -> Self {
        self.config.total_rows = rows;
        self
    }

    pub fn rows_per_stmt(mut self, rows: usize) -> Self {
        self.config.rows_per_stmt = rows;
        self
    }

    pub fn stmts_per_txn(mut self, stmts: usize) -> Self {
        self.config.stmts_per_txn = stmts;
        self
    }

    pub fn txns_per_conn(mut self, txns: usize) -> Self {
        self.config.txns_per_conn = txns;
        self
    }

    pub fn max_time(mut self, max_time: Duration) -> Self {
        self.config.max_time = max_time;
        self
    }

    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.config.report_interval = interval;
        self
    }

    pub fn mode(mut self, mode: LoadMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn noop(mut self, noop: bool) -> Self {
        self.config.noop = noop;
        self
    }

    pub fn emulate_prepares(mut self, emulate: bool) -> Self {
        self.config.emulate_prepares = emulate;
        self
    }

    pub fn indexes(mut self, indexes: u8) -> Self {
        self.config.indexes = indexes;
        self
    }

    pub fn trigger(mut self, trigger: bool) -> Self {
        self.config.trigger = trigger;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = dir.into();
        self
    }

    pub fn json_report_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.json_report_path = path;
        self
    }

    pub fn build(self) -> Result<RunConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Database connection settings, loadable from a TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub database: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: "root".to_string(),
            database: "test".to_string(),
        }
    }
}

/// Load connection settings from a TOML file
pub fn load_db_config(path: &Path) -> Result<DbConfig> {
    if !path.exists() {
        return Err(BenchError::InvalidArgs(format!(
            "config file not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    let config: DbConfig = toml::from_str(&content)?;
    Ok(config)
}

pub(crate) mod serde_duration {
    use serde::{Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }
}
