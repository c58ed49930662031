use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use libinsertbench_core::config::{load_db_config, MAX_TOTAL_ROWS};
use libinsertbench_core::{DbConfig, LoadMode, Result, RunConfig};

#[derive(Parser, Debug)]
#[command(name = "insertbench")]
#[command(about = "Run a bunch of insert statements and report insert throughput")]
#[command(version)]
pub struct Cli {
    /// Total rows to load
    #[arg(long, default_value_t = 100_000, value_parser = clap::value_parser!(u64).range(1..MAX_TOTAL_ROWS))]
    pub total_rows: u64,

    /// Rows per INSERT statement
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub rows_per_stmt: u64,

    /// Statements per transaction
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub stmts_per_txn: u64,

    /// Transactions per connection
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub txns_per_conn: u64,

    /// Interpolate values client-side instead of using server-side prepared statements
    #[arg(long)]
    pub emulate_prepares: bool,

    /// Create indexes for 1 or 2 attribute columns
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub indexes: u8,

    /// Use LOAD DATA INFILE instead of INSERT
    #[arg(long, conflicts_with = "load_xml")]
    pub load_data: bool,

    /// Use LOAD XML INFILE instead of INSERT
    #[arg(long)]
    pub load_xml: bool,

    /// Stop running after the specified number of seconds
    #[arg(long, default_value = "1800", value_parser = parse_max_time)]
    pub max_time: Duration,

    /// Do not execute SQL statements
    #[arg(long)]
    pub noop: bool,

    /// Report progress every specified number of seconds
    #[arg(long, default_value = "10", value_parser = parse_report_interval)]
    pub report_interval: Duration,

    /// Create a trigger before INSERT
    #[arg(long)]
    pub trigger: bool,

    /// More output
    #[arg(long)]
    pub verbose: bool,

    /// Directory for data.csv / data.xml staging files
    #[arg(long, default_value = ".")]
    pub staging_dir: PathBuf,

    /// Write a JSON report of the run to this file
    #[arg(long)]
    pub json_report: Option<PathBuf>,

    /// TOML file with connection settings (host, port, user, password, database)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Database host
    #[arg(long)]
    pub host: Option<String>,

    /// Database port
    #[arg(long)]
    pub port: Option<u16>,

    /// Database user
    #[arg(long)]
    pub user: Option<String>,

    /// Database password
    #[arg(long)]
    pub password: Option<String>,

    /// Database name
    #[arg(long)]
    pub database: Option<String>,
}

fn parse_seconds(s: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("'{}' is not a representable number of seconds", s))
}

fn parse_max_time(s: &str) -> std::result::Result<Duration, String> {
    let max_time = parse_seconds(s)?;
    if max_time.is_zero() {
        return Err("must be a positive number of seconds".to_string());
    }
    Ok(max_time)
}

fn parse_report_interval(s: &str) -> std::result::Result<Duration, String> {
    let interval = parse_seconds(s)?;
    if interval < Duration::from_secs(1) {
        return Err("must be at least 1 second".to_string());
    }
    Ok(interval)
}

impl Cli {
    pub fn mode(&self) -> LoadMode {
        if self.load_data {
            LoadMode::LoadData
        } else if self.load_xml {
            LoadMode::LoadXml
        } else {
            LoadMode::Insert
        }
    }

    pub fn run_config(&self) -> Result<RunConfig> {
        RunConfig::builder()
            .total_rows(self.total_rows)
            .rows_per_stmt(self.rows_per_stmt as usize)
            .stmts_per_txn(self.stmts_per_txn as usize)
            .txns_per_conn(self.txns_per_conn as usize)
            .max_time(self.max_time)
            .report_interval(self.report_interval)
            .mode(self.mode())
            .noop(self.noop)
            .emulate_prepares(self.emulate_prepares)
            .indexes(self.indexes)
            .trigger(self.trigger)
            .verbose(self.verbose)
            .staging_dir(self.staging_dir.clone())
            .json_report_path(self.json_report.clone())
            .build()
    }

    /// Connection settings: defaults, then the config file, then flags
    pub fn db_config(&self) -> Result<DbConfig> {
        let mut db = match &self.config {
            Some(path) => load_db_config(path)?,
            None => DbConfig::default(),
        };
        if let Some(host) = &self.host {
            db.host = host.clone();
        }
        if let Some(port) = self.port {
            db.port = port;
        }
        if let Some(user) = &self.user {
            db.user = user.clone();
        }
        if let Some(password) = &self.password {
            db.password = password.clone();
        }
        if let Some(database) = &self.database {
            db.database = database.clone();
        }
        Ok(db)
    }
}
