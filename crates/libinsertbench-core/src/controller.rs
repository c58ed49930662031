//! Benchmark control loop
//!
//! Insert mode nests three loops: connections, transactions per connection,
//! statements per transaction. Each level is its own method returning a
//! [`StopReason`], so stopping from the innermost level unwinds through the
//! callers without labeled breaks:
//!
//! - `DeadlineExceeded` leaves the open transaction uncommitted.
//! - `ReachedTarget` commits the open transaction before closing.

use std::io::Write;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info};

use crate::config::{LoadMode, RunConfig, TABLE_NAME};
use crate::error::{BenchError, Result};
use crate::metrics::{Counters, LatencyRecorder, PhaseTiming, RunResult, StopReason};
use crate::report::{phase_line, progress_line};
use crate::row::RowGenerator;
use crate::sink::{insert_sql, BulkFormat, Connection, DataSink, Statement};
use crate::staging::write_staging_file;

/// Run one benchmark with `config` against `sink`.
///
/// Progress and phase lines are written to `out`; the summary is left to the
/// caller (see [`crate::report::write_summary`]).
pub fn run<S, G, W>(config: &RunConfig, sink: &mut S, generator: &mut G, out: &mut W) -> Result<RunResult>
where
    S: DataSink,
    G: RowGenerator + ?Sized,
    W: Write,
{
    RunController::new(config, sink, generator, out)?.run()
}

/// Owns the counters for the duration of one run
pub struct RunController<'a, S: DataSink, G: RowGenerator + ?Sized, W: Write> {
    config: &'a RunConfig,
    sink: &'a mut S,
    generator: &'a mut G,
    out: &'a mut W,
    counters: Counters,
    latencies: LatencyRecorder,
    start: Instant,
    last_report: Instant,
}

impl<'a, S: DataSink, G: RowGenerator + ?Sized, W: Write> RunController<'a, S, G, W> {
    pub fn new(config: &'a RunConfig, sink: &'a mut S, generator: &'a mut G, out: &'a mut W) -> Result<Self> {
        config.validate()?;
        let now = Instant::now();
        Ok(Self {
            config,
            sink,
            generator,
            out,
            counters: Counters::default(),
            latencies: LatencyRecorder::new()?,
            start: now,
            last_report: now,
        })
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn run(mut self) -> Result<RunResult> {
        let started_at = Utc::now();
        info!(
            mode = self.config.mode.as_str(),
            sink = %self.sink.describe(),
            total_rows = self.config.total_rows,
            rows_per_stmt = self.config.rows_per_stmt,
            stmts_per_txn = self.config.stmts_per_txn,
            txns_per_conn = self.config.txns_per_conn,
            "starting run"
        );

        let (stop_reason, elapsed, phases) = match self.config.mode {
            LoadMode::Insert => {
                let reason = self.run_inserts()?;
                (reason, self.start.elapsed(), Vec::new())
            }
            LoadMode::LoadData => self.run_bulk(BulkFormat::Csv)?,
            LoadMode::LoadXml => self.run_bulk(BulkFormat::Xml)?,
        };

        info!(
            reason = stop_reason.as_str(),
            rows = self.counters.row_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "run finished"
        );

        Ok(RunResult {
            mode: self.config.mode,
            noop: self.config.noop,
            started_at,
            counters: self.counters,
            elapsed,
            stop_reason,
            rates: self.counters.rates(elapsed),
            latencies: self.latencies.percentiles(),
            phases,
        })
    }

    /// Open connections until the target is reached or the deadline passes
    fn run_inserts(&mut self) -> Result<StopReason> {
        self.start = Instant::now();
        self.last_report = self.start;

        loop {
            let reason = self.run_connection()?;
            if reason != StopReason::Continue {
                return Ok(reason);
            }
            if self.counters.row_count >= self.config.total_rows {
                return Ok(StopReason::ReachedTarget);
            }
        }
    }

    fn run_connection(&mut self) -> Result<StopReason> {
        let mut conn = self.sink.connect()?;
        self.counters.conn_count += 1;
        debug!(conn = self.counters.conn_count, "connection opened");

        let mut reason = StopReason::Continue;
        for _ in 0..self.config.txns_per_conn {
            reason = self.run_transaction(&mut conn)?;
            if reason != StopReason::Continue {
                break;
            }
        }

        conn.close()?;
        Ok(reason)
    }

    fn run_transaction(&mut self, conn: &mut S::Conn) -> Result<StopReason> {
        conn.begin()?;
        self.counters.txn_count += 1;

        let mut tuples = self.config.rows_per_stmt;
        let mut statement = conn.prepare(&insert_sql(TABLE_NAME, tuples))?;

        for _ in 0..self.config.stmts_per_txn {
            let remaining = self.config.total_rows.saturating_sub(self.counters.row_count);
            if remaining < tuples as u64 {
                // Final statement carries only the rows still missing
                tuples = remaining as usize;
                statement = conn.prepare(&insert_sql(TABLE_NAME, tuples))?;
            }

            self.execute_statement(conn, &statement, tuples)?;

            match self.check_progress()? {
                StopReason::Continue => {}
                StopReason::ReachedTarget => {
                    conn.commit()?;
                    return Ok(StopReason::ReachedTarget);
                }
                StopReason::DeadlineExceeded => {
                    debug!(txn = self.counters.txn_count, "deadline passed, transaction left open");
                    return Ok(StopReason::DeadlineExceeded);
                }
            }
        }

        conn.commit()?;
        Ok(StopReason::Continue)
    }

    fn execute_statement(&mut self, conn: &mut S::Conn, statement: &Statement, tuples: usize) -> Result<()> {
        let rows = self.generator.batch(self.counters.row_count, tuples);

        let started = Instant::now();
        let affected = conn.execute(statement, &rows)?;
        self.latencies.record(started.elapsed());

        self.counters.stmt_count += 1;
        self.counters.row_count += affected;
        Ok(())
    }

    /// Sampled after every statement: report if the interval elapsed, then
    /// stop on deadline (only checked when reporting) or on reaching the target
    fn check_progress(&mut self) -> Result<StopReason> {
        let now = Instant::now();
        if now.duration_since(self.last_report) > self.config.report_interval {
            let elapsed = now.duration_since(self.start);
            writeln!(
                self.out,
                "{}",
                progress_line(elapsed, self.counters.row_count, self.config.total_rows)
            )?;
            self.last_report = now;

            if elapsed > self.config.max_time {
                info!(
                    elapsed_secs = elapsed.as_secs_f64(),
                    max_time_secs = self.config.max_time.as_secs_f64(),
                    "max time exceeded"
                );
                return Ok(StopReason::DeadlineExceeded);
            }
        }

        if self.counters.row_count >= self.config.total_rows {
            return Ok(StopReason::ReachedTarget);
        }
        Ok(StopReason::Continue)
    }

    /// Stage every row to a file, then ingest it with one statement.
    ///
    /// The reported elapsed time covers the load phase only.
    fn run_bulk(&mut self, format: BulkFormat) -> Result<(StopReason, Duration, Vec<PhaseTiming>)> {
        let path = self
            .config
            .staging_path()
            .ok_or_else(|| BenchError::Internal("bulk mode without a staging path".to_string()))?;
        let total_rows = self.config.total_rows;

        let stage_start = Instant::now();
        write_staging_file(&path, format, total_rows, &mut *self.generator)?;
        let stage_elapsed = stage_start.elapsed();
        writeln!(
            self.out,
            "{}",
            phase_line(stage_elapsed, total_rows, &format!("written to {}", format.as_str()))
        )?;

        let load_start = Instant::now();
        let mut conn = self.sink.connect()?;
        conn.bulk_load(&path, format, TABLE_NAME)?;
        conn.close()?;
        self.counters.conn_count += 1;
        self.counters.txn_count += 1;
        self.counters.stmt_count += 1;
        self.counters.row_count += total_rows;
        let load_elapsed = load_start.elapsed();
        writeln!(
            self.out,
            "{}",
            phase_line(load_elapsed, total_rows, &format!("loaded from {}", format.as_str()))
        )?;

        let phases = vec![
            PhaseTiming {
                name: "stage".to_string(),
                rows: total_rows,
                elapsed: stage_elapsed,
            },
            PhaseTiming {
                name: "load".to_string(),
                rows: total_rows,
                elapsed: load_elapsed,
            },
        ];
        Ok((StopReason::ReachedTarget, load_elapsed, phases))
    }
}
