//! Human-readable and JSON output for a run

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::metrics::RunResult;

/// Server variables worth recording next to a result
pub const SERVER_SETTINGS: [&str; 13] = [
    "binlog_cache_size",
    "foreign_key_checks",
    "innodb_buffer_pool_size",
    "innodb_change_buffering",
    "innodb_checksum_algorithm",
    "innodb_doublewrite",
    "innodb_flush_log_at_trx_commit",
    "innodb_io_capacity",
    "innodb_log_file_size",
    "innodb_log_buffer_size",
    "innodb_lru_scan_depth",
    "log_bin",
    "sync_binlog",
];

/// `HH:MM:SS`, hours not wrapped
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Progress line printed while inserting
pub fn progress_line(elapsed: Duration, row_count: u64, total_rows: u64) -> String {
    let percent = if total_rows == 0 {
        0.0
    } else {
        row_count as f64 * 100.0 / total_rows as f64
    };
    format!("{} {:10} rows {:4.1}% done", format_hms(elapsed), row_count, percent)
}

/// Line closing one bulk phase, e.g. `what = "written to CSV"`
pub fn phase_line(elapsed: Duration, rows: u64, what: &str) -> String {
    format!("{} {:10} rows {}", format_hms(elapsed), rows, what)
}

/// Final summary: elapsed time, the four rates and statement latency
pub fn write_summary<W: Write>(out: &mut W, result: &RunResult) -> io::Result<()> {
    let c = &result.counters;
    let r = &result.rates;
    writeln!(
        out,
        "Time: {} seconds ({})",
        result.elapsed.as_secs(),
        format_hms(result.elapsed)
    )?;
    writeln!(out, "{:10} rows = {:10.2} rows/sec", c.row_count, r.rows_per_sec)?;
    writeln!(out, "{:10} stmt = {:10.2} stmt/sec", c.stmt_count, r.stmts_per_sec)?;
    writeln!(out, "{:10} txns = {:10.2} txns/sec", c.txn_count, r.txns_per_sec)?;
    writeln!(out, "{:10} conn = {:10.2} conn/sec", c.conn_count, r.conns_per_sec)?;
    if c.stmt_count > 0 && result.phases.is_empty() {
        let l = &result.latencies;
        writeln!(
            out,
            "Latency: P50={:.2}ms P95={:.2}ms P99={:.2}ms Max={:.2}ms",
            l.p50_ms(),
            l.p95_ms(),
            l.p99_ms(),
            l.max_ms()
        )?;
    }
    Ok(())
}

pub fn write_server_settings<W: Write>(out: &mut W, settings: &[(String, String)]) -> io::Result<()> {
    if settings.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    for (name, value) in settings {
        writeln!(out, "{:<30} {}", name, value)?;
    }
    Ok(())
}

/// Save the result as pretty JSON
pub fn write_json_report(path: &Path, result: &RunResult) -> Result<()> {
    let report = serde_json::to_string_pretty(result)?;
    std::fs::write(path, report)?;
    Ok(())
}
