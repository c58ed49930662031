//! Control loop behaviour against scripted sinks
//!
//! The recording sink logs every call the controller makes so the tests can
//! check connection/transaction/statement composition, commit behaviour on
//! each stop reason, and the state of staging files at load time.

use std::cell::RefCell;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use libinsertbench_core::config::{LoadMode, RunConfig};
use libinsertbench_core::error::{BenchError, Result};
use libinsertbench_core::metrics::StopReason;
use libinsertbench_core::row::Md5RowGenerator;
use libinsertbench_core::sink::{BulkFormat, Connection, DataSink, NoopSink, Statement};
use libinsertbench_core::run;
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Connect,
    Begin,
    Prepare(usize),
    Execute(usize),
    Commit,
    Close,
    /// Records seen in the staging file when the load was issued
    BulkLoad(usize),
}

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    /// Sleep inside every execute
    execute_delay: Duration,
    /// Fail the n-th connect (1-based)
    fail_connect_at: Option<usize>,
    /// Fail the n-th execute (1-based)
    fail_execute_at: Option<usize>,
}

impl Script {
    fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    fn executes(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, Call::Execute(_))).count()
    }
}

struct RecordingSink {
    script: Rc<RefCell<Script>>,
}

impl RecordingSink {
    fn new(script: Script) -> (Self, Rc<RefCell<Script>>) {
        let script = Rc::new(RefCell::new(script));
        (Self { script: Rc::clone(&script) }, script)
    }
}

impl DataSink for RecordingSink {
    type Conn = RecordingConnection;

    fn connect(&mut self) -> Result<RecordingConnection> {
        let mut script = self.script.borrow_mut();
        script.calls.push(Call::Connect);
        let attempts = script.count(&Call::Connect);
        if script.fail_connect_at == Some(attempts) {
            return Err(BenchError::Connection("server has gone away".to_string()));
        }
        Ok(RecordingConnection {
            script: Rc::clone(&self.script),
        })
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

struct RecordingConnection {
    script: Rc<RefCell<Script>>,
}

impl RecordingConnection {
    fn push(&self, call: Call) {
        self.script.borrow_mut().calls.push(call);
    }
}

impl Connection for RecordingConnection {
    fn begin(&mut self) -> Result<()> {
        self.push(Call::Begin);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.push(Call::Commit);
        Ok(())
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement> {
        let statement = Statement::new(sql);
        self.push(Call::Prepare(statement.placeholder_count() / 4));
        Ok(statement)
    }

    fn execute(&mut self, statement: &Statement, rows: &[libinsertbench_core::SyntheticRow]) -> Result<u64> {
        assert_eq!(statement.placeholder_count(), rows.len() * 4);
        let delay = {
            let mut script = self.script.borrow_mut();
            script.calls.push(Call::Execute(rows.len()));
            if script.fail_execute_at == Some(script.executes()) {
                return Err(BenchError::Statement("Duplicate entry '0' for key 'PRIMARY'".to_string()));
            }
            script.execute_delay
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        Ok(rows.len() as u64)
    }

    fn bulk_load(&mut self, path: &Path, format: BulkFormat, _table: &str) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        let records = match format {
            BulkFormat::Csv => text.lines().count(),
            BulkFormat::Xml => text.matches("<row>").count(),
        };
        self.push(Call::BulkLoad(records));
        Ok(())
    }

    fn execute_ddl(&mut self, _sql: &str) -> Result<()> {
        Ok(())
    }

    fn close(self) -> Result<()> {
        self.push(Call::Close);
        Ok(())
    }
}

/// Records when each complete line was written
#[derive(Default)]
struct StampedLines {
    stamps: Vec<Instant>,
    text: Vec<u8>,
}

impl Write for StampedLines {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for _ in buf.iter().filter(|b| **b == b'\n') {
            self.stamps.push(Instant::now());
        }
        self.text.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn insert_config(total: u64, rows_per_stmt: usize, stmts_per_txn: usize, txns_per_conn: usize) -> RunConfig {
    RunConfig::builder()
        .total_rows(total)
        .rows_per_stmt(rows_per_stmt)
        .stmts_per_txn(stmts_per_txn)
        .txns_per_conn(txns_per_conn)
        .noop(true)
        .build()
        .unwrap()
}

#[test]
fn test_ten_single_row_statements() {
    let config = insert_config(10, 1, 1, 1);
    let mut sink = NoopSink::new();
    let mut out = Vec::new();

    let result = run(&config, &mut sink, &mut Md5RowGenerator::with_seed(1), &mut out).unwrap();

    assert_eq!(result.stop_reason, StopReason::ReachedTarget);
    assert_eq!(result.counters.row_count, 10);
    assert_eq!(result.counters.stmt_count, 10);
    assert_eq!(result.counters.txn_count, 10);
    assert_eq!(result.counters.conn_count, 10);
    assert_eq!(sink.connections(), 10);
    assert!(result.phases.is_empty());
}

#[test]
fn test_counts_follow_ratios() {
    // 10 rows/stmt * 5 stmts/txn * 2 txns/conn = 100 rows per connection
    let config = insert_config(1000, 10, 5, 2);
    let mut sink = NoopSink::new();
    let mut out = Vec::new();

    let result = run(&config, &mut sink, &mut Md5RowGenerator::with_seed(1), &mut out).unwrap();

    assert_eq!(result.counters.row_count, 1000);
    assert_eq!(result.counters.conn_count, 10);
    assert_eq!(result.counters.txn_count, 20);
    assert_eq!(result.counters.stmt_count, 100);
    assert_eq!(
        result.counters.row_count,
        config.rows_per_conn() * result.counters.conn_count
    );
}

#[test]
fn test_row_count_capped_at_target() {
    let config = insert_config(25, 10, 1, 1);
    let (mut sink, script) = RecordingSink::new(Script::default());
    let mut out = Vec::new();

    let result = run(&config, &mut sink, &mut Md5RowGenerator::with_seed(1), &mut out).unwrap();

    assert_eq!(result.counters.row_count, 25);
    assert_eq!(result.counters.stmt_count, 3);
    assert_eq!(result.counters.conn_count, 3);

    let script = script.borrow();
    let executes: Vec<&Call> = script
        .calls
        .iter()
        .filter(|c| matches!(c, Call::Execute(_)))
        .collect();
    assert_eq!(executes, vec![&Call::Execute(10), &Call::Execute(10), &Call::Execute(5)]);
    // The short tail statement gets its own prepare
    assert!(script.calls.contains(&Call::Prepare(5)));
}

#[test]
fn test_target_reached_mid_transaction_commits() {
    let config = insert_config(5, 1, 10, 3);
    let (mut sink, script) = RecordingSink::new(Script::default());
    let mut out = Vec::new();

    let result = run(&config, &mut sink, &mut Md5RowGenerator::with_seed(1), &mut out).unwrap();

    assert_eq!(result.stop_reason, StopReason::ReachedTarget);
    assert_eq!(result.counters.row_count, 5);
    assert_eq!(result.counters.txn_count, 1);

    let script = script.borrow();
    assert_eq!(
        script.calls,
        vec![
            Call::Connect,
            Call::Begin,
            Call::Prepare(1),
            Call::Execute(1),
            Call::Execute(1),
            Call::Execute(1),
            Call::Execute(1),
            Call::Execute(1),
            Call::Commit,
            Call::Close,
        ]
    );
}

#[test]
fn test_full_transactions_commit_before_next_connection() {
    let config = insert_config(8, 2, 2, 2);
    let (mut sink, script) = RecordingSink::new(Script::default());
    let mut out = Vec::new();

    let result = run(&config, &mut sink, &mut Md5RowGenerator::with_seed(1), &mut out).unwrap();

    assert_eq!(result.counters.conn_count, 1);
    let script = script.borrow();
    assert_eq!(script.count(&Call::Begin), 2);
    assert_eq!(script.count(&Call::Commit), 2);
    assert_eq!(script.count(&Call::Close), 1);
}

#[test]
fn test_deadline_leaves_transaction_open() {
    let config = RunConfig::builder()
        .total_rows(1_000_000)
        .stmts_per_txn(10_000)
        .report_interval(Duration::from_millis(5))
        .max_time(Duration::from_millis(20))
        .noop(true)
        .build()
        .unwrap();
    let (mut sink, script) = RecordingSink::new(Script {
        execute_delay: Duration::from_millis(2),
        ..Script::default()
    });
    let mut out = Vec::new();

    let result = run(&config, &mut sink, &mut Md5RowGenerator::with_seed(1), &mut out).unwrap();

    assert_eq!(result.stop_reason, StopReason::DeadlineExceeded);
    assert!(result.counters.row_count < 1_000_000);
    assert!(result.elapsed >= Duration::from_millis(20));

    let script = script.borrow();
    assert_eq!(script.count(&Call::Commit), 0);
    assert_eq!(script.calls.last(), Some(&Call::Close));

    let text = String::from_utf8(out).unwrap();
    assert!(text.lines().count() >= 1);
    assert!(text.lines().all(|l| l.ends_with("% done")));
}

#[test]
fn test_progress_lines_respect_interval() {
    let interval = Duration::from_millis(10);
    let config = RunConfig::builder()
        .total_rows(60)
        .report_interval(interval)
        .noop(true)
        .build()
        .unwrap();
    let (mut sink, _script) = RecordingSink::new(Script {
        execute_delay: Duration::from_millis(1),
        ..Script::default()
    });
    let mut out = StampedLines::default();

    let result = run(&config, &mut sink, &mut Md5RowGenerator::with_seed(1), &mut out).unwrap();
    assert_eq!(result.counters.row_count, 60);

    assert!(!out.stamps.is_empty());
    let jitter = Duration::from_millis(1);
    for pair in out.stamps.windows(2) {
        assert!(pair[1].duration_since(pair[0]) + jitter >= interval);
    }
}

#[test]
fn test_no_progress_before_first_interval() {
    let config = insert_config(100, 1, 1, 1);
    let mut out = Vec::new();

    run(&config, &mut NoopSink::new(), &mut Md5RowGenerator::with_seed(1), &mut out).unwrap();

    // Default interval is 10 seconds
    assert!(out.is_empty());
}

#[test]
fn test_connection_failure_aborts_run() {
    let config = insert_config(10, 1, 1, 1);
    let (mut sink, script) = RecordingSink::new(Script {
        fail_connect_at: Some(3),
        ..Script::default()
    });
    let mut out = Vec::new();

    let err = run(&config, &mut sink, &mut Md5RowGenerator::with_seed(1), &mut out).unwrap_err();

    assert!(matches!(err, BenchError::Connection(_)));
    assert_eq!(script.borrow().executes(), 2);
}

#[test]
fn test_statement_failure_aborts_run() {
    let config = insert_config(10, 1, 5, 1);
    let (mut sink, script) = RecordingSink::new(Script {
        fail_execute_at: Some(2),
        ..Script::default()
    });
    let mut out = Vec::new();

    let err = run(&config, &mut sink, &mut Md5RowGenerator::with_seed(1), &mut out).unwrap_err();

    assert!(matches!(err, BenchError::Statement(_)));
    let script = script.borrow();
    assert_eq!(script.executes(), 2);
    assert_eq!(script.count(&Call::Commit), 0);
}

#[test]
fn test_invalid_config_rejected_before_connecting() {
    let mut config = insert_config(10, 1, 1, 1);
    config.rows_per_stmt = 0;
    let (mut sink, script) = RecordingSink::new(Script::default());
    let mut out = Vec::new();

    let err = run(&config, &mut sink, &mut Md5RowGenerator::with_seed(1), &mut out).unwrap_err();

    assert!(matches!(err, BenchError::InvalidArgs(_)));
    assert!(script.borrow().calls.is_empty());
}

fn bulk_config(mode: LoadMode, dir: &Path, total: u64) -> RunConfig {
    RunConfig::builder()
        .mode(mode)
        .total_rows(total)
        .staging_dir(dir)
        .noop(true)
        .build()
        .unwrap()
}

#[test]
fn test_load_data_stages_every_row_before_loading() {
    let dir = tempdir().unwrap();
    let config = bulk_config(LoadMode::LoadData, dir.path(), 50);
    let (mut sink, script) = RecordingSink::new(Script::default());
    let mut out = Vec::new();

    let result = run(&config, &mut sink, &mut Md5RowGenerator::with_seed(1), &mut out).unwrap();

    assert_eq!(
        script.borrow().calls,
        vec![Call::Connect, Call::BulkLoad(50), Call::Close]
    );
    assert_eq!(result.counters.row_count, 50);
    assert_eq!(result.counters.stmt_count, 1);
    assert_eq!(result.counters.txn_count, 1);
    assert_eq!(result.counters.conn_count, 1);
    assert_eq!(result.phases.len(), 2);

    let csv = std::fs::read_to_string(dir.path().join("data.csv")).unwrap();
    let first: Vec<&str> = csv.lines().next().unwrap().split(',').collect();
    assert_eq!(first.len(), 4);
    assert_eq!(first[0], "0");
    assert_eq!(first[2], libinsertbench_core::row::row_digest(0, 0));

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].ends_with("50 rows written to CSV"));
    assert!(lines[1].ends_with("50 rows loaded from CSV"));
}

#[test]
fn test_load_xml_stages_every_row_before_loading() {
    let dir = tempdir().unwrap();
    let config = bulk_config(LoadMode::LoadXml, dir.path(), 12);
    let (mut sink, script) = RecordingSink::new(Script::default());
    let mut out = Vec::new();

    let result = run(&config, &mut sink, &mut Md5RowGenerator::with_seed(1), &mut out).unwrap();

    assert!(script.borrow().calls.contains(&Call::BulkLoad(12)));
    assert_eq!(result.counters.row_count, 12);

    let xml = std::fs::read_to_string(dir.path().join("data.xml")).unwrap();
    for field in ["id", "intCol", "stringCol", "textCol"] {
        assert_eq!(xml.matches(&format!("<field name=\"{}\">", field)).count(), 12);
    }
}
