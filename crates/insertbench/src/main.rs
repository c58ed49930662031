//! insertbench - measure insert throughput under different batching strategies

mod cli;

use std::io::{self, Write};

use clap::{CommandFactory, Parser};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::Cli;
use libinsertbench_core::report::{self, SERVER_SETTINGS};
use libinsertbench_core::sink::{Connection, DataSink, NoopSink};
use libinsertbench_core::{schema, BenchError, Md5RowGenerator, Result, RunConfig, RunResult};
use libinsertbench_mysql::MySqlSink;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are not failures, unless they cannot be written
            let printed = e.print();
            let code = if e.use_stderr() || printed.is_err() { 1 } else { 0 };
            std::process::exit(code);
        }
    };

    let result = cli.run_config().and_then(|config| {
        init_logging(config.verbose);
        run(&cli, &config)
    });

    if let Err(e) = result {
        if let Err(io_err) = write_failure(&mut io::stderr().lock(), &e) {
            error!(%io_err, "could not write diagnostic");
        }
        std::process::exit(e.exit_code());
    }
}

/// One-line diagnostic for a fatal error, followed by usage when the error
/// came from the arguments
fn write_failure<W: Write>(out: &mut W, e: &BenchError) -> io::Result<()> {
    writeln!(out, "{}: {}", e.error_code(), e)?;
    if e.wants_usage() {
        writeln!(out)?;
        Cli::command().write_help(out)?;
    }
    Ok(())
}

fn log_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level(verbose)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: &Cli, config: &RunConfig) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let result = if config.noop {
        benchmark(config, &mut NoopSink::new(), &mut out, false)?
    } else {
        let db = cli.db_config()?;
        let mut sink = MySqlSink::new(&db, config.emulate_prepares)?;
        benchmark(config, &mut sink, &mut out, true)?
    };

    if let Some(path) = &config.json_report_path {
        report::write_json_report(path, &result)?;
        info!("Report saved to {}", path.display());
    }
    Ok(())
}

/// Prepare the table, run, and print the summary (plus server settings when
/// `with_server` is set)
fn benchmark<S: DataSink, W: Write>(
    config: &RunConfig,
    sink: &mut S,
    out: &mut W,
    with_server: bool,
) -> Result<RunResult> {
    if with_server {
        let mut conn = sink.connect()?;
        schema::prepare_table(&mut conn, config)?;
        conn.close()?;
    }

    let mut generator = Md5RowGenerator::new();
    let result = libinsertbench_core::run(config, sink, &mut generator, out)?;
    report::write_summary(out, &result)?;

    if with_server {
        let mut conn = sink.connect()?;
        let settings = conn.server_settings(&SERVER_SETTINGS)?;
        conn.close()?;
        report::write_server_settings(out, &settings)?;
    }
    out.flush()?;
    Ok(result)
}
