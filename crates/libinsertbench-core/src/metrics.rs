//! Run counters, rates and statement latency

use std::time::Duration;

use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use serde::Serialize;

use crate::config::{serde_duration, LoadMode};
use crate::error::{BenchError, Result};

/// Smallest elapsed time used as a rate divisor
pub const MIN_ELAPSED: Duration = Duration::from_micros(1);

/// Work completed during one run. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub row_count: u64,
    pub stmt_count: u64,
    pub txn_count: u64,
    pub conn_count: u64,
}

impl Counters {
    /// Per-second rates over `elapsed`, which is clamped to [`MIN_ELAPSED`]
    pub fn rates(&self, elapsed: Duration) -> Rates {
        let secs = elapsed.max(MIN_ELAPSED).as_secs_f64();
        Rates {
            rows_per_sec: self.row_count as f64 / secs,
            stmts_per_sec: self.stmt_count as f64 / secs,
            txns_per_sec: self.txn_count as f64 / secs,
            conns_per_sec: self.conn_count as f64 / secs,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rates {
    pub rows_per_sec: f64,
    pub stmts_per_sec: f64,
    pub txns_per_sec: f64,
    pub conns_per_sec: f64,
}

/// Why the insert loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Keep going; never the outcome of a finished run
    Continue,
    ReachedTarget,
    DeadlineExceeded,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Continue => "continue",
            StopReason::ReachedTarget => "reached_target",
            StopReason::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

/// Latency percentiles in microseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencyPercentiles {
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl LatencyPercentiles {
    pub fn p50_ms(&self) -> f64 {
        self.p50_us as f64 / 1000.0
    }

    pub fn p95_ms(&self) -> f64 {
        self.p95_us as f64 / 1000.0
    }

    pub fn p99_ms(&self) -> f64 {
        self.p99_us as f64 / 1000.0
    }

    pub fn max_ms(&self) -> f64 {
        self.max_us as f64 / 1000.0
    }
}

/// HDR histogram of statement execution times
pub struct LatencyRecorder {
    histogram: Histogram<u64>,
}

impl LatencyRecorder {
    pub fn new() -> Result<Self> {
        // 1 microsecond to 60 seconds, 3 significant figures
        let histogram = Histogram::new_with_bounds(1, 60_000_000, 3)
            .map_err(|e| BenchError::Internal(format!("latency histogram: {}", e)))?;
        Ok(Self { histogram })
    }

    pub fn record(&mut self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.histogram.saturating_record(micros.max(1));
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    pub fn percentiles(&self) -> LatencyPercentiles {
        if self.histogram.is_empty() {
            return LatencyPercentiles::default();
        }
        LatencyPercentiles {
            p50_us: self.histogram.value_at_quantile(0.50),
            p95_us: self.histogram.value_at_quantile(0.95),
            p99_us: self.histogram.value_at_quantile(0.99),
            max_us: self.histogram.max(),
        }
    }
}

/// Timing of one bulk-mode phase (staging or loading)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseTiming {
    pub name: String,
    pub rows: u64,
    #[serde(with = "serde_duration")]
    pub elapsed: Duration,
}

/// Everything a finished run reports
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub mode: LoadMode,
    pub noop: bool,
    pub started_at: DateTime<Utc>,
    pub counters: Counters,
    #[serde(with = "serde_duration")]
    pub elapsed: Duration,
    pub stop_reason: StopReason,
    pub rates: Rates,
    /// Empty in bulk modes
    pub latencies: LatencyPercentiles,
    /// Empty in insert mode
    pub phases: Vec<PhaseTiming>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_divide_by_elapsed() {
        let counters = Counters {
            row_count: 1000,
            stmt_count: 100,
            txn_count: 10,
            conn_count: 1,
        };
        let rates = counters.rates(Duration::from_secs(2));
        assert_eq!(rates.rows_per_sec, 500.0);
        assert_eq!(rates.stmts_per_sec, 50.0);
        assert_eq!(rates.txns_per_sec, 5.0);
        assert_eq!(rates.conns_per_sec, 0.5);
    }

    #[test]
    fn test_rates_zero_elapsed_is_finite() {
        let counters = Counters {
            row_count: 10,
            ..Counters::default()
        };
        let rates = counters.rates(Duration::ZERO);
        assert!(rates.rows_per_sec.is_finite());
        assert_eq!(rates.rows_per_sec, 10.0 / MIN_ELAPSED.as_secs_f64());
        assert_eq!(rates.conns_per_sec, 0.0);
    }

    #[test]
    fn test_latency_recorder_percentiles() {
        let mut recorder = LatencyRecorder::new().unwrap();
        assert!(recorder.is_empty());
        assert_eq!(recorder.percentiles(), LatencyPercentiles::default());

        for ms in 1..=100u64 {
            recorder.record(Duration::from_millis(ms));
        }
        let p = recorder.percentiles();
        assert_eq!(recorder.len(), 100);
        assert!(p.p50_ms() >= 49.0 && p.p50_ms() <= 51.0);
        assert!(p.p99_ms() >= 98.0 && p.p99_ms() <= 100.1);
        assert!(p.max_ms() >= 99.9);
    }

    #[test]
    fn test_stop_reason_serializes_snake_case() {
        let json = serde_json::to_string(&StopReason::DeadlineExceeded).unwrap();
        assert_eq!(json, "\"deadline_exceeded\"");
    }
}
