use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::BenchError;
use crate::pool::PoolStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Write,
    Read,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Write => f.write_str("write"),
            UnitKind::Read => f.write_str("read"),
        }
    }
}

/// Result of one insert or select unit.
#[derive(Debug)]
pub struct UnitOutcome {
    pub kind: UnitKind,
    pub index: usize,
    /// Handle the unit ran on; `None` when no handle could be acquired.
    pub handle_id: Option<usize>,
    /// Rows inserted or scanned.
    pub result: Result<usize, BenchError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    pub kind: UnitKind,
    /// `None` when the unit's task panicked before reporting.
    pub index: Option<usize>,
    pub handle_id: Option<usize>,
    pub message: String,
}

/// Aggregated outcomes for one kind of unit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KindTally {
    pub succeeded: u64,
    pub failed: u64,
    pub rows: u64,
    /// Units run per handle id.
    pub handle_usage: BTreeMap<usize, u64>,
}

impl KindTally {
    /// Fold one outcome in, returning the failure to keep when it did not succeed.
    pub fn record(&mut self, outcome: UnitOutcome) -> Option<UnitFailure> {
        if let Some(id) = outcome.handle_id {
            *self.handle_usage.entry(id).or_default() += 1;
        }
        match outcome.result {
            Ok(rows) => {
                self.succeeded += 1;
                self.rows += rows as u64;
                None
            }
            Err(err) => {
                self.failed += 1;
                Some(UnitFailure {
                    kind: outcome.kind,
                    index: Some(outcome.index),
                    handle_id: outcome.handle_id,
                    message: err.to_string(),
                })
            }
        }
    }

    pub fn record_panic(&mut self, kind: UnitKind, message: String) -> UnitFailure {
        self.failed += 1;
        UnitFailure {
            kind,
            index: None,
            handle_id: None,
            message,
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }
}

/// Metrics for one run at one pool size.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pool_size: usize,
    pub writes: usize,
    pub reads: usize,
    pub max_rows: u32,
    pub write_on_dedicated_channel: bool,
    pub pooled_handles: usize,
    pub shared_handle_id: Option<usize>,
    pub handles_opened: usize,
    #[serde(serialize_with = "secs")]
    pub open_elapsed: Duration,
    #[serde(serialize_with = "secs")]
    pub payload_elapsed: Duration,
    #[serde(serialize_with = "secs")]
    pub elapsed: Duration,
    pub queries_per_second: f64,
    pub failed_writes: u64,
    pub failed_reads: u64,
    pub write: KindTally,
    pub read: KindTally,
    pub failures: Vec<UnitFailure>,
    pub pool: PoolStatus,
    pub rows_deleted: Option<usize>,
}

impl RunReport {
    /// Log the per-run summary lines.
    pub fn log_summary(&self) {
        tracing::info!(
            "Failed writes: {}, Failed reads: {}",
            self.failed_writes,
            self.failed_reads
        );
        tracing::info!(
            "RunQueries took {:.3} seconds, queries per second: {:.2}",
            self.elapsed.as_secs_f64(),
            self.queries_per_second
        );
    }
}

/// Combined units per second over the measured phase.
#[must_use]
pub fn queries_per_second(units: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    units as f64 / secs
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn secs<S: serde::Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(value.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_successes_failures_and_handles() {
        let mut tally = KindTally::default();
        assert!(
            tally
                .record(UnitOutcome {
                    kind: UnitKind::Read,
                    index: 0,
                    handle_id: Some(2),
                    result: Ok(40),
                })
                .is_none()
        );
        let failure = tally
            .record(UnitOutcome {
                kind: UnitKind::Read,
                index: 1,
                handle_id: Some(2),
                result: Err(BenchError::PoolClosed),
            })
            .unwrap();
        assert_eq!(failure.index, Some(1));
        assert_eq!(failure.message, "handle pool is closed");
        assert_eq!((tally.succeeded, tally.failed, tally.rows), (1, 1, 40));
        assert_eq!(tally.handle_usage.get(&2), Some(&2));
        assert_eq!(tally.total(), 2);
    }

    #[test]
    fn throughput_handles_zero_elapsed() {
        assert!((queries_per_second(60, Duration::from_secs(2)) - 30.0).abs() < f64::EPSILON);
        assert!(queries_per_second(60, Duration::ZERO).abs() < f64::EPSILON);
    }
}
