// Benchmark run module
//
// - context: per-run state (pool, shared handle, counters, payload) and lease policy
// - payload: the random blob every insert writes
// - write / read: one workload unit each
// - cleanup: scratch-table reset and row counting
// - orchestrator: fan-out, timing and sequencing of runs
// - report: per-run metrics

pub mod cleanup;
pub mod context;
pub mod orchestrator;
pub mod payload;
pub mod read;
pub mod report;
pub mod write;

pub use cleanup::{count_rows, delete_all};
pub use context::{FailureCounters, RunContext};
pub use orchestrator::{run_all, run_once};
pub use payload::{Payload, generate_payload};
pub use read::select;
pub use report::{KindTally, RunReport, UnitFailure, UnitKind, UnitOutcome};
pub use write::insert;

/// Scratch table every insert appends to and cleanup empties.
pub const WRITE_TABLE: &str = "test_long_write";
/// Pre-populated table the read workload scans.
pub const READ_TABLE: &str = "user_messages";
