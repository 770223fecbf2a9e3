use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use crate::benchmark::context::RunContext;
use crate::benchmark::report::{
    KindTally, RunReport, UnitFailure, UnitKind, queries_per_second,
};
use crate::benchmark::{read, write};
use crate::config::BenchConfig;
use crate::error::BenchError;

/// Outcomes gathered by one coordinator.
struct Collected {
    tally: KindTally,
    failures: Vec<UnitFailure>,
}

/// Execute one benchmark run at `config.pool_size`.
///
/// Opens the run's handles, fans every write and read out as its own task, waits for all of
/// them, then empties the scratch table (best effort) and closes the handles.
///
/// # Errors
/// Returns setup errors (invalid config, open, key or journal-mode failures); the run is not
/// started with a broken handle. Unit failures never surface here; they are in the report.
pub async fn run_once(config: &BenchConfig) -> Result<RunReport, BenchError> {
    config.validate()?;
    tracing::info!(
        pool_size = config.pool_size,
        writes = config.writes,
        reads = config.reads,
        max_rows = config.max_rows,
        dedicated_writer = config.write_on_dedicated_channel,
        dsn_args = %config.database.dsn_args,
        "Starting run"
    );

    let ctx = Arc::new(RunContext::open(config.clone()).await?);
    let open_elapsed = ctx.open_elapsed();
    tracing::info!(
        "Open connections took {:.3} seconds",
        open_elapsed.as_secs_f64()
    );
    tracing::debug!(
        bytes = config.payload_size,
        elapsed_ms = ctx.payload_elapsed().as_millis(),
        "generated payload"
    );

    let started = Instant::now();
    let writers = tokio::spawn(run_units(Arc::clone(&ctx), UnitKind::Write));
    let readers = tokio::spawn(run_units(Arc::clone(&ctx), UnitKind::Read));
    let (writers, readers) = tokio::join!(writers, readers);
    let elapsed = started.elapsed();
    let (writes, reads) = (writers?, readers?);

    let mut failures = writes.failures;
    failures.extend(reads.failures);

    let mut report = RunReport {
        pool_size: config.pool_size,
        writes: config.writes,
        reads: config.reads,
        max_rows: config.max_rows,
        write_on_dedicated_channel: config.write_on_dedicated_channel,
        pooled_handles: config.pooled_handle_count(),
        shared_handle_id: ctx.shared_handle_id(),
        handles_opened: ctx.handles_opened(),
        open_elapsed,
        payload_elapsed: ctx.payload_elapsed(),
        elapsed,
        queries_per_second: queries_per_second(config.reads + config.writes, elapsed),
        failed_writes: ctx.counters().failed_writes(),
        failed_reads: ctx.counters().failed_reads(),
        write: writes.tally,
        read: reads.tally,
        failures,
        pool: ctx.pool_status(),
        rows_deleted: None,
    };
    report.log_summary();

    report.rows_deleted = ctx.cleanup().await;

    match Arc::try_unwrap(ctx) {
        Ok(ctx) => ctx.close().await,
        Err(_) => tracing::warn!("run context still referenced; handles close on drop"),
    }
    Ok(report)
}

/// Run once per pool size, each with fresh handles, counters and payload.
///
/// # Errors
/// Stops at the first run whose setup fails.
pub async fn run_all(
    config: &BenchConfig,
    pool_sizes: &[usize],
) -> Result<Vec<RunReport>, BenchError> {
    let mut reports = Vec::with_capacity(pool_sizes.len());
    for &pool_size in pool_sizes {
        reports.push(run_once(&config.for_pool_size(pool_size)).await?);
    }
    Ok(reports)
}

async fn run_units(ctx: Arc<RunContext>, kind: UnitKind) -> Collected {
    let count = match kind {
        UnitKind::Write => ctx.config().writes,
        UnitKind::Read => ctx.config().reads,
    };

    let mut join_set = JoinSet::new();
    for index in 0..count {
        let ctx = Arc::clone(&ctx);
        join_set.spawn(async move {
            match kind {
                UnitKind::Write => write::insert(&ctx, index).await,
                UnitKind::Read => read::select(&ctx, index).await,
            }
        });
    }

    let mut collected = Collected {
        tally: KindTally::default(),
        failures: Vec::new(),
    };
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(outcome) => {
                if let Some(failure) = collected.tally.record(outcome) {
                    collected.failures.push(failure);
                }
            }
            Err(err) => {
                tracing::warn!("{kind} unit did not finish: {err}");
                ctx.counters().record(kind);
                let failure = collected.tally.record_panic(kind, err.to_string());
                collected.failures.push(failure);
            }
        }
    }
    collected
}
