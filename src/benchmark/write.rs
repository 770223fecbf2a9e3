use rusqlite::{Connection, TransactionBehavior};

use crate::benchmark::context::RunContext;
use crate::benchmark::report::{UnitKind, UnitOutcome};
use crate::error::{BenchError, WriteStage};

const INSERT_SQL: &str = "INSERT INTO test_long_write (data) VALUES (?1)";

/// One write unit: insert the run's payload in its own transaction.
///
/// A failure at any stage is logged, counted and reported in the outcome; nothing is retried.
pub async fn insert(ctx: &RunContext, index: usize) -> UnitOutcome {
    let (handle_id, result) = match ctx.writer_lease().await {
        Ok(lease) => {
            let payload = ctx.payload();
            let result = lease
                .run(move |conn| insert_payload(conn, &payload))
                .await;
            (Some(lease.id()), result)
        }
        Err(err) => (None, Err(err)),
    };

    if let Err(err) = &result {
        tracing::warn!(unit = index, handle = ?handle_id, "Writing failed: {err}");
        ctx.counters().record(UnitKind::Write);
    }

    UnitOutcome {
        kind: UnitKind::Write,
        index,
        handle_id,
        result,
    }
}

pub(crate) fn insert_payload(conn: &mut Connection, payload: &[u8]) -> Result<usize, BenchError> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(BenchError::write(WriteStage::Begin))?;
    let inserted = {
        let mut stmt = tx
            .prepare(INSERT_SQL)
            .map_err(BenchError::write(WriteStage::Prepare))?;
        stmt.execute([payload])
            .map_err(BenchError::write(WriteStage::Execute))?
    };
    tx.commit().map_err(BenchError::write(WriteStage::Commit))?;
    Ok(inserted)
}
