use rusqlite::{Connection, TransactionBehavior};

use crate::cipher::CipherConnection;
use crate::error::{BenchError, ReadStage};

const DELETE_SQL: &str = "DELETE FROM test_long_write";

/// Delete every row from the scratch write table, returning how many went.
///
/// Safe to repeat: a second call deletes nothing and succeeds.
///
/// # Errors
/// Returns [`BenchError::Cleanup`] if the transaction or the delete fails.
pub async fn delete_all(handle: &CipherConnection) -> Result<usize, BenchError> {
    handle.run(delete_all_rows).await
}

pub(crate) fn delete_all_rows(conn: &mut Connection) -> Result<usize, BenchError> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(BenchError::Cleanup)?;
    let deleted = tx.execute(DELETE_SQL, []).map_err(BenchError::Cleanup)?;
    tx.commit().map_err(BenchError::Cleanup)?;
    Ok(deleted)
}

/// Count the rows of `table`.
///
/// # Errors
/// Returns [`BenchError::ConfigError`] when `table` is not a plain identifier, and
/// [`BenchError::Read`] when the count query fails.
pub async fn count_rows(handle: &CipherConnection, table: &str) -> Result<u64, BenchError> {
    if !is_identifier(table) {
        return Err(BenchError::ConfigError(format!(
            "invalid table name {table:?}"
        )));
    }
    let sql = format!("SELECT count(*) FROM {table}");
    handle
        .run(move |conn| {
            conn.query_row(&sql, [], |row| row.get::<_, i64>(0))
                .map(|count| u64::try_from(count).unwrap_or_default())
                .map_err(BenchError::read(ReadStage::Query))
        })
        .await
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
