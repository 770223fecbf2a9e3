use std::hint::black_box;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, Row};

use crate::benchmark::context::RunContext;
use crate::benchmark::report::{UnitKind, UnitOutcome};
use crate::error::{BenchError, ReadStage};

const SELECT_SQL: &str = "SELECT id, mentions FROM user_messages LIMIT ?1";

/// One read unit: scan up to `max_rows` messages, decoding but discarding each row.
///
/// A failed query or row decode is logged, counted and reported in the outcome; rows scanned
/// before the failure are not reported.
pub async fn select(ctx: &RunContext, index: usize) -> UnitOutcome {
    let max_rows = ctx.config().max_rows;
    let (handle_id, result) = match ctx.reader_lease().await {
        Ok(lease) => {
            let result = lease
                .run(move |conn| scan_messages(conn, max_rows))
                .await;
            (Some(lease.id()), result)
        }
        Err(err) => (None, Err(err)),
    };

    if let Err(err) = &result {
        tracing::warn!(unit = index, handle = ?handle_id, "Querying failed: {err}");
        ctx.counters().record(UnitKind::Read);
    }

    UnitOutcome {
        kind: UnitKind::Read,
        index,
        handle_id,
        result,
    }
}

pub(crate) fn scan_messages(conn: &mut Connection, max_rows: u32) -> Result<usize, BenchError> {
    let mut stmt = conn
        .prepare(SELECT_SQL)
        .map_err(BenchError::read(ReadStage::Query))?;
    let mut rows = stmt
        .query([max_rows])
        .map_err(BenchError::read(ReadStage::Query))?;

    let mut count = 0;
    while let Some(row) = rows.next().map_err(BenchError::read(ReadStage::Scan))? {
        let message = ScannedMessage::from_row(row).map_err(BenchError::read(ReadStage::Scan))?;
        black_box(message);
        count += 1;
    }
    Ok(count)
}

/// Decoded row; the values exist only to pay the decode cost.
#[derive(Debug)]
#[allow(dead_code)]
struct ScannedMessage {
    id: String,
    mentions: Option<Vec<u8>>,
}

impl ScannedMessage {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let id = match row.get_ref(0)? {
            ValueRef::Text(text) => String::from_utf8_lossy(text).into_owned(),
            ValueRef::Integer(value) => value.to_string(),
            other => {
                return Err(rusqlite::Error::InvalidColumnType(
                    0,
                    "id".into(),
                    other.data_type(),
                ));
            }
        };
        let mentions = match row.get_ref(1)? {
            ValueRef::Null => None,
            ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Some(bytes.to_vec()),
            other => {
                return Err(rusqlite::Error::InvalidColumnType(
                    1,
                    "mentions".into(),
                    other.data_type(),
                ));
            }
        };
        Ok(Self { id, mentions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE user_messages (id TEXT, mentions BLOB);
             INSERT INTO user_messages VALUES ('a', x'0102'), ('b', NULL), (3, 'text');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn scan_respects_row_limit() {
        let mut conn = messages_db();
        assert_eq!(scan_messages(&mut conn, 100).unwrap(), 3);
        assert_eq!(scan_messages(&mut conn, 2).unwrap(), 2);
        assert_eq!(scan_messages(&mut conn, 0).unwrap(), 0);
    }

    #[test]
    fn null_id_fails_the_scan() {
        let mut conn = messages_db();
        conn.execute("INSERT INTO user_messages VALUES (NULL, NULL)", [])
            .unwrap();
        let err = scan_messages(&mut conn, 100).unwrap_err();
        assert!(matches!(
            err,
            BenchError::Read {
                stage: ReadStage::Scan,
                ..
            }
        ));
    }

    #[test]
    fn missing_table_fails_the_query() {
        let mut conn = Connection::open_in_memory().unwrap();
        let err = scan_messages(&mut conn, 10).unwrap_err();
        assert!(matches!(
            err,
            BenchError::Read {
                stage: ReadStage::Query,
                ..
            }
        ));
    }
}
