use std::time::{Duration, Instant};

use rusqlite::{Connection, ErrorCode, OpenFlags};

use crate::config::{DEFAULT_BUSY_TIMEOUT, DatabaseOptions, is_in_memory_path};
use crate::error::BenchError;

use super::CipherConnection;

const WAL_MODE: &str = "wal";

/// Open and configure one encrypted handle.
///
/// The handle has foreign keys enabled, is unlocked with `key` using `kdf_iterations` rounds of
/// key derivation, and runs in WAL mode. In-memory databases are allowed to report another
/// journal mode.
///
/// # Errors
/// - [`BenchError::Open`] when the file cannot be opened.
/// - [`BenchError::KeyRejected`] when the key pragma fails or the key does not decrypt the file.
/// - [`BenchError::Pragma`] when any other pragma fails.
/// - [`BenchError::ModeMismatch`] when an on-disk database does not switch to WAL.
pub fn open(path: &str, key: &str, kdf_iterations: u32) -> Result<CipherConnection, BenchError> {
    let conn = open_connection(path, key, kdf_iterations, DEFAULT_BUSY_TIMEOUT)?;
    Ok(CipherConnection::new(0, conn))
}

/// Open handle `id` for a run on the blocking pool.
///
/// # Errors
/// Same as [`open`].
pub async fn open_database(
    options: &DatabaseOptions,
    id: usize,
) -> Result<CipherConnection, BenchError> {
    let target = options.target();
    let key = options.key.clone();
    let kdf_iterations = options.kdf_iterations;
    let busy_timeout = options.busy_timeout;

    let started = Instant::now();
    let conn = tokio::task::spawn_blocking(move || {
        open_connection(&target, &key, kdf_iterations, busy_timeout)
    })
    .await??;
    tracing::debug!(
        handle = id,
        elapsed_ms = started.elapsed().as_millis(),
        "opened database handle"
    );
    Ok(CipherConnection::new(id, conn))
}

pub(crate) fn open_connection(
    target: &str,
    key: &str,
    kdf_iterations: u32,
    busy_timeout: Duration,
) -> Result<Connection, BenchError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(target, flags).map_err(BenchError::Open)?;

    conn.pragma_update(None, "foreign_keys", true)
        .map_err(BenchError::pragma("foreign_keys"))?;
    conn.pragma_update(None, "key", key)
        .map_err(BenchError::KeyRejected)?;
    conn.pragma_update(None, "kdf_iter", kdf_iterations)
        .map_err(BenchError::pragma("kdf_iter"))?;
    conn.busy_timeout(busy_timeout)
        .map_err(BenchError::pragma("busy_timeout"))?;

    verify_key(&conn)?;

    // must run after the key is applied
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .map_err(BenchError::pragma("journal_mode"))?;
    check_journal_mode(mode, target)?;

    Ok(conn)
}

fn check_journal_mode(mode: String, target: &str) -> Result<(), BenchError> {
    if mode.eq_ignore_ascii_case(WAL_MODE) || is_in_memory_path(target) {
        Ok(())
    } else {
        Err(BenchError::ModeMismatch { actual: mode })
    }
}

/// SQLCipher accepts any key; a wrong one only shows up on the first page read.
fn verify_key(conn: &Connection) -> Result<(), BenchError> {
    match conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    }) {
        Ok(_) => Ok(()),
        Err(err) if is_not_a_database(&err) => Err(BenchError::KeyRejected(err)),
        Err(err) => Err(BenchError::pragma("key")(err)),
    }
}

fn is_not_a_database(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _) if code.code == ErrorCode::NotADatabase
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_database_is_recognised() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: ErrorCode::NotADatabase,
                extended_code: 26,
            },
            Some("file is not a database".into()),
        );
        assert!(is_not_a_database(&err));
        assert!(!is_not_a_database(&rusqlite::Error::QueryReturnedNoRows));
    }

    #[test]
    fn on_disk_database_must_report_wal() {
        assert!(check_journal_mode("wal".into(), "/tmp/bench.db").is_ok());
        assert!(check_journal_mode("WAL".into(), "file:/tmp/bench.db?cache=private").is_ok());

        let err = check_journal_mode("delete".into(), "/tmp/bench.db").unwrap_err();
        assert!(
            matches!(&err, BenchError::ModeMismatch { actual } if actual == "delete"),
            "unexpected error: {err}"
        );
        assert_eq!(
            err.to_string(),
            "unable to set journal_mode to WAL. actual mode delete"
        );
    }

    #[test]
    fn in_memory_database_may_keep_memory_mode() {
        assert!(check_journal_mode("memory".into(), crate::config::IN_MEMORY_PATH).is_ok());
        assert!(check_journal_mode("memory".into(), "file::memory:?cache=shared").is_ok());
        assert!(check_journal_mode("memory".into(), "file:bench?mode=memory").is_ok());
    }
}
