//! Fixture helpers for tests and benches.
//!
//! The benchmark assumes its two tables already exist; these helpers build an encrypted
//! database that satisfies that assumption.

use std::time::Duration;

use rusqlite::TransactionBehavior;

use crate::cipher::open::open_connection;
use crate::config::{DatabaseOptions, REDUCED_KDF_ITERATIONS};
use crate::error::BenchError;

/// Key used by fixture databases.
pub const FIXTURE_KEY: &str = "0xfixture-key-not-for-production";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS test_long_write (data BLOB);
    CREATE TABLE IF NOT EXISTS user_messages (
        id       TEXT PRIMARY KEY,
        mentions BLOB
    );
";

/// Options for a fixture at `path`, using the reduced KDF work factor to keep tests fast.
#[must_use]
pub fn fixture_options(path: &str) -> DatabaseOptions {
    DatabaseOptions::new(path, FIXTURE_KEY)
        .with_kdf_iterations(REDUCED_KDF_ITERATIONS)
        .with_busy_timeout(Duration::from_secs(10))
}

/// Create both benchmark tables and seed `messages` rows into `user_messages`.
///
/// Each message's `mentions` column holds a small JSON array, as a serialized blob.
///
/// # Errors
/// Returns open errors from the connection factory or [`BenchError::ConfigError`] if the
/// schema or seed data cannot be written.
pub fn create_fixture(options: &DatabaseOptions, messages: usize) -> Result<(), BenchError> {
    let mut conn = open_connection(
        &options.target(),
        &options.key,
        options.kdf_iterations,
        options.busy_timeout,
    )?;
    let fixture_error = |err: rusqlite::Error| BenchError::ConfigError(format!("fixture: {err}"));

    conn.execute_batch(SCHEMA).map_err(fixture_error)?;

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(fixture_error)?;
    {
        let mut stmt = tx
            .prepare("INSERT OR REPLACE INTO user_messages (id, mentions) VALUES (?1, ?2)")
            .map_err(fixture_error)?;
        for n in 0..messages {
            let mentions = serde_json::to_vec(&[format!("0x{n:040x}"), format!("user-{n}")])
                .map_err(|err| BenchError::ConfigError(format!("fixture: {err}")))?;
            stmt.execute(rusqlite::params![format!("msg-{n}"), mentions])
                .map_err(fixture_error)?;
        }
    }
    tx.commit().map_err(fixture_error)?;
    Ok(())
}

/// Create an encrypted database that has neither benchmark table.
///
/// # Errors
/// Returns open errors from the connection factory.
pub fn create_empty(options: &DatabaseOptions) -> Result<(), BenchError> {
    open_connection(
        &options.target(),
        &options.key,
        options.kdf_iterations,
        options.busy_timeout,
    )
    .map(drop)
}
