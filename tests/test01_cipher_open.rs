use sqlcipher_pool_bench::prelude::*;
use sqlcipher_pool_bench::test_utils::{FIXTURE_KEY, create_fixture, fixture_options};

fn db_path(dir: &tempfile::TempDir) -> String {
    dir.path().join("bench.db").to_string_lossy().into_owned()
}

fn pragma_text(conn: &mut rusqlite::Connection, pragma: &str) -> Result<String, BenchError> {
    conn.pragma_query_value(None, pragma, |row| {
        row.get::<_, rusqlite::types::Value>(0)
    })
    .map(|value| match value {
        rusqlite::types::Value::Text(text) => text,
        rusqlite::types::Value::Integer(n) => n.to_string(),
        other => format!("{other:?}"),
    })
    .map_err(|err| BenchError::ConfigError(err.to_string()))
}

#[tokio::test]
async fn open_switches_to_wal_and_enables_foreign_keys() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = db_path(&dir);

    let conn = open(&path, FIXTURE_KEY, REDUCED_KDF_ITERATIONS)?;
    let (mode, foreign_keys) = conn
        .run(|raw| Ok((pragma_text(raw, "journal_mode")?, pragma_text(raw, "foreign_keys")?)))
        .await?;

    assert_eq!(mode, "wal");
    assert_eq!(foreign_keys, "1");
    Ok(())
}

#[tokio::test]
async fn wrong_key_is_rejected_without_panicking() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = db_path(&dir);
    create_fixture(&fixture_options(&path), 3)?;

    let err = open(&path, "not-the-key", REDUCED_KDF_ITERATIONS).unwrap_err();
    assert!(matches!(err, BenchError::KeyRejected(_)), "unexpected error: {err}");

    // the right key still opens the same file
    open(&path, FIXTURE_KEY, REDUCED_KDF_ITERATIONS)?;
    Ok(())
}

#[tokio::test]
async fn mismatched_kdf_iterations_cannot_decrypt() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = db_path(&dir);
    create_fixture(&fixture_options(&path), 1)?;

    let err = open(&path, FIXTURE_KEY, REDUCED_KDF_ITERATIONS + 1).unwrap_err();
    assert!(matches!(err, BenchError::KeyRejected(_)), "unexpected error: {err}");
    Ok(())
}

#[tokio::test]
async fn in_memory_database_is_exempt_from_wal() -> Result<(), Box<dyn std::error::Error>> {
    let conn = open(IN_MEMORY_PATH, FIXTURE_KEY, REDUCED_KDF_ITERATIONS)?;
    let mode = conn.run(|raw| pragma_text(raw, "journal_mode")).await?;
    assert_eq!(mode, "memory");
    Ok(())
}

#[tokio::test]
async fn open_database_applies_uri_arguments() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = format!("file:{}", db_path(&dir));
    let options = fixture_options(&path).with_dsn_args("?cache=private");

    let conn = open_database(&options, 7).await?;
    assert_eq!(conn.id(), 7);
    let mode = conn.run(|raw| pragma_text(raw, "journal_mode")).await?;
    assert_eq!(mode, "wal");
    conn.close().await;

    assert!(dir.path().join("bench.db").exists());
    Ok(())
}

#[tokio::test]
async fn missing_directory_is_an_open_error() {
    let err = open(
        "/nonexistent-dir-for-bench/bench.db",
        FIXTURE_KEY,
        REDUCED_KDF_ITERATIONS,
    )
    .unwrap_err();
    assert!(matches!(err, BenchError::Open(_)), "unexpected error: {err}");
}
