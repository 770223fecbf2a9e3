use std::time::Duration;

use serde::Serialize;

use crate::error::BenchError;

/// Reduced key-derivation work factor, trading security margin for open latency.
pub const REDUCED_KDF_ITERATIONS: u32 = 3200;
/// SQLCipher's stronger default work factor.
pub const DEFAULT_KDF_ITERATIONS: u32 = 256_000;
/// Sentinel path for a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";
/// Size of the blob written by every insert.
pub const DEFAULT_PAYLOAD_SIZE: usize = 512 * 1024;
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// How to reach and unlock the encrypted database.
#[derive(Clone, Serialize)]
pub struct DatabaseOptions {
    pub path: String,
    /// URI query string (`?cache=private&...`). A plain `path` is turned into a `file:` URI when
    /// this is set.
    pub dsn_args: String,
    #[serde(skip)]
    pub key: String,
    pub kdf_iterations: u32,
    #[serde(with = "duration_millis")]
    pub busy_timeout: Duration,
}

impl DatabaseOptions {
    #[must_use]
    pub fn new(path: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            dsn_args: String::new(),
            key: key.into(),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_kdf_iterations(mut self, kdf_iterations: u32) -> Self {
        self.kdf_iterations = kdf_iterations;
        self
    }

    #[must_use]
    pub fn with_dsn_args(mut self, dsn_args: impl Into<String>) -> Self {
        self.dsn_args = dsn_args.into();
        self
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Path plus connection-string arguments, as handed to the driver.
    ///
    /// SQLite only parses a query string on `file:` URIs, so a plain path with arguments is
    /// escaped and prefixed rather than opened as a file named `bench.db?cache=...`.
    #[must_use]
    pub fn target(&self) -> String {
        if self.dsn_args.is_empty() || self.path.starts_with("file:") {
            return format!("{}{}", self.path, self.dsn_args);
        }
        if self.path == IN_MEMORY_PATH {
            return format!("file::memory:{}", self.dsn_args);
        }
        format!("file:{}{}", escape_uri_path(&self.path), self.dsn_args)
    }

    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        is_in_memory_path(&self.path)
    }
}

// The key never reaches logs.
impl std::fmt::Debug for DatabaseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseOptions")
            .field("path", &self.path)
            .field("dsn_args", &self.dsn_args)
            .field("key", &"<redacted>")
            .field("kdf_iterations", &self.kdf_iterations)
            .field("busy_timeout", &self.busy_timeout)
            .finish()
    }
}

fn escape_uri_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for ch in path.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            '?' => escaped.push_str("%3F"),
            '#' => escaped.push_str("%23"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// `:memory:`, `file::memory:...` and URIs with `mode=memory` never use WAL.
#[must_use]
pub fn is_in_memory_path(path: &str) -> bool {
    path == IN_MEMORY_PATH || path.starts_with("file::memory:") || path.contains("mode=memory")
}

/// Settings for a single benchmark run.
#[derive(Debug, Clone, Serialize)]
pub struct BenchConfig {
    pub database: DatabaseOptions,
    pub pool_size: usize,
    pub reads: usize,
    pub writes: usize,
    pub max_rows: u32,
    pub write_on_dedicated_channel: bool,
    #[serde(with = "option_duration_millis")]
    pub checkout_timeout: Option<Duration>,
    pub payload_size: usize,
    pub payload_seed: Option<u64>,
}

impl BenchConfig {
    #[must_use]
    pub fn builder(database: DatabaseOptions) -> BenchConfigBuilder {
        BenchConfigBuilder::new(database)
    }

    /// Copy of this configuration with a different pool size.
    #[must_use]
    pub fn for_pool_size(&self, pool_size: usize) -> Self {
        Self {
            pool_size,
            ..self.clone()
        }
    }

    /// Writers share one handle when there is only one, or when asked to.
    #[must_use]
    pub fn writes_use_shared_handle(&self) -> bool {
        self.pool_size == 1 || self.write_on_dedicated_channel
    }

    #[must_use]
    pub fn reads_use_pool(&self) -> bool {
        self.pool_size > 1
    }

    #[must_use]
    pub fn opens_shared_handle(&self) -> bool {
        self.writes_use_shared_handle()
    }

    /// Handles pushed into the pool. The dedicated writer is carved out of `pool_size`.
    #[must_use]
    pub fn pooled_handle_count(&self) -> usize {
        if self.pool_size <= 1 {
            0
        } else {
            self.pool_size - usize::from(self.write_on_dedicated_channel)
        }
    }

    /// # Errors
    /// Returns [`BenchError::ConfigError`] for a zero pool size, zero payload or empty path.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.pool_size == 0 {
            return Err(BenchError::ConfigError(
                "pool size must be a positive integer".into(),
            ));
        }
        if self.payload_size == 0 {
            return Err(BenchError::ConfigError(
                "payload size must be greater than zero".into(),
            ));
        }
        if self.database.path.is_empty() {
            return Err(BenchError::ConfigError("database path is empty".into()));
        }
        Ok(())
    }
}

/// Fluent builder for [`BenchConfig`].
#[derive(Debug, Clone)]
pub struct BenchConfigBuilder {
    config: BenchConfig,
}

impl BenchConfigBuilder {
    #[must_use]
    pub fn new(database: DatabaseOptions) -> Self {
        Self {
            config: BenchConfig {
                database,
                pool_size: 1,
                reads: 100,
                writes: 100,
                max_rows: 100,
                write_on_dedicated_channel: false,
                checkout_timeout: None,
                payload_size: DEFAULT_PAYLOAD_SIZE,
                payload_seed: None,
            },
        }
    }

    #[must_use]
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.config.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn reads(mut self, reads: usize) -> Self {
        self.config.reads = reads;
        self
    }

    #[must_use]
    pub fn writes(mut self, writes: usize) -> Self {
        self.config.writes = writes;
        self
    }

    #[must_use]
    pub fn max_rows(mut self, max_rows: u32) -> Self {
        self.config.max_rows = max_rows;
        self
    }

    #[must_use]
    pub fn write_on_dedicated_channel(mut self, dedicated: bool) -> Self {
        self.config.write_on_dedicated_channel = dedicated;
        self
    }

    #[must_use]
    pub fn checkout_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.checkout_timeout = timeout;
        self
    }

    #[must_use]
    pub fn payload_size(mut self, payload_size: usize) -> Self {
        self.config.payload_size = payload_size;
        self
    }

    #[must_use]
    pub fn payload_seed(mut self, seed: Option<u64>) -> Self {
        self.config.payload_seed = seed;
        self
    }

    /// # Errors
    /// Propagates [`BenchConfig::validate`] failures.
    pub fn build(self) -> Result<BenchConfig, BenchError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Parse a comma-separated list of positive pool sizes such as `1,2,4`.
///
/// # Errors
/// Returns [`BenchError::ConfigError`] on an empty list, a non-number or a zero.
pub fn parse_pool_sizes(raw: &str) -> Result<Vec<usize>, BenchError> {
    let sizes = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.parse::<usize>() {
            Ok(0) => Err(BenchError::ConfigError(format!(
                "pool size must be positive, got {part}"
            ))),
            Ok(size) => Ok(size),
            Err(err) => Err(BenchError::ConfigError(format!(
                "invalid pool size {part:?}: {err}"
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if sizes.is_empty() {
        return Err(BenchError::ConfigError("no pool sizes given".into()));
    }
    Ok(sizes)
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub(super) fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }
}

mod option_duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    #[allow(clippy::ref_option)]
    pub(super) fn serialize<S: Serializer>(
        value: &Option<Duration>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => {
                s.serialize_some(&u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
            }
            None => s.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pool_size: usize, dedicated: bool) -> BenchConfig {
        BenchConfig::builder(DatabaseOptions::new("bench.db", "secret"))
            .pool_size(pool_size)
            .write_on_dedicated_channel(dedicated)
            .build()
            .unwrap()
    }

    #[test]
    fn dsn_args_turn_plain_paths_into_uris() {
        let plain = DatabaseOptions::new("/tmp/bench.db", "k");
        assert_eq!(plain.target(), "/tmp/bench.db");

        let with_args = plain.clone().with_dsn_args("?cache=private");
        assert_eq!(with_args.target(), "file:/tmp/bench.db?cache=private");

        let uri = DatabaseOptions::new("file:/tmp/bench.db", "k").with_dsn_args("?mode=rwc");
        assert_eq!(uri.target(), "file:/tmp/bench.db?mode=rwc");

        let odd = DatabaseOptions::new("/tmp/a?b#100%.db", "k").with_dsn_args("?cache=shared");
        assert_eq!(odd.target(), "file:/tmp/a%3Fb%23100%25.db?cache=shared");

        let memory = DatabaseOptions::new(IN_MEMORY_PATH, "k").with_dsn_args("?cache=private");
        assert_eq!(memory.target(), "file::memory:?cache=private");
        assert!(is_in_memory_path(&memory.target()));
    }

    #[test]
    fn parses_comma_separated_pool_sizes() {
        assert_eq!(parse_pool_sizes("1,2, 4").unwrap(), vec![1, 2, 4]);
        assert_eq!(parse_pool_sizes("8").unwrap(), vec![8]);
    }

    #[test]
    fn rejects_bad_pool_sizes() {
        assert!(matches!(
            parse_pool_sizes("1,0"),
            Err(BenchError::ConfigError(_))
        ));
        assert!(parse_pool_sizes("two").is_err());
        assert!(parse_pool_sizes(" , ").is_err());
    }

    #[test]
    fn single_handle_runs_open_no_pool() {
        let cfg = config(1, false);
        assert!(cfg.opens_shared_handle());
        assert!(!cfg.reads_use_pool());
        assert_eq!(cfg.pooled_handle_count(), 0);
    }

    #[test]
    fn dedicated_writer_is_carved_out_of_pool() {
        let cfg = config(4, true);
        assert!(cfg.writes_use_shared_handle());
        assert!(cfg.reads_use_pool());
        assert_eq!(cfg.pooled_handle_count(), 3);

        let shared = config(4, false);
        assert!(!shared.opens_shared_handle());
        assert_eq!(shared.pooled_handle_count(), 4);
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let result = BenchConfig::builder(DatabaseOptions::new("bench.db", "k"))
            .pool_size(0)
            .build();
        assert!(matches!(result, Err(BenchError::ConfigError(_))));
    }

    #[test]
    fn in_memory_paths_are_detected() {
        assert!(is_in_memory_path(":memory:"));
        assert!(is_in_memory_path("file::memory:?cache=shared"));
        assert!(is_in_memory_path("file:bench?mode=memory&cache=shared"));
        assert!(!is_in_memory_path("file:/tmp/bench.db"));
    }

    #[test]
    fn uri_target_keeps_dsn_args_and_debug_redacts_key() {
        let opts = DatabaseOptions::new("file:bench.db", "k").with_dsn_args("?cache=private");
        assert_eq!(opts.target(), "file:bench.db?cache=private");
        assert!(!format!("{opts:?}").contains("\"k\""));
    }
}
