use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use sqlcipher_pool_bench::config::{
    BenchConfig, DEFAULT_BUSY_TIMEOUT, DEFAULT_KDF_ITERATIONS, DEFAULT_PAYLOAD_SIZE,
    DatabaseOptions, parse_pool_sizes,
};
use sqlcipher_pool_bench::BenchError;

#[derive(Parser, Debug)]
#[command(author, version, about = "Pooled SQLCipher read/write throughput benchmark")]
pub(crate) struct Args {
    /// Pool sizes to run, one run each. Ex: 1,2,3,4,5
    #[arg(long, default_value = "1")]
    pub(crate) pool_size: String,
    #[arg(long, default_value_t = 100)]
    pub(crate) writes: usize,
    #[arg(long, default_value_t = 100)]
    pub(crate) reads: usize,
    /// Writing is done on a single, dedicated handle (0 or 1)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub(crate) write_on_dedicated_channel: u8,
    /// Appended verbatim to the database path. Ex: ?cache=private
    #[arg(long, default_value = "")]
    pub(crate) db_dns_args: String,
    /// Max rows to select
    #[arg(long, default_value_t = 100)]
    pub(crate) max_rows: u32,
    #[arg(long, env = "BENCH_DB_PATH")]
    pub(crate) db_path: String,
    #[arg(long, env = "BENCH_DB_KEY", hide_env_values = true)]
    pub(crate) key: String,
    #[arg(long, default_value_t = DEFAULT_KDF_ITERATIONS)]
    pub(crate) kdf_iter: u32,
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) busy_timeout: Option<Duration>,
    /// Give up on a pool checkout after this long instead of waiting forever
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) checkout_timeout: Option<Duration>,
    #[arg(long, default_value_t = DEFAULT_PAYLOAD_SIZE)]
    pub(crate) payload_size: usize,
    #[arg(long)]
    pub(crate) payload_seed: Option<u64>,
    /// Print run reports as JSON once all runs finish
    #[arg(long)]
    pub(crate) json: bool,
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    #[arg(long)]
    pub(crate) verbose: bool,
}

impl Args {
    pub(crate) fn pool_sizes(&self) -> Result<Vec<usize>, BenchError> {
        parse_pool_sizes(&self.pool_size)
    }

    /// Base configuration; the pool size is replaced per run.
    pub(crate) fn bench_config(&self) -> Result<BenchConfig, BenchError> {
        let database = DatabaseOptions::new(self.db_path.clone(), self.key.clone())
            .with_dsn_args(self.db_dns_args.clone())
            .with_kdf_iterations(self.kdf_iter)
            .with_busy_timeout(self.busy_timeout.unwrap_or(DEFAULT_BUSY_TIMEOUT));

        BenchConfig::builder(database)
            .writes(self.writes)
            .reads(self.reads)
            .max_rows(self.max_rows)
            .write_on_dedicated_channel(self.write_on_dedicated_channel == 1)
            .checkout_timeout(self.checkout_timeout)
            .payload_size(self.payload_size)
            .payload_seed(self.payload_seed)
            .build()
    }
}
