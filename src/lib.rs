//! Throughput and failure-rate benchmark for concurrent reads and writes against an encrypted
//! SQLite (SQLCipher) database, over a varying number of pooled connections.
//!
//! A run opens its handles up front, fans every insert and select out as its own task, counts
//! failures, reports throughput, and finally empties the scratch table.
//!
//! ```rust,no_run
//! use sqlcipher_pool_bench::prelude::*;
//!
//! # async fn demo() -> Result<(), BenchError> {
//! let database = DatabaseOptions::new("file:bench.db", "secret")
//!     .with_kdf_iterations(REDUCED_KDF_ITERATIONS);
//! let config = BenchConfig::builder(database)
//!     .writes(10)
//!     .reads(50)
//!     .build()?;
//! for report in run_all(&config, &[1, 2, 4]).await? {
//!     println!("{} qps at pool size {}", report.queries_per_second, report.pool_size);
//! }
//! # Ok(()) }
//! ```

pub mod benchmark;
pub mod cipher;
pub mod config;
pub mod error;
pub mod pool;
#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use benchmark::{RunContext, RunReport, run_all, run_once};
pub use cipher::{CipherConnection, open, open_database};
pub use config::{BenchConfig, BenchConfigBuilder, DatabaseOptions, parse_pool_sizes};
pub use error::BenchError;
pub use pool::{HandlePool, Lease, PoolStatus, PooledHandle};

pub mod prelude {
    pub use crate::benchmark::{
        KindTally, RunContext, RunReport, UnitFailure, UnitKind, count_rows, delete_all, run_all,
        run_once,
    };
    pub use crate::cipher::{CipherConnection, open, open_database};
    pub use crate::config::{
        BenchConfig, BenchConfigBuilder, DEFAULT_KDF_ITERATIONS, DatabaseOptions,
        IN_MEMORY_PATH, REDUCED_KDF_ITERATIONS, parse_pool_sizes,
    };
    pub use crate::error::{BenchError, ReadStage, WriteStage};
    pub use crate::pool::{HandlePool, Lease, PoolStatus, PooledHandle};
}
