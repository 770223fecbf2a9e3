use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::benchmark::cleanup;
use crate::benchmark::payload::{Payload, generate_payload};
use crate::benchmark::report::UnitKind;
use crate::cipher::{CipherConnection, open_database};
use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::pool::{HandlePool, Lease, PoolStatus};

/// Failed-unit counts shared by every unit of a run. Only ever incremented.
#[derive(Debug, Default)]
pub struct FailureCounters {
    failed_writes: AtomicU64,
    failed_reads: AtomicU64,
}

impl FailureCounters {
    pub fn record(&self, kind: UnitKind) {
        let counter = match kind {
            UnitKind::Write => &self.failed_writes,
            UnitKind::Read => &self.failed_reads,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed_reads(&self) -> u64 {
        self.failed_reads.load(Ordering::Relaxed)
    }
}

/// Everything one run needs, built fresh per run and handed to each unit by reference.
#[derive(Debug)]
pub struct RunContext {
    config: BenchConfig,
    pool: HandlePool<CipherConnection>,
    shared: Option<CipherConnection>,
    counters: FailureCounters,
    payload: Payload,
    handles_opened: usize,
    open_elapsed: Duration,
    payload_elapsed: Duration,
}

impl RunContext {
    /// Open the run's handles and generate its payload.
    ///
    /// The shared handle (when the configuration calls for one) is opened first, then the
    /// pooled handles one by one. [`RunContext::open_elapsed`] covers only the handle opens;
    /// the payload is generated afterwards.
    ///
    /// # Errors
    /// Any open failure aborts setup; handles opened so far are dropped.
    pub async fn open(config: BenchConfig) -> Result<Self, BenchError> {
        config.validate()?;

        let started = Instant::now();
        let mut next_id = 0;
        let shared = if config.opens_shared_handle() {
            let handle = open_database(&config.database, next_id).await?;
            next_id += 1;
            Some(handle)
        } else {
            None
        };

        let pool = HandlePool::with_capacity(config.pooled_handle_count());
        for _ in 0..config.pooled_handle_count() {
            let handle = open_database(&config.database, next_id).await?;
            pool.add(handle)?;
            next_id += 1;
        }

        let open_elapsed = started.elapsed();

        let started = Instant::now();
        let payload = generate_payload(config.payload_size, config.payload_seed);
        let payload_elapsed = started.elapsed();
        Ok(Self {
            config,
            pool,
            shared,
            counters: FailureCounters::default(),
            payload,
            handles_opened: next_id,
            open_elapsed,
            payload_elapsed,
        })
    }

    #[must_use]
    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    #[must_use]
    pub fn counters(&self) -> &FailureCounters {
        &self.counters
    }

    #[must_use]
    pub fn payload(&self) -> Payload {
        Payload::clone(&self.payload)
    }

    #[must_use]
    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    #[must_use]
    pub fn shared_handle_id(&self) -> Option<usize> {
        self.shared.as_ref().map(CipherConnection::id)
    }

    #[must_use]
    pub fn handles_opened(&self) -> usize {
        self.handles_opened
    }

    /// Time spent opening and configuring handles.
    #[must_use]
    pub fn open_elapsed(&self) -> Duration {
        self.open_elapsed
    }

    #[must_use]
    pub fn payload_elapsed(&self) -> Duration {
        self.payload_elapsed
    }

    /// Handle for an insert: the shared writer, or one from the pool.
    ///
    /// # Errors
    /// Pool checkout errors ([`BenchError::CheckoutTimeout`], [`BenchError::PoolClosed`]).
    pub async fn writer_lease(&self) -> Result<Lease, BenchError> {
        if self.config.writes_use_shared_handle() {
            self.shared_lease()
        } else {
            self.pooled_lease().await
        }
    }

    /// Handle for a select: from the pool when there is more than one handle.
    ///
    /// # Errors
    /// Pool checkout errors ([`BenchError::CheckoutTimeout`], [`BenchError::PoolClosed`]).
    pub async fn reader_lease(&self) -> Result<Lease, BenchError> {
        if self.config.reads_use_pool() {
            self.pooled_lease().await
        } else {
            self.shared_lease()
        }
    }

    async fn pooled_lease(&self) -> Result<Lease, BenchError> {
        self.pool
            .timeout_get(self.config.checkout_timeout)
            .await
            .map(Lease::Pooled)
    }

    fn shared_lease(&self) -> Result<Lease, BenchError> {
        self.shared
            .clone()
            .map(Lease::Shared)
            .ok_or_else(|| BenchError::ConfigError("run has no shared handle".into()))
    }

    /// Empty the scratch table on the writer's handle. Failures are logged, not returned.
    pub async fn cleanup(&self) -> Option<usize> {
        tracing::info!("Deleting data..");
        let lease = match self.writer_lease().await {
            Ok(lease) => lease,
            Err(err) => {
                tracing::error!("Delete: {err}");
                return None;
            }
        };
        match cleanup::delete_all(&lease).await {
            Ok(deleted) => {
                tracing::debug!(rows = deleted, "deleted scratch rows");
                Some(deleted)
            }
            Err(err) => {
                tracing::error!("Delete: {err}");
                None
            }
        }
    }

    /// Close every handle this run opened.
    pub async fn close(self) {
        for handle in self.pool.drain() {
            handle.close().await;
        }
        if let Some(shared) = self.shared {
            shared.close().await;
        }
    }
}
