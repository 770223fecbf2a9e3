use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Step of the insert unit that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStage {
    Begin,
    Prepare,
    Execute,
    Commit,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WriteStage::Begin => "begin",
            WriteStage::Prepare => "prepare",
            WriteStage::Execute => "exec",
            WriteStage::Commit => "commit",
        };
        f.write_str(label)
    }
}

/// Step of the select unit that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStage {
    Query,
    Scan,
}

impl fmt::Display for ReadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadStage::Query => f.write_str("query"),
            ReadStage::Scan => f.write_str("scan"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("failed to open database handle: {0}")]
    Open(#[source] rusqlite::Error),

    #[error("failed to set key pragma: {0}")]
    KeyRejected(#[source] rusqlite::Error),

    #[error("failed to apply PRAGMA {pragma}: {source}")]
    Pragma {
        pragma: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("unable to set journal_mode to WAL. actual mode {actual}")]
    ModeMismatch { actual: String },

    #[error("write failed at {stage}: {source}")]
    Write {
        stage: WriteStage,
        #[source]
        source: rusqlite::Error,
    },

    #[error("read failed at {stage}: {source}")]
    Read {
        stage: ReadStage,
        #[source]
        source: rusqlite::Error,
    },

    #[error("cleanup failed: {0}")]
    Cleanup(#[source] rusqlite::Error),

    #[error("timed out after {0:?} waiting for a pooled handle")]
    CheckoutTimeout(Duration),

    #[error("handle pool is closed")]
    PoolClosed,

    #[error("handle pool is full (capacity {capacity})")]
    PoolFull { capacity: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl BenchError {
    pub(crate) fn write(stage: WriteStage) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| BenchError::Write { stage, source }
    }

    pub(crate) fn read(stage: ReadStage) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| BenchError::Read { stage, source }
    }

    pub(crate) fn pragma(pragma: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| BenchError::Pragma { pragma, source }
    }
}
