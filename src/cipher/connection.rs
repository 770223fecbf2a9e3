use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::BenchError;

pub(crate) type SharedConnection = Arc<Mutex<rusqlite::Connection>>;

/// An open, keyed SQLCipher connection.
///
/// The driver connection is not safe for concurrent use, so every operation goes through an
/// async mutex: callers queue on the lock without tying up a blocking thread, and the work itself
/// runs on tokio's blocking pool. Clones share the same underlying connection.
#[derive(Clone)]
pub struct CipherConnection {
    id: usize,
    conn: SharedConnection,
}

impl CipherConnection {
    pub(crate) fn new(id: usize, conn: rusqlite::Connection) -> Self {
        Self {
            id,
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Identifier assigned when the handle was opened, unique within a run.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Run synchronous `rusqlite` work on this handle.
    ///
    /// Waits for any in-flight operation on the same handle to finish first.
    ///
    /// # Errors
    /// Returns whatever `func` returns, or [`BenchError::Join`] if the blocking task panicked.
    pub async fn run<F, R>(&self, func: F) -> Result<R, BenchError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, BenchError> + Send + 'static,
        R: Send + 'static,
    {
        let guard = Arc::clone(&self.conn).lock_owned().await;
        tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            func(&mut guard)
        })
        .await?
    }

    /// Close the connection if this is the last reference to it.
    ///
    /// Close failures are logged; the handle is gone either way.
    pub async fn close(self) {
        let id = self.id;
        let Ok(mutex) = Arc::try_unwrap(self.conn) else {
            tracing::debug!(handle = id, "handle still shared; it closes on last drop");
            return;
        };
        let conn = mutex.into_inner();
        match tokio::task::spawn_blocking(move || conn.close()).await {
            Ok(Ok(())) => tracing::debug!(handle = id, "closed handle"),
            Ok(Err((_conn, err))) => tracing::error!(handle = id, "failed to close handle: {err}"),
            Err(err) => tracing::error!(handle = id, "close task failed: {err}"),
        }
    }
}

impl fmt::Debug for CipherConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherConnection")
            .field("id", &self.id)
            .field("shared_refs", &Arc::strong_count(&self.conn))
            .finish()
    }
}
