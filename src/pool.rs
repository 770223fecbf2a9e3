use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::BenchError;

pub mod lease;

pub use lease::Lease;

/// Bounded store of pre-opened handles.
///
/// Handles are added up front and then borrowed through [`HandlePool::checkout`], which waits
/// until one is idle. A checked-out handle lives in a [`PooledHandle`] guard and goes back to the
/// pool when the guard is dropped, so a handle can never be returned twice or returned to a pool
/// it did not come from.
///
/// There is no fairness beyond the FIFO ordering of the underlying semaphore, and plain
/// `checkout` never times out.
pub struct HandlePool<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    slots: Mutex<Slots<T>>,
    permits: Arc<Semaphore>,
    capacity: usize,
    checked_out: AtomicUsize,
    peak_checked_out: AtomicUsize,
}

struct Slots<T> {
    idle: VecDeque<T>,
    size: usize,
}

impl<T> Shared<T> {
    fn slots(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub capacity: usize,
    /// Handles owned by the pool, idle or checked out.
    pub size: usize,
    pub available: usize,
    pub checked_out: usize,
    pub peak_checked_out: usize,
}

impl<T> HandlePool<T> {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                slots: Mutex::new(Slots {
                    idle: VecDeque::with_capacity(capacity),
                    size: 0,
                }),
                permits: Arc::new(Semaphore::new(0)),
                capacity,
                checked_out: AtomicUsize::new(0),
                peak_checked_out: AtomicUsize::new(0),
            }),
        }
    }

    /// Pool sized to exactly the given handles.
    #[must_use]
    pub fn from_handles(handles: Vec<T>) -> Self {
        let pool = Self::with_capacity(handles.len());
        {
            let mut slots = pool.shared.slots();
            slots.size = handles.len();
            slots.idle.extend(handles);
        }
        pool.shared.permits.add_permits(pool.shared.capacity);
        pool
    }

    /// Hand a new handle to the pool.
    ///
    /// # Errors
    /// Returns [`BenchError::PoolFull`] once the pool owns `capacity` handles, and
    /// [`BenchError::PoolClosed`] after [`HandlePool::close`].
    pub fn add(&self, handle: T) -> Result<(), BenchError> {
        if self.is_closed() {
            return Err(BenchError::PoolClosed);
        }
        {
            let mut slots = self.shared.slots();
            if slots.size >= self.shared.capacity {
                return Err(BenchError::PoolFull {
                    capacity: self.shared.capacity,
                });
            }
            slots.size += 1;
            slots.idle.push_back(handle);
        }
        self.shared.permits.add_permits(1);
        Ok(())
    }

    /// Wait until a handle is idle and take it.
    ///
    /// # Errors
    /// Returns [`BenchError::PoolClosed`] if the pool is closed while waiting.
    pub async fn checkout(&self) -> Result<PooledHandle<T>, BenchError> {
        let permit = Arc::clone(&self.shared.permits)
            .acquire_owned()
            .await
            .map_err(|_| BenchError::PoolClosed)?;
        self.take(permit)
    }

    /// Like [`HandlePool::checkout`], giving up after `timeout`.
    ///
    /// # Errors
    /// Returns [`BenchError::CheckoutTimeout`] on expiry or [`BenchError::PoolClosed`].
    pub async fn checkout_timeout(&self, timeout: Duration) -> Result<PooledHandle<T>, BenchError> {
        tokio::time::timeout(timeout, self.checkout())
            .await
            .map_err(|_| BenchError::CheckoutTimeout(timeout))?
    }

    /// Checkout bounded by `timeout` when one is given, unbounded otherwise.
    ///
    /// # Errors
    /// See [`HandlePool::checkout_timeout`].
    pub async fn timeout_get(
        &self,
        timeout: Option<Duration>,
    ) -> Result<PooledHandle<T>, BenchError> {
        match timeout {
            Some(timeout) => self.checkout_timeout(timeout).await,
            None => self.checkout().await,
        }
    }

    /// Take an idle handle without waiting.
    #[must_use]
    pub fn try_checkout(&self) -> Option<PooledHandle<T>> {
        let permit = Arc::clone(&self.shared.permits).try_acquire_owned().ok()?;
        self.take(permit).ok()
    }

    fn take(&self, permit: OwnedSemaphorePermit) -> Result<PooledHandle<T>, BenchError> {
        let handle = self.shared.slots().idle.pop_front();
        // only a concurrent drain can leave a permit without a handle
        let Some(handle) = handle else {
            permit.forget();
            return Err(BenchError::PoolClosed);
        };
        let now = self.shared.checked_out.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared
            .peak_checked_out
            .fetch_max(now, Ordering::AcqRel);
        Ok(PooledHandle {
            handle: Some(handle),
            pool: Arc::clone(&self.shared),
            _permit: permit,
        })
    }

    /// Reject further checkouts and wake every waiter with [`BenchError::PoolClosed`].
    pub fn close(&self) {
        self.shared.permits.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.permits.is_closed()
    }

    /// Close the pool and take every idle handle out of it.
    ///
    /// Handles still checked out come back to the closed pool and are dropped with it.
    pub fn drain(&self) -> Vec<T> {
        self.close();
        let mut slots = self.shared.slots();
        let drained: Vec<T> = slots.idle.drain(..).collect();
        slots.size -= drained.len();
        drained
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let slots = self.shared.slots();
        PoolStatus {
            capacity: self.shared.capacity,
            size: slots.size,
            available: slots.idle.len(),
            checked_out: self.shared.checked_out.load(Ordering::Acquire),
            peak_checked_out: self.shared.peak_checked_out.load(Ordering::Acquire),
        }
    }
}

impl<T> Clone for HandlePool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for HandlePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlePool")
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A handle checked out of a [`HandlePool`]. Dropping it checks the handle back in.
pub struct PooledHandle<T> {
    handle: Option<T>,
    pool: Arc<Shared<T>>,
    _permit: OwnedSemaphorePermit,
}

impl<T> PooledHandle<T> {
    /// Return the handle to its pool now rather than at end of scope.
    pub fn checkin(self) {
        drop(self);
    }
}

impl<T> Deref for PooledHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.handle
            .as_ref()
            .unwrap_or_else(|| unreachable!("pooled handle is only taken in drop"))
    }
}

impl<T> DerefMut for PooledHandle<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.handle
            .as_mut()
            .unwrap_or_else(|| unreachable!("pooled handle is only taken in drop"))
    }
}

impl<T> Drop for PooledHandle<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.slots().idle.push_back(handle);
            self.pool.checked_out.fetch_sub(1, Ordering::AcqRel);
        }
        // the permit is released after this, once the handle is idle again
    }
}

impl<T: fmt::Debug> fmt::Debug for PooledHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PooledHandle").field(&self.handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn checkout_and_checkin_track_availability() {
        let pool = HandlePool::from_handles(vec![1_usize, 2]);
        assert_eq!(pool.status().available, 2);

        let first = pool.checkout().await.unwrap();
        let second = pool.checkout().await.unwrap();
        assert_eq!((*first, *second), (1, 2));
        assert!(pool.try_checkout().is_none());
        assert_eq!(pool.status().checked_out, 2);

        first.checkin();
        let status = pool.status();
        assert_eq!(status.available, 1);
        assert_eq!(status.checked_out, 1);
        assert_eq!(status.peak_checked_out, 2);
        drop(second);
        assert_eq!(pool.status().available, 2);
    }

    #[tokio::test]
    async fn add_beyond_capacity_is_rejected() {
        let pool = HandlePool::with_capacity(1);
        pool.add("a").unwrap();
        assert!(matches!(
            pool.add("b"),
            Err(BenchError::PoolFull { capacity: 1 })
        ));
        assert_eq!(pool.status().size, 1);
    }

    #[tokio::test]
    async fn empty_pool_times_out() {
        let pool: HandlePool<u8> = HandlePool::with_capacity(1);
        let result = pool.checkout_timeout(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(BenchError::CheckoutTimeout(_))));
    }

    #[tokio::test]
    async fn waiter_wakes_on_checkin() {
        let pool = HandlePool::from_handles(vec![7_u8]);
        let held = pool.checkout().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { *pool.checkout().await.unwrap() })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(held);
        assert_eq!(waiter.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn close_wakes_waiters_and_drain_returns_idle() {
        let pool = HandlePool::from_handles(vec![1_u8, 2]);
        let held = pool.checkout().await.unwrap();
        let _other = pool.checkout().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.checkout().await.map(|h| *h) })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(held);
        let drained_before = pool.status().available;
        let drained = pool.drain();
        assert!(drained.len() <= drained_before);
        // the waiter either got the returned handle before the drain or saw the close
        match waiter.await.unwrap() {
            Ok(value) => assert_eq!(value, 1),
            Err(err) => assert!(matches!(err, BenchError::PoolClosed)),
        }
        assert!(matches!(pool.checkout().await, Err(BenchError::PoolClosed)));
        assert!(matches!(pool.add(3), Err(BenchError::PoolClosed)));
    }
}
