use std::ops::Deref;

use crate::cipher::CipherConnection;

use super::PooledHandle;

/// The handle a workload unit runs on: borrowed from the pool, or the run's shared handle.
#[derive(Debug)]
pub enum Lease {
    Pooled(PooledHandle<CipherConnection>),
    Shared(CipherConnection),
}

impl Lease {
    #[must_use]
    pub fn handle(&self) -> &CipherConnection {
        match self {
            Lease::Pooled(handle) => &**handle,
            Lease::Shared(handle) => handle,
        }
    }
}

impl Deref for Lease {
    type Target = CipherConnection;

    fn deref(&self) -> &CipherConnection {
        self.handle()
    }
}
