//! Per-article in-flight locks.
//!
//! Concurrent analysis requests for the same `(site, url)` queue behind one
//! lock, so only the first reaches the model; later holders re-read the row
//! and find it analyzed. Entries are removed once nobody holds or waits for
//! them.

use crate::models::Site;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Key = (Site, String);

#[derive(Debug, Default)]
pub struct InFlight {
    locks: Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

/// Held while an identity is being analysed.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    key: Key,
    _held: OwnedMutexGuard<()>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no one else holds `(site, url)`, then hold it.
    pub async fn acquire(&self, site: Site, url: &str) -> InFlightGuard<'_> {
        let key = (site, url.to_string());
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                locks
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        InFlightGuard {
            owner: self,
            key,
            _held: lock.lock_owned().await,
        }
    }

    /// Number of identities currently held or waited on.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.owner.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // one reference in the map, one in `_held`; anything more is a waiter
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) <= 2)
        {
            locks.remove(&self.key);
        }
    }
}
