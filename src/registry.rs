//! Handle table for device-owned resources
//!
//! Every resource lives in a `Registry` under a numeric id; the caller holds
//! a `Lease`, the single owner of that id. The entry is removed exactly once,
//! either through `Lease::release` or when the lease is dropped. Looking up
//! an id that is no longer present reports `BufferReleased`.

use crate::error::{AmpereError, Result};
use log::trace;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct Table<T> {
    entries: Mutex<HashMap<u64, T>>,
    next_id: AtomicU64,
    released: AtomicU64,
}

impl<T> Table<T> {
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, T>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64) -> Option<T> {
        let value = self.lock().remove(&id);
        if value.is_some() {
            self.released.fetch_add(1, Ordering::Relaxed);
            trace!("registry release id={id}");
        }
        value
    }
}

/// Shared table of live resources
pub struct Registry<T> {
    table: Arc<Table<T>>,
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Registry {
            table: Arc::clone(&self.table),
        }
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("live", &self.live())
            .field("released", &self.released())
            .finish()
    }
}

impl<T> Registry<T> {
    #[must_use]
    pub fn new() -> Self {
        Registry {
            table: Arc::new(Table {
                entries: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                released: AtomicU64::new(0),
            }),
        }
    }

    /// Store `value` and hand back its owning lease
    pub fn register(&self, value: T) -> Lease<T> {
        let id = self.table.next_id.fetch_add(1, Ordering::Relaxed);
        self.table.lock().insert(id, value);
        trace!("registry register id={id}");
        Lease {
            id,
            table: Arc::clone(&self.table),
            released: false,
        }
    }

    /// Number of entries still owned by a lease
    #[must_use]
    pub fn live(&self) -> usize {
        self.table.lock().len()
    }

    /// Total entries released so far
    #[must_use]
    pub fn released(&self) -> u64 {
        self.table.released.load(Ordering::Relaxed)
    }

    /// Borrow the entry under `id`
    ///
    /// # Errors
    /// `BufferReleased` if the id is not live
    pub fn with<R>(&self, id: u64, f: impl FnOnce(&T) -> R) -> Result<R> {
        let entries = self.table.lock();
        entries
            .get(&id)
            .map(f)
            .ok_or(AmpereError::BufferReleased { id })
    }
}

/// Sole owner of one registry entry
pub struct Lease<T> {
    id: u64,
    table: Arc<Table<T>>,
    released: bool,
}

impl<T> fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease").field("id", &self.id).finish()
    }
}

impl<T> Lease<T> {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let entries = self.table.lock();
        entries
            .get(&self.id)
            .map(f)
            .ok_or(AmpereError::BufferReleased { id: self.id })
    }

    /// Remove the entry now and return it
    pub fn release(mut self) -> Option<T> {
        self.released = true;
        self.table.remove(self.id)
    }
}

impl<T: Clone> Lease<T> {
    /// Clone the entry out of the table
    pub fn get(&self) -> Result<T> {
        self.with(T::clone)
    }
}

impl<T> Drop for Lease<T> {
    fn drop(&mut self) {
        if !self.released {
            self.table.remove(self.id);
        }
    }
}
