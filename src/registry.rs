use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::backend::TryLock;
use crate::outcome::Outcome;

/// A registry mapping string keys to shared lock entries.
///
/// Entries are created lazily on first use of a key and bound weakly: the
/// registry never extends an entry's lifetime, so a lock nobody references
/// is reclaimed once its last in-flight call finishes. Two callers resolving
/// the same key while either is live always converge on the same entry.
pub struct LockRegistry<B: TryLock> {
    entries: Mutex<HashMap<String, Weak<B::Lock>>>,
}

impl<B: TryLock> LockRegistry<B> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the live lock entry for `key`, creating a fresh unheld one if
    /// none exists.
    ///
    /// Concurrent callers racing to create the same key converge on a single
    /// entry; the registry never hands out two distinct live entries for one
    /// key. A slot whose entry has already been reclaimed is replaced by the
    /// fresh entry.
    pub fn get_or_create(&self, key: &str) -> Arc<B::Lock> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(key).and_then(Weak::upgrade) {
            return existing;
        }
        let fresh = Arc::new(B::new_lock());
        entries.insert(key.to_owned(), Arc::downgrade(&fresh));
        trace!(key, "created lock entry");
        fresh
    }

    /// Runs `fut` while holding the lock for `key`, or skips it entirely.
    ///
    /// The lock is acquired with a non-blocking try-acquire: if it is already
    /// held, `fut` is dropped unpolled and [`Outcome::Skipped`] is returned
    /// immediately. Otherwise `fut` runs to completion under the lock and its
    /// output is returned in [`Outcome::Completed`]. The lock is released on
    /// every exit path, including cancellation of the returned future.
    pub async fn run_or_skip<F>(&self, key: impl AsRef<str>, fut: F) -> Outcome<F::Output>
    where
        F: Future,
    {
        let key = key.as_ref();
        let entry = self.get_or_create(key);
        let Some(inner) = B::try_lock(&entry) else {
            debug!(key, "lock held, skipping call");
            return Outcome::Skipped;
        };
        let _guard = EntryGuard {
            registry: self,
            key,
            entry,
            _inner: inner,
        };
        Outcome::Completed(fut.await)
    }

    #[cfg(test)]
    fn registry_len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl<B: TryLock> Default for LockRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped acquisition of one registry entry. Dropping it releases the lock
/// and removes the registry slot if no other call references the entry.
struct EntryGuard<'r, B: TryLock> {
    registry: &'r LockRegistry<B>,
    key: &'r str,
    entry: Arc<B::Lock>,
    _inner: B::Guard,
}

impl<B: TryLock> Drop for EntryGuard<'_, B> {
    fn drop(&mut self) {
        let mut entries = self.registry.entries.lock();
        // If the strong count is 1, this guard holds the only reference to
        // the entry (the registry's binding is weak), so the slot can be
        // removed. Upgrades happen under the same map lock, so no concurrent
        // caller can resurrect the entry between the check and the removal.
        if Arc::strong_count(&self.entry) == 1 {
            entries.remove(self.key);
            trace!(key = self.key, "reclaimed lock entry");
        }
    }
}
