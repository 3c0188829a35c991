//! Per-key mutual exclusion for install state changes.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::ledger::LedgerKey;

/// Serializes operations on the same `(skill_id, agent)`; different keys
/// proceed in parallel.
#[derive(Debug, Default)]
pub struct KeyLocks {
    held: Mutex<HashSet<LedgerKey>>,
    released: Condvar,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<LedgerKey>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Block until `key` is free, then hold it until the guard drops.
    pub fn lock(&self, key: LedgerKey) -> KeyGuard<'_> {
        let mut held = self.held();
        while held.contains(&key) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        held.insert(key.clone());
        KeyGuard { locks: self, key }
    }

    pub fn is_locked(&self, key: &LedgerKey) -> bool {
        self.held().contains(key)
    }
}

#[must_use]
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: LedgerKey,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.locks.held().remove(&self.key);
        self.locks.released.notify_all();
    }
}
