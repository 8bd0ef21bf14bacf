//! Module: db::lock
//! Responsibility: in-process mutual exclusion for saves of one record.
//! Does not own: cross-process exclusion; callers sharing a store across
//! processes must provide their own.

use std::{
    collections::HashSet,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
};

type RecordKey = (String, String);

///
/// RecordLocks
///
/// Set of `(model, id)` pairs currently held. Index maintenance reads the
/// old record, computes a transition, and writes it; two concurrent saves
/// of one record would otherwise interleave those steps.
///

#[derive(Debug, Default)]
pub struct RecordLocks {
    held: Mutex<HashSet<RecordKey>>,
    released: Condvar,
}

impl RecordLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `(model, id)` is free, then hold it.
    pub fn lock<'a>(&'a self, model: &str, id: &str) -> RecordGuard<'a> {
        let key = (model.to_string(), id.to_string());
        let mut held = self.held();
        while held.contains(&key) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(key.clone());

        RecordGuard { locks: self, key }
    }

    /// Hold `(model, id)` if it is free; `None` when another save holds it.
    pub fn try_lock<'a>(&'a self, model: &str, id: &str) -> Option<RecordGuard<'a>> {
        let key = (model.to_string(), id.to_string());
        if !self.held().insert(key.clone()) {
            return None;
        }

        Some(RecordGuard { locks: self, key })
    }

    #[must_use]
    pub fn is_locked(&self, model: &str, id: &str) -> bool {
        self.held().contains(&(model.to_string(), id.to_string()))
    }

    fn held(&self) -> MutexGuard<'_, HashSet<RecordKey>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, key: &RecordKey) {
        self.held().remove(key);
        self.released.notify_all();
    }
}

///
/// RecordGuard
///
/// Proof that the holder is the only in-process writer of one record.
/// Released on drop.
///

#[derive(Debug)]
pub struct RecordGuard<'a> {
    locks: &'a RecordLocks,
    key: RecordKey,
}

impl RecordGuard<'_> {
    #[must_use]
    pub fn model(&self) -> &str {
        &self.key.0
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.key.1
    }

    pub(crate) fn is_from(&self, locks: &RecordLocks) -> bool {
        std::ptr::eq(self.locks, locks)
    }
}

impl Drop for RecordGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.key);
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread, time::Duration};

    #[test]
    fn try_lock_fails_while_held_and_succeeds_after_drop() {
        let locks = RecordLocks::new();
        let guard = locks.try_lock("person", "r1").unwrap();

        assert!(locks.try_lock("person", "r1").is_none());
        assert!(locks.try_lock("person", "r2").is_some());
        assert!(locks.try_lock("pet", "r1").is_some());

        drop(guard);
        assert!(!locks.is_locked("person", "r1"));
        assert!(locks.try_lock("person", "r1").is_some());
    }

    #[test]
    fn lock_waits_for_release() {
        let locks = Arc::new(RecordLocks::new());
        let guard = locks.lock("person", "r1");

        let waiter = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                let guard = locks.lock("person", "r1");
                guard.id().to_string()
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        drop(guard);

        assert_eq!(waiter.join().unwrap(), "r1");
        assert!(!locks.is_locked("person", "r1"));
    }
}
