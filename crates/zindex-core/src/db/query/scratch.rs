use crate::db::store::SortedSetStore;
use std::{
    sync::{LazyLock, Mutex, PoisonError},
    time::Duration,
};
use tracing::warn;
use ulid::{Generator, Ulid};

///
/// GENERATOR is lazily initiated with a Mutex
/// it has to keep state so scratch keys issued in the same millisecond
/// still sort in issue order
///

static GENERATOR: LazyLock<Mutex<Generator>> = LazyLock::new(|| Mutex::new(Generator::new()));

/// Next monotonic ULID; falls back to a fresh random one if the
/// per-millisecond sequence overflows.
fn next_ulid() -> Ulid {
    let mut generator = GENERATOR.lock().unwrap_or_else(PoisonError::into_inner);

    generator.generate().unwrap_or_else(|_| Ulid::new())
}

///
/// ScratchKeys
///
/// Issues and tracks the ephemeral structures of one query execution.
/// Keys are `{prefix}:{model}:{ulid}`; every issued key is deleted by
/// `cleanup`, and each one also carries a TTL once written.
///

#[derive(Debug)]
pub struct ScratchKeys {
    namespace: String,
    ttl: Duration,
    issued: Vec<String>,
}

impl ScratchKeys {
    #[must_use]
    pub fn new(prefix: &str, model: &str, ttl: Duration) -> Self {
        Self {
            namespace: format!("{prefix}:{model}"),
            ttl,
            issued: Vec::new(),
        }
    }

    /// Issue a fresh key and remember it for cleanup.
    pub fn issue(&mut self) -> String {
        let key = format!("{}:{}", self.namespace, next_ulid());
        self.issued.push(key.clone());

        key
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn issued(&self) -> &[String] {
        &self.issued
    }

    /// Best-effort delete of every issued key. A failure is logged and left
    /// to the TTL.
    pub fn cleanup<S: SortedSetStore + ?Sized>(self, store: &S) {
        if self.issued.is_empty() {
            return;
        }

        if let Err(err) = store.delete(&self.issued) {
            warn!(
                keys = self.issued.len(),
                error = %err,
                "scratch cleanup failed; keys will expire"
            );
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::MemoryStore;

    #[test]
    fn issued_keys_are_namespaced_and_monotonic() {
        let mut scratch = ScratchKeys::new("zindex:scratch", "person", Duration::from_secs(60));
        let a = scratch.issue();
        let b = scratch.issue();

        assert!(a.starts_with("zindex:scratch:person:"));
        assert!(a < b);
        assert_eq!(scratch.issued(), &[a, b]);
    }

    #[test]
    fn cleanup_removes_issued_keys_only() {
        let store = MemoryStore::new();
        let mut scratch = ScratchKeys::new("tmp", "person", Duration::from_secs(60));
        let key = scratch.issue();
        store.add(&key, 1.0, b"r1").unwrap();
        store.add("person:age", 1.0, b"r1").unwrap();

        scratch.cleanup(&store);

        assert!(!store.exists(&key));
        assert!(store.exists("person:age"));
    }
}
