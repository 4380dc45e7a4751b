//! A small byte-oriented TTL cache backing the engine's per-`(name,
//! type)` answer sets, modeled on the reference resolver's
//! `SharedCache` wrapper around a mutex-guarded cache.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const MUTEX_POISON_MESSAGE: &str = "cache mutex poisoned - a prior holder panicked while locked";

/// Get/set-with-expiry over opaque byte values. A poisoned lock is
/// treated as unrecoverable and panics, matching the reference
/// resolver's `SharedCache`; cache population failures the engine is
/// expected to shrug off are a higher-level fail-soft concern (see
/// `engine::QueryEngine::populate_and_return`'s callers), not a
/// property of this trait's own locking.
pub trait TtlCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: u32);
}

struct Entry {
    value: Vec<u8>,
    expiry: Instant,
}

/// An in-process `TtlCache`, `Arc<Mutex<HashMap<...>>>`-backed.
#[derive(Default)]
pub struct InMemoryTtlCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryTtlCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TtlCache for InMemoryTtlCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().expect(MUTEX_POISON_MESSAGE);
        match entries.get(key) {
            Some(entry) if entry.expiry > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl_seconds: u32) {
        let mut entries = self.entries.lock().expect(MUTEX_POISON_MESSAGE);
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expiry: Instant::now() + Duration::from_secs(ttl_seconds.into()),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn round_trips_a_value() {
        let cache = InMemoryTtlCache::new();
        cache.set("k", b"v".to_vec(), 60);
        assert_eq!(Some(b"v".to_vec()), cache.get("k"));
    }

    #[test]
    fn expires_after_ttl() {
        let cache = InMemoryTtlCache::new();
        cache.set("k", b"v".to_vec(), 0);
        sleep(Duration::from_millis(10));
        assert_eq!(None, cache.get("k"));
    }

    #[test]
    fn missing_key_is_none() {
        let cache = InMemoryTtlCache::new();
        assert_eq!(None, cache.get("nope"));
    }
}
