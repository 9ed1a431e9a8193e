use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use memstash::domain::StoreMode;
use memstash::domain::response::{DeleteResponse, ExistsResponse, GetResponse, StoreResponse};
use memstash::ports::CacheStore;
use shared::{Error, Result, TtlSecs};
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Time source used to decide whether an entry has expired
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_ms: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        let ms = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Writes between two automatic purges of expired entries
pub const DEFAULT_PURGE_INTERVAL: u64 = 1024;

/// In-process store over a concurrent map with lazy per-entry expiry.
/// Expired entries are dropped when touched, on every
/// [`DEFAULT_PURGE_INTERVAL`]th write, or by [`MemoryStore::purge_expired`].
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
    clock: Arc<dyn Clock>,
    writes: AtomicU64,
    purge_interval: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            writes: AtomicU64::new(0),
            purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }

    /// Purge expired entries every `writes` stores. `0` turns automatic purging off.
    pub fn with_purge_interval(mut self, writes: u64) -> Self {
        self.purge_interval = writes;
        self
    }

    /// Number of entries held, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn maybe_purge(&self) {
        if self.purge_interval == 0 {
            return;
        }
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % self.purge_interval == 0 {
            let purged = self.purge_expired();
            if purged > 0 {
                debug!("Purged {} expired entries after {} writes", purged, writes);
            }
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, stored| !stored.is_expired(now));
        before.saturating_sub(self.entries.len())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryStore {
    fn store(&self, mode: StoreMode, key: &str, value: &str, ttl: TtlSecs) -> Result<StoreResponse> {
        let now = self.clock.now();
        let stored = StoredValue {
            value: value.to_string(),
            expires_at: ttl.as_duration().map(|d| now + d),
        };

        let created = match mode {
            StoreMode::Set => {
                self.entries.insert(key.to_string(), stored);
                true
            }
            StoreMode::Add => match self.entries.entry(key.to_string()) {
                Entry::Occupied(mut occupied) => {
                    if occupied.get().is_expired(now) {
                        occupied.insert(stored);
                        true
                    } else {
                        false
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(stored);
                    true
                }
            },
        };

        self.maybe_purge();
        Ok(StoreResponse::new(created))
    }

    fn get(&self, key: &str) -> Result<GetResponse<String>> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            Some(stored) if !stored.is_expired(now) => {
                return Ok(GetResponse::new(true, stored.value.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, stored| stored.is_expired(now));
        }
        Err(Error::NotFound)
    }

    fn exists(&self, key: &str) -> Result<ExistsResponse> {
        match self.get(key) {
            Ok(_) => Ok(ExistsResponse::new(true)),
            Err(Error::NotFound) => Ok(ExistsResponse::new(false)),
            Err(e) => Err(e),
        }
    }

    fn delete(&self, key: &str) -> Result<DeleteResponse> {
        let now = self.clock.now();
        let deleted = match self.entries.remove(key) {
            Some((_, stored)) => !stored.is_expired(now),
            None => false,
        };
        Ok(DeleteResponse::new(deleted))
    }
}

impl Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entry_count", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstash::{Cache, CacheAdapter, CacheExt};
    use serde::{Deserialize, Serialize};
    use std::thread;

    fn manual_store() -> (Arc<ManualClock>, MemoryStore) {
        let clock = Arc::new(ManualClock::new());
        let store = MemoryStore::with_clock(clock.clone());
        (clock, store)
    }

    #[test]
    fn test_memory_store_set_and_get() {
        let store = MemoryStore::new();

        let resp = store.store(StoreMode::Set, "hello", "world", TtlSecs::NEVER).unwrap();
        assert!(resp.stored);

        let resp = store.get("hello").unwrap();
        assert!(resp.found);
        assert_eq!(resp.value, "world");
    }

    #[test]
    fn test_memory_store_get_nonexistent() {
        let store = MemoryStore::new();

        let result = store.get("nonexistent");
        assert!(matches!(result.unwrap_err(), Error::NotFound));
        assert!(!store.exists("nonexistent").unwrap().exists);
    }

    #[test]
    fn test_memory_store_add_refuses_live_key() {
        let store = MemoryStore::new();

        assert!(store.store(StoreMode::Add, "k", "v1", TtlSecs::NEVER).unwrap().stored);
        assert!(!store.store(StoreMode::Add, "k", "v2", TtlSecs::NEVER).unwrap().stored);
        assert_eq!(store.get("k").unwrap().value, "v1");
    }

    #[test]
    fn test_memory_store_set_overwrites() {
        let store = MemoryStore::new();

        store.store(StoreMode::Set, "k", "v1", TtlSecs::NEVER).unwrap();
        store.store(StoreMode::Set, "k", "v2", TtlSecs::NEVER).unwrap();
        assert_eq!(store.get("k").unwrap().value, "v2");
    }

    #[test]
    fn test_memory_store_ttl_expiry() {
        let (clock, store) = manual_store();

        store.store(StoreMode::Set, "short", "v", TtlSecs(5)).unwrap();
        store.store(StoreMode::Set, "forever", "v", TtlSecs::NEVER).unwrap();

        clock.advance(Duration::from_secs(4));
        assert!(store.get("short").is_ok());

        clock.advance(Duration::from_secs(1));
        assert!(matches!(store.get("short").unwrap_err(), Error::NotFound));

        // ten years later
        clock.advance(Duration::from_secs(10 * 365 * 24 * 60 * 60));
        assert_eq!(store.get("forever").unwrap().value, "v");
    }

    #[test]
    fn test_memory_store_add_replaces_expired_entry() {
        let (clock, store) = manual_store();

        store.store(StoreMode::Add, "k", "old", TtlSecs(1)).unwrap();
        clock.advance(Duration::from_secs(2));

        assert!(store.store(StoreMode::Add, "k", "new", TtlSecs::NEVER).unwrap().stored);
        assert_eq!(store.get("k").unwrap().value, "new");
    }

    #[test]
    fn test_memory_store_delete() {
        let (clock, store) = manual_store();

        store.store(StoreMode::Set, "k", "v", TtlSecs::NEVER).unwrap();
        assert!(store.delete("k").unwrap().deleted);
        assert!(!store.delete("k").unwrap().deleted);

        store.store(StoreMode::Set, "gone", "v", TtlSecs(1)).unwrap();
        clock.advance(Duration::from_secs(1));
        assert!(!store.delete("gone").unwrap().deleted);
    }

    #[test]
    fn test_memory_store_purge_expired() {
        let (clock, store) = manual_store();

        store.store(StoreMode::Set, "a", "v", TtlSecs(1)).unwrap();
        store.store(StoreMode::Set, "b", "v", TtlSecs(10)).unwrap();
        store.store(StoreMode::Set, "c", "v", TtlSecs::NEVER).unwrap();

        clock.advance(Duration::from_secs(5));
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_memory_store_purges_on_write_interval() {
        let clock = Arc::new(ManualClock::new());
        let store = MemoryStore::with_clock(clock.clone()).with_purge_interval(3);

        store.store(StoreMode::Set, "a", "v", TtlSecs(1)).unwrap();
        store.store(StoreMode::Set, "b", "v", TtlSecs(1)).unwrap();
        clock.advance(Duration::from_secs(2));
        assert_eq!(store.len(), 2);

        // third write triggers the purge of both expired, never-read entries
        store.store(StoreMode::Add, "c", "v", TtlSecs::NEVER).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.exists("c").unwrap().exists);
    }

    #[test]
    fn test_memory_store_purge_interval_zero_keeps_expired_entries() {
        let clock = Arc::new(ManualClock::new());
        let store = MemoryStore::with_clock(clock.clone()).with_purge_interval(0);

        for i in 0..10 {
            store.store(StoreMode::Set, &format!("k{}", i), "v", TtlSecs(1)).unwrap();
        }
        clock.advance(Duration::from_secs(2));
        store.store(StoreMode::Set, "last", "v", TtlSecs::NEVER).unwrap();
        assert_eq!(store.len(), 11);
    }

    #[test]
    fn test_memory_store_concurrent_add_has_one_winner() {
        let store = Arc::new(MemoryStore::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    store
                        .store(StoreMode::Add, "race", &format!("writer-{}", i), TtlSecs::NEVER)
                        .unwrap()
                        .stored
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|stored| *stored)
            .count();
        assert_eq!(winners, 1);
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Quote {
        symbol: String,
        price_cents: i64,
    }

    #[test]
    fn test_adapter_over_memory_store() {
        let (clock, store) = manual_store();
        let cache = CacheAdapter::new(Arc::new(store));

        let quote = Quote {
            symbol: "ACME".to_string(),
            price_cents: 12_345,
        };
        assert!(cache.set_json("quote:ACME", &quote, TtlSecs(60)));
        assert!(cache.set("motd", "hello", TtlSecs::NEVER));

        clock.advance(Duration::from_secs(30));
        assert_eq!(cache.get_json::<Quote>("quote:ACME"), Some(quote.clone()));

        clock.advance(Duration::from_secs(30));
        assert_eq!(cache.get_json::<Quote>("quote:ACME"), None);
        assert!(cache.contains("motd"));

        let refreshed = cache.get_or_add_json("quote:ACME", || Some(quote.clone()), TtlSecs(60));
        assert_eq!(refreshed, Some(quote));
        assert!(cache.contains("quote:ACME"));
    }
}
