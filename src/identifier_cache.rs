// Process-lifetime cache of provider place identifiers
// Sits between the orchestrator and the rate-limited, billed lookup endpoints

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

// Identifier namespaces; values from one provider are meaningless to the other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    FlightEntity,
    HotelGeo,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::FlightEntity => write!(f, "flight entity id"),
            Namespace::HotelGeo => write!(f, "hotel geo id"),
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hit_count: AtomicUsize,
    pub miss_count: AtomicUsize,
    pub insert_count: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStatsReport {
    pub flight_entries: usize,
    pub hotel_entries: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub insert_count: usize,
}

/// Trims surrounding whitespace; the result is the cache key and the lookup query.
pub fn normalize_city(city: &str) -> String {
    city.trim().to_string()
}

pub fn create_cache_key(namespace: Namespace, city: &str) -> (Namespace, String) {
    (namespace, normalize_city(city))
}

/// Write-once identifier store shared by every pipeline.
///
/// Entries are never refreshed, evicted or invalidated. If a provider changes
/// the identifier for a place, this cache keeps serving the old one until the
/// process exits.
#[derive(Debug, Default)]
pub struct IdentifierCache {
    entries: DashMap<(Namespace, String), String>,
    // One lock per key serialises read-or-fetch-then-write for that key
    fill_locks: DashMap<(Namespace, String), Arc<Mutex<()>>>,
    stats: CacheStats,
}

impl IdentifierCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: Namespace, city: &str) -> Option<String> {
        let key = create_cache_key(namespace, city);
        match self.entries.get(&key) {
            Some(entry) => {
                self.stats.hit_count.fetch_add(1, Ordering::SeqCst);
                Some(entry.value().clone())
            }
            None => {
                self.stats.miss_count.fetch_add(1, Ordering::SeqCst);
                None
            }
        }
    }

    // Read without touching the hit/miss counters
    pub(crate) fn peek(&self, namespace: Namespace, city: &str) -> Option<String> {
        self.entries
            .get(&create_cache_key(namespace, city))
            .map(|entry| entry.value().clone())
    }

    /// Stores an identifier unless the key is already present.
    ///
    /// Returns the identifier that is cached afterwards, which is the earlier
    /// value when the key was already filled.
    pub fn insert(&self, namespace: Namespace, city: &str, identifier: String) -> String {
        let key = create_cache_key(namespace, city);
        let entry = self.entries.entry(key).or_insert_with(|| {
            self.stats.insert_count.fetch_add(1, Ordering::SeqCst);
            identifier
        });
        entry.value().clone()
    }

    pub(crate) fn fill_lock(&self, namespace: Namespace, city: &str) -> Arc<Mutex<()>> {
        let key = create_cache_key(namespace, city);
        self.fill_locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    // Drops the key's lock once no task holds or waits on it
    pub(crate) fn release_fill_lock(&self, namespace: Namespace, city: &str) {
        let key = create_cache_key(namespace, city);
        self.fill_locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub(crate) fn pending_fills(&self) -> usize {
        self.fill_locks.len()
    }

    pub fn len(&self, namespace: Namespace) -> usize {
        self.entries.iter().filter(|e| e.key().0 == namespace).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            flight_entries: self.len(Namespace::FlightEntity),
            hotel_entries: self.len(Namespace::HotelGeo),
            hit_count: self.stats.hit_count.load(Ordering::SeqCst),
            miss_count: self.stats.miss_count.load(Ordering::SeqCst),
            insert_count: self.stats.insert_count.load(Ordering::SeqCst),
        }
    }
}
