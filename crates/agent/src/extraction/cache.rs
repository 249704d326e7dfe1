//! Bounded TTL cache for extraction results
//!
//! Keys are canonical transcript keys (case, Twi vowels and punctuation
//! folded), so "How much for tilapia?" and "how much for Tilapia" share an
//! entry. Expiry and eviction happen under the same lock as the lookup.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use voice_ledger_text_processing::text::canonical_key;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Bounded cache; the oldest entry is evicted when full
pub struct ExtractionCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    capacity: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> ExtractionCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache key for a transcript
    pub fn key(transcript: &str) -> String {
        canonical_key(transcript)
    }

    pub fn get(&self, transcript: &str) -> Option<V> {
        self.get_at(transcript, Instant::now())
    }

    pub fn insert(&self, transcript: &str, value: V) {
        self.insert_at(transcript, value, Instant::now());
    }

    /// Drop the entry for a transcript; returns whether one existed
    pub fn invalidate(&self, transcript: &str) -> bool {
        self.entries.lock().remove(&Self::key(transcript)).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn get_at(&self, transcript: &str, now: Instant) -> Option<V> {
        let key = Self::key(transcript);
        let mut entries = self.entries.lock();

        let expired = match entries.get(&key) {
            Some(entry) if now.duration_since(entry.inserted_at) <= self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            },
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(&key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn insert_at(&self, transcript: &str, value: V, now: Instant) {
        let key = Self::key(transcript);
        let mut entries = self.entries.lock();

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let ttl = self.ttl;
            entries.retain(|_, entry| now.duration_since(entry.inserted_at) <= ttl);

            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.inserted_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
            },
        );
    }
}
