//! In-Memory Price Cache
//!
//! Thread-safe quote cache shared by concurrent validations.
//! DashMap gives per-shard locking keyed by symbol.
//!
//! Features:
//! - TTL judged against the quote timestamp (300s default)
//! - Symbol normalization (uppercase)
//! - Last-writer-wins on timestamp: an older quote never replaces a newer one
//! - Cache HIT/MISS logging and counters

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::types::PriceQuote;
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::constants::DEFAULT_PRICE_CACHE_TTL_SECS;

/// Quote cache keyed by price symbol
#[derive(Clone, Debug)]
pub struct PriceCache {
    store: Arc<DashMap<String, PriceQuote>>,
    ttl_secs: u64,
    clock: Arc<dyn Clock>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceCache {
    /// Default TTL, system clock
    pub fn new() -> Self {
        Self::with_clock(DEFAULT_PRICE_CACHE_TTL_SECS, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            ttl_secs,
            clock,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current time on the cache's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    #[inline]
    fn normalize_symbol(symbol: &str) -> String {
        symbol.trim().to_ascii_uppercase()
    }

    fn is_fresh(&self, quote: &PriceQuote) -> bool {
        let age = self.clock.now() - quote.timestamp;
        age.num_milliseconds() <= (self.ttl_secs as i64).saturating_mul(1000)
    }

    /// Fresh quote for `symbol`, or `None`. Stale entries are evicted.
    pub fn get(&self, symbol: &str) -> Option<PriceQuote> {
        let key = Self::normalize_symbol(symbol);

        let cached = self.store.get(&key).map(|entry| entry.value().clone());
        match cached {
            Some(quote) if self.is_fresh(&quote) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("✅ PRICE CACHE HIT: {} = ${} ({})", key, quote.price, quote.source_tier.as_str());
                Some(quote)
            }
            Some(_) => {
                // Only drop the entry if it is still the stale one
                self.store.remove_if(&key, |_, q| !self.is_fresh(q));
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📭 PRICE CACHE MISS (expired): {}", key);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📭 PRICE CACHE MISS: {}", key);
                None
            }
        }
    }

    /// Store a quote unless a newer one is already present
    pub fn set(&self, quote: PriceQuote) {
        let key = Self::normalize_symbol(&quote.symbol);
        let ts = quote.timestamp;
        self.store
            .entry(key.clone())
            .and_modify(|existing| {
                if quote.timestamp >= existing.timestamp {
                    *existing = quote.clone();
                }
            })
            .or_insert(quote);
        info!("💾 PRICE CACHE SET: {} @ {} (TTL: {}s)", key, ts.format("%H:%M:%S"), self.ttl_secs);
    }

    /// Drop every expired entry, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, quote| self.is_fresh(quote));
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            info!("🧹 PRICE CACHE CLEANUP: {} expired entries removed", removed);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            entries: self.store.len(),
            hits,
            misses,
            hit_rate,
            ttl_secs: self.ttl_secs,
        }
    }

    pub fn clear(&self) {
        self.store.clear();
        info!("🗑️ PRICE CACHE CLEARED");
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}
