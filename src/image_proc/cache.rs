//! In-memory render cache.
//!
//! Only cacheable requests (pinned source, no uniqueness marker) are ever
//! stored. Entries expire after a fixed TTL measured from insertion; hits do
//! not extend it. Expiry and the capacity bound are enforced by a sweep that
//! runs on every cacheable lookup, dropping the oldest entries first.
//!
//! Entries live in an unbounded `LruCache` that is only ever read with
//! `peek`, so its recency order is insertion order and `pop_lru` always
//! yields the oldest render.

use super::params::{EffectScale, ImageRequest};
use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A cached render
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Bytes,
    pub inserted_at: Instant,
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    pub bypasses: u64,
}

/// Fingerprint of a request's normalised fields.
///
/// Absent fields hash as fixed sentinels so they can never collide with a
/// real value.
pub fn fingerprint(request: &ImageRequest) -> String {
    let scale = |s: Option<EffectScale>| {
        s.map_or_else(|| "default".to_string(), |s| s.get().to_string())
    };

    let key = [
        request.width.to_string(),
        request.height.to_string(),
        scale(request.saturation),
        scale(request.blur),
        scale(request.contrast),
        request
            .tint
            .map_or_else(|| "default".to_string(), |t| t.to_hex()),
        request
            .image
            .map_or_else(|| "random".to_string(), |i| i.to_string()),
    ]
    .join("|");

    hex::encode(Sha256::digest(key.as_bytes()))
}

pub struct ImageCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
}

impl ImageCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            ttl,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            bypasses: AtomicU64::new(0),
        }
    }

    /// Look up a request, `None` for misses and non-cacheable requests
    pub fn lookup(&self, request: &ImageRequest) -> Option<Bytes> {
        self.lookup_at(request, Instant::now())
    }

    pub fn lookup_at(&self, request: &ImageRequest, now: Instant) -> Option<Bytes> {
        if !request.is_cacheable() {
            self.bypasses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.sweep_at(now);

        let key = fingerprint(request);
        let entries = self.entries.lock();
        let hit = entries
            .peek(&key)
            .filter(|entry| now.saturating_duration_since(entry.inserted_at) < self.ttl)
            .map(|entry| entry.data.clone());
        drop(entries);

        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Cache HIT for key: {}", key);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Cache MISS for key: {}", key);
        }
        hit
    }

    /// Store a render; non-cacheable requests are ignored
    pub fn store(&self, request: &ImageRequest, data: Bytes) {
        self.store_at(request, data, Instant::now());
    }

    pub fn store_at(&self, request: &ImageRequest, data: Bytes, now: Instant) {
        if !request.is_cacheable() {
            return;
        }

        let entry = CacheEntry {
            data,
            inserted_at: now,
        };
        self.entries.lock().put(fingerprint(request), entry);
    }

    /// Drop expired entries, then the oldest ones beyond capacity
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    pub fn sweep_at(&self, now: Instant) {
        let mut entries = self.entries.lock();

        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.inserted_at) >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        let expired = stale.len();

        let mut evicted = 0;
        while entries.len() > self.max_entries && entries.pop_lru().is_some() {
            evicted += 1;
        }

        if expired > 0 || evicted > 0 {
            tracing::debug!(
                "Cache sweep removed {} expired and {} over-capacity entries, {} remain",
                expired,
                evicted,
                entries.len()
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            max_entries: self.max_entries,
            ttl_secs: self.ttl.as_secs(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_proc::params::Tint;

    const TTL: Duration = Duration::from_secs(60);

    fn cacheable(image: usize) -> ImageRequest {
        ImageRequest {
            image: Some(image),
            ..ImageRequest::new(300, 300)
        }
    }

    #[test]
    fn test_fingerprint_is_pure() {
        let request = ImageRequest {
            saturation: EffectScale::new(3),
            tint: Tint::parse("abc"),
            ..cacheable(5)
        };
        assert_eq!(fingerprint(&request), fingerprint(&request.clone()));
        assert_eq!(fingerprint(&request).len(), 64);
    }

    #[test]
    fn test_fingerprint_sensitive_to_every_field() {
        let base = ImageRequest {
            saturation: EffectScale::new(2),
            blur: EffectScale::new(2),
            contrast: EffectScale::new(2),
            tint: Tint::parse("112233"),
            ..cacheable(1)
        };
        let variants = [
            ImageRequest { width: 301, ..base.clone() },
            ImageRequest { height: 301, ..base.clone() },
            ImageRequest { saturation: EffectScale::new(3), ..base.clone() },
            ImageRequest { saturation: None, ..base.clone() },
            ImageRequest { blur: EffectScale::new(3), ..base.clone() },
            ImageRequest { contrast: EffectScale::new(3), ..base.clone() },
            ImageRequest { tint: Tint::parse("112234"), ..base.clone() },
            ImageRequest { tint: None, ..base.clone() },
            ImageRequest { image: Some(2), ..base.clone() },
        ];

        let base_key = fingerprint(&base);
        for variant in &variants {
            assert_ne!(fingerprint(variant), base_key, "{variant:?}");
        }
    }

    #[test]
    fn test_fingerprint_fields_do_not_shift() {
        let a = ImageRequest { saturation: EffectScale::new(4), ..cacheable(0) };
        let b = ImageRequest { blur: EffectScale::new(4), ..cacheable(0) };
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_ignores_tint_spelling() {
        let upper = ImageRequest { tint: Tint::parse("FF0000"), ..cacheable(0) };
        let short = ImageRequest { tint: Tint::parse("#f00"), ..cacheable(0) };
        assert_eq!(fingerprint(&upper), fingerprint(&short));
    }

    #[test]
    fn test_store_then_lookup_round_trip() {
        let cache = ImageCache::new(TTL, 10);
        let request = cacheable(5);
        let data = Bytes::from_static(b"jpeg bytes");

        cache.store(&request, data.clone());
        assert_eq!(cache.lookup(&request), Some(data));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_lookup_miss_for_unknown_request() {
        let cache = ImageCache::new(TTL, 10);
        cache.store(&cacheable(1), Bytes::from_static(b"one"));
        assert_eq!(cache.lookup(&cacheable(2)), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_ttl_boundary() {
        let cache = ImageCache::new(TTL, 10);
        let request = cacheable(3);
        let t0 = Instant::now();

        cache.store_at(&request, Bytes::from_static(b"x"), t0);
        assert!(cache.lookup_at(&request, t0 + TTL - Duration::from_millis(1)).is_some());
        assert!(cache.lookup_at(&request, t0 + TTL).is_none());
        assert!(cache.is_empty(), "expired entry should be swept");
    }

    #[test]
    fn test_hit_does_not_refresh_ttl() {
        let cache = ImageCache::new(TTL, 10);
        let request = cacheable(3);
        let t0 = Instant::now();

        cache.store_at(&request, Bytes::from_static(b"x"), t0);
        assert!(cache.lookup_at(&request, t0 + TTL / 2).is_some());
        assert!(cache.lookup_at(&request, t0 + TTL).is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let cache = ImageCache::new(TTL, 3);
        let t0 = Instant::now();

        for i in 0..5u64 {
            let inserted_at = t0 + Duration::from_secs(i);
            cache.store_at(&cacheable(i as usize), Bytes::from(vec![i as u8]), inserted_at);
        }
        assert_eq!(cache.len(), 5);

        cache.sweep_at(t0 + Duration::from_secs(5));
        assert_eq!(cache.len(), 3);

        let now = t0 + Duration::from_secs(5);
        assert!(cache.lookup_at(&cacheable(0), now).is_none());
        assert!(cache.lookup_at(&cacheable(1), now).is_none());
        for i in 2..5 {
            assert_eq!(cache.lookup_at(&cacheable(i), now), Some(Bytes::from(vec![i as u8])));
        }
    }

    #[test]
    fn test_hits_do_not_protect_old_entries_from_eviction() {
        let cache = ImageCache::new(TTL, 2);
        let t0 = Instant::now();

        cache.store_at(&cacheable(0), Bytes::from_static(b"zero"), t0);
        cache.store_at(&cacheable(1), Bytes::from_static(b"one"), t0 + Duration::from_secs(1));
        assert!(cache.lookup_at(&cacheable(0), t0 + Duration::from_secs(2)).is_some());

        cache.store_at(&cacheable(2), Bytes::from_static(b"two"), t0 + Duration::from_secs(3));
        cache.sweep_at(t0 + Duration::from_secs(4));

        let now = t0 + Duration::from_secs(4);
        assert!(cache.lookup_at(&cacheable(0), now).is_none());
        assert!(cache.lookup_at(&cacheable(1), now).is_some());
        assert!(cache.lookup_at(&cacheable(2), now).is_some());
    }

    #[test]
    fn test_overwrite_counts_as_newest() {
        let cache = ImageCache::new(TTL, 2);
        let t0 = Instant::now();

        cache.store_at(&cacheable(0), Bytes::from_static(b"a"), t0);
        cache.store_at(&cacheable(1), Bytes::from_static(b"b"), t0 + Duration::from_secs(1));
        cache.store_at(&cacheable(0), Bytes::from_static(b"c"), t0 + Duration::from_secs(2));
        cache.store_at(&cacheable(2), Bytes::from_static(b"d"), t0 + Duration::from_secs(3));
        cache.sweep_at(t0 + Duration::from_secs(4));

        let now = t0 + Duration::from_secs(4);
        assert!(cache.lookup_at(&cacheable(1), now).is_none());
        assert_eq!(cache.lookup_at(&cacheable(0), now), Some(Bytes::from_static(b"c")));
    }

    #[test]
    fn test_sweep_expires_before_capacity_check() {
        let cache = ImageCache::new(TTL, 2);
        let t0 = Instant::now();

        cache.store_at(&cacheable(0), Bytes::from_static(b"old"), t0);
        cache.store_at(&cacheable(1), Bytes::from_static(b"a"), t0 + TTL);
        cache.store_at(&cacheable(2), Bytes::from_static(b"b"), t0 + TTL);

        cache.sweep_at(t0 + TTL + Duration::from_secs(1));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_overwrite_resets_insertion_time() {
        let cache = ImageCache::new(TTL, 10);
        let request = cacheable(4);
        let t0 = Instant::now();

        cache.store_at(&request, Bytes::from_static(b"first"), t0);
        cache.store_at(&request, Bytes::from_static(b"second"), t0 + TTL / 2);

        assert_eq!(
            cache.lookup_at(&request, t0 + TTL),
            Some(Bytes::from_static(b"second"))
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_non_cacheable_requests_never_hit() {
        let cache = ImageCache::new(TTL, 10);
        let random = ImageRequest::new(300, 300);
        let unique = cacheable(2).with_force_unique(42);

        for request in [&random, &unique] {
            cache.store(request, Bytes::from_static(b"x"));
            assert_eq!(cache.lookup(request), None);
            assert_eq!(cache.lookup(request), None);
        }

        assert!(cache.is_empty());
        let stats = cache.stats();
        assert_eq!(stats.bypasses, 4);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }
}
