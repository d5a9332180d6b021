//! # Key Cache
//!
//! Memoizes the conversion of a hashable token into its canonical immutable
//! value, so repeated conversions of the same logical key share one stored
//! value instead of allocating a fresh one each time.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                     KeyCache<K, V, F>                        │
//!   │                                                              │
//!   │   canonicalize: F  (pure, cheap: &K -> V, called on miss)    │
//!   │                                                              │
//!   │   Mutex<CacheState>                                          │
//!   │   ┌────────────────────────────────────────────────────────┐ │
//!   │   │  FxHashMap<K, CacheSlot>                               │ │
//!   │   │  ┌─────────┬──────────────┬──────┐                     │ │
//!   │   │  │  Token  │   Arc<V>     │ hits │                     │ │
//!   │   │  ├─────────┼──────────────┼──────┤                     │ │
//!   │   │  │ status  │ "status"     │  15  │ ← hot, survives     │ │
//!   │   │  │ user_id │ "user_id"    │   3  │                     │ │
//!   │   │  │ flags   │ "flags"      │   1  │ ← cold, LFU victim  │ │
//!   │   │  └─────────┴──────────────┴──────┘                     │ │
//!   │   │  capacity, closed, cleanup_runs                        │ │
//!   │   └────────────────────────────────────────────────────────┘ │
//!   │                                                              │
//!   │   MaintenanceTask: every trim_interval, decay entry count    │
//!   │   to max(capacity / 2, min_floor), lowest hits first         │
//!   └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Operations
//!
//! | Method          | Complexity | Description                                |
//! |-----------------|------------|--------------------------------------------|
//! | `get_or_create` | O(1)*      | Hit: bump hits, share value; miss: insert  |
//! | `resolve`       | O(1)*      | Pass canonical input through untouched     |
//! | `get`           | O(1)       | Hit-only lookup, bumps hits                |
//! | `contains`      | O(1)       | Membership test, no statistics mutation    |
//! | `frequency`     | O(1)       | Hit count observer, no mutation            |
//! | `invalidate`    | O(1)       | Remove one entry                           |
//! | `warm_up`       | O(k)       | `get_or_create` for each token             |
//! | `resize`        | O(n log n) | Shrink evicts lowest hit counts first      |
//! | `stats`         | O(n)       | Snapshot incl. most-accessed token         |
//! | `clear`         | O(n)       | Drop all entries and counters              |
//!
//! \* a miss at capacity triggers an O(n) scan for the lowest-hits victim;
//! the scan is retained deliberately, matching the small capacities this
//! cache is built for.
//!
//! ## Eviction
//!
//! Least-frequently-used: the single entry with the lowest hit count is
//! evicted when an insert would exceed capacity. Ties break toward the first
//! entry encountered in map iteration; `FxHashMap` iterates deterministically
//! for a given insertion history, so the tie-break is deterministic. The
//! periodic trim is a coarse LFU decay toward `max(capacity / 2, min_floor)`
//! rather than precise recency tracking.
//!
//! ## Invariants
//!
//! - `entries.len() <= capacity` at every observation point.
//! - Stored values are immutable and shared as `Arc<V>`; two hits on the same
//!   token return pointer-identical values.
//! - A hit increments the entry's count exactly once; an insert starts the
//!   count at 1.
//!
//! ## Thread Safety
//!
//! One mutex serializes the entry map and counters. Canonicalization is
//! contractually pure and cheap, so a miss computes it inside the critical
//! section while constructing the entry.
//!
//! ## Shutdown
//!
//! `shutdown` is terminal and idempotent. Afterwards the cache degrades to
//! pass-through canonicalization: lookups compute fresh values and retain
//! nothing.

use std::fmt;
use std::hash::Hash;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::config::KeyCacheConfig;
use crate::error::ConfigError;
use crate::maintenance::MaintenanceTask;

/// Input to [`KeyCache::resolve`]: either a token to canonicalize or a value
/// that already is canonical.
///
/// Already-canonical inputs pass through unchanged with no cache interaction.
#[derive(Debug, Clone)]
pub enum KeyInput<K, V> {
    /// A hashable token whose canonical form is memoized.
    Token(K),
    /// An already-canonical value; returned as-is.
    Canonical(Arc<V>),
}

/// One-lock snapshot of cache counters and gauges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCacheStats<K> {
    /// Entries currently cached.
    pub len: usize,
    /// Maximum entries retained.
    pub capacity: usize,
    /// Sum of all live entries' hit counters.
    pub total_accesses: u64,
    /// The most-accessed token and its hit count, if any entries exist.
    pub most_accessed: Option<(K, u64)>,
    /// Maintenance passes executed (including passes with nothing to trim).
    pub cleanup_runs: u64,
}

#[derive(Debug)]
struct CacheSlot<V> {
    value: Arc<V>,
    hits: u64,
}

#[derive(Debug)]
struct CacheState<K, V> {
    entries: FxHashMap<K, CacheSlot<V>>,
    capacity: usize,
    closed: bool,
    cleanup_runs: u64,
}

impl<K, V> CacheState<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Removes the entry with the strictly lowest hit count; ties break
    /// toward the first entry encountered in iteration.
    fn evict_lowest(&mut self) -> Option<K> {
        let mut victim: Option<(&K, u64)> = None;
        for (key, slot) in &self.entries {
            match victim {
                Some((_, lowest)) if slot.hits >= lowest => {},
                _ => victim = Some((key, slot.hits)),
            }
        }
        let (key, _) = victim?;
        let key = K::clone(key);
        self.entries.remove(&key);
        Some(key)
    }

    /// Evicts lowest-hit entries until at most `target` remain. Returns the
    /// number of entries removed.
    fn trim_to(&mut self, target: usize) -> usize {
        if self.entries.len() <= target {
            return 0;
        }
        let mut ranked: Vec<(u64, K)> = self
            .entries
            .iter()
            .map(|(key, slot)| (slot.hits, K::clone(key)))
            .collect();
        // Stable sort preserves first-encountered order among equal counts.
        ranked.sort_by_key(|(hits, _)| *hits);

        let excess = self.entries.len() - target;
        for (_, key) in ranked.into_iter().take(excess) {
            self.entries.remove(&key);
        }
        excess
    }
}

#[derive(Debug)]
struct CacheShared<K, V, F> {
    state: Mutex<CacheState<K, V>>,
    canonicalize: F,
    min_floor: usize,
}

impl<K, V, F> CacheShared<K, V, F>
where
    K: Eq + Hash + Clone,
{
    /// Runs one maintenance pass: decay the entry count toward
    /// `max(capacity / 2, min_floor)`.
    fn decay(&self) -> usize {
        let mut state = self.state.lock();
        state.cleanup_runs += 1;
        if state.closed || state.entries.len() <= self.min_floor {
            return 0;
        }
        let target = (state.capacity / 2).max(self.min_floor);
        state.trim_to(target)
    }
}

/// Bounded, thread-safe memoization cache for token canonicalization.
///
/// `F` is the pure canonicalization function applied on a miss. See the
/// module documentation for the architecture and invariants.
pub struct KeyCache<K, V, F>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + Sync + 'static,
    F: Fn(&K) -> V + Send + Sync + 'static,
{
    shared: Arc<CacheShared<K, V, F>>,
    maintenance: Mutex<Option<MaintenanceTask>>,
    shutdown_grace: Duration,
}

impl<K, V, F> KeyCache<K, V, F>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + Sync + 'static,
    F: Fn(&K) -> V + Send + Sync + 'static,
{
    /// Creates a cache with the given canonicalization function and starts
    /// its maintenance task.
    pub fn new(config: KeyCacheConfig, canonicalize: F) -> Result<Self, ConfigError> {
        config.validate()?;

        let shared = Arc::new(CacheShared {
            state: Mutex::new(CacheState {
                entries: FxHashMap::default(),
                capacity: config.capacity,
                closed: false,
                cleanup_runs: 0,
            }),
            canonicalize,
            min_floor: config.min_floor,
        });

        let job_shared = Arc::clone(&shared);
        let task = MaintenanceTask::spawn(
            "key-cache",
            config.trim_interval,
            config.on_maintenance_error.clone(),
            move || {
                job_shared.decay();
                Ok(())
            },
        );

        Ok(Self {
            shared,
            maintenance: Mutex::new(Some(task)),
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// Returns the canonical value for `token`, creating and caching it on a
    /// first miss.
    ///
    /// Hits increment the entry's counter and return the stored value; two
    /// calls with the same token yield pointer-identical `Arc`s. A miss at
    /// capacity evicts the lowest-hit entry first. Never fails.
    pub fn get_or_create(&self, token: &K) -> Arc<V> {
        let mut state = self.shared.state.lock();
        if state.closed {
            drop(state);
            // Degraded mode: canonicalize fresh, retain nothing.
            return Arc::new((self.shared.canonicalize)(token));
        }

        if let Some(slot) = state.entries.get_mut(token) {
            slot.hits += 1;
            return Arc::clone(&slot.value);
        }

        // Canonicalization is contractually pure and cheap, so it runs while
        // constructing the entry.
        let value = Arc::new((self.shared.canonicalize)(token));
        if state.entries.len() >= state.capacity {
            state.evict_lowest();
        }
        state.entries.insert(
            K::clone(token),
            CacheSlot {
                value: Arc::clone(&value),
                hits: 1,
            },
        );
        value
    }

    /// Resolves a [`KeyInput`]: canonical inputs pass through unchanged with
    /// no cache interaction, tokens go through [`Self::get_or_create`].
    pub fn resolve(&self, input: KeyInput<K, V>) -> Arc<V> {
        match input {
            KeyInput::Token(token) => self.get_or_create(&token),
            KeyInput::Canonical(value) => value,
        }
    }

    /// Hit-only lookup: returns the cached value and increments its counter,
    /// or `None` without creating anything.
    pub fn get(&self, token: &K) -> Option<Arc<V>> {
        let mut state = self.shared.state.lock();
        let slot = state.entries.get_mut(token)?;
        slot.hits += 1;
        Some(Arc::clone(&slot.value))
    }

    /// Membership test; does not touch access statistics.
    pub fn contains(&self, token: &K) -> bool {
        self.shared.state.lock().entries.contains_key(token)
    }

    /// Returns the hit count for `token` without mutating it.
    pub fn frequency(&self, token: &K) -> Option<u64> {
        let state = self.shared.state.lock();
        state.entries.get(token).map(|slot| slot.hits)
    }

    /// Removes one entry, returning its value if present.
    pub fn invalidate(&self, token: &K) -> Option<Arc<V>> {
        let mut state = self.shared.state.lock();
        state.entries.remove(token).map(|slot| slot.value)
    }

    /// Pre-populates the cache by canonicalizing each token. Idempotent; the
    /// resulting entry set does not depend on input order.
    pub fn warm_up<I>(&self, tokens: I)
    where
        I: IntoIterator<Item = K>,
    {
        for token in tokens {
            drop(self.get_or_create(&token));
        }
    }

    /// Changes the cache capacity.
    ///
    /// Fails for a capacity below 1; values below the configured floor are
    /// clamped to it. Shrinking evicts lowest-hit entries until the new
    /// capacity holds.
    pub fn resize(&self, capacity: usize) -> Result<(), ConfigError> {
        if capacity < 1 {
            return Err(ConfigError::new("key cache capacity must be >= 1"));
        }
        let effective = capacity.max(self.shared.min_floor);
        let mut state = self.shared.state.lock();
        state.capacity = effective;
        state.trim_to(effective);
        Ok(())
    }

    /// Snapshots size, capacity, access totals, and the most-accessed token
    /// under one lock.
    pub fn stats(&self) -> KeyCacheStats<K> {
        let state = self.shared.state.lock();
        let mut total_accesses = 0;
        let mut most_accessed: Option<(&K, u64)> = None;
        for (key, slot) in &state.entries {
            total_accesses += slot.hits;
            match most_accessed {
                Some((_, highest)) if slot.hits <= highest => {},
                _ => most_accessed = Some((key, slot.hits)),
            }
        }
        KeyCacheStats {
            len: state.entries.len(),
            capacity: state.capacity,
            total_accesses,
            most_accessed: most_accessed.map(|(key, hits)| (K::clone(key), hits)),
            cleanup_runs: state.cleanup_runs,
        }
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Returns `true` if no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().entries.is_empty()
    }

    /// Returns the current capacity.
    pub fn capacity(&self) -> usize {
        self.shared.state.lock().capacity
    }

    /// Returns `true` once the cache has been shut down.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Drops all entries and their counters.
    pub fn clear(&self) {
        let drained = {
            let mut state = self.shared.state.lock();
            mem::take(&mut state.entries)
        };
        drop(drained);
    }

    /// Closes the cache, drops all entries, and stops the maintenance task
    /// within the configured grace period. Idempotent and callable from any
    /// thread.
    ///
    /// After shutdown the cache never fails: `get_or_create` computes fresh
    /// canonical values and retains nothing.
    pub fn shutdown(&self) {
        let drained = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            mem::take(&mut state.entries)
        };
        drop(drained);

        let task = self.maintenance.lock().take();
        if let Some(mut task) = task {
            task.stop(self.shutdown_grace);
        }
    }
}

impl<K, V, F> Drop for KeyCache<K, V, F>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + Sync + 'static,
    F: Fn(&K) -> V + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<K, V, F> fmt::Debug for KeyCache<K, V, F>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + Sync + 'static,
    F: Fn(&K) -> V + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("KeyCache")
            .field("len", &state.entries.len())
            .field("capacity", &state.capacity)
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    type SymbolCache = KeyCache<&'static str, String, fn(&&'static str) -> String>;

    fn canonical(token: &&'static str) -> String {
        token.to_string()
    }

    fn small_cache(capacity: usize, floor: usize) -> SymbolCache {
        KeyCache::new(
            KeyCacheConfig::default()
                .with_capacity(capacity)
                .with_min_floor(floor)
                .with_trim_interval(Duration::from_secs(3600)),
            canonical as fn(&&'static str) -> String,
        )
        .unwrap()
    }

    #[test]
    fn repeated_lookups_share_one_value() {
        let cache = small_cache(8, 1);
        let first = cache.get_or_create(&"status");
        let second = cache.get_or_create(&"status");
        assert!(Arc::ptr_eq(&first, &second), "hits must reuse, not reallocate");
        assert_eq!(*first, "status");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn insert_counts_as_one_access() {
        let cache = small_cache(8, 1);
        drop(cache.get_or_create(&"k"));
        assert_eq!(cache.frequency(&"k"), Some(1));

        drop(cache.get_or_create(&"k"));
        drop(cache.get(&"k"));
        assert_eq!(cache.frequency(&"k"), Some(3));
    }

    #[test]
    fn get_never_creates() {
        let cache = small_cache(8, 1);
        assert!(cache.get(&"missing").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn contains_does_not_mutate_counts() {
        let cache = small_cache(8, 1);
        drop(cache.get_or_create(&"k"));
        assert!(cache.contains(&"k"));
        assert!(!cache.contains(&"other"));
        assert_eq!(cache.frequency(&"k"), Some(1));
    }

    #[test]
    fn canonical_input_passes_through_untouched() {
        let cache = small_cache(8, 1);
        let already = Arc::new("already-canonical".to_string());
        let resolved = cache.resolve(KeyInput::Canonical(Arc::clone(&already)));
        assert!(Arc::ptr_eq(&already, &resolved));
        assert_eq!(cache.len(), 0, "pass-through must not grow the cache");
    }

    #[test]
    fn resolve_token_populates() {
        let cache = small_cache(8, 1);
        let value = cache.resolve(KeyInput::Token("flags"));
        assert_eq!(*value, "flags");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn len_never_exceeds_capacity() {
        let cache: KeyCache<u64, String, _> = KeyCache::new(
            KeyCacheConfig::default()
                .with_capacity(4)
                .with_min_floor(1)
                .with_trim_interval(Duration::from_secs(3600)),
            |token: &u64| token.to_string(),
        )
        .unwrap();

        for token in 0..50_u64 {
            drop(cache.get_or_create(&token));
            assert!(cache.len() <= 4);
        }
    }

    #[test]
    fn insert_at_capacity_evicts_lowest_count() {
        // Capacity 3: A, B, C inserted once each, A accessed five more
        // times, then D arrives. A must survive; one of B/C is evicted.
        let cache = small_cache(3, 1);
        drop(cache.get_or_create(&"a"));
        drop(cache.get_or_create(&"b"));
        drop(cache.get_or_create(&"c"));
        for _ in 0..5 {
            drop(cache.get_or_create(&"a"));
        }

        drop(cache.get_or_create(&"d"));
        assert_eq!(cache.len(), 3);
        assert!(cache.contains(&"a"), "hot entry must survive");
        assert!(cache.contains(&"d"));
        let survivors = usize::from(cache.contains(&"b")) + usize::from(cache.contains(&"c"));
        assert_eq!(survivors, 1, "exactly one cold entry is evicted");
    }

    #[test]
    fn resize_rejects_zero() {
        let cache = small_cache(4, 2);
        assert!(cache.resize(0).is_err());
        assert_eq!(cache.capacity(), 4, "failed resize must not change capacity");
    }

    #[test]
    fn resize_clamps_to_floor() {
        let cache = small_cache(8, 4);
        cache.resize(1).unwrap();
        assert_eq!(cache.capacity(), 4);
    }

    #[test]
    fn shrink_evicts_lowest_counts_first() {
        let cache = small_cache(4, 1);
        drop(cache.get_or_create(&"cold"));
        drop(cache.get_or_create(&"warm"));
        drop(cache.get_or_create(&"hot"));
        drop(cache.get(&"warm"));
        for _ in 0..4 {
            drop(cache.get(&"hot"));
        }

        cache.resize(2).unwrap();
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&"cold"), "lowest count goes first");
        assert!(cache.contains(&"warm"));
        assert!(cache.contains(&"hot"));

        cache.resize(1).unwrap();
        assert!(cache.contains(&"hot"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn warm_up_is_idempotent() {
        let cache = small_cache(8, 1);
        cache.warm_up(["a", "b", "c"]);
        assert_eq!(cache.len(), 3);

        cache.warm_up(["c", "b", "a"]);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.frequency(&"a"), Some(2));
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = small_cache(8, 1);
        let stored = cache.get_or_create(&"k");
        let removed = cache.invalidate(&"k").unwrap();
        assert!(Arc::ptr_eq(&stored, &removed));
        assert!(!cache.contains(&"k"));
        assert!(cache.invalidate(&"k").is_none());
    }

    #[test]
    fn stats_track_totals_and_hottest() {
        let cache = small_cache(8, 1);
        drop(cache.get_or_create(&"a"));
        drop(cache.get_or_create(&"b"));
        drop(cache.get(&"b"));
        drop(cache.get(&"b"));

        let stats = cache.stats();
        assert_eq!(stats.len, 2);
        assert_eq!(stats.capacity, 8);
        assert_eq!(stats.total_accesses, 4);
        assert_eq!(stats.most_accessed, Some(("b", 3)));
    }

    #[test]
    fn clear_drops_entries_and_counters() {
        let cache = small_cache(8, 1);
        cache.warm_up(["a", "b"]);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().total_accesses, 0);
        assert_eq!(cache.stats().most_accessed, None);
    }

    #[test]
    fn shutdown_is_idempotent_and_bounded() {
        let cache = small_cache(8, 1);
        cache.warm_up(["a", "b"]);

        let start = Instant::now();
        cache.shutdown();
        cache.shutdown();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(cache.is_closed());
        assert!(cache.is_empty());
    }

    #[test]
    fn closed_cache_degrades_to_pass_through() {
        let cache = small_cache(8, 1);
        cache.shutdown();

        let first = cache.get_or_create(&"k");
        let second = cache.get_or_create(&"k");
        assert_eq!(*first, "k");
        assert!(!Arc::ptr_eq(&first, &second), "closed cache memoizes nothing");
        assert!(cache.is_empty());
    }

    #[test]
    fn maintenance_decays_toward_half_capacity() {
        let cache: KeyCache<u64, String, _> = KeyCache::new(
            KeyCacheConfig::default()
                .with_capacity(8)
                .with_min_floor(2)
                .with_trim_interval(Duration::from_millis(20)),
            |token: &u64| token.to_string(),
        )
        .unwrap();

        for token in 0..8_u64 {
            drop(cache.get_or_create(&token));
        }
        // Keep a couple of entries hot so the decay has a preference.
        for _ in 0..3 {
            drop(cache.get(&0));
            drop(cache.get(&1));
        }

        std::thread::sleep(Duration::from_millis(200));
        let stats = cache.stats();
        assert_eq!(stats.len, 4, "decay trims to max(capacity / 2, floor)");
        assert!(stats.cleanup_runs >= 1);
        assert!(cache.contains(&0), "hot entries survive the decay");
        assert!(cache.contains(&1));
        cache.shutdown();
    }

    #[test]
    fn decay_respects_floor() {
        let cache: KeyCache<u64, String, _> = KeyCache::new(
            KeyCacheConfig::default()
                .with_capacity(4)
                .with_min_floor(3)
                .with_trim_interval(Duration::from_millis(20)),
            |token: &u64| token.to_string(),
        )
        .unwrap();

        for token in 0..4_u64 {
            drop(cache.get_or_create(&token));
        }
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(cache.len(), 3, "floor wins over capacity / 2");
        cache.shutdown();
    }
}
