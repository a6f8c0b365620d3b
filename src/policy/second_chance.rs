//! Pool-backed second-chance cache.
//!
//! A bounded cache whose values are constructed from the lookup key on a miss
//! and live in a [`PoolAllocator`] slot. Recency is kept in a
//! [`SecondChanceQueue`]: hits only set a referenced bit, and eviction gives
//! every referenced entry one more trip through the queue before it can be
//! evicted.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                        PoolCache<K, A> Layout                               │
//! │                                                                             │
//! │   queue: SecondChanceQueue<Pooled<dyn KeyProvider<K>>>                      │
//! │                                                                             │
//! │     front                                                   back            │
//! │     ┌─────────┐   ┌─────────┐   ┌─────────┐   ┌─────────┐                   │
//! │     │ "c" r=0 │ ─ │ 42  r=1 │ ─ │ "a" r=0 │ ─ │ 'b' r=1 │                   │
//! │     └────┬────┘   └────┬────┘   └────┬────┘   └────┬────┘                   │
//! │          │             │             │             │      handles           │
//! │          ▼             ▼             ▼             ▼                        │
//! │   allocator: PoolAllocator                                                  │
//! │     ┌──────────────┬──────────────┬──────────────┐                          │
//! │     │ 4 B  [■][□]  │ 8 B  [■][□]  │ 24 B [■][■]  │  arena                   │
//! │     └──────────────┴──────────────┴──────────────┘                          │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm
//!
//! ```text
//! GET<T>(key):
//!   1. Scan queue front to back for an entry with value.matches(key)
//!   2. Hit:  set referenced = true, return value downcast to T
//!   3. Miss: if len == capacity:
//!              while back.referenced: move back to front, referenced = false
//!              destroy back through the allocator
//!            create T::from_key(key) in the allocator, push front, return it
//! ```
//!
//! A single `get` performs at most `capacity` requeues: requeueing clears the
//! bit, so once every entry that was referenced has been moved the back
//! entry is fresh and gets evicted.
//!
//! ## Ownership
//!
//! Every entry owns exactly one slot through its [`Pooled`] handle. The slot
//! goes back to the allocator when the entry is evicted, on
//! [`clear`](PoolCache::clear), or when the cache is dropped.
//!
//! ## Performance Characteristics
//!
//! | Operation  | Time   | Notes                                        |
//! |------------|--------|----------------------------------------------|
//! | `get` hit  | O(n)   | Linear key scan + bit set                    |
//! | `get` miss | O(n)   | Scan + at most `capacity` requeues + alloc   |
//! | `peek`     | O(n)   | Scan only, no bit set                        |
//! | `len`      | O(1)   |                                              |
//!
//! ## Example Usage
//!
//! ```
//! use poolcache::policy::second_chance::PoolCache;
//!
//! let mut cache: PoolCache<str> =
//!     PoolCache::with_pool(2, 256, [size_of::<String>()]).unwrap();
//!
//! cache.get::<String>("A").unwrap();
//! cache.get::<String>("B").unwrap();
//! cache.get::<String>("A").unwrap(); // A referenced
//! cache.get::<String>("C").unwrap(); // B evicted, A requeued
//!
//! assert!(cache.contains("A"));
//! assert!(!cache.contains("B"));
//! assert!(cache.contains("C"));
//! assert_eq!(cache.to_string(), "\"C\"<0> \"A\"<0> \n");
//! ```

use std::any::type_name;
use std::fmt;
use std::ptr::NonNull;

use tracing::{debug, trace, warn};

use crate::ds::{Eviction, SecondChanceQueue};
use crate::error::{AllocError, CacheError, ConfigError, InvariantError};
#[cfg(feature = "metrics")]
use crate::metrics::metrics_impl::PoolCacheMetrics;
#[cfg(feature = "metrics")]
use crate::metrics::snapshot::PoolCacheMetricsSnapshot;
#[cfg(feature = "metrics")]
use crate::metrics::traits::{
    CoreMetricsRecorder, MetricsReset, MetricsSnapshotProvider, SecondChanceMetricsRecorder,
};
use crate::store::handle::Pooled;
use crate::store::pool::PoolAllocator;
use crate::traits::{Allocator, AsAny, KeyProvider};

type Erased<K> = Pooled<dyn KeyProvider<K>>;

/// Diagnostic view of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    /// `Debug` rendering of the stored value.
    pub value: String,
    pub referenced: bool,
    /// Concrete type stored in the entry.
    pub type_name: &'static str,
}

/// Fixed-capacity cache of key-constructed values with second-chance
/// eviction.
///
/// # Type Parameters
///
/// - `K`: Lookup key type; may be unsized (`str`, `[u8]`)
/// - `A`: Storage for the values, [`PoolAllocator`] by default
///
/// Values of several types may share one cache; each `get::<T>` constructs
/// a `T` on a miss and downcasts to `T` on a hit.
pub struct PoolCache<K, A = PoolAllocator>
where
    K: ?Sized + 'static,
    A: Allocator,
{
    queue: SecondChanceQueue<Erased<K>>,
    allocator: A,
    capacity: usize,
    #[cfg(feature = "metrics")]
    metrics: PoolCacheMetrics,
}

impl<K> PoolCache<K, PoolAllocator>
where
    K: ?Sized + fmt::Debug + 'static,
{
    /// Creates a cache together with its pool.
    ///
    /// # Example
    ///
    /// ```
    /// use poolcache::policy::second_chance::PoolCache;
    ///
    /// let cache: PoolCache<u32> = PoolCache::with_pool(8, 64, [4]).unwrap();
    /// assert_eq!(cache.capacity(), 8);
    /// assert!(cache.is_empty());
    /// ```
    pub fn with_pool(
        capacity: usize,
        block_size: usize,
        size_classes: impl IntoIterator<Item = usize>,
    ) -> Result<Self, ConfigError> {
        Self::new(capacity, PoolAllocator::new(block_size, size_classes)?)
    }
}

impl<K, A> PoolCache<K, A>
where
    K: ?Sized + fmt::Debug + 'static,
    A: Allocator,
{
    /// Creates a cache holding at most `capacity` entries in `allocator`.
    ///
    /// Fails if `capacity` is zero.
    pub fn new(capacity: usize, allocator: A) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::new("cache capacity must be > 0"));
        }
        Ok(Self {
            queue: SecondChanceQueue::with_capacity(capacity),
            allocator,
            capacity,
            #[cfg(feature = "metrics")]
            metrics: PoolCacheMetrics::default(),
        })
    }

    /// Returns the entry for `key`, constructing a `T` from the key on a
    /// miss.
    ///
    /// A hit sets the entry's referenced bit without moving it. A miss on a
    /// full cache evicts one entry first (second chance). Allocation failures
    /// are returned unchanged and not retried.
    ///
    /// # Errors
    ///
    /// - [`CacheError::TypeMismatch`] if the entry for `key` holds a type
    ///   other than `T`.
    /// - [`CacheError::Alloc`] if the allocator cannot construct a `T`.
    ///
    /// # Example
    ///
    /// ```
    /// use poolcache::policy::second_chance::PoolCache;
    ///
    /// let mut cache: PoolCache<u64> = PoolCache::with_pool(4, 64, [8]).unwrap();
    /// *cache.get::<u64>(&3).unwrap() += 10;
    /// assert_eq!(*cache.get::<u64>(&3).unwrap(), 13);
    /// ```
    pub fn get<T>(&mut self, key: &K) -> Result<&mut T, CacheError>
    where
        T: KeyProvider<K>,
    {
        if let Some(idx) = self.find(key)? {
            #[cfg(feature = "metrics")]
            self.metrics.record_get_hit();
            trace!(?key, position = idx, "cache hit");

            self.check_type::<T>(idx)?;
            self.queue.mark_referenced(idx);
            return self.value_mut::<T>(idx);
        }

        #[cfg(feature = "metrics")]
        self.metrics.record_get_miss();
        trace!(?key, "cache miss");

        if self.queue.len() >= self.capacity {
            self.evict_one()?;
        }

        let value = match self.allocator.create(T::from_key(key)) {
            Ok(value) => value,
            Err(err) => {
                #[cfg(feature = "metrics")]
                self.metrics.record_alloc_failure();
                debug!(?key, %err, value_type = type_name::<T>(), "cannot construct entry");
                return Err(err.into());
            },
        };
        self.queue.push_front(erase(value));
        #[cfg(feature = "metrics")]
        self.metrics.record_insert_new();

        self.value_mut::<T>(0)
    }

    /// Looks up `key` without setting the referenced bit or inserting.
    ///
    /// Returns `Ok(None)` on a miss.
    pub fn peek<T>(&self, key: &K) -> Result<Option<&T>, CacheError>
    where
        T: KeyProvider<K>,
    {
        let Some(idx) = self.find(key)? else {
            return Ok(None);
        };
        let pooled = self
            .queue
            .get(idx)
            .expect("position returned an index past the queue");
        let value: &dyn KeyProvider<K> = self.allocator.resolve(pooled)?;
        let found = AsAny::type_name(value);
        match AsAny::as_any(value).downcast_ref::<T>() {
            Some(value) => Ok(Some(value)),
            None => Err(CacheError::TypeMismatch {
                expected: type_name::<T>(),
                found,
            }),
        }
    }

    /// Returns `true` if an entry matches `key`. Does not set the referenced
    /// bit.
    pub fn contains(&self, key: &K) -> bool {
        matches!(self.find(key), Ok(Some(_)))
    }

    /// Number of resident entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shared access to the backing allocator.
    #[inline]
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Destroys every entry, returning all slots to the allocator.
    ///
    /// Every entry is removed even if some cannot be destroyed; the first
    /// such error is returned.
    pub fn clear(&mut self) -> Result<(), AllocError> {
        #[cfg(feature = "metrics")]
        self.metrics.record_clear();
        let mut first_err = None;
        for pooled in self.queue.drain() {
            if let Err(err) = self.allocator.destroy(pooled) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Returns one [`EntrySnapshot`] per entry, front to back.
    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.queue
            .iter()
            .map(|(pooled, referenced)| match self.allocator.resolve(pooled) {
                Ok(value) => EntrySnapshot {
                    value: format!("{:?}", value),
                    referenced,
                    type_name: AsAny::type_name(value),
                },
                Err(err) => EntrySnapshot {
                    value: format!("<{}>", err),
                    referenced,
                    type_name: "<unresolved>",
                },
            })
            .collect()
    }

    /// Verifies the cache's bookkeeping against its allocator.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.queue.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "queue holds {} entries, capacity is {}",
                self.queue.len(),
                self.capacity
            )));
        }
        for (idx, (pooled, _)) in self.queue.iter().enumerate() {
            if let Err(err) = self.allocator.resolve(pooled) {
                return Err(InvariantError::new(format!(
                    "entry {} does not resolve: {}",
                    idx, err
                )));
            }
        }
        Ok(())
    }

    fn find(&self, key: &K) -> Result<Option<usize>, CacheError> {
        for (idx, (pooled, _)) in self.queue.iter().enumerate() {
            if self.allocator.resolve(pooled)?.matches(key) {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }

    fn check_type<T: 'static>(&mut self, idx: usize) -> Result<(), CacheError> {
        let pooled = self
            .queue
            .get(idx)
            .expect("position returned an index past the queue");
        let value: &dyn KeyProvider<K> = self.allocator.resolve(pooled)?;
        if AsAny::as_any(value).is::<T>() {
            return Ok(());
        }
        #[cfg(feature = "metrics")]
        self.metrics.record_type_mismatch();
        Err(CacheError::TypeMismatch {
            expected: type_name::<T>(),
            found: AsAny::type_name(value),
        })
    }

    fn value_mut<T: 'static>(&mut self, idx: usize) -> Result<&mut T, CacheError> {
        let pooled = self
            .queue
            .get(idx)
            .expect("entry index past the queue");
        let value: &mut dyn KeyProvider<K> = self.allocator.resolve_mut(pooled)?;
        let found = AsAny::type_name(&*value);
        AsAny::as_any_mut(value)
            .downcast_mut::<T>()
            .ok_or(CacheError::TypeMismatch {
                expected: type_name::<T>(),
                found,
            })
    }

    fn evict_one(&mut self) -> Result<(), CacheError> {
        #[cfg(feature = "metrics")]
        self.metrics.record_evict_call();
        let Some(Eviction { value, requeues }) = self.queue.evict() else {
            return Ok(());
        };
        #[cfg(feature = "metrics")]
        {
            for _ in 0..requeues {
                self.metrics.record_requeue();
            }
            self.metrics.record_evicted_entry();
        }
        debug!(
            requeues,
            victim = ?self.allocator.resolve(&value).ok(),
            "evicting entry"
        );
        self.allocator.destroy(value)?;
        Ok(())
    }
}

#[cfg(feature = "metrics")]
impl<K> PoolCache<K, PoolAllocator>
where
    K: ?Sized + fmt::Debug + 'static,
{
    /// Returns a snapshot of cache metrics.
    pub fn metrics_snapshot(&self) -> PoolCacheMetricsSnapshot {
        let pool = self.allocator.stats();
        PoolCacheMetricsSnapshot {
            get_calls: self.metrics.get_calls,
            get_hits: self.metrics.get_hits,
            get_misses: self.metrics.get_misses,
            insert_new: self.metrics.insert_new,
            evict_calls: self.metrics.evict_calls,
            evicted_entries: self.metrics.evicted_entries,
            requeues: self.metrics.requeues,
            max_requeues_per_evict: self.metrics.max_requeues_per_evict,
            alloc_failures: self.metrics.alloc_failures,
            type_mismatches: self.metrics.type_mismatches,
            clears: self.metrics.clears,
            cache_len: self.queue.len(),
            capacity: self.capacity,
            pool_used_slots: pool.used_slots(),
            pool_total_slots: pool.total_slots(),
        }
    }
}

#[cfg(feature = "metrics")]
impl<K> MetricsSnapshotProvider<PoolCacheMetricsSnapshot> for PoolCache<K, PoolAllocator>
where
    K: ?Sized + fmt::Debug + 'static,
{
    fn snapshot(&self) -> PoolCacheMetricsSnapshot {
        self.metrics_snapshot()
    }
}

#[cfg(feature = "metrics")]
impl<K, A> MetricsReset for PoolCache<K, A>
where
    K: ?Sized + 'static,
    A: Allocator,
{
    fn reset_metrics(&mut self) {
        self.metrics.reset_metrics();
    }
}

fn erase<K, T>(value: Pooled<T>) -> Erased<K>
where
    K: ?Sized + 'static,
    T: KeyProvider<K>,
{
    let (ptr, handle) = value.into_raw_parts();
    let ptr: NonNull<dyn KeyProvider<K>> = ptr;
    // SAFETY: same pointee and slot, only the pointer metadata changed
    unsafe { Pooled::from_raw_parts(ptr, handle) }
}

/// Renders `value<flag> ` per entry from front to back, then a newline.
impl<K, A> fmt::Display for PoolCache<K, A>
where
    K: ?Sized + 'static,
    A: Allocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pooled, referenced) in self.queue.iter() {
            let flag = u8::from(referenced);
            match self.allocator.resolve(pooled) {
                Ok(value) => write!(f, "{:?}<{}> ", value, flag)?,
                Err(_) => write!(f, "?<{}> ", flag)?,
            }
        }
        writeln!(f)
    }
}

impl<K, A> fmt::Debug for PoolCache<K, A>
where
    K: ?Sized + 'static,
    A: Allocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolCache")
            .field("capacity", &self.capacity)
            .field("len", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl<K, A> Drop for PoolCache<K, A>
where
    K: ?Sized + 'static,
    A: Allocator,
{
    fn drop(&mut self) {
        for pooled in self.queue.drain() {
            if let Err(err) = self.allocator.destroy(pooled) {
                warn!(%err, "failed to release cache entry on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, PartialEq)]
    struct Name(String);

    impl KeyProvider<str> for Name {
        fn from_key(key: &str) -> Self {
            Name(key.to_string())
        }

        fn matches(&self, key: &str) -> bool {
            self.0 == key
        }
    }

    /// Keyed by the first letter only, like an ordinal lookup table.
    #[derive(Debug, PartialEq)]
    struct Ordinal(u32);

    impl KeyProvider<str> for Ordinal {
        fn from_key(key: &str) -> Self {
            Ordinal(key.bytes().next().map_or(0, |b| u32::from(b.wrapping_sub(b'a'))))
        }

        fn matches(&self, key: &str) -> bool {
            key.bytes().next().map(|b| u32::from(b.wrapping_sub(b'a'))) == Some(self.0)
        }
    }

    fn name_cache(capacity: usize) -> PoolCache<str> {
        PoolCache::with_pool(
            capacity,
            size_of::<Name>() * 8,
            [size_of::<Name>(), size_of::<Ordinal>()],
        )
        .unwrap()
    }

    fn keys(cache: &PoolCache<str>) -> Vec<String> {
        cache.snapshot().into_iter().map(|e| e.value).collect()
    }

    mod basic_operations {
        use super::*;

        #[test]
        fn new_cache_is_empty() {
            let cache = name_cache(3);
            assert_eq!(cache.capacity(), 3);
            assert_eq!(cache.len(), 0);
            assert!(cache.is_empty());
            assert_eq!(cache.to_string(), "\n");
        }

        #[test]
        fn zero_capacity_rejected() {
            let pool = PoolAllocator::new(64, [8]).unwrap();
            let err = PoolCache::<u64>::new(0, pool).unwrap_err();
            assert!(err.message().contains("capacity"));
        }

        #[test]
        fn miss_constructs_from_key() {
            let mut cache = name_cache(2);
            let value = cache.get::<Name>("alpha").unwrap();
            assert_eq!(*value, Name("alpha".into()));
            assert_eq!(cache.len(), 1);
            assert!(cache.contains("alpha"));
        }

        #[test]
        fn hit_returns_same_value_and_keeps_mutation() {
            let mut cache = name_cache(2);
            cache.get::<Name>("a").unwrap().0.push('!');
            assert_eq!(cache.get::<Name>("a").unwrap().0, "a!");
            assert_eq!(cache.len(), 1);
        }

        #[test]
        fn hit_sets_referenced_without_moving() {
            let mut cache = name_cache(3);
            cache.get::<Name>("a").unwrap();
            cache.get::<Name>("b").unwrap();
            cache.get::<Name>("a").unwrap();
            let snapshot = cache.snapshot();
            assert_eq!(snapshot[0].value, "Name(\"b\")");
            assert!(!snapshot[0].referenced);
            assert_eq!(snapshot[1].value, "Name(\"a\")");
            assert!(snapshot[1].referenced);
        }

        #[test]
        fn peek_does_not_mark_or_insert() {
            let mut cache = name_cache(2);
            cache.get::<Name>("a").unwrap();
            assert_eq!(cache.peek::<Name>("a").unwrap(), Some(&Name("a".into())));
            assert_eq!(cache.peek::<Name>("zzz").unwrap(), None);
            assert_eq!(cache.len(), 1);
            assert!(!cache.snapshot()[0].referenced);
        }

        #[test]
        fn clear_returns_every_slot() {
            let mut cache = name_cache(4);
            for key in ["a", "b", "c"] {
                cache.get::<Name>(key).unwrap();
            }
            assert_eq!(cache.allocator().used_slots(size_of::<Name>()), Some(3));
            cache.clear().unwrap();
            assert!(cache.is_empty());
            assert_eq!(cache.allocator().used_slots(size_of::<Name>()), Some(0));
        }
    }

    mod eviction {
        use super::*;

        #[test]
        fn second_chance_example() {
            let mut cache = name_cache(2);
            cache.get::<Name>("A").unwrap();
            cache.get::<Name>("B").unwrap();
            cache.get::<Name>("A").unwrap();
            cache.get::<Name>("C").unwrap();

            assert_eq!(cache.len(), 2);
            assert!(cache.contains("A"));
            assert!(cache.contains("C"));
            assert!(!cache.contains("B"));
            assert_eq!(cache.to_string(), "Name(\"C\")<0> Name(\"A\")<0> \n");
        }

        #[test]
        fn unreferenced_back_is_evicted_first() {
            let mut cache = name_cache(3);
            for key in ["a", "b", "c", "d"] {
                cache.get::<Name>(key).unwrap();
            }
            assert_eq!(
                keys(&cache),
                vec!["Name(\"d\")", "Name(\"c\")", "Name(\"b\")"]
            );
        }

        #[test]
        fn all_referenced_evicts_oldest_after_full_sweep() {
            let mut cache = name_cache(3);
            for key in ["a", "b", "c"] {
                cache.get::<Name>(key).unwrap();
            }
            for key in ["a", "b", "c"] {
                cache.get::<Name>(key).unwrap();
            }
            cache.get::<Name>("d").unwrap();

            assert_eq!(
                keys(&cache),
                vec!["Name(\"d\")", "Name(\"c\")", "Name(\"b\")"]
            );
            assert!(cache.snapshot().iter().all(|e| !e.referenced));
        }

        #[test]
        fn capacity_one_replaces_entry() {
            let mut cache = name_cache(1);
            cache.get::<Name>("a").unwrap();
            cache.get::<Name>("a").unwrap();
            cache.get::<Name>("b").unwrap();
            assert!(!cache.contains("a"));
            assert!(cache.contains("b"));
            assert_eq!(cache.allocator().used_slots(size_of::<Name>()), Some(1));
        }

        #[test]
        fn eviction_frees_slot_for_reuse() {
            // pool holds exactly as many names as the cache
            let mut cache: PoolCache<str> =
                PoolCache::with_pool(2, size_of::<Name>() * 2, [size_of::<Name>()]).unwrap();
            for i in 0..50 {
                cache.get::<Name>(&format!("k{i}")).unwrap();
                cache.check_invariants().unwrap();
            }
            assert_eq!(cache.len(), 2);
        }

        #[test]
        fn repeated_eviction_stays_bounded() {
            let mut cache: PoolCache<u64> = PoolCache::with_pool(4, 64, [8]).unwrap();
            for i in 0..100u64 {
                cache.get::<u64>(&(i % 7)).unwrap();
                assert!(cache.len() <= 4);
            }
            assert_eq!(cache.allocator().used_slots(8), Some(4));
        }
    }

    mod multi_type {
        use super::*;

        #[test]
        fn different_types_share_one_cache() {
            let mut cache = name_cache(4);
            cache.get::<Name>("apple").unwrap();
            let ordinal = cache.get::<Ordinal>("cherry").unwrap();
            assert_eq!(*ordinal, Ordinal(2));

            let types: Vec<_> = cache.snapshot().into_iter().map(|e| e.type_name).collect();
            assert!(types[0].ends_with("Ordinal"));
            assert!(types[1].ends_with("Name"));
        }

        #[test]
        fn wrong_type_on_hit_is_reported() {
            let mut cache = name_cache(4);
            cache.get::<Ordinal>("b").unwrap();
            let err = cache.get::<Name>("b").unwrap_err();
            match err {
                CacheError::TypeMismatch { expected, found } => {
                    assert!(expected.ends_with("Name"));
                    assert!(found.ends_with("Ordinal"));
                },
                other => panic!("unexpected error: {other:?}"),
            }
            // mismatch is not a hit: the entry stays unreferenced
            assert!(!cache.snapshot()[0].referenced);
            assert!(matches!(
                cache.peek::<Name>("b"),
                Err(CacheError::TypeMismatch { .. })
            ));
        }

        #[test]
        fn first_matching_entry_wins() {
            let mut cache = name_cache(4);
            cache.get::<Ordinal>("banana").unwrap();
            // "berry" shares the first letter, so it hits the Ordinal entry
            assert_eq!(*cache.get::<Ordinal>("berry").unwrap(), Ordinal(1));
            assert_eq!(cache.len(), 1);
        }
    }

    mod failures {
        use super::*;

        #[test]
        fn type_without_size_class_is_out_of_memory() {
            let mut cache: PoolCache<u64> = PoolCache::with_pool(4, 64, [8]).unwrap();
            let err = cache.get::<Wide>(&1).unwrap_err();
            assert_eq!(
                err,
                CacheError::Alloc(AllocError::OutOfMemory {
                    size: size_of::<Wide>()
                })
            );
            assert!(cache.is_empty());
        }

        #[test]
        fn exhausted_class_below_capacity_is_out_of_memory() {
            // pool fits two u64 values, cache allows four entries
            let mut cache: PoolCache<u64> = PoolCache::with_pool(4, 16, [8]).unwrap();
            cache.get::<u64>(&1).unwrap();
            cache.get::<u64>(&2).unwrap();
            let err = cache.get::<u64>(&3).unwrap_err();
            assert_eq!(err, CacheError::Alloc(AllocError::OutOfMemory { size: 8 }));
            assert_eq!(cache.len(), 2);
            cache.check_invariants().unwrap();
        }

        #[derive(Debug)]
        struct Wide([u64; 4]);

        impl KeyProvider<u64> for Wide {
            fn from_key(key: &u64) -> Self {
                Wide([*key; 4])
            }

            fn matches(&self, key: &u64) -> bool {
                self.0[0] == *key
            }
        }
    }

    mod ownership {
        use super::*;

        #[derive(Debug)]
        struct Tracked {
            key: u32,
            drops: Rc<Cell<usize>>,
        }

        thread_local! {
            static DROPS: Rc<Cell<usize>> = Rc::new(Cell::new(0));
        }

        impl KeyProvider<u32> for Tracked {
            fn from_key(key: &u32) -> Self {
                Tracked {
                    key: *key,
                    drops: DROPS.with(Rc::clone),
                }
            }

            fn matches(&self, key: &u32) -> bool {
                self.key == *key
            }
        }

        impl Drop for Tracked {
            fn drop(&mut self) {
                self.drops.set(self.drops.get() + 1);
            }
        }

        #[test]
        fn evicted_and_remaining_values_dropped_exactly_once() {
            let drops = DROPS.with(Rc::clone);
            drops.set(0);
            {
                let size = size_of::<Tracked>();
                let mut cache: PoolCache<u32> =
                    PoolCache::with_pool(2, size * 2, [size]).unwrap();
                for key in 0..5 {
                    cache.get::<Tracked>(&key).unwrap();
                }
                assert_eq!(drops.get(), 3);
            }
            assert_eq!(drops.get(), 5);
        }
    }

    #[cfg(feature = "metrics")]
    mod metrics {
        use super::*;

        #[test]
        fn counters_follow_hits_misses_and_requeues() {
            let mut cache = name_cache(2);
            cache.get::<Name>("A").unwrap();
            cache.get::<Name>("B").unwrap();
            cache.get::<Name>("A").unwrap();
            cache.get::<Name>("C").unwrap();

            let snapshot = cache.metrics_snapshot();
            assert_eq!(snapshot.get_calls, 4);
            assert_eq!(snapshot.get_hits, 1);
            assert_eq!(snapshot.get_misses, 3);
            assert_eq!(snapshot.insert_new, 3);
            assert_eq!(snapshot.evicted_entries, 1);
            assert_eq!(snapshot.requeues, 1);
            assert_eq!(snapshot.max_requeues_per_evict, 1);
            assert_eq!(snapshot.cache_len, 2);
            assert_eq!(snapshot.pool_used_slots, 2);

            cache.reset_metrics();
            assert_eq!(cache.metrics_snapshot().get_calls, 0);
        }
    }
}
