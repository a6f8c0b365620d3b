//! Pool configuration and cache builder.
//!
//! [`PoolConfig`] describes the arena (block size plus the element sizes it
//! serves) and validates it; [`CacheBuilder`] combines it with the cache
//! capacity. Size classes can be given in bytes or derived from the value
//! types the cache will store.
//!
//! ## Example
//!
//! ```rust
//! use poolcache::builder::CacheBuilder;
//!
//! let mut cache = CacheBuilder::new(2)
//!     .block_size(256)
//!     .size_class_of::<u64>()
//!     .build::<u64>()
//!     .unwrap();
//!
//! assert_eq!(*cache.get::<u64>(&7).unwrap(), 7);
//! assert_eq!(cache.len(), 1);
//! ```

use std::fmt::Debug;

use crate::error::ConfigError;
use crate::policy::second_chance::PoolCache;
use crate::store::pool::PoolAllocator;

/// Block size used when none is configured.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Arena layout for a [`PoolAllocator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    block_size: usize,
    size_classes: Vec<usize>,
}

impl PoolConfig {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            size_classes: Vec::new(),
        }
    }

    /// Adds an element size in bytes. Duplicates are allowed and collapse.
    pub fn with_size_class(mut self, size: usize) -> Self {
        self.size_classes.push(size);
        self
    }

    /// Adds the size of `T` as an element size.
    pub fn with_size_class_of<T>(self) -> Self {
        self.with_size_class(size_of::<T>())
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Size classes in insertion order, as configured.
    pub fn size_classes(&self) -> &[usize] {
        &self.size_classes
    }

    /// Size classes sorted ascending with duplicates removed.
    pub fn normalized_classes(&self) -> Vec<usize> {
        let mut sizes = self.size_classes.clone();
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }

    /// Checks that every class fits at least one element per block.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::new("block size must be > 0"));
        }
        for &size in &self.size_classes {
            if size == 0 {
                return Err(ConfigError::new("size class must be > 0"));
            }
            if size > self.block_size {
                return Err(ConfigError::new(format!(
                    "size class {} exceeds block size {}",
                    size, self.block_size
                )));
            }
        }
        let classes = self.normalized_classes().len();
        let arena_len = self
            .block_size
            .checked_mul(classes)
            .ok_or_else(|| ConfigError::new("arena size overflows usize"))?;
        if arena_len > isize::MAX as usize {
            return Err(ConfigError::new("arena size exceeds isize::MAX"));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}

/// Builder for a [`PoolCache`] backed by a [`PoolAllocator`].
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    capacity: usize,
    pool: PoolConfig,
}

impl CacheBuilder {
    /// Starts a builder for a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pool: PoolConfig::default(),
        }
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.pool.block_size = block_size;
        self
    }

    pub fn size_class(mut self, size: usize) -> Self {
        self.pool = self.pool.with_size_class(size);
        self
    }

    /// Adds a size class fitting values of type `T`.
    pub fn size_class_of<T>(self) -> Self {
        self.size_class(size_of::<T>())
    }

    /// Replaces the whole pool configuration.
    pub fn config(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn pool_config(&self) -> &PoolConfig {
        &self.pool
    }

    /// Builds the pool and the cache.
    pub fn build<K>(self) -> Result<PoolCache<K>, ConfigError>
    where
        K: ?Sized + Debug + 'static,
    {
        let pool = PoolAllocator::from_config(&self.pool)?;
        PoolCache::new(self.capacity, pool)
    }
}
