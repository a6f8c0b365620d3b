//! Error types for the poolcache library.
//!
//! ## Key Components
//!
//! - [`AllocError`]: Returned by the pool allocator when a request cannot be
//!   satisfied or a release does not name a slot the pool handed out.
//! - [`CacheError`]: Returned by [`PoolCache::get`](crate::policy::second_chance::PoolCache::get);
//!   wraps allocator failures and checked-downcast mismatches.
//! - [`ConfigError`]: Returned when construction parameters are invalid
//!   (zero capacity, zero block size, oversized size class).
//! - [`InvariantError`]: Returned by `check_invariants` methods when an
//!   internal invariant does not hold.
//!
//! ## Example Usage
//!
//! ```
//! use poolcache::error::{AllocError, ConfigError};
//! use poolcache::store::pool::PoolAllocator;
//!
//! // Zero-sized blocks are rejected up front
//! let bad: Result<PoolAllocator, ConfigError> = PoolAllocator::new(0, [8]);
//! assert!(bad.is_err());
//!
//! // Requests with no matching size class fail with OutOfMemory
//! let mut pool = PoolAllocator::new(64, [8]).unwrap();
//! assert_eq!(pool.allocate(16).unwrap_err(), AllocError::OutOfMemory { size: 16 });
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// AllocError
// ---------------------------------------------------------------------------

/// Error returned by [`PoolAllocator`](crate::store::pool::PoolAllocator)
/// operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No size class matches `size`, or the matching class has no free slot.
    OutOfMemory {
        /// Requested element size in bytes.
        size: usize,
    },
    /// Address does not fall on a slot of this pool's arena.
    ForeignPointer {
        /// The rejected address.
        addr: usize,
    },
    /// Handle was issued by a different pool.
    ForeignHandle,
    /// Handle refers to a slot that has since been released (and possibly
    /// reused).
    StaleHandle,
    /// Address names a slot that is already free.
    DoubleFree {
        /// The rejected address.
        addr: usize,
    },
    /// Slot address does not satisfy the alignment of the requested type.
    Misaligned {
        /// Element size in bytes.
        size: usize,
        /// Required alignment in bytes.
        align: usize,
    },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::OutOfMemory { size } => {
                write!(f, "out of memory: no free slot for {} byte element", size)
            },
            AllocError::ForeignPointer { addr } => {
                write!(f, "address {:#x} is not a slot of this pool", addr)
            },
            AllocError::ForeignHandle => f.write_str("handle was issued by a different pool"),
            AllocError::StaleHandle => f.write_str("handle refers to a released slot"),
            AllocError::DoubleFree { addr } => {
                write!(f, "slot at {:#x} is already free", addr)
            },
            AllocError::Misaligned { size, align } => write!(
                f,
                "slot for {} byte element is not aligned to {} bytes",
                size, align
            ),
        }
    }
}

impl std::error::Error for AllocError {}

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Error returned by cache lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The allocator could not construct or release a value.
    Alloc(AllocError),
    /// The entry matching the key holds a different concrete type than the
    /// one requested.
    TypeMismatch {
        /// Type requested by the caller.
        expected: &'static str,
        /// Type actually stored for the key.
        found: &'static str,
    },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Alloc(err) => write!(f, "allocation failed: {}", err),
            CacheError::TypeMismatch { expected, found } => write!(
                f,
                "type mismatch: requested {}, entry holds {}",
                expected, found
            ),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Alloc(err) => Some(err),
            CacheError::TypeMismatch { .. } => None,
        }
    }
}

impl From<AllocError> for CacheError {
    fn from(err: AllocError) -> Self {
        CacheError::Alloc(err)
    }
}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal invariants are violated.
///
/// Produced by `check_invariants` methods on
/// [`PoolAllocator`](crate::store::pool::PoolAllocator) and
/// [`PoolCache`](crate::policy::second_chance::PoolCache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when construction parameters are invalid.
///
/// # Example
///
/// ```
/// use poolcache::builder::CacheBuilder;
///
/// let err = CacheBuilder::new(0).size_class(8).build::<u64>().unwrap_err();
/// assert!(err.to_string().contains("capacity"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    // -- AllocError -------------------------------------------------------

    #[test]
    fn alloc_out_of_memory_mentions_size() {
        let err = AllocError::OutOfMemory { size: 24 };
        assert!(err.to_string().contains("24 byte"));
    }

    #[test]
    fn alloc_foreign_pointer_renders_hex() {
        let err = AllocError::ForeignPointer { addr: 0x1000 };
        assert!(err.to_string().contains("0x1000"));
    }

    #[test]
    fn alloc_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<AllocError>();
    }

    // -- CacheError -------------------------------------------------------

    #[test]
    fn cache_from_alloc_keeps_source() {
        let err: CacheError = AllocError::StaleHandle.into();
        assert_eq!(err, CacheError::Alloc(AllocError::StaleHandle));
        let source = err.source().expect("alloc errors carry a source");
        assert_eq!(source.to_string(), AllocError::StaleHandle.to_string());
    }

    #[test]
    fn cache_type_mismatch_names_both_types() {
        let err = CacheError::TypeMismatch {
            expected: "u32",
            found: "alloc::string::String",
        };
        let msg = err.to_string();
        assert!(msg.contains("u32"));
        assert!(msg.contains("String"));
        assert!(err.source().is_none());
    }

    // -- InvariantError ---------------------------------------------------

    #[test]
    fn invariant_display_shows_message() {
        let err = InvariantError::new("queue longer than capacity");
        assert_eq!(err.to_string(), "queue longer than capacity");
        assert_eq!(err.message(), "queue longer than capacity");
    }

    #[test]
    fn invariant_clone_and_eq() {
        let a = InvariantError::new("x");
        let b = a.clone();
        assert_eq!(a, b);
    }

    // -- ConfigError ------------------------------------------------------

    #[test]
    fn config_display_shows_message() {
        let err = ConfigError::new("block size must be > 0");
        assert_eq!(err.to_string(), "block size must be > 0");
    }

    #[test]
    fn config_debug_includes_message() {
        let err = ConfigError::new("bad size class");
        let dbg = format!("{:?}", err);
        assert!(dbg.contains("bad size class"));
    }

    #[test]
    fn config_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<ConfigError>();
    }
}
