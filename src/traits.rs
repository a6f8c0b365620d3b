//! # Capability Traits
//!
//! The cache is generic over two capabilities: how stored values relate to
//! lookup keys ([`KeyProvider`]) and where those values live ([`Allocator`]).
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────┐        ┌──────────────────────────────┐
//!   │      KeyProvider<K>          │        │         Allocator            │
//!   │                              │        │                              │
//!   │  from_key(&K) → Self         │        │  create<T>(T) → Pooled<T>    │
//!   │  matches(&self, &K) → bool   │        │  destroy<T>(Pooled<T>)       │
//!   │  (+ Debug, + AsAny)          │        │  resolve(&Pooled<T>) → &T    │
//!   └──────────────┬───────────────┘        │  resolve_mut → &mut T        │
//!                  │                        └──────────────┬───────────────┘
//!                  │   stored as                           │ implemented by
//!                  ▼   Pooled<dyn KeyProvider<K>>          ▼
//!   ┌─────────────────────────────────────────────────────────────────────┐
//!   │                        PoolCache<K, A>                              │
//!   │   get::<T>(&K) → &mut T   (checked downcast through AsAny)          │
//!   └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A single cache may hold values of several concrete types, all keyed by the
//! same `K`. Each entry is stored type-erased as `dyn KeyProvider<K>`; reading
//! it back as `T` goes through [`AsAny`], so asking for the wrong type fails
//! with [`CacheError::TypeMismatch`](crate::error::CacheError::TypeMismatch)
//! instead of reinterpreting memory.
//!
//! ## Example Usage
//!
//! ```
//! use poolcache::traits::KeyProvider;
//!
//! #[derive(Debug, PartialEq)]
//! struct Page {
//!     name: String,
//!     hits: u32,
//! }
//!
//! impl KeyProvider<str> for Page {
//!     fn from_key(key: &str) -> Self {
//!         Page { name: key.to_string(), hits: 0 }
//!     }
//!
//!     fn matches(&self, key: &str) -> bool {
//!         self.name == key
//!     }
//! }
//!
//! let page = Page::from_key("index");
//! assert!(page.matches("index"));
//! assert!(!page.matches("about"));
//! ```

use std::any::{Any, type_name};
use std::fmt;

use crate::error::AllocError;
use crate::store::handle::Pooled;

/// Dynamic-typing helpers for type-erased cache entries.
///
/// Blanket-implemented for every `'static` type; there is no need to
/// implement it by hand.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Name of the concrete type behind the erased value.
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    #[inline]
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// A value type that can be stored in a cache keyed by `K`.
///
/// The value is built from the key on a miss and must recognise that key on
/// later lookups. `Debug` is used by the cache's diagnostic rendering.
pub trait KeyProvider<K: ?Sized>: AsAny + fmt::Debug {
    /// Constructs the value for a cache miss on `key`.
    fn from_key(key: &K) -> Self
    where
        Self: Sized;

    /// Returns `true` if this value is the entry for `key`.
    fn matches(&self, key: &K) -> bool;
}

macro_rules! impl_key_provider_identity {
    ($($ty:ty),* $(,)?) => {
        $(
            impl KeyProvider<$ty> for $ty {
                #[inline]
                fn from_key(key: &$ty) -> Self {
                    *key
                }

                #[inline]
                fn matches(&self, key: &$ty) -> bool {
                    self == key
                }
            }
        )*
    };
}

impl_key_provider_identity!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, char, bool
);

impl KeyProvider<str> for String {
    fn from_key(key: &str) -> Self {
        key.to_owned()
    }

    fn matches(&self, key: &str) -> bool {
        self == key
    }
}

impl KeyProvider<String> for String {
    fn from_key(key: &String) -> Self {
        key.clone()
    }

    fn matches(&self, key: &String) -> bool {
        self == key
    }
}

/// Typed construction and destruction of values in allocator-owned storage.
///
/// Values are handed out as unique [`Pooled`] handles. A handle is not
/// `Clone`; giving it back through [`destroy`](Allocator::destroy) moves slot
/// ownership back to the allocator. Access goes through the allocator so a
/// handle cannot outlive the storage it points into.
pub trait Allocator {
    /// Moves `value` into a fresh slot sized for `T`.
    ///
    /// Fails with [`AllocError::OutOfMemory`] when no slot of that size is
    /// available; `value` is dropped in that case.
    fn create<T>(&mut self, value: T) -> Result<Pooled<T>, AllocError>;

    /// Drops the value in place and releases its slot.
    ///
    /// A handle that is foreign to this allocator or stale is reported and the
    /// value is not dropped.
    fn destroy<T: ?Sized>(&mut self, value: Pooled<T>) -> Result<(), AllocError>;

    /// Borrows the value behind `value`.
    fn resolve<'a, T: ?Sized>(&'a self, value: &'a Pooled<T>) -> Result<&'a T, AllocError>;

    /// Mutably borrows the value behind `value`.
    fn resolve_mut<'a, T: ?Sized>(
        &'a mut self,
        value: &'a Pooled<T>,
    ) -> Result<&'a mut T, AllocError>;
}
