//! Commonly used types, for glob import.

pub use crate::builder::{CacheBuilder, PoolConfig};
pub use crate::error::{AllocError, CacheError, ConfigError, InvariantError};
pub use crate::policy::second_chance::{EntrySnapshot, PoolCache};
pub use crate::store::handle::{Pooled, SlotHandle};
pub use crate::store::pool::{PoolAllocator, PoolStats};
pub use crate::traits::{Allocator, AsAny, KeyProvider};
