//! poolcache: a fixed-capacity second-chance object cache backed by a
//! segregated size-class memory pool.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod builder;
pub mod ds;
pub mod error;
pub mod policy;
pub mod store;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;
pub mod traits;

pub use crate::ds::{Eviction, OccupancyBitmap, SecondChanceQueue};
#[cfg(feature = "metrics")]
pub use crate::metrics::snapshot::PoolCacheMetricsSnapshot;
pub use crate::policy::second_chance::PoolCache;
pub use crate::store::pool::PoolAllocator;
