//! Value storage: the size-class pool and the handles it hands out.

pub mod handle;
pub mod pool;
