/// Point-in-time view of a [`PoolCache`](crate::policy::second_chance::PoolCache)'s counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolCacheMetricsSnapshot {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,

    pub insert_new: u64,

    pub evict_calls: u64,
    pub evicted_entries: u64,
    pub requeues: u64, // referenced entries given a second chance
    pub max_requeues_per_evict: u64,

    pub alloc_failures: u64,
    pub type_mismatches: u64,
    pub clears: u64,

    // gauges captured at snapshot time
    pub cache_len: usize,
    pub capacity: usize,
    pub pool_used_slots: usize,
    pub pool_total_slots: usize,
}

impl PoolCacheMetricsSnapshot {
    /// Fraction of `get` calls that hit, or `0.0` before the first call.
    pub fn hit_ratio(&self) -> f64 {
        if self.get_calls == 0 {
            0.0
        } else {
            self.get_hits as f64 / self.get_calls as f64
        }
    }
}
