use crate::metrics::traits::{CoreMetricsRecorder, MetricsReset, SecondChanceMetricsRecorder};

// ---------------------------------------------------------------------------
// PoolCacheMetrics
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct PoolCacheMetrics {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub insert_new: u64,
    pub evict_calls: u64,
    pub evicted_entries: u64,
    pub requeues: u64,
    pub max_requeues_per_evict: u64,
    pub alloc_failures: u64,
    pub type_mismatches: u64,
    pub clears: u64,
    current_evict_requeues: u64,
}

impl CoreMetricsRecorder for PoolCacheMetrics {
    fn record_get_hit(&mut self) {
        self.get_calls += 1;
        self.get_hits += 1;
    }
    fn record_get_miss(&mut self) {
        self.get_calls += 1;
        self.get_misses += 1;
    }
    fn record_insert_new(&mut self) {
        self.insert_new += 1;
    }
    fn record_evict_call(&mut self) {
        self.evict_calls += 1;
        self.current_evict_requeues = 0;
    }
    fn record_evicted_entry(&mut self) {
        self.evicted_entries += 1;
        self.max_requeues_per_evict = self.max_requeues_per_evict.max(self.current_evict_requeues);
    }
    fn record_clear(&mut self) {
        self.clears += 1;
    }
}

impl SecondChanceMetricsRecorder for PoolCacheMetrics {
    fn record_requeue(&mut self) {
        self.requeues += 1;
        self.current_evict_requeues += 1;
    }
    fn record_alloc_failure(&mut self) {
        self.alloc_failures += 1;
    }
    fn record_type_mismatch(&mut self) {
        self.type_mismatches += 1;
    }
}

impl MetricsReset for PoolCacheMetrics {
    fn reset_metrics(&mut self) {
        *self = Self::default();
    }
}
