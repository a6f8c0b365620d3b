//! # Metrics Trait Hierarchy
//!
//! Separates *recording*, *snapshotting* and *export* into small traits so
//! that monitoring never leaks into cache logic.
//!
//! ## Architecture
//!
//! ```text
//!              ┌─────────────────────────────┐
//!              │     CoreMetricsRecorder     │
//!              │  get_hit/get_miss/insert    │
//!              │  evict/clear                │
//!              └──────────────┬──────────────┘
//!                             │
//!                             ▼
//!              ┌─────────────────────────────┐
//!              │ SecondChanceMetricsRecorder │
//!              │  requeue/alloc_failure      │
//!              │  type_mismatch              │
//!              └─────────────────────────────┘
//!
//!   Consumption (decoupled from recording):
//!   ┌──────────────────────────────┐    ┌──────────────────────────────┐
//!   │ MetricsSnapshotProvider<S>   │    │ MetricsExporter<S>           │
//!   │ (bench/test)                 │    │ (production monitoring)      │
//!   └──────────────────────────────┘    └──────────────────────────────┘
//! ```

/// Common counters for any cache.
pub trait CoreMetricsRecorder {
    fn record_get_hit(&mut self);
    fn record_get_miss(&mut self);
    fn record_insert_new(&mut self);
    fn record_evict_call(&mut self);
    fn record_evicted_entry(&mut self);
    fn record_clear(&mut self);
}

/// Metrics specific to the pool-backed second-chance cache.
pub trait SecondChanceMetricsRecorder: CoreMetricsRecorder {
    /// A referenced entry was moved from the back to the front.
    fn record_requeue(&mut self);
    /// The allocator refused to construct a value.
    fn record_alloc_failure(&mut self);
    /// A hit was read back as the wrong concrete type.
    fn record_type_mismatch(&mut self);
}

/// Snapshot provider for bench/testing.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Reset metrics between tests or benchmark iterations.
pub trait MetricsReset {
    fn reset_metrics(&mut self);
}

/// Export/publish metrics to production monitoring backends.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
