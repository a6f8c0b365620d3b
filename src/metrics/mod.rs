//! Cache metrics, compiled with the `metrics` feature.
//!
//! Recording, snapshotting and export are separate concerns:
//! [`traits`] defines the recorder and consumer traits,
//! [`metrics_impl`] holds the counters a cache updates,
//! [`snapshot`] the plain-data view handed to consumers, and
//! [`exporter`] publishes snapshots in Prometheus text format.

pub mod exporter;
pub mod metrics_impl;
pub mod snapshot;
pub mod traits;
