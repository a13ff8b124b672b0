//! Storage layer: one repository contract, three implementations.
//!
//! `MemStorage` keeps the two metric maps in memory, `DbStorage` persists
//! them in Postgres, and `RetriableStorage` wraps any repository with a
//! bounded retry schedule for connect-class failures. `FileSnapshot` is a
//! side-car that periodically dumps a `MemStorage` to disk and restores it
//! on startup.

pub mod db;
pub mod memory;
pub mod retriable;
pub mod snapshot;

pub use db::DbStorage;
pub use memory::MemStorage;
pub use retriable::RetriableStorage;
pub use snapshot::FileSnapshot;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::core::{Metric, Result};

/// The storage contract shared by every backend. Free of database types so
/// in-memory and SQL variants are interchangeable behind `Arc<dyn Repository>`.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// Adds `delta` to the stored counter, creating it at zero first.
    async fn update_counter(&self, name: &str, delta: i64) -> Result<()>;

    /// Replaces the stored gauge with `value`.
    async fn update_gauge(&self, name: &str, value: f64) -> Result<()>;

    /// Applies a batch of metrics. Counters accumulate in list order,
    /// gauges last-wins.
    async fn update_metrics(&self, metrics: &[Metric]) -> Result<()>;

    async fn get_counter(&self, name: &str) -> Result<i64>;
    async fn get_gauge(&self, name: &str) -> Result<f64>;

    async fn counter_metrics(&self) -> Result<HashMap<String, i64>>;
    async fn gauge_metrics(&self) -> Result<HashMap<String, f64>>;
}
