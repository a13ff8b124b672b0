use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Repository;
use crate::core::{Metric, MetricKind, MetricsError, Result};

#[derive(Default)]
struct Maps {
    counters: HashMap<String, i64>,
    gauges: HashMap<String, f64>,
}

/// In-memory repository: two maps behind one lock. List operations return
/// copies so callers can never mutate the live maps.
#[derive(Default)]
pub struct MemStorage {
    maps: RwLock<Maps>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flattens both maps into the wire representation, for snapshots.
    pub async fn export_metrics(&self) -> Vec<Metric> {
        let maps = self.maps.read().await;
        let mut metrics = Vec::with_capacity(maps.counters.len() + maps.gauges.len());
        for (name, value) in &maps.counters {
            metrics.push(Metric::counter(name.clone(), *value));
        }
        for (name, value) in &maps.gauges {
            metrics.push(Metric::gauge(name.clone(), *value));
        }
        metrics
    }

    /// Loads snapshot metrics, overwriting both counters and gauges.
    /// Entries with a missing payload field are skipped with a warning.
    pub async fn import_metrics(&self, metrics: Vec<Metric>) {
        let mut maps = self.maps.write().await;
        for metric in metrics {
            match (metric.kind, metric.delta, metric.value) {
                (MetricKind::Counter, Some(delta), _) => {
                    maps.counters.insert(metric.id, delta);
                }
                (MetricKind::Gauge, _, Some(value)) => {
                    maps.gauges.insert(metric.id, value);
                }
                _ => {
                    tracing::warn!(id = %metric.id, kind = %metric.kind, "invalid metric in snapshot, skipping");
                }
            }
        }
    }
}

#[async_trait]
impl Repository for MemStorage {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn update_counter(&self, name: &str, delta: i64) -> Result<()> {
        let mut maps = self.maps.write().await;
        *maps.counters.entry(name.to_string()).or_insert(0) += delta;
        Ok(())
    }

    async fn update_gauge(&self, name: &str, value: f64) -> Result<()> {
        let mut maps = self.maps.write().await;
        maps.gauges.insert(name.to_string(), value);
        Ok(())
    }

    async fn update_metrics(&self, metrics: &[Metric]) -> Result<()> {
        let mut maps = self.maps.write().await;
        for metric in metrics {
            match metric.kind {
                MetricKind::Counter => {
                    let delta = metric.delta.ok_or_else(|| {
                        MetricsError::Validation(format!("counter '{}' without delta", metric.id))
                    })?;
                    *maps.counters.entry(metric.id.clone()).or_insert(0) += delta;
                }
                MetricKind::Gauge => {
                    let value = metric.value.ok_or_else(|| {
                        MetricsError::Validation(format!("gauge '{}' without value", metric.id))
                    })?;
                    maps.gauges.insert(metric.id.clone(), value);
                }
            }
        }
        Ok(())
    }

    async fn get_counter(&self, name: &str) -> Result<i64> {
        let maps = self.maps.read().await;
        maps.counters
            .get(name)
            .copied()
            .ok_or_else(|| MetricsError::NotFound(name.to_string()))
    }

    async fn get_gauge(&self, name: &str) -> Result<f64> {
        let maps = self.maps.read().await;
        maps.gauges
            .get(name)
            .copied()
            .ok_or_else(|| MetricsError::NotFound(name.to_string()))
    }

    async fn counter_metrics(&self) -> Result<HashMap<String, i64>> {
        Ok(self.maps.read().await.counters.clone())
    }

    async fn gauge_metrics(&self) -> Result<HashMap<String, f64>> {
        Ok(self.maps.read().await.gauges.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counters_accumulate() {
        let storage = MemStorage::new();
        storage.update_counter("hits", 3).await.unwrap();
        storage.update_counter("hits", 4).await.unwrap();
        storage.update_counter("hits", -2).await.unwrap();
        assert_eq!(storage.get_counter("hits").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn gauges_replace() {
        let storage = MemStorage::new();
        storage.update_gauge("temp", 1.5).await.unwrap();
        storage.update_gauge("temp", 2.5).await.unwrap();
        assert_eq!(storage.get_gauge("temp").await.unwrap(), 2.5);
    }

    #[tokio::test]
    async fn missing_metric_is_not_found() {
        let storage = MemStorage::new();
        assert!(matches!(
            storage.get_counter("absent").await,
            Err(MetricsError::NotFound(_))
        ));
        assert!(matches!(
            storage.get_gauge("absent").await,
            Err(MetricsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn bulk_update_applies_in_list_order() {
        let storage = MemStorage::new();
        storage
            .update_metrics(&[
                Metric::counter("c", 3),
                Metric::counter("c", 3),
                Metric::gauge("g", 1.0),
                Metric::gauge("g", 9.0),
            ])
            .await
            .unwrap();
        assert_eq!(storage.get_counter("c").await.unwrap(), 6);
        assert_eq!(storage.get_gauge("g").await.unwrap(), 9.0);
    }

    #[tokio::test]
    async fn bulk_update_rejects_malformed_metric() {
        let storage = MemStorage::new();
        let malformed = Metric {
            id: "broken".to_string(),
            kind: MetricKind::Counter,
            delta: None,
            value: Some(1.0),
        };
        assert!(storage.update_metrics(&[malformed]).await.is_err());
    }

    #[tokio::test]
    async fn list_results_are_copies() {
        let storage = MemStorage::new();
        storage.update_counter("c", 1).await.unwrap();
        let mut listed = storage.counter_metrics().await.unwrap();
        listed.insert("c".to_string(), 99);
        assert_eq!(storage.get_counter("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn export_import_round_trip() {
        let storage = MemStorage::new();
        storage.update_counter("c", 10).await.unwrap();
        storage.update_gauge("g", 0.5).await.unwrap();

        let exported = storage.export_metrics().await;
        let restored = MemStorage::new();
        restored.import_metrics(exported).await;

        assert_eq!(restored.get_counter("c").await.unwrap(), 10);
        assert_eq!(restored.get_gauge("g").await.unwrap(), 0.5);
    }
}
