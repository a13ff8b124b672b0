use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::Metric;

/// The agent's working set: name -> value maps for both metric kinds.
///
/// Collectors mutate it under the lock; the reporter side only ever sees a
/// [`CollectionSnapshot`] deep-copied under the same lock, so a report in
/// flight can never observe a half-written poll cycle.
#[derive(Default)]
pub struct MetricsCollection {
    inner: Mutex<Maps>,
}

#[derive(Default)]
struct Maps {
    counters: HashMap<String, i64>,
    gauges: HashMap<String, f64>,
}

/// Point-in-time copy handed to report workers.
#[derive(Debug, Clone, Default)]
pub struct CollectionSnapshot {
    pub counters: HashMap<String, i64>,
    pub gauges: HashMap<String, f64>,
}

impl CollectionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.gauges.is_empty()
    }

    /// Flattens both maps into wire metrics, gauges first.
    pub fn to_metrics(&self) -> Vec<Metric> {
        let mut metrics = Vec::with_capacity(self.gauges.len() + self.counters.len());
        for (name, value) in &self.gauges {
            metrics.push(Metric::gauge(name.clone(), *value));
        }
        for (name, value) in &self.counters {
            metrics.push(Metric::counter(name.clone(), *value));
        }
        metrics
    }
}

impl MetricsCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_counter(&self, name: &str, value: i64) {
        let mut maps = self.inner.lock().expect("collection lock poisoned");
        maps.counters.insert(name.to_string(), value);
    }

    pub fn set_gauge(&self, name: &str, value: f64) {
        let mut maps = self.inner.lock().expect("collection lock poisoned");
        maps.gauges.insert(name.to_string(), value);
    }

    /// Writes a batch of gauges under one lock acquisition.
    pub fn set_gauges<I>(&self, gauges: I)
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut maps = self.inner.lock().expect("collection lock poisoned");
        for (name, value) in gauges {
            maps.gauges.insert(name, value);
        }
    }

    pub fn snapshot(&self) -> CollectionSnapshot {
        let maps = self.inner.lock().expect("collection lock poisoned");
        CollectionSnapshot {
            counters: maps.counters.clone(),
            gauges: maps.gauges.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MetricKind;

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let collection = MetricsCollection::new();
        collection.set_counter("PollCount", 1);
        collection.set_gauge("Alloc", 100.0);

        let snapshot = collection.snapshot();
        collection.set_counter("PollCount", 2);
        collection.set_gauge("Alloc", 200.0);

        assert_eq!(snapshot.counters["PollCount"], 1);
        assert_eq!(snapshot.gauges["Alloc"], 100.0);
    }

    #[test]
    fn flatten_produces_one_metric_per_entry() {
        let collection = MetricsCollection::new();
        collection.set_counter("PollCount", 3);
        collection.set_gauges([("A".to_string(), 1.0), ("B".to_string(), 2.0)]);

        let metrics = collection.snapshot().to_metrics();
        assert_eq!(metrics.len(), 3);
        assert_eq!(
            metrics
                .iter()
                .filter(|m| m.kind == MetricKind::Gauge)
                .count(),
            2
        );
    }

    #[test]
    fn empty_collection_has_empty_snapshot() {
        assert!(MetricsCollection::new().snapshot().is_empty());
    }
}
