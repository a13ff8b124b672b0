use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use super::Repository;
use crate::core::{Metric, Result};

/// Backoff schedule shared with the agent reporters.
pub const RETRY_INTERVALS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(5),
];

/// Wraps any repository and retries connect-class failures on the
/// [1s, 2s, 5s] schedule. Errors outside that class return immediately.
pub struct RetriableStorage<S> {
    inner: S,
}

impl<S: Repository> RetriableStorage<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    async fn retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retriable() && attempt < RETRY_INTERVALS.len() - 1 => {
                    tracing::warn!(error = %err, attempt, "storage operation failed, retrying");
                    tokio::time::sleep(RETRY_INTERVALS[attempt]).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<S: Repository> Repository for RetriableStorage<S> {
    async fn ping(&self) -> Result<()> {
        self.retry(|| self.inner.ping()).await
    }

    async fn update_counter(&self, name: &str, delta: i64) -> Result<()> {
        self.retry(|| self.inner.update_counter(name, delta)).await
    }

    async fn update_gauge(&self, name: &str, value: f64) -> Result<()> {
        self.retry(|| self.inner.update_gauge(name, value)).await
    }

    async fn update_metrics(&self, metrics: &[Metric]) -> Result<()> {
        self.retry(|| self.inner.update_metrics(metrics)).await
    }

    async fn get_counter(&self, name: &str) -> Result<i64> {
        self.retry(|| self.inner.get_counter(name)).await
    }

    async fn get_gauge(&self, name: &str) -> Result<f64> {
        self.retry(|| self.inner.get_gauge(name)).await
    }

    async fn counter_metrics(&self) -> Result<HashMap<String, i64>> {
        self.retry(|| self.inner.counter_metrics()).await
    }

    async fn gauge_metrics(&self) -> Result<HashMap<String, f64>> {
        self.retry(|| self.inner.gauge_metrics()).await
    }
}
