use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::Repository;
use crate::core::{Metric, MetricKind, MetricsError, Result};

/// Bulk updates are applied in groups of this size, one transaction per
/// group. A failed group rolls back alone; earlier groups stay committed.
const BULK_CHUNK_SIZE: usize = 100;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS counter_metrics (name TEXT PRIMARY KEY, value BIGINT NOT NULL)",
    "CREATE TABLE IF NOT EXISTS gauge_metrics (name TEXT PRIMARY KEY, value DOUBLE PRECISION NOT NULL)",
];

const UPSERT_COUNTER: &str = "INSERT INTO counter_metrics (name, value) VALUES ($1, $2) \
     ON CONFLICT (name) DO UPDATE SET value = counter_metrics.value + EXCLUDED.value";

const UPSERT_GAUGE: &str = "INSERT INTO gauge_metrics (name, value) VALUES ($1, $2) \
     ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value";

/// Postgres-backed repository. Counter upserts accumulate at the database
/// layer, so concurrent bulk updates never lose deltas.
pub struct DbStorage {
    pool: PgPool,
}

impl DbStorage {
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(dsn)
            .await
            .map_err(map_db_err)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the two metric tables when missing.
    pub async fn bootstrap_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_db_err)?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Streams `SELECT name, value` rows into a map. The value type is
    /// fixed by the table being queried.
    async fn load_table<V>(&self, sql: &str) -> Result<HashMap<String, V>>
    where
        V: Send + Unpin + sqlx::Type<sqlx::Postgres> + for<'r> sqlx::Decode<'r, sqlx::Postgres>,
    {
        let rows: Vec<(String, V)> = sqlx::query_as(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl Repository for DbStorage {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_db_err)
    }

    async fn update_counter(&self, name: &str, delta: i64) -> Result<()> {
        sqlx::query(UPSERT_COUNTER)
            .bind(name)
            .bind(delta)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_db_err)
    }

    async fn update_gauge(&self, name: &str, value: f64) -> Result<()> {
        sqlx::query(UPSERT_GAUGE)
            .bind(name)
            .bind(value)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_db_err)
    }

    async fn update_metrics(&self, metrics: &[Metric]) -> Result<()> {
        for chunk in metrics.chunks(BULK_CHUNK_SIZE) {
            let mut tx = self.pool.begin().await.map_err(map_db_err)?;
            for metric in chunk {
                match metric.kind {
                    MetricKind::Counter => {
                        let delta = metric.delta.ok_or_else(|| {
                            MetricsError::Validation(format!(
                                "counter '{}' without delta",
                                metric.id
                            ))
                        })?;
                        sqlx::query(UPSERT_COUNTER)
                            .bind(&metric.id)
                            .bind(delta)
                            .execute(&mut *tx)
                            .await
                            .map_err(map_db_err)?;
                    }
                    MetricKind::Gauge => {
                        let value = metric.value.ok_or_else(|| {
                            MetricsError::Validation(format!("gauge '{}' without value", metric.id))
                        })?;
                        sqlx::query(UPSERT_GAUGE)
                            .bind(&metric.id)
                            .bind(value)
                            .execute(&mut *tx)
                            .await
                            .map_err(map_db_err)?;
                    }
                }
            }
            tx.commit().await.map_err(map_db_err)?;
        }
        Ok(())
    }

    async fn get_counter(&self, name: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT value FROM counter_metrics WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| MetricsError::NotFound(name.to_string()))
    }

    async fn get_gauge(&self, name: &str) -> Result<f64> {
        sqlx::query_scalar("SELECT value FROM gauge_metrics WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| MetricsError::NotFound(name.to_string()))
    }

    async fn counter_metrics(&self) -> Result<HashMap<String, i64>> {
        self.load_table("SELECT name, value FROM counter_metrics")
            .await
    }

    async fn gauge_metrics(&self) -> Result<HashMap<String, f64>> {
        self.load_table("SELECT name, value FROM gauge_metrics")
            .await
    }
}

fn map_db_err(err: sqlx::Error) -> MetricsError {
    let retriable = matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Tls(_)
    );
    MetricsError::Storage {
        message: err.to_string(),
        retriable,
    }
}
