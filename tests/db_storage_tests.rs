//! Postgres-backed storage tests. These need a live database and skip
//! silently unless `TEST_DATABASE_DSN` is set.

use metrion::core::Metric;
use metrion::storage::{DbStorage, Repository};

async fn connect() -> Option<DbStorage> {
    let dsn = std::env::var("TEST_DATABASE_DSN").ok()?;
    let db = DbStorage::connect(&dsn).await.expect("cannot connect to test database");
    db.bootstrap_schema().await.expect("cannot bootstrap schema");
    Some(db)
}

fn unique(name: &str) -> String {
    format!(
        "{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    )
}

#[tokio::test]
async fn counter_upsert_accumulates() {
    let Some(db) = connect().await else {
        eprintln!("TEST_DATABASE_DSN not set, skipping");
        return;
    };

    let name = unique("counter");
    db.update_counter(&name, 3).await.unwrap();
    db.update_counter(&name, 4).await.unwrap();
    assert_eq!(db.get_counter(&name).await.unwrap(), 7);
}

#[tokio::test]
async fn gauge_upsert_replaces() {
    let Some(db) = connect().await else {
        eprintln!("TEST_DATABASE_DSN not set, skipping");
        return;
    };

    let name = unique("gauge");
    db.update_gauge(&name, 1.5).await.unwrap();
    db.update_gauge(&name, 2.5).await.unwrap();
    assert_eq!(db.get_gauge(&name).await.unwrap(), 2.5);
}

#[tokio::test]
async fn bulk_update_spanning_multiple_chunks() {
    let Some(db) = connect().await else {
        eprintln!("TEST_DATABASE_DSN not set, skipping");
        return;
    };

    // 250 metrics cross the 100-per-transaction boundary twice.
    let name = unique("bulk");
    let metrics: Vec<Metric> = (0..250).map(|_| Metric::counter(name.clone(), 1)).collect();
    db.update_metrics(&metrics).await.unwrap();
    assert_eq!(db.get_counter(&name).await.unwrap(), 250);

    let listed = db.counter_metrics().await.unwrap();
    assert_eq!(listed.get(&name), Some(&250));
}
