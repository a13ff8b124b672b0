use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use metrion::core::Metric;
use metrion::server::{AppState, router};
use metrion::storage::{MemStorage, Repository};

fn app_with_storage() -> (axum::Router, Arc<MemStorage>) {
    let storage = Arc::new(MemStorage::new());
    let app = router(AppState {
        repo: storage.clone(),
    });
    (app, storage)
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn ping_returns_ok_for_healthy_storage() {
    let (app, _) = app_with_storage();
    let response = app
        .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn path_update_stores_counter() {
    let (app, storage) = app_with_storage();
    let response = app
        .oneshot(
            Request::post("/update/counter/hits/7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(storage.get_counter("hits").await.unwrap(), 7);
}

#[tokio::test]
async fn path_update_rejects_unknown_type() {
    let (app, _) = app_with_storage();
    let response = app
        .oneshot(
            Request::post("/update/histogram/x/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn path_update_rejects_unparseable_values() {
    let (app, _) = app_with_storage();

    let response = app
        .clone()
        .oneshot(
            Request::post("/update/counter/x/1.5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::post("/update/gauge/x/abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn path_read_returns_plain_text_value() {
    let (app, storage) = app_with_storage();
    storage.update_gauge("temp", 2.5).await.unwrap();
    storage.update_counter("hits", 6).await.unwrap();

    let response = app
        .clone()
        .oneshot(Request::get("/value/gauge/temp").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "2.5");

    let response = app
        .oneshot(Request::get("/value/counter/hits").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "6");
}

#[tokio::test]
async fn path_read_of_missing_metric_is_404() {
    let (app, _) = app_with_storage();
    let response = app
        .oneshot(Request::get("/value/counter/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn json_update_echoes_the_stored_state() {
    let (app, _) = app_with_storage();

    // Second update accumulates, and the echo carries the running total.
    for expected in [3i64, 6] {
        let response = app
            .clone()
            .oneshot(
                Request::post("/update/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"id":"x","type":"counter","delta":3}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stored: Metric = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(stored.delta, Some(expected));
    }
}

#[tokio::test]
async fn json_update_rejects_missing_payload_field() {
    let (app, _) = app_with_storage();
    let response = app
        .oneshot(
            Request::post("/update/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"id":"x","type":"counter"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_update_accumulates_counters_and_replaces_gauges() {
    let (app, storage) = app_with_storage();

    let payload = serde_json::to_vec(&vec![
        Metric::counter("c", 3),
        Metric::gauge("g", 1.5),
        Metric::counter("c", 3),
        Metric::gauge("g", 2.5),
    ])
    .unwrap();

    let response = app
        .oneshot(
            Request::post("/updates/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(storage.get_counter("c").await.unwrap(), 6);
    assert_eq!(storage.get_gauge("g").await.unwrap(), 2.5);
}

#[tokio::test]
async fn bulk_update_rejects_malformed_json() {
    let (app, _) = app_with_storage();
    let response = app
        .oneshot(
            Request::post("/updates/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn json_read_returns_current_value() {
    let (app, storage) = app_with_storage();
    storage.update_gauge("y", 2.5).await.unwrap();

    let response = app
        .oneshot(
            Request::post("/value/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"id":"y","type":"gauge"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stored: Metric = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(stored.value, Some(2.5));
    assert_eq!(stored.delta, None);
}

#[tokio::test]
async fn json_read_of_missing_metric_is_404() {
    let (app, _) = app_with_storage();
    let response = app
        .oneshot(
            Request::post("/value/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"id":"nope","type":"gauge"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn index_lists_one_metric_per_line() {
    let (app, storage) = app_with_storage();
    storage.update_counter("hits", 2).await.unwrap();
    storage.update_gauge("temp", 36.6).await.unwrap();

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    let body = body_string(response).await;
    assert!(body.contains("hits 2\n"));
    assert!(body.contains("temp 36.6\n"));
}
