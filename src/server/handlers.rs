//! HTTP ingest and query endpoints.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};

use crate::core::{Metric, MetricKind, MetricsError};
use crate::storage::Repository;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
}

/// Handler-level error with its HTTP mapping. Storage failures map to 400
/// on write paths and 500 on read paths, so handlers pick the variant.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, message).into_response()
    }
}

impl From<MetricsError> for ApiError {
    fn from(err: MetricsError) -> Self {
        match err {
            MetricsError::Validation(msg) => Self::BadRequest(msg),
            MetricsError::NotFound(_) => Self::NotFound("metric not found".to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Write-path mapping: storage failures surface as 400.
fn write_error(err: MetricsError) -> ApiError {
    match err {
        MetricsError::Storage { message, .. } => ApiError::BadRequest(message),
        other => other.into(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_metrics))
        .route("/ping", get(ping))
        .route("/update/", post(update_metric_json))
        .route("/update/:type/:name/:value", post(update_metric))
        .route("/updates/", post(bulk_update_json))
        .route("/value/", post(get_metric_json))
        .route("/value/:type/:name", get(get_metric))
        .with_state(state)
}

/// `GET /` — one `name value` line per metric.
async fn get_metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let counters = state.repo.counter_metrics().await?;
    let gauges = state.repo.gauge_metrics().await?;

    let mut lines: Vec<String> = counters
        .iter()
        .map(|(name, value)| format!("{name} {value}"))
        .chain(gauges.iter().map(|(name, value)| format!("{name} {value}")))
        .collect();
    lines.sort();
    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }

    Ok(([(header::CONTENT_TYPE, "text/plain")], body).into_response())
}

/// `GET /ping` — 200 iff the storage backend is reachable.
async fn ping(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state
        .repo
        .ping()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(StatusCode::OK)
}

/// `POST /update/{type}/{name}/{value}` — path-parameter update.
async fn update_metric(
    State(state): State<AppState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let kind = MetricKind::parse(&kind).map_err(|_| ApiError::BadRequest("Wrong metric type".to_string()))?;

    match kind {
        MetricKind::Counter => {
            let delta: i64 = value
                .parse()
                .map_err(|_| ApiError::BadRequest("Wrong metric value".to_string()))?;
            state
                .repo
                .update_counter(&name, delta)
                .await
                .map_err(write_error)?;
        }
        MetricKind::Gauge => {
            let parsed: f64 = value
                .parse()
                .map_err(|_| ApiError::BadRequest("Wrong metric value".to_string()))?;
            state
                .repo
                .update_gauge(&name, parsed)
                .await
                .map_err(write_error)?;
        }
    }

    let body = format!("Metric: {name} value: {value} has added");
    Ok(([(header::CONTENT_TYPE, "text/plain")], body).into_response())
}

/// `POST /update/` — JSON single-metric update; echoes the stored state.
async fn update_metric_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let metric: Metric = serde_json::from_slice(&body)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    match metric.kind {
        MetricKind::Counter => {
            let delta = metric
                .delta
                .ok_or_else(|| ApiError::BadRequest("counter requires delta".to_string()))?;
            state
                .repo
                .update_counter(&metric.id, delta)
                .await
                .map_err(write_error)?;
        }
        MetricKind::Gauge => {
            let value = metric
                .value
                .ok_or_else(|| ApiError::BadRequest("gauge requires value".to_string()))?;
            state
                .repo
                .update_gauge(&metric.id, value)
                .await
                .map_err(write_error)?;
        }
    }

    let stored = read_metric(&state, metric.kind, &metric.id)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    json_response(&stored)
}

/// `POST /updates/` — JSON bulk update.
async fn bulk_update_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let metrics: Vec<Metric> = serde_json::from_slice(&body)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    state
        .repo
        .update_metrics(&metrics)
        .await
        .map_err(write_error)?;
    Ok(StatusCode::OK)
}

/// `GET /value/{type}/{name}` — plain-text read.
async fn get_metric(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let kind = MetricKind::parse(&kind).map_err(|_| ApiError::BadRequest("Wrong metric type".to_string()))?;

    let body = match kind {
        MetricKind::Counter => state.repo.get_counter(&name).await.map_err(read_error)?.to_string(),
        MetricKind::Gauge => state.repo.get_gauge(&name).await.map_err(read_error)?.to_string(),
    };

    Ok(([(header::CONTENT_TYPE, "text/plain")], body).into_response())
}

/// `POST /value/` — JSON read; responds with the current stored value.
async fn get_metric_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: Metric = serde_json::from_slice(&body)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let stored = read_metric(&state, request.kind, &request.id)
        .await
        .map_err(read_error)?;
    json_response(&stored)
}

fn read_error(err: MetricsError) -> ApiError {
    match err {
        MetricsError::NotFound(_) => ApiError::NotFound("Metric Not Found".to_string()),
        other => ApiError::Internal(other.to_string()),
    }
}

async fn read_metric(
    state: &AppState,
    kind: MetricKind,
    name: &str,
) -> Result<Metric, MetricsError> {
    match kind {
        MetricKind::Counter => {
            let value = state.repo.get_counter(name).await?;
            Ok(Metric::counter(name, value))
        }
        MetricKind::Gauge => {
            let value = state.repo.get_gauge(name).await?;
            Ok(Metric::gauge(name, value))
        }
    }
}

fn json_response(metric: &Metric) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(metric).map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}
