//! Optional profiling server on a fixed local port.

use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;

const DEBUG_ADDR: &str = "localhost:6060";

/// Per-request bound standing in for the 3s read/write timeouts.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Sampling window; must finish inside [`REQUEST_TIMEOUT`].
#[cfg(feature = "pprof")]
const PROFILE_WINDOW: Duration = Duration::from_secs(2);

/// Serves `/debug/pprof/profile` until shutdown. Bind or serve errors are
/// logged; the main server keeps running either way.
pub async fn run_debug_server(shutdown: CancellationToken) {
    let app = Router::new()
        .route("/debug/pprof/profile", get(cpu_profile))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|_: tower::BoxError| async {
                    StatusCode::REQUEST_TIMEOUT
                }))
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        );

    let listener = match tokio::net::TcpListener::bind(DEBUG_ADDR).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, "cannot bind profiling server on {DEBUG_ADDR}");
            return;
        }
    };

    tracing::info!("profiling server listening on {DEBUG_ADDR}");
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
    {
        tracing::error!(error = %err, "profiling server error");
    }
}

/// Short CPU profile rendered as a flamegraph.
#[cfg(feature = "pprof")]
async fn cpu_profile() -> Response {
    let guard = match pprof::ProfilerGuardBuilder::default().frequency(100).build() {
        Ok(guard) => guard,
        Err(err) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("profiler start failed: {err}"),
            )
                .into_response();
        }
    };

    tokio::time::sleep(PROFILE_WINDOW).await;

    let report = match guard.report().build() {
        Ok(report) => report,
        Err(err) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("profile report failed: {err}"),
            )
                .into_response();
        }
    };

    let mut svg = Vec::new();
    if let Err(err) = report.flamegraph(&mut svg) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("flamegraph render failed: {err}"),
        )
            .into_response();
    }

    (
        [(axum::http::header::CONTENT_TYPE, "image/svg+xml")],
        svg,
    )
        .into_response()
}

#[cfg(not(feature = "pprof"))]
async fn cpu_profile() -> Response {
    (
        StatusCode::NOT_IMPLEMENTED,
        "server built without the pprof feature",
    )
        .into_response()
}
