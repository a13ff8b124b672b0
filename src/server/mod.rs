//! Server side: ingest front-ends, middleware and lifecycle.

pub mod application;
pub mod debug;
pub mod grpc;
pub mod handlers;
pub mod middleware;

pub use application::Application;
pub use grpc::MetricsService;
pub use handlers::{ApiError, AppState, router};
pub use middleware::ProtectionConfig;

use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;

/// Per-request bound standing in for the 3s read-header timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// The full HTTP surface: routes wrapped in the middleware chain,
/// outermost first request timeout, gzip, request log, signature, decrypt,
/// trusted subnet.
pub fn build_app(state: AppState, protection: ProtectionConfig) -> axum::Router {
    handlers::router(state).layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(|_: tower::BoxError| async {
                StatusCode::REQUEST_TIMEOUT
            }))
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            .layer(axum::middleware::from_fn(middleware::compress))
            .layer(axum::middleware::from_fn(middleware::request_log))
            .layer(axum::middleware::from_fn_with_state(
                protection.clone(),
                middleware::signature,
            ))
            .layer(axum::middleware::from_fn_with_state(
                protection.clone(),
                middleware::decrypt,
            ))
            .layer(axum::middleware::from_fn_with_state(
                protection,
                middleware::trusted_subnet,
            )),
    )
}
