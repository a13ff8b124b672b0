use std::time::Instant;

use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Structured request log: uri, method, status, duration and response
/// size. Bodies here are small, so the response is buffered to measure it.
pub async fn request_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let (parts, body) = response.into_parts();
    let Ok(bytes) = to_bytes(body, usize::MAX).await else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    tracing::info!(
        uri = %uri,
        method = %method,
        status = parts.status.as_u16(),
        duration = ?start.elapsed(),
        size = bytes.len(),
        "request handled"
    );

    Response::from_parts(parts, Body::from(bytes))
}
