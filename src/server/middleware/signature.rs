use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::ProtectionConfig;
use crate::core::{SIGNATURE_HEADER, SIGNATURE_METADATA_KEY};
use crate::signer;

/// Validates the request signature and signs 200 responses.
///
/// Runs over the body as received here: after gzip decoding, before
/// decryption. A request without the header passes through unsigned and
/// the response is then left unsigned too.
pub async fn signature(
    State(config): State<ProtectionConfig>,
    req: Request,
    next: Next,
) -> Response {
    let Some(key) = config.key.clone() else {
        return next.run(req).await;
    };
    let Some(received) = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
    else {
        return next.run(req).await;
    };

    let (parts, body) = req.into_parts();
    let Ok(bytes) = to_bytes(body, usize::MAX).await else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    if !signer::verify_payload_hex(&bytes, key.as_bytes(), &received) {
        return (StatusCode::BAD_GATEWAY, "invalid signature").into_response();
    }

    let response = next
        .run(Request::from_parts(parts, Body::from(bytes)))
        .await;

    if response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let Ok(response_bytes) = to_bytes(body, usize::MAX).await else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let response_signature = signer::sign_payload_hex(&response_bytes, key.as_bytes());
    if let Ok(value) = HeaderValue::from_str(&response_signature) {
        parts
            .headers
            .insert(HeaderName::from_static(SIGNATURE_METADATA_KEY), value);
    }
    Response::from_parts(parts, Body::from(response_bytes))
}
