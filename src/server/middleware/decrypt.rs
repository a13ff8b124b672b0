use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::ProtectionConfig;
use crate::crypto;

/// Chunk-decrypts the request body with the configured RSA private key.
/// The plaintext replaces the body for downstream handlers.
pub async fn decrypt(State(config): State<ProtectionConfig>, req: Request, next: Next) -> Response {
    let Some(private_key) = config.private_key.clone() else {
        return next.run(req).await;
    };

    let (mut parts, body) = req.into_parts();
    let Ok(bytes) = to_bytes(body, usize::MAX).await else {
        return (StatusCode::BAD_REQUEST, "failed to read request body").into_response();
    };

    let plaintext = match crypto::decrypt_chunked(&private_key, &bytes) {
        Ok(plaintext) => plaintext,
        Err(err) => {
            tracing::debug!(error = %err, "request decryption failed");
            return (StatusCode::BAD_REQUEST, "failed to decrypt data").into_response();
        }
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    next.run(Request::from_parts(parts, Body::from(plaintext)))
        .await
}
