use std::io::{Read, Write};

use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Transparently decompresses gzipped request bodies and compresses
/// responses for clients that accept gzip. A body that fails to
/// decompress is a 500, matching the ingest contract.
pub async fn compress(req: Request, next: Next) -> Response {
    let accepts_gzip = header_contains(&req, header::ACCEPT_ENCODING, "gzip");
    let sends_gzip = header_contains(&req, header::CONTENT_ENCODING, "gzip");

    let req = if sends_gzip {
        let (mut parts, body) = req.into_parts();
        let Ok(bytes) = to_bytes(body, usize::MAX).await else {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        };
        let mut decoded = Vec::new();
        if GzDecoder::new(&bytes[..]).read_to_end(&mut decoded).is_err() {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        parts.headers.remove(header::CONTENT_ENCODING);
        parts.headers.remove(header::CONTENT_LENGTH);
        Request::from_parts(parts, Body::from(decoded))
    } else {
        req
    };

    let response = next.run(req).await;

    if !accepts_gzip {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let Ok(bytes) = to_bytes(body, usize::MAX).await else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(&bytes).is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let Ok(compressed) = encoder.finish() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    parts
        .headers
        .insert(header::CONTENT_ENCODING, header::HeaderValue::from_static("gzip"));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(compressed))
}

fn header_contains(req: &Request, name: header::HeaderName, token: &str) -> bool {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains(token))
}
