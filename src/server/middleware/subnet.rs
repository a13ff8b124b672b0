use std::net::IpAddr;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::ProtectionConfig;
use crate::core::REAL_IP_HEADER;

/// Rejects requests whose `X-Real-IP` is absent, unparseable or outside
/// the configured CIDR. With no subnet configured all origins pass.
pub async fn trusted_subnet(
    State(config): State<ProtectionConfig>,
    req: Request,
    next: Next,
) -> Response {
    let Some(subnet) = config.trusted_subnet else {
        return next.run(req).await;
    };

    let origin = req
        .headers()
        .get(REAL_IP_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<IpAddr>().ok());

    match origin {
        Some(ip) if subnet.contains(&ip) => next.run(req).await,
        _ => StatusCode::FORBIDDEN.into_response(),
    }
}
