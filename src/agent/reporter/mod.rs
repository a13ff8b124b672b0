//! Transport-polymorphic metric shipping.
//!
//! Both reporters share one preparation pipeline: flatten the snapshot,
//! marshal to JSON, optionally chunk-encrypt with the server's RSA public
//! key, optionally sign the plaintext with HMAC-SHA256, then gzip the
//! result. Only the request envelope differs per transport.

mod grpc;
mod http;

pub use grpc::GrpcReporter;
pub use http::HttpReporter;

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use rsa::RsaPublicKey;
use tokio_util::sync::CancellationToken;

use super::collection::CollectionSnapshot;
use crate::core::{Metric, Result};
use crate::{crypto, signer};

/// Delivery schedule for transient transport failures.
pub(crate) const RETRY_INTERVALS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(5),
];

#[async_trait]
pub trait Reporter: Send + Sync {
    /// Ships one snapshot. Transport failures are returned so the caller
    /// can count them; they must never abort the agent.
    async fn report(&self, snapshot: CollectionSnapshot) -> Result<()>;

    /// Releases transport resources.
    async fn close(&self);
}

/// A fully prepared HTTP payload: gzipped body plus the signature computed
/// over the plaintext JSON (not the ciphertext).
pub(crate) struct EncodedPayload {
    pub body: Vec<u8>,
    pub signature: Option<String>,
}

pub(crate) fn encode_payload(
    metrics: &[Metric],
    key: Option<&str>,
    crypto_key: Option<&RsaPublicKey>,
) -> Result<EncodedPayload> {
    let json = serde_json::to_vec(metrics)?;

    let signature = key.map(|k| signer::sign_payload_hex(&json, k.as_bytes()));

    let protected = match crypto_key {
        Some(public_key) => crypto::encrypt_chunked(public_key, &json)?,
        None => json,
    };

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&protected)?;
    let body = encoder.finish()?;

    Ok(EncodedPayload { body, signature })
}

/// Runs `attempt` up to three times, sleeping [1s, 2s] between retriable
/// failures. The sleep aborts as soon as `shutdown` fires so a stopping
/// agent never waits out the schedule.
pub(crate) async fn send_with_retry<F, Fut>(
    shutdown: &CancellationToken,
    mut attempt: F,
) -> Result<()>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send,
{
    let mut tries = 0;
    loop {
        match attempt().await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_retriable() && tries < RETRY_INTERVALS.len() - 1 => {
                tracing::warn!(error = %err, attempt = tries, "report attempt failed, retrying");
                tokio::select! {
                    _ = shutdown.cancelled() => return Err(err),
                    _ = tokio::time::sleep(RETRY_INTERVALS[tries]) => {}
                }
                tries += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Local address of a UDP socket pointed at a public resolver; no traffic
/// is sent. Failures degrade to the literal `unknown`.
pub(crate) fn outbound_ip() -> String {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to discover outbound IP");
            "unknown".to_string()
        })
}
