use async_trait::async_trait;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;

use super::{EncodedPayload, Reporter, encode_payload, outbound_ip, send_with_retry};
use crate::agent::collection::CollectionSnapshot;
use crate::config::AgentConfig;
use crate::core::{MetricsError, REAL_IP_HEADER, Result, SIGNATURE_HEADER};

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Ships snapshots as gzipped JSON over `POST /updates/`.
pub struct HttpReporter {
    config: AgentConfig,
    client: reqwest::Client,
    shutdown: CancellationToken,
}

impl HttpReporter {
    pub fn new(config: AgentConfig, shutdown: CancellationToken) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| MetricsError::transport(err.to_string(), false))?;
        Ok(Self {
            config,
            client,
            shutdown,
        })
    }

    async fn send_once(&self, url: &str, payload: &EncodedPayload, host_ip: &str) -> Result<()> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_ENCODING, "gzip")
            .header(REAL_IP_HEADER, host_ip)
            .body(payload.body.clone());

        if let Some(signature) = &payload.signature {
            request = request.header(SIGNATURE_HEADER, signature.as_str());
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            // Server-side rejections are never worth retrying.
            return Err(MetricsError::transport(
                format!("server returned {status}"),
                false,
            ));
        }
        tracing::debug!(status = %status, "report delivered");
        Ok(())
    }
}

#[async_trait]
impl Reporter for HttpReporter {
    async fn report(&self, snapshot: CollectionSnapshot) -> Result<()> {
        let metrics = snapshot.to_metrics();
        if metrics.is_empty() {
            return Ok(());
        }

        let payload = encode_payload(
            &metrics,
            self.config.key.as_deref(),
            self.config.crypto_key.as_ref(),
        )?;
        let url = format!(
            "{}://{}/updates/",
            self.config.scheme, self.config.address
        );
        let host_ip = outbound_ip();

        send_with_retry(&self.shutdown, || {
            self.send_once(&url, &payload, &host_ip)
        })
        .await
    }

    async fn close(&self) {}
}

/// Connection-refused and timeout failures go back onto the retry
/// schedule; anything else aborts the report.
fn classify(err: reqwest::Error) -> MetricsError {
    MetricsError::transport(err.to_string(), err.is_connect() || err.is_timeout())
}
