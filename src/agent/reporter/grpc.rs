use async_trait::async_trait;
use prost::Message;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

use super::{Reporter, send_with_retry};
use crate::agent::collection::CollectionSnapshot;
use crate::config::AgentConfig;
use crate::core::{MetricsError, Result, SIGNATURE_METADATA_KEY};
use crate::proto;
use crate::proto::metrics_client::MetricsClient;
use crate::signer;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Ships snapshots over the `metrics.Metrics/UpdateMetricsBulk` RPC.
/// The channel connects lazily so a server that is down at startup only
/// surfaces as retriable per-call errors.
pub struct GrpcReporter {
    config: AgentConfig,
    client: MetricsClient<Channel>,
    shutdown: CancellationToken,
}

impl GrpcReporter {
    pub fn new(config: AgentConfig, shutdown: CancellationToken) -> Result<Self> {
        let use_tls = config.crypto_key.is_some();
        let url = if use_tls {
            format!("https://{}", config.address)
        } else {
            format!("http://{}", config.address)
        };

        let mut endpoint = Endpoint::from_shared(url)
            .map_err(|err| MetricsError::Config(format!("invalid gRPC endpoint: {err}")))?
            .timeout(REQUEST_TIMEOUT);

        if use_tls {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new())
                .map_err(|err| MetricsError::Config(format!("invalid TLS config: {err}")))?;
        }

        let channel = endpoint.connect_lazy();
        Ok(Self {
            config,
            client: MetricsClient::new(channel),
            shutdown,
        })
    }

    async fn send_once(&self, bulk: &proto::UpdateMetricsBulkRequest) -> Result<()> {
        let mut request = tonic::Request::new(bulk.clone());

        if let Some(key) = &self.config.key {
            let signature = signer::sign_payload_hex(&bulk.encode_to_vec(), key.as_bytes());
            let value = signature.parse().map_err(|_| {
                MetricsError::Validation("signature is not valid metadata".to_string())
            })?;
            request.metadata_mut().insert(SIGNATURE_METADATA_KEY, value);
        }

        // Cloning the client is cheap; calls multiplex over one channel.
        let mut client = self.client.clone();
        let response = client
            .update_metrics_bulk(request)
            .await
            .map_err(classify)?;

        let ack = response.into_inner();
        if !ack.received {
            let message = ack
                .error
                .unwrap_or_else(|| "server did not acknowledge receipt".to_string());
            return Err(MetricsError::transport(message, false));
        }
        tracing::debug!("report delivered");
        Ok(())
    }
}

#[async_trait]
impl Reporter for GrpcReporter {
    async fn report(&self, snapshot: CollectionSnapshot) -> Result<()> {
        let bulk = to_bulk_request(&snapshot);
        if bulk.metrics.is_empty() {
            return Ok(());
        }

        send_with_retry(&self.shutdown, || self.send_once(&bulk)).await
    }

    async fn close(&self) {}
}

fn to_bulk_request(snapshot: &CollectionSnapshot) -> proto::UpdateMetricsBulkRequest {
    let mut metrics = Vec::with_capacity(snapshot.gauges.len() + snapshot.counters.len());

    for (name, value) in &snapshot.gauges {
        metrics.push(proto::Metric {
            key: name.clone(),
            r#type: proto::metric::Type::Gauge as i32,
            m_value: Some(proto::metric::MValue::Value(*value)),
        });
    }
    for (name, value) in &snapshot.counters {
        metrics.push(proto::Metric {
            key: name.clone(),
            r#type: proto::metric::Type::Counter as i32,
            m_value: Some(proto::metric::MValue::Delta(*value)),
        });
    }

    proto::UpdateMetricsBulkRequest { metrics }
}

fn classify(status: tonic::Status) -> MetricsError {
    let retriable = matches!(
        status.code(),
        tonic::Code::Unavailable | tonic::Code::DeadlineExceeded
    );
    MetricsError::transport(status.to_string(), retriable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_request_carries_both_kinds() {
        let mut snapshot = CollectionSnapshot::default();
        snapshot.gauges.insert("Alloc".to_string(), 64.0);
        snapshot.counters.insert("PollCount".to_string(), 5);

        let bulk = to_bulk_request(&snapshot);
        assert_eq!(bulk.metrics.len(), 2);

        let counter = bulk
            .metrics
            .iter()
            .find(|m| m.key == "PollCount")
            .unwrap();
        assert_eq!(counter.r#type, proto::metric::Type::Counter as i32);
        assert_eq!(counter.m_value, Some(proto::metric::MValue::Delta(5)));
    }

    #[test]
    fn unavailable_and_deadline_are_retriable() {
        assert!(classify(tonic::Status::unavailable("down")).is_retriable());
        assert!(classify(tonic::Status::deadline_exceeded("slow")).is_retriable());
        assert!(!classify(tonic::Status::invalid_argument("bad")).is_retriable());
    }
}
