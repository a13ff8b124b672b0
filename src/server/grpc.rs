//! gRPC ingest: the `metrics.Metrics` service exposes bulk update only.

use std::sync::Arc;

use prost::Message;
use tonic::{Request, Response, Status};

use crate::core::{Metric, MetricKind, MetricsError, SIGNATURE_METADATA_KEY};
use crate::proto;
use crate::signer;
use crate::storage::Repository;

pub struct MetricsService {
    repo: Arc<dyn Repository>,
    key: Option<String>,
}

impl MetricsService {
    pub fn new(repo: Arc<dyn Repository>, key: Option<String>) -> Self {
        Self { repo, key }
    }

    /// HMAC check over the re-encoded request bytes against the
    /// `hashsha256` metadata entry. tonic interceptors only see metadata,
    /// so the message-level check lives here, in front of the handler body.
    fn verify_signature(&self, request: &Request<proto::UpdateMetricsBulkRequest>) -> Result<(), Status> {
        let Some(key) = &self.key else {
            return Ok(());
        };

        let signature = request
            .metadata()
            .get(SIGNATURE_METADATA_KEY)
            .ok_or_else(|| Status::unauthenticated("no signature header found"))?
            .to_str()
            .map_err(|_| Status::unauthenticated("invalid signature format"))?;

        let payload = request.get_ref().encode_to_vec();
        if !signer::verify_payload_hex(&payload, key.as_bytes(), signature) {
            return Err(Status::unauthenticated("signature mismatch"));
        }
        Ok(())
    }
}

#[tonic::async_trait]
impl proto::metrics_server::Metrics for MetricsService {
    async fn update_metrics_bulk(
        &self,
        request: Request<proto::UpdateMetricsBulkRequest>,
    ) -> Result<Response<proto::Ack>, Status> {
        self.verify_signature(&request)?;

        let metrics = to_domain_metrics(request.into_inner());
        match self.repo.update_metrics(&metrics).await {
            Ok(()) => Ok(Response::new(proto::Ack {
                received: true,
                error: None,
            })),
            Err(MetricsError::Validation(message)) => Err(Status::invalid_argument(message)),
            Err(err) => Err(Status::internal(err.to_string())),
        }
    }
}

fn to_domain_metrics(bulk: proto::UpdateMetricsBulkRequest) -> Vec<Metric> {
    bulk.metrics
        .into_iter()
        .map(|metric| {
            let kind = match proto::metric::Type::try_from(metric.r#type) {
                Ok(proto::metric::Type::Counter) => MetricKind::Counter,
                _ => MetricKind::Gauge,
            };
            match kind {
                MetricKind::Counter => {
                    let delta = match metric.m_value {
                        Some(proto::metric::MValue::Delta(delta)) => delta,
                        _ => 0,
                    };
                    Metric::counter(metric.key, delta)
                }
                MetricKind::Gauge => {
                    let value = match metric.m_value {
                        Some(proto::metric::MValue::Value(value)) => value,
                        _ => 0.0,
                    };
                    Metric::gauge(metric.key, value)
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::metrics_server::Metrics as _;
    use crate::storage::MemStorage;

    fn sample_request() -> proto::UpdateMetricsBulkRequest {
        proto::UpdateMetricsBulkRequest {
            metrics: vec![
                proto::Metric {
                    key: "PollCount".to_string(),
                    r#type: proto::metric::Type::Counter as i32,
                    m_value: Some(proto::metric::MValue::Delta(3)),
                },
                proto::Metric {
                    key: "Alloc".to_string(),
                    r#type: proto::metric::Type::Gauge as i32,
                    m_value: Some(proto::metric::MValue::Value(8.5)),
                },
            ],
        }
    }

    #[tokio::test]
    async fn bulk_update_lands_in_storage() {
        let repo = Arc::new(MemStorage::new());
        let service = MetricsService::new(repo.clone(), None);

        let ack = service
            .update_metrics_bulk(Request::new(sample_request()))
            .await
            .unwrap()
            .into_inner();
        assert!(ack.received);
        assert_eq!(repo.get_counter("PollCount").await.unwrap(), 3);
        assert_eq!(repo.get_gauge("Alloc").await.unwrap(), 8.5);
    }

    #[tokio::test]
    async fn missing_signature_is_unauthenticated() {
        let repo = Arc::new(MemStorage::new());
        let service = MetricsService::new(repo, Some("secret".to_string()));

        let err = service
            .update_metrics_bulk(Request::new(sample_request()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
    }

    #[tokio::test]
    async fn valid_signature_passes() {
        let repo = Arc::new(MemStorage::new());
        let service = MetricsService::new(repo, Some("secret".to_string()));

        let bulk = sample_request();
        let signature = signer::sign_payload_hex(&bulk.encode_to_vec(), b"secret");
        let mut request = Request::new(bulk);
        request
            .metadata_mut()
            .insert(SIGNATURE_METADATA_KEY, signature.parse().unwrap());

        let ack = service.update_metrics_bulk(request).await.unwrap().into_inner();
        assert!(ack.received);
    }

    #[tokio::test]
    async fn wrong_key_signature_is_rejected() {
        let repo = Arc::new(MemStorage::new());
        let service = MetricsService::new(repo, Some("server-key".to_string()));

        let bulk = sample_request();
        let signature = signer::sign_payload_hex(&bulk.encode_to_vec(), b"agent-key");
        let mut request = Request::new(bulk);
        request
            .metadata_mut()
            .insert(SIGNATURE_METADATA_KEY, signature.parse().unwrap());

        let err = service.update_metrics_bulk(request).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
    }
}
