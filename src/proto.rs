//! Wire definitions for the `metrics.Metrics` gRPC service.
//!
//! Prost/tonic definitions for the following schema, vendored so builds do
//! not require `protoc`:
//!
//! ```proto
//! syntax = "proto3";
//! package metrics;
//!
//! message Metric {
//!   string key = 1;
//!   enum Type { GAUGE = 0; COUNTER = 1; }
//!   Type type = 2;
//!   oneof m_value {
//!     double value = 3;
//!     int64 delta = 4;
//!   }
//! }
//!
//! message UpdateMetricsBulkRequest { repeated Metric metrics = 1; }
//!
//! message Ack {
//!   bool received = 1;
//!   optional string error = 2;
//! }
//!
//! service Metrics {
//!   rpc UpdateMetricsBulk(UpdateMetricsBulkRequest) returns (Ack);
//! }
//! ```

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metric {
    #[prost(string, tag = "1")]
    pub key: ::prost::alloc::string::String,
    #[prost(enumeration = "metric::Type", tag = "2")]
    pub r#type: i32,
    #[prost(oneof = "metric::MValue", tags = "3, 4")]
    pub m_value: ::core::option::Option<metric::MValue>,
}

pub mod metric {
    #[derive(
        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
    )]
    #[repr(i32)]
    pub enum Type {
        Gauge = 0,
        Counter = 1,
    }

    impl Type {
        pub fn as_str_name(&self) -> &'static str {
            match self {
                Self::Gauge => "GAUGE",
                Self::Counter => "COUNTER",
            }
        }

        pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
            match value {
                "GAUGE" => Some(Self::Gauge),
                "COUNTER" => Some(Self::Counter),
                _ => None,
            }
        }
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum MValue {
        #[prost(double, tag = "3")]
        Value(f64),
        #[prost(int64, tag = "4")]
        Delta(i64),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateMetricsBulkRequest {
    #[prost(message, repeated, tag = "1")]
    pub metrics: ::prost::alloc::vec::Vec<Metric>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ack {
    #[prost(bool, tag = "1")]
    pub received: bool,
    #[prost(string, optional, tag = "2")]
    pub error: ::core::option::Option<::prost::alloc::string::String>,
}

pub mod metrics_client {
    #![allow(unused_variables, dead_code, missing_docs, clippy::wildcard_imports)]

    use tonic::codegen::http::Uri;
    use tonic::codegen::*;

    #[derive(Debug, Clone)]
    pub struct MetricsClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl MetricsClient<tonic::transport::Channel> {
        /// Attempt to create a new client by connecting to a given endpoint.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }

    impl<T> MetricsClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        pub fn with_origin(inner: T, origin: Uri) -> Self {
            let inner = tonic::client::Grpc::with_origin(inner, origin);
            Self { inner }
        }

        pub async fn update_metrics_bulk(
            &mut self,
            request: impl tonic::IntoRequest<super::UpdateMetricsBulkRequest>,
        ) -> std::result::Result<tonic::Response<super::Ack>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/metrics.Metrics/UpdateMetricsBulk");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("metrics.Metrics", "UpdateMetricsBulk"));
            self.inner.unary(req, path, codec).await
        }
    }
}

pub mod metrics_server {
    #![allow(unused_variables, dead_code, missing_docs, clippy::wildcard_imports)]

    use tonic::codegen::*;

    /// Server-side handler trait for the `metrics.Metrics` service.
    #[async_trait]
    pub trait Metrics: Send + Sync + 'static {
        async fn update_metrics_bulk(
            &self,
            request: tonic::Request<super::UpdateMetricsBulkRequest>,
        ) -> std::result::Result<tonic::Response<super::Ack>, tonic::Status>;
    }

    #[derive(Debug)]
    pub struct MetricsServer<T> {
        inner: Arc<T>,
    }

    impl<T> MetricsServer<T> {
        pub fn new(inner: T) -> Self {
            Self::from_arc(Arc::new(inner))
        }

        pub fn from_arc(inner: Arc<T>) -> Self {
            Self { inner }
        }
    }

    impl<T, B> tonic::codegen::Service<http::Request<B>> for MetricsServer<T>
    where
        T: Metrics,
        B: Body + Send + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = std::convert::Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(
            &mut self,
            _cx: &mut Context<'_>,
        ) -> Poll<std::result::Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            match req.uri().path() {
                "/metrics.Metrics/UpdateMetricsBulk" => {
                    struct UpdateMetricsBulkSvc<T: Metrics>(pub Arc<T>);
                    impl<T: Metrics> tonic::server::UnaryService<super::UpdateMetricsBulkRequest>
                        for UpdateMetricsBulkSvc<T>
                    {
                        type Response = super::Ack;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::UpdateMetricsBulkRequest>,
                        ) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            let fut = async move {
                                <T as Metrics>::update_metrics_bulk(&inner, request).await
                            };
                            Box::pin(fut)
                        }
                    }
                    let inner = Arc::clone(&self.inner);
                    let fut = async move {
                        let method = UpdateMetricsBulkSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    Ok(http::Response::builder()
                        .status(http::StatusCode::OK)
                        .header("grpc-status", tonic::Code::Unimplemented as i32)
                        .header(
                            http::header::CONTENT_TYPE,
                            tonic::metadata::GRPC_CONTENT_TYPE,
                        )
                        .body(empty_body())
                        .unwrap())
                }),
            }
        }
    }

    impl<T> Clone for MetricsServer<T> {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
            }
        }
    }

    pub const SERVICE_NAME: &str = "metrics.Metrics";

    impl<T> tonic::server::NamedService for MetricsServer<T> {
        const NAME: &'static str = SERVICE_NAME;
    }
}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    #[test]
    fn request_encoding_round_trips() {
        let request = UpdateMetricsBulkRequest {
            metrics: vec![
                Metric {
                    key: "PollCount".to_string(),
                    r#type: metric::Type::Counter as i32,
                    m_value: Some(metric::MValue::Delta(7)),
                },
                Metric {
                    key: "Alloc".to_string(),
                    r#type: metric::Type::Gauge as i32,
                    m_value: Some(metric::MValue::Value(1024.0)),
                },
            ],
        };

        let bytes = request.encode_to_vec();
        let decoded = UpdateMetricsBulkRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn ack_error_field_is_optional() {
        let ack = Ack {
            received: true,
            error: None,
        };
        let decoded = Ack::decode(ack.encode_to_vec().as_slice()).unwrap();
        assert!(decoded.received);
        assert!(decoded.error.is_none());
    }
}
