pub mod error;
pub mod metric;

pub use error::{MetricsError, Result};
pub use metric::{
    Metric, MetricKind, POLL_COUNT, REAL_IP_HEADER, SIGNATURE_HEADER, SIGNATURE_METADATA_KEY,
};
