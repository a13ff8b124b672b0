use serde::{Deserialize, Serialize};

use super::{MetricsError, Result};

/// HTTP header / gRPC metadata key carrying the hex-encoded HMAC-SHA256
/// payload signature. gRPC metadata keys are matched lowercased.
pub const SIGNATURE_HEADER: &str = "HashSHA256";

/// Lowercased form of [`SIGNATURE_HEADER`] used as gRPC metadata key.
pub const SIGNATURE_METADATA_KEY: &str = "hashsha256";

/// Header carrying the agent's outbound IP for trusted-subnet checks.
pub const REAL_IP_HEADER: &str = "X-Real-IP";

/// Well-known counter incremented once per collection tick.
pub const POLL_COUNT: &str = "PollCount";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "gauge" => Ok(Self::Gauge),
            "counter" => Ok(Self::Counter),
            other => Err(MetricsError::Validation(format!(
                "unknown metric type '{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single wire entity. Exactly one of `delta` / `value` is populated
/// depending on `kind`; the absent field is omitted from JSON, never null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: MetricKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Metric {
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Counter,
            delta: Some(delta),
            value: None,
        }
    }

    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Gauge,
            delta: None,
            value: Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_json_omits_value() {
        let json = serde_json::to_string(&Metric::counter("x", 3)).unwrap();
        assert_eq!(json, r#"{"id":"x","type":"counter","delta":3}"#);
    }

    #[test]
    fn gauge_json_omits_delta() {
        let json = serde_json::to_string(&Metric::gauge("y", 1.5)).unwrap();
        assert_eq!(json, r#"{"id":"y","type":"gauge","value":1.5}"#);
    }

    #[test]
    fn json_round_trip_is_stable() {
        let source = r#"{"id":"cpu","type":"gauge","value":42.25}"#;
        let decoded: Metric = serde_json::from_str(source).unwrap();
        assert_eq!(serde_json::to_string(&decoded).unwrap(), source);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let res = serde_json::from_str::<Metric>(r#"{"id":"x","type":"histogram"}"#);
        assert!(res.is_err());
    }
}
