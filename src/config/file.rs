//! JSON config file support. Unknown keys are ignored; a file that is not
//! valid JSON is a fatal configuration error.

use std::path::Path;

use serde::Deserialize;

use crate::core::{MetricsError, Result};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AgentFileConfig {
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub crypto_key: Option<String>,
    #[serde(default)]
    pub report_interval: Option<u64>,
    #[serde(default)]
    pub poll_interval: Option<u64>,
    #[serde(default)]
    pub rate_limit: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub crypto_key: Option<String>,
    #[serde(default)]
    pub restore: Option<bool>,
    #[serde(default)]
    pub store_interval: Option<u64>,
    #[serde(default)]
    pub store_file: Option<String>,
    #[serde(default)]
    pub database_dsn: Option<String>,
    #[serde(default)]
    pub trusted_subnet: Option<String>,
}

impl AgentFileConfig {
    pub fn read(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

impl ServerFileConfig {
    pub fn read(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path).map_err(|err| {
        MetricsError::Config(format!("cannot read config file {}: {err}", path.display()))
    })?;
    serde_json::from_str(&data).map_err(|err| {
        MetricsError::Config(format!("invalid config file {}: {err}", path.display()))
    })
}
