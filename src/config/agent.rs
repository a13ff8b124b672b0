use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rsa::RsaPublicKey;

use super::file::AgentFileConfig;
use super::{
    check_address, check_scheme, env_string, env_u64, non_empty, non_zero, read_key_file, resolve,
    resolve_opt,
};
use crate::core::Result;
use crate::crypto;

const DEFAULT_SCHEME: &str = "http";
const DEFAULT_ADDRESS: &str = "localhost:8080";
const DEFAULT_REPORT_INTERVAL_SEC: u64 = 10;
const DEFAULT_POLL_INTERVAL_SEC: u64 = 2;
const DEFAULT_RATE_LIMIT: u64 = 5;

#[derive(Parser, Debug, Default)]
#[command(name = "agent", about = "Telemetry agent: samples metrics and ships them to the server", long_about = None)]
pub struct AgentFlags {
    /// Server scheme: http, https or grpc
    #[arg(short = 's', long = "scheme")]
    pub scheme: Option<String>,

    /// Address and port of the server
    #[arg(short = 'a', long = "address")]
    pub address: Option<String>,

    /// Report interval, seconds
    #[arg(short = 'r', long = "report-interval")]
    pub report_interval: Option<u64>,

    /// Poll interval, seconds
    #[arg(short = 'p', long = "poll-interval")]
    pub poll_interval: Option<u64>,

    /// Number of concurrent report workers
    #[arg(short = 'l', long = "rate-limit")]
    pub rate_limit: Option<u64>,

    /// HMAC key for payload signing
    #[arg(short = 'k', long = "key")]
    pub key: Option<String>,

    /// Path to a PEM-encoded RSA public key for payload encryption
    #[arg(long = "crypto-key")]
    pub crypto_key: Option<PathBuf>,

    /// Path to a JSON config file
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}

/// Environment layer, snapshotted so resolution stays a pure function.
#[derive(Debug, Default)]
pub struct AgentEnv {
    pub scheme: Option<String>,
    pub address: Option<String>,
    pub report_interval: Option<u64>,
    pub poll_interval: Option<u64>,
    pub rate_limit: Option<u64>,
    pub key: Option<String>,
    pub crypto_key: Option<String>,
}

impl AgentEnv {
    pub fn from_os() -> Result<Self> {
        Ok(Self {
            scheme: env_string("SCHEME"),
            address: env_string("ADDRESS"),
            report_interval: env_u64("REPORT_INTERVAL")?,
            poll_interval: env_u64("POLL_INTERVAL")?,
            rate_limit: env_u64("RATE_LIMIT")?,
            key: env_string("KEY"),
            crypto_key: env_string("CRYPTO_KEY"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub scheme: String,
    pub address: String,
    pub report_interval: Duration,
    pub poll_interval: Duration,
    pub rate_limit: usize,
    pub key: Option<String>,
    pub crypto_key: Option<RsaPublicKey>,
}

impl AgentConfig {
    /// Parses flags, the optional config file and the environment, then
    /// resolves the layered result. Fatal on any validation failure.
    pub fn load() -> Result<Self> {
        let flags = AgentFlags::parse();
        let file = match &flags.config {
            Some(path) => AgentFileConfig::read(path)?,
            None => AgentFileConfig::default(),
        };
        let env = AgentEnv::from_os()?;
        Self::resolve_layers(file, flags, env)
    }

    pub fn resolve_layers(file: AgentFileConfig, flags: AgentFlags, env: AgentEnv) -> Result<Self> {
        let scheme = resolve(
            DEFAULT_SCHEME.to_string(),
            [
                non_empty(file.scheme),
                non_empty(flags.scheme),
                non_empty(env.scheme),
            ],
        );
        let address = resolve(
            DEFAULT_ADDRESS.to_string(),
            [
                non_empty(file.address),
                non_empty(flags.address),
                non_empty(env.address),
            ],
        );
        let report_interval = resolve(
            DEFAULT_REPORT_INTERVAL_SEC,
            [
                non_zero(file.report_interval),
                non_zero(flags.report_interval),
                env.report_interval,
            ],
        );
        let poll_interval = resolve(
            DEFAULT_POLL_INTERVAL_SEC,
            [
                non_zero(file.poll_interval),
                non_zero(flags.poll_interval),
                env.poll_interval,
            ],
        );
        let rate_limit = resolve(
            DEFAULT_RATE_LIMIT,
            [
                non_zero(file.rate_limit),
                non_zero(flags.rate_limit),
                env.rate_limit,
            ],
        );
        let key = resolve_opt([
            non_empty(file.key),
            non_empty(flags.key),
            non_empty(env.key),
        ]);
        let crypto_key_path = resolve_opt([
            non_empty(file.crypto_key),
            non_empty(flags.crypto_key.map(|p| p.to_string_lossy().into_owned())),
            non_empty(env.crypto_key),
        ]);

        check_scheme(&scheme)?;
        check_address(&address)?;

        let crypto_key = match crypto_key_path {
            Some(path) => {
                let pem = read_key_file(std::path::Path::new(&path))?;
                Some(crypto::load_public_key(&pem)?)
            }
            None => None,
        };

        Ok(Self {
            scheme,
            address,
            report_interval: Duration::from_secs(report_interval),
            poll_interval: Duration::from_secs(poll_interval),
            rate_limit: rate_limit as usize,
            key,
            crypto_key,
        })
    }
}
