use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use ipnet::IpNet;
use rsa::RsaPrivateKey;

use super::file::ServerFileConfig;
use super::{
    check_address, check_scheme, env_bool, env_string, env_u64, non_empty, non_zero, read_key_file,
    resolve, resolve_opt,
};
use crate::core::{MetricsError, Result};
use crate::crypto;

const DEFAULT_SCHEME: &str = "http";
const DEFAULT_ADDRESS: &str = "localhost:8080";
const DEFAULT_STORE_INTERVAL_SEC: u64 = 300;
const DEFAULT_FILE_STORAGE_PATH: &str = "data_snapshot";

#[derive(Parser, Debug, Default)]
#[command(name = "server", about = "Telemetry server: ingests, persists and serves metrics", long_about = None)]
pub struct ServerFlags {
    /// Server scheme: http, https or grpc
    #[arg(short = 's', long = "scheme")]
    pub scheme: Option<String>,

    /// Address and port to listen on
    #[arg(short = 'a', long = "address")]
    pub address: Option<String>,

    /// Snapshot interval, seconds (0 disables periodic saves)
    #[arg(short = 'i', long = "store-interval")]
    pub store_interval: Option<u64>,

    /// Snapshot file path
    #[arg(short = 'f', long = "file-storage-path")]
    pub file_storage_path: Option<PathBuf>,

    /// Restore metrics from the snapshot file on start
    #[arg(short = 'r', long = "restore")]
    pub restore: bool,

    /// Postgres DSN; when set, storage is database-backed
    #[arg(short = 'd', long = "database-dsn")]
    pub database_dsn: Option<String>,

    /// HMAC key for payload signing
    #[arg(short = 'k', long = "key")]
    pub key: Option<String>,

    /// Path to a PEM-encoded RSA private key for payload decryption
    #[arg(long = "crypto-key")]
    pub crypto_key: Option<PathBuf>,

    /// CIDR of the trusted agent subnet
    #[arg(short = 't', long = "trusted-subnet")]
    pub trusted_subnet: Option<String>,

    /// Serve profiling endpoints on localhost:6060
    #[arg(short = 'p', long = "profiling")]
    pub profiling: bool,

    /// Path to a JSON config file
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}

/// Environment layer, snapshotted so resolution stays a pure function.
#[derive(Debug, Default)]
pub struct ServerEnv {
    pub scheme: Option<String>,
    pub address: Option<String>,
    pub store_interval: Option<u64>,
    pub file_storage_path: Option<String>,
    pub restore: Option<bool>,
    pub database_dsn: Option<String>,
    pub key: Option<String>,
    pub crypto_key: Option<String>,
    pub trusted_subnet: Option<String>,
}

impl ServerEnv {
    pub fn from_os() -> Result<Self> {
        Ok(Self {
            scheme: env_string("SCHEME"),
            address: env_string("ADDRESS"),
            store_interval: env_u64("STORE_INTERVAL")?,
            file_storage_path: env_string("FILE_STORAGE_PATH"),
            restore: env_bool("RESTORE")?,
            database_dsn: env_string("DATABASE_DSN"),
            key: env_string("KEY"),
            crypto_key: env_string("CRYPTO_KEY"),
            trusted_subnet: env_string("TRUSTED_SUBNET"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub scheme: String,
    pub address: String,
    /// Zero means "no periodic save": snapshots happen only at shutdown.
    pub store_interval: Duration,
    pub file_storage_path: PathBuf,
    pub restore: bool,
    pub database_dsn: Option<String>,
    pub key: Option<String>,
    pub crypto_key: Option<RsaPrivateKey>,
    pub trusted_subnet: Option<IpNet>,
    pub profiling: bool,
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        let flags = ServerFlags::parse();
        let file = match &flags.config {
            Some(path) => ServerFileConfig::read(path)?,
            None => ServerFileConfig::default(),
        };
        let env = ServerEnv::from_os()?;
        Self::resolve_layers(file, flags, env)
    }

    pub fn resolve_layers(
        file: ServerFileConfig,
        flags: ServerFlags,
        env: ServerEnv,
    ) -> Result<Self> {
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
        let store_interval = resolve(
            DEFAULT_STORE_INTERVAL_SEC,
            [
                non_zero(file.store_interval),
                non_zero(flags.store_interval),
                env.store_interval,
            ],
        );
        let file_storage_path = resolve(
            DEFAULT_FILE_STORAGE_PATH.to_string(),
            [
                non_empty(file.store_file),
                non_empty(
                    flags
                        .file_storage_path
                        .map(|p| p.to_string_lossy().into_owned()),
                ),
                non_empty(env.file_storage_path),
            ],
        );
        let restore = resolve(
            false,
            [
                file.restore.filter(|v| *v),
                Some(flags.restore).filter(|v| *v),
                env.restore,
            ],
        );
        let database_dsn = resolve_opt([
            non_empty(file.database_dsn),
            non_empty(flags.database_dsn),
            non_empty(env.database_dsn),
        ]);
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
        let trusted_subnet_raw = resolve_opt([
            non_empty(file.trusted_subnet),
            non_empty(flags.trusted_subnet),
            non_empty(env.trusted_subnet),
        ]);

        check_scheme(&scheme)?;
        check_address(&address)?;

        let crypto_key = match crypto_key_path {
            Some(path) => {
                let pem = read_key_file(std::path::Path::new(&path))?;
                Some(crypto::load_private_key(&pem)?)
            }
            None => None,
        };

        let trusted_subnet = match trusted_subnet_raw {
            Some(raw) => Some(raw.parse::<IpNet>().map_err(|err| {
                MetricsError::Config(format!("trusted subnet must be a CIDR: {err}"))
            })?),
            None => None,
        };

        Ok(Self {
            scheme,
            address,
            store_interval: Duration::from_secs(store_interval),
            file_storage_path: PathBuf::from(file_storage_path),
            restore,
            database_dsn,
            key,
            crypto_key,
            trusted_subnet,
            profiling: flags.profiling,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_provided() {
        let cfg = ServerConfig::resolve_layers(
            ServerFileConfig::default(),
            ServerFlags::default(),
            ServerEnv::default(),
        )
        .unwrap();
        assert_eq!(cfg.scheme, "http");
        assert_eq!(cfg.address, "localhost:8080");
        assert_eq!(cfg.store_interval, Duration::from_secs(300));
        assert_eq!(cfg.file_storage_path, PathBuf::from("data_snapshot"));
        assert!(!cfg.restore);
        assert!(cfg.database_dsn.is_none());
        assert!(cfg.trusted_subnet.is_none());
    }

    #[test]
    fn env_restore_overrides_default() {
        let env = ServerEnv {
            restore: Some(true),
            ..Default::default()
        };
        let cfg =
            ServerConfig::resolve_layers(ServerFileConfig::default(), ServerFlags::default(), env)
                .unwrap();
        assert!(cfg.restore);
    }

    #[test]
    fn file_layer_loses_to_flags() {
        let file = ServerFileConfig {
            store_interval: Some(60),
            store_file: Some("/tmp/file-layer.json".to_string()),
            ..Default::default()
        };
        let flags = ServerFlags {
            store_interval: Some(5),
            ..Default::default()
        };
        let cfg = ServerConfig::resolve_layers(file, flags, ServerEnv::default()).unwrap();
        assert_eq!(cfg.store_interval, Duration::from_secs(5));
        assert_eq!(cfg.file_storage_path, PathBuf::from("/tmp/file-layer.json"));
    }

    #[test]
    fn invalid_subnet_is_fatal() {
        let flags = ServerFlags {
            trusted_subnet: Some("not-a-cidr".to_string()),
            ..Default::default()
        };
        assert!(
            ServerConfig::resolve_layers(ServerFileConfig::default(), flags, ServerEnv::default())
                .is_err()
        );
    }

    #[test]
    fn subnet_parses_and_matches() {
        let flags = ServerFlags {
            trusted_subnet: Some("192.168.1.0/24".to_string()),
            ..Default::default()
        };
        let cfg =
            ServerConfig::resolve_layers(ServerFileConfig::default(), flags, ServerEnv::default())
                .unwrap();
        let net = cfg.trusted_subnet.unwrap();
        assert!(net.contains(&"192.168.1.42".parse::<std::net::IpAddr>().unwrap()));
        assert!(!net.contains(&"10.0.0.1".parse::<std::net::IpAddr>().unwrap()));
    }
}
