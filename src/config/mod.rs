//! Layered configuration shared by both executables.
//!
//! Each recognized field is resolved independently with priority
//! built-in default < config file < command-line flag < environment.
//! Empty strings and numeric zeros coming from file, flag or env count
//! as "not provided", so they never shadow a lower layer.

mod agent;
mod file;
mod server;

pub use agent::{AgentConfig, AgentEnv, AgentFlags};
pub use file::{AgentFileConfig, ServerFileConfig};
pub use server::{ServerConfig, ServerEnv, ServerFlags};

use crate::core::{MetricsError, Result};

/// Picks the highest-priority provided candidate. `layers` are ordered
/// lowest to highest (file, flag, env); `None` entries are skipped.
fn resolve<T>(default: T, layers: [Option<T>; 3]) -> T {
    layers.into_iter().flatten().last().unwrap_or(default)
}

/// Like [`resolve`], for fields whose default is "unset".
fn resolve_opt<T>(layers: [Option<T>; 3]) -> Option<T> {
    layers.into_iter().flatten().last()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn non_zero(value: Option<u64>) -> Option<u64> {
    value.filter(|v| *v != 0)
}

fn env_string(name: &str) -> Option<String> {
    non_empty(std::env::var(name).ok())
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) if raw.is_empty() => Ok(None),
        Ok(raw) => raw
            .parse::<u64>()
            .map(|v| non_zero(Some(v)))
            .map_err(|_| MetricsError::Config(format!("{name} must be an integer, got '{raw}'"))),
        Err(_) => Ok(None),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    match std::env::var(name) {
        Ok(raw) if raw.is_empty() => Ok(None),
        Ok(raw) => match raw.as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(None),
            other => Err(MetricsError::Config(format!(
                "{name} must be a boolean, got '{other}'"
            ))),
        },
        Err(_) => Ok(None),
    }
}

/// Scheme names the transport: plain or TLS HTTP, or gRPC.
fn check_scheme(scheme: &str) -> Result<()> {
    match scheme {
        "http" | "https" | "grpc" => Ok(()),
        other => Err(MetricsError::Config(format!(
            "scheme must be http, https or grpc, got '{other}'"
        ))),
    }
}

fn check_address(address: &str) -> Result<()> {
    let (host, port) = address.rsplit_once(':').ok_or_else(|| {
        MetricsError::Config(format!("address must be host:port, got '{address}'"))
    })?;
    if host.is_empty() {
        return Err(MetricsError::Config(format!(
            "address must include a host, got '{address}'"
        )));
    }
    port.parse::<u16>().map_err(|_| {
        MetricsError::Config(format!("address port must be numeric, got '{address}'"))
    })?;
    Ok(())
}

fn read_key_file(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| {
        MetricsError::Config(format!("cannot read key file {}: {err}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_provided_layer_wins() {
        let value = resolve(
            "default".to_string(),
            [
                Some("file".to_string()),
                Some("flag".to_string()),
                Some("env".to_string()),
            ],
        );
        assert_eq!(value, "env");
    }

    #[test]
    fn unset_env_never_beats_a_set_flag() {
        let value = resolve(
            "default".to_string(),
            [Some("file".to_string()), Some("flag".to_string()), None],
        );
        assert_eq!(value, "flag");
    }

    #[test]
    fn default_survives_when_nothing_is_provided() {
        assert_eq!(resolve(42u64, [None, None, None]), 42);
    }

    #[test]
    fn empty_and_zero_count_as_absent() {
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_zero(Some(0)), None);
        assert_eq!(non_zero(Some(7)), Some(7));
    }

    #[test]
    fn scheme_validation() {
        assert!(check_scheme("http").is_ok());
        assert!(check_scheme("https").is_ok());
        assert!(check_scheme("grpc").is_ok());
        assert!(check_scheme("ftp").is_err());
    }

    #[test]
    fn address_validation() {
        assert!(check_address("localhost:8080").is_ok());
        assert!(check_address("127.0.0.1:9000").is_ok());
        assert!(check_address("localhost").is_err());
        assert!(check_address(":8080").is_err());
        assert!(check_address("localhost:http").is_err());
    }
}
