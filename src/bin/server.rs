use std::time::Duration;

use tokio_util::sync::CancellationToken;

use metrion::buildinfo;
use metrion::config::ServerConfig;
use metrion::server::Application;
use metrion::shutdown;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    buildinfo::log_build_info();

    let config = ServerConfig::load()?;

    let shutdown = CancellationToken::new();
    shutdown::watch_signals(shutdown.clone());

    let mut server = tokio::spawn(Application::new(config).run(shutdown.clone()));

    tokio::select! {
        result = &mut server => result??,
        _ = shutdown.cancelled() => {
            // Work still in progress past the cap is abandoned.
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, server).await {
                Ok(result) => result??,
                Err(_) => anyhow::bail!("graceful shutdown timed out"),
            }
        }
    }
    Ok(())
}
