use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use metrion::agent::{GrpcReporter, HttpReporter, Reporter, Scheduler, TrackingAllocator};
use metrion::buildinfo;
use metrion::config::AgentConfig;
use metrion::shutdown;

// Counting allocator feeds the runtime memory gauges.
#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    buildinfo::log_build_info();

    let config = AgentConfig::load()?;

    let shutdown = CancellationToken::new();
    shutdown::watch_signals(shutdown.clone());

    let reporter: Arc<dyn Reporter> = match config.scheme.as_str() {
        "grpc" => Arc::new(GrpcReporter::new(config.clone(), shutdown.clone())?),
        _ => Arc::new(HttpReporter::new(config.clone(), shutdown.clone())?),
    };

    Scheduler::new(config, reporter, shutdown).run().await;
    Ok(())
}
