use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Identity, ServerTlsConfig};

use super::debug::run_debug_server;
use super::grpc::MetricsService;
use super::handlers::AppState;
use super::middleware::ProtectionConfig;
use crate::config::ServerConfig;
use crate::core::{MetricsError, Result};
use crate::proto::metrics_server::MetricsServer;
use crate::storage::{DbStorage, FileSnapshot, MemStorage, Repository, RetriableStorage};

/// Composes storage, transport and middleware, and owns the lifecycle:
/// optional snapshot loop, optional profiling server, serve until the
/// shutdown token fires, final snapshot save on the way out.
pub struct Application {
    config: ServerConfig,
}

impl Application {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        if self.config.profiling {
            tokio::spawn(run_debug_server(shutdown.child_token()));
        }

        if let Some(dsn) = self.config.database_dsn.clone() {
            let db = DbStorage::connect(&dsn).await?;
            db.bootstrap_schema().await?;
            let repo: Arc<dyn Repository> = Arc::new(RetriableStorage::new(db));
            return self.serve(repo, shutdown).await;
        }

        let mem = Arc::new(MemStorage::new());
        let snapshot = FileSnapshot::new(&mem, &self.config.file_storage_path);

        if self.config.restore {
            if let Err(err) = snapshot.restore().await {
                tracing::warn!(error = %err, "snapshot restore skipped");
            }
        }

        let saver = self.spawn_snapshot_saver(snapshot, &shutdown);

        let repo: Arc<dyn Repository> = mem;
        let result = self.serve(repo, shutdown).await;

        // The saver exits after its final save; wait so data hits disk
        // before the process does.
        if let Some(saver) = saver {
            let _ = saver.await;
        }
        result
    }

    fn spawn_snapshot_saver(
        &self,
        snapshot: FileSnapshot,
        shutdown: &CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if self.config.store_interval.is_zero() {
            return None;
        }
        let interval = self.config.store_interval;
        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            let mut tick = tokio::time::interval_at(start + interval, interval);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if let Err(err) = snapshot.save().await {
                            tracing::error!(error = %err, "snapshot save failed");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        tracing::info!("stopping snapshot saver");
                        if let Err(err) = snapshot.save().await {
                            tracing::error!(error = %err, "final snapshot save failed");
                        }
                        return;
                    }
                }
            }
        }))
    }

    async fn serve(&self, repo: Arc<dyn Repository>, shutdown: CancellationToken) -> Result<()> {
        match self.config.scheme.as_str() {
            "http" | "https" => self.serve_http(repo, shutdown).await,
            "grpc" => self.serve_grpc(repo, shutdown).await,
            other => Err(MetricsError::Config(format!("unknown protocol '{other}'"))),
        }
    }

    async fn serve_http(&self, repo: Arc<dyn Repository>, shutdown: CancellationToken) -> Result<()> {
        let protection = ProtectionConfig {
            key: self.config.key.clone().map(Arc::new),
            private_key: self.config.crypto_key.clone().map(Arc::new),
            trusted_subnet: self.config.trusted_subnet,
        };
        let app = super::build_app(AppState { repo }, protection);

        let listener = TcpListener::bind(&self.config.address).await?;
        tracing::info!(address = %self.config.address, "starting HTTP server");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;
        Ok(())
    }

    async fn serve_grpc(&self, repo: Arc<dyn Repository>, shutdown: CancellationToken) -> Result<()> {
        let addr = tokio::net::lookup_host(&self.config.address)
            .await?
            .next()
            .ok_or_else(|| {
                MetricsError::Config(format!("cannot resolve address '{}'", self.config.address))
            })?;

        let service = MetricsService::new(repo, self.config.key.clone());

        let mut builder = tonic::transport::Server::builder();
        if self.config.crypto_key.is_some() {
            let cert = std::fs::read_to_string("server.crt")?;
            let key = std::fs::read_to_string("server.key")?;
            builder = builder
                .tls_config(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))
                .map_err(|err| MetricsError::Config(format!("invalid TLS config: {err}")))?;
        }

        tracing::info!(address = %self.config.address, "starting gRPC server");
        builder
            .add_service(MetricsServer::new(service))
            .serve_with_shutdown(addr, shutdown.cancelled_owned())
            .await
            .map_err(|err| MetricsError::transport(err.to_string(), false))
    }
}
