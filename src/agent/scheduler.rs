use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::collection::{CollectionSnapshot, MetricsCollection};
use super::collector::{HostCollector, RuntimeCollector};
use super::reporter::Reporter;
use crate::config::AgentConfig;

/// Drives collection and reporting on independent tickers.
///
/// One select loop owns both tickers and the shutdown signal; it is the
/// sole producer on a bounded job channel sized to the CPU count, drained
/// by a fixed pool of report workers. When the channel is full at report
/// time the tick is dropped and counted rather than stalling collection.
pub struct Scheduler {
    collection: Arc<MetricsCollection>,
    runtime: Arc<RuntimeCollector>,
    host: Arc<HostCollector>,
    reporter: Arc<dyn Reporter>,
    config: AgentConfig,
    shutdown: CancellationToken,
    dropped_reports: Arc<AtomicU64>,
}

impl Scheduler {
    pub fn new(config: AgentConfig, reporter: Arc<dyn Reporter>, shutdown: CancellationToken) -> Self {
        Self {
            collection: Arc::new(MetricsCollection::new()),
            runtime: Arc::new(RuntimeCollector::new()),
            host: Arc::new(HostCollector::new()),
            reporter,
            config,
            shutdown,
            dropped_reports: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Runs until the shutdown token fires, then drains in-flight reports
    /// and closes the reporter.
    pub async fn run(self) {
        let queue_size = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let (jobs_tx, jobs_rx) = mpsc::channel::<CollectionSnapshot>(queue_size);
        let jobs_rx = Arc::new(tokio::sync::Mutex::new(jobs_rx));

        let worker_count = self.config.rate_limit.max(1);
        if self.config.rate_limit == 0 {
            tracing::warn!("rate limit 0 clamped to 1 worker");
        }

        let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            workers.push(tokio::spawn(report_worker(
                id,
                Arc::clone(&jobs_rx),
                Arc::clone(&self.reporter),
            )));
        }

        // Pool of one for collection: a tick that arrives while the
        // previous collection still runs is skipped, not stacked.
        let collect_gate = Arc::new(tokio::sync::Mutex::new(()));

        // First tick lands one full period out, matching ticker semantics.
        let start = tokio::time::Instant::now();
        let mut poll_tick =
            tokio::time::interval_at(start + self.config.poll_interval, self.config.poll_interval);
        let mut report_tick = tokio::time::interval_at(
            start + self.config.report_interval,
            self.config.report_interval,
        );
        poll_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        report_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = poll_tick.tick() => self.spawn_collect(&collect_gate),
                _ = report_tick.tick() => {
                    let snapshot = self.collection.snapshot();
                    match jobs_tx.try_send(snapshot) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            let dropped = self.dropped_reports.fetch_add(1, Ordering::Relaxed) + 1;
                            tracing::warn!(dropped, "report queue full, dropping tick");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => break,
                    }
                }
            }
        }

        // Closing the channel lets workers drain the backlog and exit.
        drop(jobs_tx);
        for worker in workers {
            let _ = worker.await;
        }
        self.reporter.close().await;

        tracing::info!(
            dropped_reports = self.dropped_reports.load(Ordering::Relaxed),
            "agent scheduler stopped"
        );
    }

    fn spawn_collect(&self, gate: &Arc<tokio::sync::Mutex<()>>) {
        let Ok(permit) = Arc::clone(gate).try_lock_owned() else {
            tracing::debug!("previous collection still running, skipping poll tick");
            return;
        };
        let collection = Arc::clone(&self.collection);
        let runtime = Arc::clone(&self.runtime);
        let host = Arc::clone(&self.host);
        tokio::spawn(async move {
            let _permit = permit;
            let runtime_task = tokio::task::spawn_blocking({
                let collection = Arc::clone(&collection);
                move || runtime.collect(&collection)
            });
            let host_task = tokio::task::spawn_blocking({
                let collection = Arc::clone(&collection);
                move || host.collect(&collection)
            });
            let _ = runtime_task.await;
            let _ = host_task.await;
        });
    }

    pub fn dropped_reports(&self) -> u64 {
        self.dropped_reports.load(Ordering::Relaxed)
    }
}

async fn report_worker(id: usize, jobs: Arc<tokio::sync::Mutex<mpsc::Receiver<CollectionSnapshot>>>, reporter: Arc<dyn Reporter>) {
    loop {
        let job = { jobs.lock().await.recv().await };
        match job {
            Some(snapshot) => {
                if let Err(err) = reporter.report(snapshot).await {
                    tracing::error!(worker = id, error = %err, "report failed permanently");
                }
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::core::Result;

    struct RecordingReporter {
        reports: AtomicUsize,
        closes: AtomicUsize,
        delay: Duration,
    }

    impl RecordingReporter {
        fn new(delay: Duration) -> Self {
            Self {
                reports: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                delay,
            }
        }
    }

    #[async_trait]
    impl Reporter for RecordingReporter {
        async fn report(&self, _snapshot: CollectionSnapshot) -> Result<()> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reports.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_config(poll_ms: u64, report_ms: u64, rate_limit: usize) -> AgentConfig {
        AgentConfig {
            scheme: "http".to_string(),
            address: "localhost:8080".to_string(),
            report_interval: Duration::from_millis(report_ms),
            poll_interval: Duration::from_millis(poll_ms),
            rate_limit,
            key: None,
            crypto_key: None,
        }
    }

    #[tokio::test]
    async fn reports_flow_and_shutdown_closes_reporter() {
        let reporter = Arc::new(RecordingReporter::new(Duration::ZERO));
        let shutdown = CancellationToken::new();
        let scheduler = Scheduler::new(
            test_config(10, 25, 2),
            Arc::clone(&reporter) as Arc<dyn Reporter>,
            shutdown.clone(),
        );

        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(120)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert!(reporter.reports.load(Ordering::SeqCst) >= 2);
        assert_eq!(reporter.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_reporter_drops_ticks_instead_of_stalling() {
        let reporter = Arc::new(RecordingReporter::new(Duration::from_secs(60)));
        let shutdown = CancellationToken::new();
        let scheduler = Scheduler::new(
            test_config(5, 5, 1),
            Arc::clone(&reporter) as Arc<dyn Reporter>,
            shutdown.clone(),
        );
        let dropped_handle = Arc::clone(&scheduler.dropped_reports);

        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(800)).await;
        shutdown.cancel();
        handle.abort();
        let _ = handle.await;

        assert!(dropped_handle.load(Ordering::SeqCst) >= 1);
    }
}
