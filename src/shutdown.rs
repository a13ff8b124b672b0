//! Process-wide shutdown signal handling.

use tokio_util::sync::CancellationToken;

/// Cancels `token` when the process receives SIGINT, SIGTERM or SIGQUIT.
pub fn watch_signals(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        token.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(error = %err, "cannot install SIGINT handler");
            return std::future::pending::<()>().await;
        }
    };
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(error = %err, "cannot install SIGTERM handler");
            return std::future::pending::<()>().await;
        }
    };
    let mut quit = match signal(SignalKind::quit()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(error = %err, "cannot install SIGQUIT handler");
            return std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
        _ = quit.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
