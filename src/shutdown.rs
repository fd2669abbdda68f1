//! Shutdown signalling.
//!
//! Signal handlers are registered when [`install_shutdown_handler`] returns,
//! so a SIGINT or SIGTERM that arrives during startup still stops the worker
//! instead of killing it outright.

use std::future::Future;
use std::io;

use tokio_util::sync::CancellationToken;

/// Register SIGTERM and SIGINT handlers and return a token cancelled by the
/// first of them.
#[cfg(unix)]
pub fn install_shutdown_handler() -> io::Result<CancellationToken> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(cancel_on(async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
        }
    }))
}

/// Return a token cancelled on Ctrl+C.
#[cfg(not(unix))]
pub fn install_shutdown_handler() -> io::Result<CancellationToken> {
    Ok(cancel_on(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    }))
}

/// Return a token that is cancelled once `signal` resolves.
pub fn cancel_on<F>(signal: F) -> CancellationToken
where
    F: Future<Output = ()> + Send + 'static,
{
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        signal.await;
        cancel.cancel();
    });
    token
}
