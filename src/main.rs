use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use compute_worker::config::WorkerConfig;
use compute_worker::coordinator::{Coordinator, HttpCoordinator};
use compute_worker::dispatch::Dispatcher;
use compute_worker::shutdown::install_shutdown_handler;
use compute_worker::worker::WorkerLoop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing();

    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;

    // Installed before any network call so a signal during startup is honoured.
    let shutdown = install_shutdown_handler().context("Failed to install signal handlers")?;

    eprintln!("🚀 Compute worker v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Coordinator: {}", config.server_url);
    eprintln!("   Device: {}", config.device_name);
    eprintln!("   Poll interval: {}s", config.poll_interval.as_secs());
    eprintln!("   Script runtime: {} (not a security sandbox)\n", config.sandbox.runtime);

    let coordinator: Arc<dyn Coordinator> = Arc::new(HttpCoordinator::from_config(&config));

    let startup = async {
        if let Err(e) = coordinator.health().await {
            tracing::warn!(error = %e, "Coordinator health check failed, registering anyway");
        }
        WorkerLoop::register(
            Arc::clone(&coordinator),
            &config.device_name,
            Dispatcher::from_config(&config),
            config.poll_interval,
        )
        .await
    };

    let worker = tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            eprintln!("\n⏹ Worker stopped before registering");
            return Ok(());
        }
        registered = startup => registered
            .with_context(|| format!("Failed to register with {}", config.server_url))?,
    };

    worker.run_until(shutdown.cancelled()).await;
    eprintln!("\n⏹ Worker stopped");

    Ok(())
}

/// stderr logging filtered by `RUST_LOG` (default `info`), plus a daily
/// rolling file when `WORKER_LOG_DIR` is set.
fn init_tracing() -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match std::env::var("WORKER_LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "compute-worker.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}
