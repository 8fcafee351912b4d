//! Command implementations.

mod condense;
mod info;
mod serve;
mod validate;

pub use condense::run_condense;
pub use info::run_info;
pub use serve::run_serve;
pub use validate::run_validate;

use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Cancel `token` on Ctrl+C or SIGTERM
fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, draining sessions...");
        token.cancel();
    });
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Start the Prometheus exporter unless `port` is 0
fn init_metrics(port: u16) -> anyhow::Result<()> {
    if port != 0 {
        observability::init_metrics_only(port)?;
    }
    Ok(())
}
