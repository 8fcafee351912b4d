//! `serve` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use session::{LiveServer, LiveSessionConfig};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{cancel_on_signal, init_metrics};
use crate::cli::ServeArgs;
use crate::error::{load_blueprint, revalidate};

/// Execute the `serve` command
pub async fn run_serve(args: &ServeArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");
    let mut blueprint = load_blueprint(&args.config)?;

    // Apply CLI overrides
    if let Some(ref bind) = args.bind {
        info!(bind = %bind, "Overriding listen address from CLI");
        blueprint.live.bind = bind.clone();
    }
    if let Some(interval) = args.flush_interval_ms {
        info!(interval_ms = interval, "Overriding flush interval from CLI");
        blueprint.live.flush_interval_ms = interval;
    }
    revalidate(&args.config, &blueprint)?;

    let schema = blueprint.schema().context("Invalid stream descriptor")?;
    init_metrics(args.metrics_port)?;

    let sinks = dispatcher::create_sink_set(&blueprint.sinks)
        .await
        .context("Failed to create sinks")?;
    info!(sinks = ?sinks.names(), "Sinks ready");

    let server = LiveServer::bind(
        &blueprint.live.bind,
        schema,
        LiveSessionConfig::from(&blueprint.live),
        Arc::new(Mutex::new(sinks)),
    )
    .await?;
    let addr = server.local_addr()?;
    info!(
        addr = %addr,
        flush_delay_ms = blueprint.live.flush_delay_ms,
        flush_interval_ms = blueprint.live.flush_interval_ms,
        drain_limit = blueprint.live.drain_limit,
        "Listening for readers"
    );

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());

    let summary = server.run(shutdown).await.context("Live server failed")?;
    info!(
        connections = summary.connections,
        clean_disconnects = summary.clean_disconnects,
        accepted = summary.readings_accepted,
        rejected = summary.readings_rejected,
        records = summary.records_emitted,
        failed = summary.records_failed,
        "Appearance condenser stopped"
    );
    Ok(())
}
