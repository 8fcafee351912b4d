//! `condense` command implementation.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::AppearanceSink;
use ingestion::ReadingSource;
use session::{BatchSession, BatchSessionConfig};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{cancel_on_signal, init_metrics};
use crate::cli::CondenseArgs;
use crate::error::{load_blueprint, revalidate, CliError};
use crate::report::RunReport;

/// Execute the `condense` command
pub async fn run_condense(args: &CondenseArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");
    let mut blueprint = load_blueprint(&args.config)?;

    // Apply CLI overrides
    if let Some(ref database) = args.database {
        info!(database = %database.display(), "Overriding database from CLI");
        blueprint.batch.database = Some(database.clone());
    }
    if let Some(bulk_size) = args.bulk_size {
        info!(bulk_size, "Overriding bulk size from CLI");
        blueprint.batch.bulk_size = bulk_size;
    }
    revalidate(&args.config, &blueprint)?;

    let database = blueprint
        .batch
        .database
        .clone()
        .ok_or(CliError::MissingDatabase)?;
    init_metrics(args.metrics_port)?;

    let mut source = ReadingSource::register(&blueprint.stream.descriptor)
        .context("Invalid stream descriptor")?
        .with_prefetch(blueprint.batch.prefetch);
    source
        .open_path(&database)
        .with_context(|| format!("Failed to open {}", database.display()))?;

    let sinks = dispatcher::create_sink_set(&blueprint.sinks)
        .await
        .context("Failed to create sinks")?;
    let sinks = Arc::new(Mutex::new(sinks));

    let session = BatchSession::new(
        source,
        BatchSessionConfig::from(&blueprint.batch),
        sinks.clone(),
    );

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());

    let started = Instant::now();
    let summary = session.run(shutdown).await.context("Batch session failed")?;
    let duration = started.elapsed();

    let mut sinks = sinks.lock().await;
    if let Err(e) = sinks.close().await {
        error!(error = %e, "Sink close failed");
    }
    let report = RunReport::new(summary, duration, sinks.metrics());

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize summary")?;
        println!("{}", json);
    } else {
        report.print_summary();
    }
    Ok(())
}
