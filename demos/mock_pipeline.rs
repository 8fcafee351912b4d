//! Mock Pipeline Example
//!
//! Condenses generated readings twice: once through a batch session over a
//! scratch SQLite database, once through a live session fed over an in-memory
//! duplex stream. No reader deployment or database is required.
//!
//! Run with: cargo run -p demos --bin mock_pipeline [config.toml]

use std::sync::Arc;
use std::time::Duration;

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::CondenserBlueprint;
use dispatcher::{LogSink, MemorySink, SinkSet};
use ingestion::{
    create_stream_table, insert_readings, Frame, ReadingGenerator, ReadingGeneratorConfig,
    ReadingSource,
};
use rusqlite::Connection;
use session::{BatchSession, BatchSessionConfig, LiveSession, LiveSessionConfig};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

const DEFAULT_CONFIG: &str = r#"
[stream]
descriptor = "STREAM rfid_stream (license_plate varchar # location_id integer # reading_ts timestamp # speed double)"

[live]
flush_delay_ms = 50
flush_interval_ms = 100

[batch]
bulk_size = 8
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Mock Pipeline Demo");

    // ==== Stage 1: Use default config or load from file ====
    let blueprint = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading condenser config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        ConfigLoader::load_from_str(DEFAULT_CONFIG, ConfigFormat::Toml)?
    };
    let schema = blueprint.schema()?;
    let generator = ReadingGeneratorConfig {
        objects: 6,
        readers: 3,
        dwell: 4,
        count: 300,
        ..Default::default()
    };

    // ==== Stage 2: Seed a scratch database ====
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("readings.db");
    let expected = {
        let readings = ReadingGenerator::new(schema.clone(), generator.clone());
        let expected = readings.distinct_keys();
        let mut conn = Connection::open(&db)?;
        create_stream_table(&conn, &schema)?;
        let seeded = insert_readings(&mut conn, &schema, readings)?;
        tracing::info!(seeded, distinct_keys = expected, path = %db.display(), "Database seeded");
        expected
    };

    // ==== Stage 3: Batch session ====
    let batch_sink = MemorySink::new("batch");
    let sinks = SinkSet::new()
        .with(LogSink::new("log"))
        .with(batch_sink.clone());
    let mut source =
        ReadingSource::from_schema(schema.clone()).with_prefetch(blueprint.batch.prefetch);
    source.open_path(&db)?;
    let batch = BatchSession::new(
        source,
        BatchSessionConfig::from(&blueprint.batch),
        Arc::new(Mutex::new(sinks)),
    );
    let summary = batch.run(CancellationToken::new()).await?;
    tracing::info!(
        accepted = summary.readings_accepted,
        records = summary.records_emitted,
        flushes = summary.flushes,
        "Batch session finished"
    );
    println!("{}", summary.flush_stats.summary());

    // ==== Stage 4: Live session ====
    let live_sink = MemorySink::new("live");
    let live = live_session(&blueprint, live_sink.clone())?;
    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let handle = tokio::spawn(live.run(BufReader::new(server), CancellationToken::new()));

    for reading in ReadingGenerator::new(schema, generator) {
        client.write_all(Frame::Reading(reading).to_line().as_bytes()).await?;
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    client.write_all(Frame::Quit.to_line().as_bytes()).await?;

    let summary = tokio::time::timeout(Duration::from_secs(30), handle).await???;
    tracing::info!(
        accepted = summary.readings_accepted,
        records = summary.records_emitted,
        flushes = summary.flushes,
        reason = ?summary.close_reason,
        "Live session finished"
    );

    // ==== Stage 5: Compare ====
    tracing::info!(
        batch_records = batch_sink.len(),
        live_records = live_sink.len(),
        final_flush_only = expected,
        "Pipeline completed"
    );

    Ok(())
}

fn live_session(
    blueprint: &CondenserBlueprint,
    sink: MemorySink,
) -> Result<LiveSession<MemorySink>, Box<dyn std::error::Error>> {
    let schema = blueprint.schema()?;
    let config = LiveSessionConfig::from(&blueprint.live);
    Ok(LiveSession::new(schema, config, Arc::new(Mutex::new(sink))))
}
