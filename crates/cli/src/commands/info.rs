//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{CondenserBlueprint, StreamSchema};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::load_blueprint;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    stream: StreamInfo,
    live: LiveInfo,
    batch: BatchInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct StreamInfo {
    name: String,
    object_attr: String,
    reader_attr: String,
    time_attr: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attributes: Vec<AttributeInfo>,
}

#[derive(Serialize)]
struct AttributeInfo {
    name: String,
    attr_type: String,
}

#[derive(Serialize)]
struct LiveInfo {
    bind: String,
    flush_delay_ms: u64,
    flush_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    drain_limit: Option<usize>,
    max_frame_bytes: usize,
}

#[derive(Serialize)]
struct BatchInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<String>,
    bulk_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    drain_limit: Option<usize>,
    prefetch: usize,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    params: std::collections::HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.config)?;
    let schema = blueprint.schema().context("Invalid stream descriptor")?;

    if args.json {
        let info = build_config_info(&blueprint, &schema, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, &schema, args);
    }

    Ok(())
}

fn build_config_info(
    blueprint: &CondenserBlueprint,
    schema: &StreamSchema,
    args: &InfoArgs,
) -> ConfigInfo {
    let attributes = if args.attributes {
        schema
            .attributes()
            .iter()
            .map(|a| AttributeInfo {
                name: a.name.clone(),
                attr_type: a.attr_type.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                params: s.params.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        stream: StreamInfo {
            name: schema.stream().to_string(),
            object_attr: schema.object_attr().to_string(),
            reader_attr: schema.reader_attr().to_string(),
            time_attr: schema.time_attr().to_string(),
            attributes,
        },
        live: LiveInfo {
            bind: blueprint.live.bind.clone(),
            flush_delay_ms: blueprint.live.flush_delay_ms,
            flush_interval_ms: blueprint.live.flush_interval_ms,
            drain_limit: blueprint.live.drain_limit(),
            max_frame_bytes: blueprint.live.max_frame_bytes,
        },
        batch: BatchInfo {
            database: blueprint
                .batch
                .database
                .as_ref()
                .map(|p| p.display().to_string()),
            bulk_size: blueprint.batch.bulk_size,
            drain_limit: blueprint.batch.drain_limit(),
            prefetch: blueprint.batch.prefetch,
        },
        sinks,
    }
}

fn print_config_info(blueprint: &CondenserBlueprint, schema: &StreamSchema, args: &InfoArgs) {
    println!("=== Appearance Condenser Configuration ===\n");

    println!("Stream");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Name: {}", schema.stream());
    println!("   ├─ Object id: {}", schema.object_attr());
    println!("   ├─ Reader id: {}", schema.reader_attr());
    println!("   ├─ Timestamp: {}", schema.time_attr());
    if args.attributes {
        println!("   └─ Attributes ({}):", schema.attributes().len());
        for (i, attr) in schema.attributes().iter().enumerate() {
            let prefix = if i + 1 == schema.attributes().len() { "└─" } else { "├─" };
            println!("        {} {} {}", prefix, attr.name, attr.attr_type);
        }
    } else {
        println!("   └─ {} auxiliary attributes", schema.auxiliary().len());
    }

    let live = &blueprint.live;
    println!("\nLive");
    println!("   ├─ Bind: {}", live.bind);
    println!(
        "   ├─ Flush: first after {} ms, then every {} ms",
        live.flush_delay_ms, live.flush_interval_ms
    );
    match live.drain_limit() {
        Some(limit) => println!("   ├─ Drain limit: {}", limit),
        None => println!("   ├─ Drain limit: disabled"),
    }
    println!("   └─ Max frame: {} bytes", live.max_frame_bytes);

    let batch = &blueprint.batch;
    println!("\nBatch");
    match &batch.database {
        Some(db) => println!("   ├─ Database: {}", db.display()),
        None => println!("   ├─ Database: (from --database)"),
    }
    println!("   ├─ Bulk size: {}", batch.bulk_size);
    match batch.drain_limit() {
        Some(limit) => println!("   ├─ Drain limit: {}", limit),
        None => println!("   ├─ Drain limit: disabled"),
    }
    println!("   └─ Prefetch: {}", batch.prefetch);

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let prefix = if i + 1 == blueprint.sinks.len() { "└─" } else { "├─" };
            println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
            if args.sinks {
                for (key, value) in &sink.params {
                    println!("        {} = {}", key, value);
                }
            }
        }
    }

    println!();
}
