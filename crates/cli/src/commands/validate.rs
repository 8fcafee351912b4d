//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{CondenserBlueprint, SinkType};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::load_blueprint;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    stream: String,
    attribute_count: usize,
    bind: String,
    bulk_size: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    let blueprint = match load_blueprint(&args.config) {
        Ok(blueprint) => blueprint,
        Err(e) => {
            return ValidationResult {
                valid: false,
                config_path,
                error: Some(e.to_string()),
                warnings: None,
                summary: None,
            }
        }
    };

    // validated on load
    let (stream, attribute_count) = blueprint
        .schema()
        .map(|s| (s.stream().to_string(), s.attributes().len()))
        .unwrap_or_default();
    let warnings = collect_warnings(&blueprint);

    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: if warnings.is_empty() {
            None
        } else {
            Some(warnings)
        },
        summary: Some(ConfigSummary {
            version: format!("{:?}", blueprint.version),
            stream,
            attribute_count,
            bind: blueprint.live.bind.clone(),
            bulk_size: blueprint.batch.bulk_size,
            sink_count: blueprint.sinks.len(),
        }),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &CondenserBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - records will only be logged".to_string());
    } else if blueprint.sinks.iter().all(|s| s.sink_type == SinkType::Log) {
        warnings.push("Only log sinks configured - records are not persisted".to_string());
    }

    if blueprint.live.flush_delay_ms > blueprint.live.flush_interval_ms {
        warnings.push(format!(
            "live.flush_delay_ms ({}) exceeds live.flush_interval_ms ({})",
            blueprint.live.flush_delay_ms, blueprint.live.flush_interval_ms
        ));
    }

    if let Some(limit) = blueprint.live.drain_limit() {
        warnings.push(format!(
            "live.drain_limit = {} - scheduled flushes also evict the current window when at most {} remain",
            limit, limit
        ));
    }

    if blueprint.batch.database.is_none() {
        warnings.push("batch.database is unset - `condense` needs --database".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!(
                "  Stream: {} ({} attributes)",
                summary.stream, summary.attribute_count
            );
            println!("  Live bind: {}", summary.bind);
            println!("  Bulk size: {}", summary.bulk_size);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
