//! Configuration validation
//!
//! Rules:
//! - stream descriptor parses
//! - flush_interval_ms > 0, max_frame_bytes >= 64
//! - bulk_size >= 1, prefetch >= 1
//! - sink names non-empty and unique, required params present

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{CondenserBlueprint, ContractError, SinkConfig, SinkType, StreamSchema};

/// Smallest accepted `live.max_frame_bytes`
pub const MIN_FRAME_BYTES: usize = 64;

/// Validate a CondenserBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &CondenserBlueprint) -> Result<(), ContractError> {
    validate_stream(blueprint)?;
    validate_live(blueprint)?;
    validate_batch(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_stream(blueprint: &CondenserBlueprint) -> Result<(), ContractError> {
    StreamSchema::parse(&blueprint.stream.descriptor)
        .map(|_| ())
        .map_err(|e| ContractError::config_validation("stream.descriptor", e.to_string()))
}

fn validate_live(blueprint: &CondenserBlueprint) -> Result<(), ContractError> {
    let live = &blueprint.live;

    if live.flush_interval_ms == 0 {
        return Err(ContractError::config_validation(
            "live.flush_interval_ms",
            "flush_interval_ms must be > 0",
        ));
    }
    if live.max_frame_bytes < MIN_FRAME_BYTES {
        return Err(ContractError::config_validation(
            "live.max_frame_bytes",
            format!(
                "max_frame_bytes must be >= {MIN_FRAME_BYTES}, got {}",
                live.max_frame_bytes
            ),
        ));
    }
    Ok(())
}

fn validate_batch(blueprint: &CondenserBlueprint) -> Result<(), ContractError> {
    let batch = &blueprint.batch;

    if batch.bulk_size == 0 {
        return Err(ContractError::config_validation(
            "batch.bulk_size",
            "bulk_size must be >= 1",
        ));
    }
    if batch.prefetch == 0 {
        return Err(ContractError::config_validation(
            "batch.prefetch",
            "prefetch must be >= 1",
        ));
    }
    Ok(())
}

fn validate_sinks(blueprint: &CondenserBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        validate_sink_params(idx, sink)?;
    }
    Ok(())
}

fn validate_sink_params(idx: usize, sink: &SinkConfig) -> Result<(), ContractError> {
    match sink.sink_type {
        SinkType::Log => Ok(()),
        SinkType::File | SinkType::Sqlite => match sink.params.get("path") {
            Some(path) if !path.trim().is_empty() => Ok(()),
            _ => Err(ContractError::config_validation(
                format!("sinks[{idx}].params.path"),
                format!("{:?} sink '{}' requires a path", sink.sink_type, sink.name),
            )),
        },
        SinkType::Network => {
            let addr = sink.params.get("addr").ok_or_else(|| {
                ContractError::config_validation(
                    format!("sinks[{idx}].params.addr"),
                    format!("network sink '{}' requires an addr", sink.name),
                )
            })?;
            addr.parse::<SocketAddr>().map(|_| ()).map_err(|e| {
                ContractError::config_validation(
                    format!("sinks[{idx}].params.addr"),
                    format!("invalid addr '{addr}': {e}"),
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BatchConfig, ConfigVersion, LiveConfig, StreamConfig};
    use std::collections::HashMap;

    fn minimal_blueprint() -> CondenserBlueprint {
        CondenserBlueprint {
            version: ConfigVersion::V1,
            stream: StreamConfig {
                descriptor: "STREAM s (plate text # gate integer # ts timestamp)".into(),
            },
            live: LiveConfig::default(),
            batch: BatchConfig::default(),
            sinks: vec![SinkConfig {
                name: "log".into(),
                sink_type: SinkType::Log,
                params: HashMap::new(),
            }],
        }
    }

    fn assert_invalid(bp: &CondenserBlueprint, needle: &str) {
        let err = validate(bp).unwrap_err().to_string();
        assert!(err.contains(needle), "got: {err}");
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_blueprint()).is_ok());
    }

    #[test]
    fn test_bad_descriptor() {
        let mut bp = minimal_blueprint();
        bp.stream.descriptor = "STREAM s (a text # b int)".into();
        assert_invalid(&bp, "stream.descriptor");
    }

    #[test]
    fn test_zero_interval() {
        let mut bp = minimal_blueprint();
        bp.live.flush_interval_ms = 0;
        assert_invalid(&bp, "flush_interval_ms must be > 0");
    }

    #[test]
    fn test_zero_bulk_size() {
        let mut bp = minimal_blueprint();
        bp.batch.bulk_size = 0;
        assert_invalid(&bp, "bulk_size must be >= 1");
    }

    #[test]
    fn test_zero_prefetch() {
        let mut bp = minimal_blueprint();
        bp.batch.prefetch = 0;
        assert_invalid(&bp, "prefetch must be >= 1");
    }

    #[test]
    fn test_zero_drain_limit_disables() {
        let mut bp = minimal_blueprint();
        bp.live.drain_limit = 0;
        assert!(validate(&bp).is_ok());
        assert_eq!(bp.live.drain_limit(), None);
        assert_eq!(minimal_blueprint().live.drain_limit(), Some(2));
    }

    #[test]
    fn test_tiny_frame_limit() {
        let mut bp = minimal_blueprint();
        bp.live.max_frame_bytes = 8;
        assert_invalid(&bp, "max_frame_bytes");
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].name = String::new();
        assert_invalid(&bp, "cannot be empty");
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(bp.sinks[0].clone());
        assert_invalid(&bp, "duplicate sink name");
    }

    #[test]
    fn test_sqlite_sink_requires_path() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].sink_type = SinkType::Sqlite;
        assert_invalid(&bp, "requires a path");

        bp.sinks[0].params.insert("path".into(), "appear.db".into());
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_network_sink_addr() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].sink_type = SinkType::Network;
        assert_invalid(&bp, "requires an addr");

        bp.sinks[0].params.insert("addr".into(), "not-an-addr".into());
        assert_invalid(&bp, "invalid addr");

        bp.sinks[0].params.insert("addr".into(), "127.0.0.1:9999".into());
        assert!(validate(&bp).is_ok());
    }
}
