//! Configuration parsing
//!
//! TOML is the primary format; JSON is accepted as well.

use contracts::{CondenserBlueprint, ContractError};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse TOML configuration
pub fn parse_toml(content: &str) -> Result<CondenserBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON configuration
pub fn parse_json(content: &str) -> Result<CondenserBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse according to format
pub fn parse(content: &str, format: ConfigFormat) -> Result<CondenserBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SinkType;

    #[test]
    fn test_parse_toml_applies_defaults() {
        let content = r#"
[stream]
descriptor = "STREAM s (plate text # gate integer # ts timestamp)"

[[sinks]]
name = "log"
sink_type = "log"
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.live.bind, "0.0.0.0:5555");
        assert_eq!(bp.live.flush_delay_ms, 1000);
        assert_eq!(bp.live.flush_interval_ms, 5000);
        assert_eq!(bp.live.drain_limit(), Some(2));
        assert_eq!(bp.batch.bulk_size, 1000);
        assert_eq!(bp.batch.drain_limit(), Some(2));
        assert!(bp.batch.database.is_none());
        assert_eq!(bp.sinks[0].sink_type, SinkType::Log);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "stream": { "descriptor": "STREAM s (a text # b int # c timestamp)" },
            "batch": { "bulk_size": 2, "drain_limit": 0 },
            "sinks": [{ "name": "db", "sink_type": "sqlite", "params": { "path": "x.db" } }]
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.batch.bulk_size, 2);
        assert_eq!(bp.batch.drain_limit(), None);
        assert_eq!(bp.sinks[0].params.get("path").map(String::as_str), Some("x.db"));
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_rejects_unknown_sink_type() {
        let content = r#"
[stream]
descriptor = "STREAM s (a text # b int # c timestamp)"

[[sinks]]
name = "kafka"
sink_type = "kafka"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
