//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Appearance Condenser - turns raw tag sightings into dwell records
#[derive(Parser, Debug)]
#[command(
    name = "appearance-condenser",
    author,
    version,
    about = "Condense identification-tag readings into appearance records",
    long_about = "Condenses a stream of tag readings into one appearance record per \n\
                  (object, reader) dwell window.\n\n\
                  `serve` ingests live readings over TCP; `condense` replays a stored \n\
                  stream from a SQLite database."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CONDENSER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "CONDENSER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Accept live readings over TCP until interrupted
    Serve(ServeArgs),

    /// Condense a stored stream from a SQLite database
    Condense(CondenseArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `serve` command
#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "CONDENSER_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address from configuration
    #[arg(long, env = "CONDENSER_BIND")]
    pub bind: Option<String>,

    /// Override the scheduled flush period (ms)
    #[arg(long, env = "CONDENSER_FLUSH_INTERVAL_MS")]
    pub flush_interval_ms: Option<u64>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "CONDENSER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `condense` command
#[derive(Parser, Debug, Clone)]
pub struct CondenseArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "CONDENSER_CONFIG")]
    pub config: PathBuf,

    /// SQLite database holding the stream table
    #[arg(short, long, env = "CONDENSER_DATABASE")]
    pub database: Option<PathBuf>,

    /// Override the bulk threshold from configuration
    #[arg(long, env = "CONDENSER_BULK_SIZE")]
    pub bulk_size: Option<usize>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "CONDENSER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show stream attributes
    #[arg(long)]
    pub attributes: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_condense_overrides() {
        let cli = Cli::try_parse_from([
            "appearance-condenser",
            "condense",
            "-c",
            "c.toml",
            "--database",
            "r.db",
            "--bulk-size",
            "2",
        ])
        .unwrap();
        let Commands::Condense(args) = cli.command else {
            panic!("expected condense");
        };
        assert_eq!(args.bulk_size, Some(2));
        assert_eq!(args.database, Some(PathBuf::from("r.db")));
    }
}
