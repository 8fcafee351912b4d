//! Error types for CLI operations.

use std::path::{Path, PathBuf};

use contracts::{CondenserBlueprint, ContractError};
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Configuration could not be loaded or is invalid
    #[error("Invalid configuration in {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: ContractError,
    },

    /// Batch mode needs a database
    #[error("No database given: set [batch].database or pass --database")]
    MissingDatabase,
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Load and validate a configuration file
pub fn load_blueprint(path: &Path) -> Result<CondenserBlueprint> {
    if !path.exists() {
        return Err(CliError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    config_loader::ConfigLoader::load_from_path(path).map_err(|source| CliError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// Re-validate after CLI overrides were applied
pub fn revalidate(path: &Path, blueprint: &CondenserBlueprint) -> Result<()> {
    config_loader::ConfigLoader::validate(blueprint).map_err(|source| CliError::Config {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_blueprint(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CliError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_invalid_config_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[stream]\ndescriptor = \"STREAM s (a text)\"\n").unwrap();
        let err = load_blueprint(&path).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }
}
