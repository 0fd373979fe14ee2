//! Analysis Configuration Module
//!
//! Provides run configuration loaded from TOML files so analysis options can
//! be tuned without recompiling.
//!
//! ## Loading Order
//!
//! 1. `SITELENS_CONFIG` environment variable (path to TOML file)
//! 2. `sitelens.toml` in the current working directory
//! 3. Built-in defaults (matching the documented option defaults)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::types::AnalysisOptions;

/// Errors raised while loading an analysis config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Pipeline execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run the independent analyzers on the rayon pool
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Root configuration for an analysis run.
///
/// Load with `AnalysisConfig::load()` which searches:
/// 1. `$SITELENS_CONFIG` env var
/// 2. `./sitelens.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Analyzer options, echoed into every result envelope
    pub options: AnalysisOptions,
    /// Pipeline execution settings
    pub pipeline: PipelineConfig,
}

impl AnalysisConfig {
    /// Load configuration from the standard search order.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("SITELENS_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded analysis config from SITELENS_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from SITELENS_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "SITELENS_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("sitelens.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded analysis config from ./sitelens.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./sitelens.toml, using defaults");
                }
            }
        }

        info!("No sitelens.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config
            .options
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }
}
