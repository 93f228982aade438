//! Run settings for the `evalg-run` binary
//!
//! Each setting resolves in priority order:
//! 1. Command-line flag (highest priority)
//! 2. Environment variable
//! 3. TOML settings file
//! 4. Compiled default (fallback)
//!
//! A missing settings file is not an error: a warning is logged and defaults
//! apply.

use crate::params::ConcurrencyModel;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding the log level
pub const LOG_LEVEL_ENV: &str = "EVALG_LOG";

/// Logging section of the settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_threads() -> usize {
    1
}

/// Settings file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Worker threads for event processing
    #[serde(default = "default_threads")]
    pub threads: usize,

    #[serde(default)]
    pub concurrency_model: ConcurrencyModel,

    /// Extra configuration directories, highest priority first
    #[serde(default)]
    pub config_dirs: Vec<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            threads: default_threads(),
            concurrency_model: ConcurrencyModel::default(),
            config_dirs: Vec::new(),
        }
    }
}

impl RunSettings {
    /// Parse a settings file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: RunSettings = toml::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse `path` if given and present, else defaults
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Ok(Self::default()),
            Some(p) if !p.exists() => {
                warn!("settings file {} not found; using defaults", p.display());
                Ok(Self::default())
            }
            Some(p) => Self::load(p),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(Error::Config("threads must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Log level after applying flag and environment overrides
    pub fn resolve_log_level(&self, cli_arg: Option<&str>) -> String {
        // Priority 1: command-line flag
        if let Some(level) = cli_arg {
            return level.to_string();
        }
        // Priority 2: environment variable
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            if !level.is_empty() {
                return level;
            }
        }
        // Priority 3/4: settings file or compiled default
        self.logging.level.clone()
    }

    /// Thread count after applying the flag override
    pub fn resolve_threads(&self, cli_arg: Option<usize>) -> Result<usize> {
        let threads = cli_arg.unwrap_or(self.threads);
        if threads == 0 {
            return Err(Error::Config("threads must be at least 1".to_string()));
        }
        Ok(threads)
    }

    /// Concurrency model after applying the flag override
    pub fn resolve_concurrency_model(&self, cli_arg: Option<ConcurrencyModel>) -> ConcurrencyModel {
        cli_arg.unwrap_or(self.concurrency_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: RunSettings = toml::from_str("concurrency_model = \"none\"\n").unwrap();
        assert_eq!(settings.concurrency_model, ConcurrencyModel::None);
        assert_eq!(settings.threads, 1);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.config_dirs.is_empty());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let settings = RunSettings::default();
        assert!(matches!(settings.resolve_threads(Some(0)), Err(Error::Config(_))));

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "threads = 0\n").unwrap();
        assert!(matches!(RunSettings::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_cli_model_overrides_file() {
        let settings = RunSettings::default();
        assert_eq!(settings.resolve_concurrency_model(None), ConcurrencyModel::Memoize);
        assert_eq!(
            settings.resolve_concurrency_model(Some(ConcurrencyModel::None)),
            ConcurrencyModel::None
        );
    }
}
