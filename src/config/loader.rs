//! Configuration Loader
//!
//! Environment-aware layered loading on top of the `config` crate.

use super::error::{ConfigResult, ConfigurationError};
use super::ConsoleConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const ENV_PREFIX: &str = "DBCONSOLE";

/// Loaded configuration plus the context it was resolved from
#[derive(Debug)]
pub struct ConfigManager {
    config: ConsoleConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for tests that must not touch process-wide environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            sync_enabled = config.slow_query_sync.enabled,
            sync_interval_seconds = config.slow_query_sync.interval_seconds,
            retention_days = config.slow_query_sync.retention_days,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, for embedding and tests
    pub fn from_config(config: ConsoleConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_directory: PathBuf::from("config"),
        }))
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// DBCONSOLE_ENV || APP_ENV || 'development'
    fn detect_environment() -> String {
        env::var("DBCONSOLE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn load_and_merge_config(directory: &Path, environment: &str) -> ConfigResult<ConsoleConfig> {
        let defaults = serde_json::to_string(&ConsoleConfig::default())
            .map_err(|e| ConfigurationError::json_serialization_error("defaults", e))?;

        let builder = Config::builder()
            .add_source(File::from_str(&defaults, FileFormat::Json))
            .add_source(
                File::from(directory.join("base.toml"))
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                File::from(directory.join(format!("{environment}.toml")))
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder
            .build()
            .and_then(|config| config.try_deserialize::<ConsoleConfig>())
            .map_err(|e| ConfigurationError::load_error(environment, e))
    }
}
