//! # Configuration System
//!
//! Typed configuration for the rollout core, loaded in layers by
//! [`ConfigManager`]:
//!
//! 1. Built-in defaults ([`ConsoleConfig::default`])
//! 2. `config/base.toml`
//! 3. `config/{environment}.toml`
//! 4. `DBCONSOLE_` environment variables, `__` separating nested keys
//!    (for example `DBCONSOLE_SLOW_QUERY_SYNC__INTERVAL_SECONDS=600`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rollout_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let interval = manager.config().slow_query_sync.interval();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::slow_query::{DEFAULT_SYNC_INTERVAL_SECONDS, RETENTION_DAYS};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConsoleConfig {
    /// Metadata database holding task DAG edges and slow query records
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Slow query log synchronization runner
    #[serde(default)]
    pub slow_query_sync: SlowQuerySyncConfig,
}

impl ConsoleConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.database.validate()?;
        self.slow_query_sync.validate()
    }
}

/// Metadata database connection pool settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Connection URL; `DATABASE_URL` is used when unset
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_seconds")]
    pub acquire_timeout_seconds: u64,
    /// Skip running embedded migrations on startup
    #[serde(default)]
    pub skip_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_seconds() -> u64 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout_seconds(),
            skip_migrations: false,
        }
    }
}

impl DatabaseConfig {
    /// Explicit URL if configured, else `DATABASE_URL`
    pub fn database_url(&self) -> ConfigResult<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        std::env::var("DATABASE_URL")
            .map_err(|_| ConfigurationError::missing_required_field("url", "database"))
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                "0",
                "pool must allow at least one connection",
            ));
        }
        Ok(())
    }
}

/// Slow query sync runner settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlowQuerySyncConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Seconds between scheduled sync cycles
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Days of history kept per instance
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_enabled() -> bool {
    true
}

fn default_interval_seconds() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECONDS
}

fn default_retention_days() -> i64 {
    RETENTION_DAYS
}

impl Default for SlowQuerySyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_seconds: default_interval_seconds(),
            retention_days: default_retention_days(),
        }
    }
}

impl SlowQuerySyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "slow_query_sync.interval_seconds",
                "0",
                "interval must be positive",
            ));
        }
        if self.retention_days <= 0 {
            return Err(ConfigurationError::invalid_value(
                "slow_query_sync.retention_days",
                self.retention_days.to_string(),
                "retention window must be at least one day",
            ));
        }
        Ok(())
    }
}
