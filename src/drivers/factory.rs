//! # sqlx Driver Factory
//!
//! Builds a small dedicated pool per opened driver from the instance's
//! stored data source. MySQL-family drivers connect at instance level;
//! PostgreSQL drivers connect to the requested database.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::time::Duration;
use tracing::debug;

use super::{DriverFactory, MySqlSlowQueryDriver, PgSlowQueryDriver, SlowQueryDriver};
use crate::constants::slow_query::{DRIVER_ACQUIRE_TIMEOUT_SECONDS, DRIVER_MAX_CONNECTIONS};
use crate::constants::Engine;
use crate::error::{DriverError, DriverResult};
use crate::models::{DataSource, Database, Instance};

/// [`DriverFactory`] backed by sqlx MySQL and PostgreSQL pools
#[derive(Debug, Clone)]
pub struct SqlxDriverFactory {
    max_connections: u32,
    acquire_timeout: Duration,
}

impl Default for SqlxDriverFactory {
    fn default() -> Self {
        Self {
            max_connections: DRIVER_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DRIVER_ACQUIRE_TIMEOUT_SECONDS),
        }
    }
}

impl SqlxDriverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn mysql_options(data_source: &DataSource) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&data_source.host)
            .port(data_source.port)
            .username(&data_source.username)
            .password(&data_source.password);
        if let Some(database) = data_source.database.as_deref().filter(|db| !db.is_empty()) {
            options = options.database(database);
        }
        options
    }

    fn postgres_options(data_source: &DataSource, database: Option<&Database>) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&data_source.host)
            .port(data_source.port)
            .username(&data_source.username)
            .password(&data_source.password);
        let database_name = database
            .map(|db| db.database_name.as_str())
            .or(data_source.database.as_deref())
            .filter(|db| !db.is_empty());
        if let Some(database_name) = database_name {
            options = options.database(database_name);
        }
        options
    }
}

#[async_trait]
impl DriverFactory for SqlxDriverFactory {
    async fn open(
        &self,
        instance: &Instance,
        database: Option<&Database>,
    ) -> DriverResult<Box<dyn SlowQueryDriver>> {
        debug!(
            instance = %instance.resource_id,
            engine = %instance.engine,
            database = ?database.map(|db| db.database_name.as_str()),
            "Opening slow query driver"
        );

        match instance.engine {
            Engine::MySql | Engine::MariaDb | Engine::TiDb => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(self.max_connections)
                    .acquire_timeout(self.acquire_timeout)
                    .connect_with(Self::mysql_options(&instance.data_source))
                    .await?;
                Ok(Box::new(MySqlSlowQueryDriver::new(pool)))
            }
            Engine::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(self.max_connections)
                    .acquire_timeout(self.acquire_timeout)
                    .connect_with(Self::postgres_options(&instance.data_source, database))
                    .await?;
                let database_name = database
                    .map(|db| db.database_name.clone())
                    .unwrap_or_default();
                Ok(Box::new(PgSlowQueryDriver::new(pool, database_name)))
            }
            engine => Err(DriverError::Connection(format!(
                "no slow query driver for engine {engine}"
            ))),
        }
    }
}
