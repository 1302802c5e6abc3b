//! # Engine Drivers
//!
//! Live connections to managed instances, reduced to the two questions the
//! slow query syncer asks: is slow query capture switched on, and what did
//! it capture.
//!
//! Drivers are obtained through a [`DriverFactory`] so the syncer can be
//! driven against scripted drivers in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::DriverResult;
use crate::models::{Database, Instance, SlowQueryStatistics};

pub mod factory;
pub mod mysql;
pub mod postgres;

pub use factory::SqlxDriverFactory;
pub use mysql::MySqlSlowQueryDriver;
pub use postgres::PgSlowQueryDriver;

/// A connection to one instance (or one database of it) able to read slow query data
#[async_trait]
pub trait SlowQueryDriver: Send + Sync {
    /// `Err(DriverError::FeatureUnavailable)` when capture is not enabled
    async fn check_slow_query_log_enabled(&self) -> DriverResult<()>;

    /// Statistics per database name.
    ///
    /// Day-partitioned engines return the day starting at `log_date_ts`;
    /// rolling-window engines ignore it and return their current window.
    async fn sync_slow_query(
        &self,
        log_date_ts: DateTime<Utc>,
    ) -> DriverResult<HashMap<String, SlowQueryStatistics>>;

    async fn close(&self);
}

/// Opens drivers for instances
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Open a driver for `instance`, scoped to `database` when one is given
    async fn open(
        &self,
        instance: &Instance,
        database: Option<&Database>,
    ) -> DriverResult<Box<dyn SlowQueryDriver>>;
}
