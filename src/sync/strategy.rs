//! # Sync Strategies
//!
//! Engines differ in how their slow query data is shaped: some keep a log
//! partitioned by day, others expose one cumulative rolling window. Each
//! shape is a [`SyncStrategy`], and the [`SyncStrategyRegistry`] maps engine
//! identifiers onto them. Supporting a new engine is a registration, not a
//! change to the scheduler.

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::clock::Clock;
use super::daily::DailyPartitionedSync;
use super::rolling::RollingWindowSync;
use crate::constants::slow_query::RETENTION_DAYS;
use crate::constants::Engine;
use crate::drivers::DriverFactory;
use crate::error::SyncResult;
use crate::metrics;
use crate::models::Instance;
use crate::store::SlowQueryStore;

/// Collaborators shared by every strategy run
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<dyn SlowQueryStore>,
    pub drivers: Arc<dyn DriverFactory>,
    pub clock: Arc<dyn Clock>,
    pub retention_days: i64,
}

// Store and driver factory are trait objects without Debug
impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("clock", &self.clock)
            .field("retention_days", &self.retention_days)
            .finish_non_exhaustive()
    }
}

impl SyncContext {
    /// A retention window below one day falls back to [`RETENTION_DAYS`]
    pub fn new(
        store: Arc<dyn SlowQueryStore>,
        drivers: Arc<dyn DriverFactory>,
        clock: Arc<dyn Clock>,
        retention_days: i64,
    ) -> Self {
        let retention_days = if retention_days > 0 {
            retention_days
        } else {
            warn!(
                retention_days,
                fallback = RETENTION_DAYS,
                "Retention window must be at least one day, using default"
            );
            RETENTION_DAYS
        };
        Self {
            store,
            drivers,
            clock,
            retention_days,
        }
    }

    /// Oldest day kept; anything dated before it is swept
    pub fn retention_cutoff(&self) -> NaiveDate {
        let today = self.clock.today();
        let days = u64::try_from(self.retention_days)
            .ok()
            .filter(|days| *days > 0)
            .unwrap_or(RETENTION_DAYS.unsigned_abs());
        today.checked_sub_days(Days::new(days)).unwrap_or(today)
    }

    /// Remove the instance's records older than the retention window
    pub async fn sweep_outdated(&self, instance: &Instance) -> SyncResult<u64> {
        let cutoff = self.retention_cutoff();
        let deleted = self
            .store
            .delete_outdated_slow_logs(&instance.resource_id, cutoff)
            .await?;
        if deleted > 0 {
            metrics::records_deleted_total().add(deleted, &[]);
        }
        debug!(
            instance = %instance.resource_id,
            cutoff = %cutoff,
            deleted,
            "Swept outdated slow query logs"
        );
        Ok(deleted)
    }
}

/// What one successful instance sync did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceSyncSummary {
    pub records_deleted: u64,
    pub records_upserted: u64,
    pub days_synced: u64,
}

/// One way of pulling an instance's slow query data into the store
#[async_trait]
pub trait SyncStrategy: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    async fn sync(&self, context: &SyncContext, instance: &Instance)
        -> SyncResult<InstanceSyncSummary>;
}

/// Engine → strategy lookup
#[derive(Debug, Clone, Default)]
pub struct SyncStrategyRegistry {
    strategies: HashMap<Engine, Arc<dyn SyncStrategy>>,
}

impl SyncStrategyRegistry {
    /// A registry with nothing registered
    pub fn new() -> Self {
        Self::default()
    }

    /// The engines slow query sync supports out of the box
    pub fn with_defaults() -> Self {
        let daily: Arc<dyn SyncStrategy> = Arc::new(DailyPartitionedSync);
        let rolling: Arc<dyn SyncStrategy> = Arc::new(RollingWindowSync);

        let mut registry = Self::new();
        registry.register(Engine::MySql, daily.clone());
        registry.register(Engine::MariaDb, daily.clone());
        registry.register(Engine::TiDb, daily);
        registry.register(Engine::Postgres, rolling);
        registry
    }

    /// Register `strategy` for `engine`, replacing any previous registration
    pub fn register(&mut self, engine: Engine, strategy: Arc<dyn SyncStrategy>) {
        self.strategies.insert(engine, strategy);
    }

    pub fn get(&self, engine: Engine) -> Option<Arc<dyn SyncStrategy>> {
        self.strategies.get(&engine).cloned()
    }

    pub fn supports(&self, engine: Engine) -> bool {
        self.strategies.contains_key(&engine)
    }

    /// Registered engines, sorted
    pub fn engines(&self) -> Vec<Engine> {
        let mut engines: Vec<Engine> = self.strategies.keys().copied().collect();
        engines.sort();
        engines
    }
}
