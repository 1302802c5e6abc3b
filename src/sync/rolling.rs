//! # Rolling-Window Sync
//!
//! For engines that expose cumulative statement statistics with no notion
//! of a day. One snapshot is taken through the first database that has the
//! statistics extension enabled, dated by its latest log time, and merged
//! into whatever is already stored for that day.
//!
//! Failures listing or writing one database are logged and the routine
//! moves on to the next database.

use async_trait::async_trait;
use chrono::Days;
use tracing::{debug, info, warn};

use super::strategy::{InstanceSyncSummary, SyncContext, SyncStrategy};
use crate::constants::slow_query::is_postgres_system_database;
use crate::constants::SyncState;
use crate::drivers::SlowQueryDriver;
use crate::error::{SyncError, SyncResult};
use crate::metrics;
use crate::models::{Database, DatabaseFilter, Instance, ListSlowQueryFilter, UpsertSlowLog};
use crate::slow_query::merge;

#[derive(Debug, Clone, Copy, Default)]
pub struct RollingWindowSync;

impl RollingWindowSync {
    /// Open a driver through the first eligible database with capture enabled
    async fn open_enabled_driver(
        context: &SyncContext,
        instance: &Instance,
        databases: &[Database],
    ) -> SyncResult<Box<dyn SlowQueryDriver>> {
        let candidates = databases.iter().filter(|database| {
            database.sync_state == SyncState::Ok
                && !is_postgres_system_database(&database.database_name)
        });

        for database in candidates {
            let driver = match context.drivers.open(instance, Some(database)).await {
                Ok(driver) => driver,
                Err(e) => {
                    warn!(database = %database, error = %e, "Failed to open database for slow query sync");
                    continue;
                }
            };
            match driver.check_slow_query_log_enabled().await {
                Ok(()) => return Ok(driver),
                Err(e) => {
                    warn!(database = %database, error = %e, "Slow query log is not enabled for database");
                    driver.close().await;
                }
            }
        }

        Err(SyncError::NoEligibleDatabase {
            instance_id: instance.resource_id.clone(),
        })
    }

    async fn sync_snapshot(
        context: &SyncContext,
        instance: &Instance,
        databases: &[Database],
        driver: &dyn SlowQueryDriver,
        summary: &mut InstanceSyncSummary,
    ) -> SyncResult<()> {
        let mut snapshot = driver.sync_slow_query(context.clock.now()).await?;

        let Some(latest_log_time) = snapshot
            .values()
            .filter_map(|statistics| statistics.latest_log_time())
            .max()
        else {
            debug!(instance = %instance.resource_id, "Slow query snapshot is empty");
            return Ok(());
        };
        let log_date = latest_log_time.date_naive();
        let next_day = log_date.checked_add_days(Days::new(1));

        for database in databases {
            let Some(statistics) = snapshot.remove(&database.database_name) else {
                continue;
            };

            let filter = ListSlowQueryFilter {
                instance_id: Some(instance.resource_id.clone()),
                database_name: Some(database.database_name.clone()),
                start_log_date: Some(log_date),
                end_log_date: next_day,
            };
            let persisted = match context.store.list_slow_query_logs(&filter).await {
                Ok(persisted) => persisted,
                Err(e) => {
                    warn!(database = %database, error = %e, "Failed to list slow query logs");
                    Vec::new()
                }
            };

            let statistics = if persisted.is_empty() {
                statistics
            } else {
                merge(statistics, &persisted)
            };

            let upsert = UpsertSlowLog {
                instance_id: instance.resource_id.clone(),
                database_name: database.database_name.clone(),
                log_date,
                statistics,
            };
            if let Err(e) = context.store.upsert_slow_log(upsert).await {
                warn!(database = %database, error = %e, "Failed to upsert slow query log");
                continue;
            }
            summary.records_upserted += 1;
            metrics::records_upserted_total().add(1, &[]);
        }

        summary.days_synced = 1;
        Ok(())
    }
}

#[async_trait]
impl SyncStrategy for RollingWindowSync {
    fn name(&self) -> &'static str {
        "rolling_window"
    }

    async fn sync(
        &self,
        context: &SyncContext,
        instance: &Instance,
    ) -> SyncResult<InstanceSyncSummary> {
        let mut summary = InstanceSyncSummary {
            records_deleted: context.sweep_outdated(instance).await?,
            ..InstanceSyncSummary::default()
        };

        let databases = context
            .store
            .list_databases(&DatabaseFilter::instance(instance.resource_id.clone()))
            .await?;

        let driver = Self::open_enabled_driver(context, instance, &databases).await?;
        let result =
            Self::sync_snapshot(context, instance, &databases, driver.as_ref(), &mut summary).await;
        driver.close().await;
        result?;

        info!(
            instance = %instance.resource_id,
            records = summary.records_upserted,
            "Synced slow query snapshot"
        );
        Ok(summary)
    }
}
