//! # Day-Partitioned Sync
//!
//! For engines whose slow log is a table of individual executions. The
//! routine resumes from the latest stored day (re-syncing it, since it may
//! have been partial) and walks forward one day at a time through today.
//! Days are strictly ascending and each day's writes land before the next
//! day is fetched, so a failure leaves a contiguous committed prefix.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info};

use super::strategy::{InstanceSyncSummary, SyncContext, SyncStrategy};
use crate::drivers::SlowQueryDriver;
use crate::error::{SyncError, SyncResult};
use crate::metrics;
use crate::models::{Instance, UpsertSlowLog};

#[derive(Debug, Clone, Copy, Default)]
pub struct DailyPartitionedSync;

impl DailyPartitionedSync {
    async fn sync_days(
        context: &SyncContext,
        instance: &Instance,
        driver: &dyn SlowQueryDriver,
        start: NaiveDate,
        today: NaiveDate,
        summary: &mut InstanceSyncSummary,
    ) -> SyncResult<()> {
        if let Err(e) = driver.check_slow_query_log_enabled().await {
            if e.is_feature_unavailable() {
                return Err(SyncError::FeatureUnavailable {
                    instance_id: instance.resource_id.clone(),
                    reason: e.to_string(),
                });
            }
            return Err(e.into());
        }

        for day in start.iter_days().take_while(|day| *day <= today) {
            let log_date_ts = day.and_time(NaiveTime::MIN).and_utc();
            let statistics = driver.sync_slow_query(log_date_ts).await?;

            let databases = statistics.len();
            for (database_name, statistics) in statistics {
                context
                    .store
                    .upsert_slow_log(UpsertSlowLog {
                        instance_id: instance.resource_id.clone(),
                        database_name,
                        log_date: day,
                        statistics,
                    })
                    .await?;
                summary.records_upserted += 1;
                metrics::records_upserted_total().add(1, &[]);
            }
            summary.days_synced += 1;

            debug!(
                instance = %instance.resource_id,
                log_date = %day,
                databases,
                "Synced slow query day"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl SyncStrategy for DailyPartitionedSync {
    fn name(&self) -> &'static str {
        "daily_partitioned"
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

        let today = context.clock.today();
        let earliest = context.retention_cutoff();
        let start = context
            .store
            .get_latest_slow_log_date(&instance.resource_id)
            .await?
            .map_or(earliest, |latest| latest.max(earliest));

        let driver = context.drivers.open(instance, None).await?;
        let result =
            Self::sync_days(context, instance, driver.as_ref(), start, today, &mut summary).await;
        driver.close().await;
        result?;

        info!(
            instance = %instance.resource_id,
            start = %start,
            end = %today,
            days = summary.days_synced,
            records = summary.records_upserted,
            "Synced slow query logs"
        );
        Ok(summary)
    }
}
