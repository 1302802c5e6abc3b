//! # Slow Query Statistics
//!
//! Per-day, per-database slow query aggregates keyed by statement
//! fingerprint, plus the read model returned when listing persisted logs.
//!
//! Item order inside [`SlowQueryStatistics`] carries no meaning. Compare
//! statistics through [`SlowQueryStatistics::by_fingerprint`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::utils::serde::duration_micros;

/// Aggregate for one statement shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowQueryStatisticsItem {
    pub sql_fingerprint: String,
    pub count: u64,
    #[serde(with = "duration_micros")]
    pub total_query_time: Duration,
    #[serde(with = "duration_micros")]
    pub maximum_query_time: Duration,
    pub latest_log_time: DateTime<Utc>,
    pub total_rows_sent: u64,
    #[serde(default)]
    pub total_rows_examined: u64,
    /// One raw statement of this shape, kept for operators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_sql: Option<String>,
}

impl SlowQueryStatisticsItem {
    pub fn average_query_time(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_query_time.as_nanos() / u128::from(self.count);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    pub fn average_rows_sent(&self) -> u64 {
        if self.count == 0 {
            return 0;
        }
        self.total_rows_sent / self.count
    }
}

/// All statement aggregates of one database for one day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowQueryStatistics {
    pub items: Vec<SlowQueryStatisticsItem>,
}

impl SlowQueryStatistics {
    pub fn new(items: Vec<SlowQueryStatisticsItem>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Index items by fingerprint, for order-independent comparison
    pub fn by_fingerprint(&self) -> HashMap<&str, &SlowQueryStatisticsItem> {
        self.items
            .iter()
            .map(|item| (item.sql_fingerprint.as_str(), item))
            .collect()
    }

    /// Latest log time observed by any item
    pub fn latest_log_time(&self) -> Option<DateTime<Utc>> {
        self.items.iter().map(|item| item.latest_log_time).max()
    }
}

/// A persisted day of slow query statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowLogRecord {
    pub instance_id: String,
    pub database_name: String,
    pub log_date: NaiveDate,
    pub statistics: SlowQueryStatistics,
}

/// Average-based view of one persisted fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowQueryLogStatistics {
    pub sql_fingerprint: String,
    pub count: u64,
    pub latest_log_time: DateTime<Utc>,
    #[serde(with = "duration_micros")]
    pub average_query_time: Duration,
    #[serde(with = "duration_micros")]
    pub maximum_query_time: Duration,
    pub average_rows_sent: u64,
}

impl From<&SlowQueryStatisticsItem> for SlowQueryLogStatistics {
    fn from(item: &SlowQueryStatisticsItem) -> Self {
        Self {
            sql_fingerprint: item.sql_fingerprint.clone(),
            count: item.count,
            latest_log_time: item.latest_log_time,
            average_query_time: item.average_query_time(),
            maximum_query_time: item.maximum_query_time,
            average_rows_sent: item.average_rows_sent(),
        }
    }
}

/// Row of the listing read model: one persisted fingerprint of one database-day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowQueryLogEntry {
    pub database_name: String,
    pub log_date: NaiveDate,
    pub statistics: SlowQueryLogStatistics,
}

impl SlowLogRecord {
    /// Flatten into the average-based read model
    pub fn entries(&self) -> Vec<SlowQueryLogEntry> {
        self.statistics
            .items
            .iter()
            .map(|item| SlowQueryLogEntry {
                database_name: self.database_name.clone(),
                log_date: self.log_date,
                statistics: item.into(),
            })
            .collect()
    }
}

/// Listing filter; the date range is half-open `[start, end)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSlowQueryFilter {
    pub instance_id: Option<String>,
    pub database_name: Option<String>,
    pub start_log_date: Option<NaiveDate>,
    pub end_log_date: Option<NaiveDate>,
}

impl ListSlowQueryFilter {
    pub fn matches(&self, record: &SlowLogRecord) -> bool {
        self.instance_id
            .as_ref()
            .map_or(true, |id| *id == record.instance_id)
            && self
                .database_name
                .as_ref()
                .map_or(true, |name| *name == record.database_name)
            && self.start_log_date.map_or(true, |start| record.log_date >= start)
            && self.end_log_date.map_or(true, |end| record.log_date < end)
    }
}

/// Overwrite of one `(instance, database, day)` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertSlowLog {
    pub instance_id: String,
    pub database_name: String,
    pub log_date: NaiveDate,
    pub statistics: SlowQueryStatistics,
}

impl From<UpsertSlowLog> for SlowLogRecord {
    fn from(upsert: UpsertSlowLog) -> Self {
        Self {
            instance_id: upsert.instance_id,
            database_name: upsert.database_name,
            log_date: upsert.log_date,
            statistics: upsert.statistics,
        }
    }
}
