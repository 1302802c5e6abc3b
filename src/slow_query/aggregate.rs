//! # Slow Log Aggregation
//!
//! Folds raw slow-log observations into per-database statistics keyed by
//! statement fingerprint.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

use super::fingerprint::{fingerprint_with, SqlDialect};
use crate::models::{SlowQueryStatistics, SlowQueryStatisticsItem};

/// One observation read from an engine's slow query source.
///
/// A MySQL `slow_log` row is a single execution (`count == 1`); a
/// `pg_stat_statements` row already carries cumulative counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSlowQueryEntry {
    pub database: String,
    pub sql_text: String,
    pub count: u64,
    pub total_query_time: Duration,
    pub maximum_query_time: Duration,
    pub rows_sent: u64,
    pub rows_examined: u64,
    pub log_time: DateTime<Utc>,
}

impl RawSlowQueryEntry {
    /// A single execution, as logged by the MySQL family
    pub fn execution(
        database: impl Into<String>,
        sql_text: impl Into<String>,
        query_time: Duration,
        rows_sent: u64,
        rows_examined: u64,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            database: database.into(),
            sql_text: sql_text.into(),
            count: 1,
            total_query_time: query_time,
            maximum_query_time: query_time,
            rows_sent,
            rows_examined,
            log_time: start_time,
        }
    }
}

/// Group entries by database, then by their fingerprint under `dialect`.
///
/// Entries without a database name cannot be attributed and are dropped.
pub fn aggregate<I>(entries: I, dialect: SqlDialect) -> HashMap<String, SlowQueryStatistics>
where
    I: IntoIterator<Item = RawSlowQueryEntry>,
{
    let mut grouped: HashMap<String, HashMap<String, SlowQueryStatisticsItem>> = HashMap::new();

    for entry in entries {
        if entry.database.is_empty() {
            continue;
        }
        let key = fingerprint_with(&entry.sql_text, dialect);
        let items = grouped.entry(entry.database).or_default();

        match items.get_mut(&key) {
            Some(item) => {
                item.count += entry.count;
                item.total_query_time += entry.total_query_time;
                item.maximum_query_time = item.maximum_query_time.max(entry.maximum_query_time);
                item.latest_log_time = item.latest_log_time.max(entry.log_time);
                item.total_rows_sent += entry.rows_sent;
                item.total_rows_examined += entry.rows_examined;
            }
            None => {
                items.insert(
                    key.clone(),
                    SlowQueryStatisticsItem {
                        sql_fingerprint: key,
                        count: entry.count,
                        total_query_time: entry.total_query_time,
                        maximum_query_time: entry.maximum_query_time,
                        latest_log_time: entry.log_time,
                        total_rows_sent: entry.rows_sent,
                        total_rows_examined: entry.rows_examined,
                        sample_sql: Some(entry.sql_text),
                    },
                );
            }
        }
    }

    grouped
        .into_iter()
        .map(|(database, items)| (database, SlowQueryStatistics::new(items.into_values().collect())))
        .collect()
}
