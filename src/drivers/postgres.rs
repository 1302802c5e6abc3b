//! # PostgreSQL-Family Driver
//!
//! Reads `pg_stat_statements`, a cumulative view with no per-day
//! partitioning. Every fetch returns the whole window as seen now.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::SlowQueryDriver;
use crate::constants::slow_query::PG_STAT_STATEMENTS_EXEC_TIME_VERSION;
use crate::error::{DriverError, DriverResult};
use crate::models::SlowQueryStatistics;
use crate::slow_query::{aggregate, RawSlowQueryEntry, SqlDialect};

#[derive(Debug, FromRow)]
struct StatementRow {
    database_name: String,
    query: Option<String>,
    calls: i64,
    total_time_ms: f64,
    max_time_ms: f64,
    rows: i64,
}

impl StatementRow {
    fn into_entry(self, snapshot_time: DateTime<Utc>) -> RawSlowQueryEntry {
        let non_negative = |value: i64| u64::try_from(value).unwrap_or(0);
        RawSlowQueryEntry {
            database: self.database_name,
            sql_text: self.query.unwrap_or_default(),
            count: non_negative(self.calls),
            total_query_time: millis(self.total_time_ms),
            maximum_query_time: millis(self.max_time_ms),
            rows_sent: non_negative(self.rows),
            rows_examined: 0,
            log_time: snapshot_time,
        }
    }
}

fn millis(value: f64) -> Duration {
    Duration::try_from_secs_f64(value / 1000.0).unwrap_or_default()
}

/// `pg_stat_statements` renamed its timing columns in PostgreSQL 13
pub(crate) fn statements_query(server_version_num: i32) -> String {
    let (total, max) = if server_version_num >= PG_STAT_STATEMENTS_EXEC_TIME_VERSION {
        ("total_exec_time", "max_exec_time")
    } else {
        ("total_time", "max_time")
    };
    format!(
        r#"
        SELECT
            d.datname::text AS database_name,
            s.query,
            s.calls,
            s.{total} AS total_time_ms,
            s.{max} AS max_time_ms,
            s.rows
        FROM pg_stat_statements s
        JOIN pg_database d ON d.oid = s.dbid
        WHERE s.calls > 0
        "#
    )
}

/// Slow query driver for PostgreSQL, connected to one database
#[derive(Debug, Clone)]
pub struct PgSlowQueryDriver {
    pool: PgPool,
    database_name: String,
}

impl PgSlowQueryDriver {
    pub fn new(pool: PgPool, database_name: impl Into<String>) -> Self {
        Self {
            pool,
            database_name: database_name.into(),
        }
    }
}

#[async_trait]
impl SlowQueryDriver for PgSlowQueryDriver {
    async fn check_slow_query_log_enabled(&self) -> DriverResult<()> {
        let installed = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM pg_extension WHERE extname = 'pg_stat_statements')",
        )
        .fetch_one(&self.pool)
        .await?;

        if !installed {
            return Err(DriverError::FeatureUnavailable(format!(
                "pg_stat_statements is not installed in database {}",
                self.database_name
            )));
        }
        Ok(())
    }

    async fn sync_slow_query(
        &self,
        _log_date_ts: DateTime<Utc>,
    ) -> DriverResult<HashMap<String, SlowQueryStatistics>> {
        let server_version_num = sqlx::query_scalar::<_, i32>(
            "SELECT current_setting('server_version_num')::int",
        )
        .fetch_one(&self.pool)
        .await?;

        let snapshot_time = Utc::now();
        let rows = sqlx::query_as::<_, StatementRow>(&statements_query(server_version_num))
            .fetch_all(&self.pool)
            .await?;

        debug!(
            database = %self.database_name,
            statements = rows.len(),
            "Read pg_stat_statements"
        );
        Ok(aggregate(
            rows.into_iter().map(|row| row.into_entry(snapshot_time)),
            SqlDialect::Standard,
        ))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_statements_query_picks_columns_by_version() {
        assert!(statements_query(160_002).contains("s.total_exec_time"));
        assert!(statements_query(120_017).contains("s.total_time"));
        assert!(!statements_query(120_017).contains("exec_time"));
    }

    #[test]
    fn test_statements_query_skips_uncalled_statements() {
        for version in [120_017, 160_002] {
            assert!(statements_query(version).contains("WHERE s.calls > 0"));
        }
    }

    #[test]
    fn test_row_keeps_cumulative_counters() {
        let snapshot_time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let entry = StatementRow {
            database_name: "orders".to_string(),
            query: Some("SELECT * FROM o WHERE id = $1".to_string()),
            calls: 40,
            total_time_ms: 2500.0,
            max_time_ms: 312.5,
            rows: 40,
        }
        .into_entry(snapshot_time);

        assert_eq!(entry.count, 40);
        assert_eq!(entry.total_query_time, Duration::from_millis(2500));
        assert_eq!(entry.maximum_query_time, Duration::from_micros(312_500));
        assert_eq!(entry.log_time, snapshot_time);
    }

    #[test]
    fn test_invalid_timing_becomes_zero() {
        assert_eq!(millis(f64::NAN), Duration::ZERO);
        assert_eq!(millis(-5.0), Duration::ZERO);
    }
}
