//! # MySQL-Family Driver
//!
//! Reads `mysql.slow_log`, which the server only populates when
//! `slow_query_log = ON` and `log_output` includes `TABLE`. Rows are
//! partitioned by day on `start_time`.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::{FromRow, MySqlPool, Row};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::SlowQueryDriver;
use crate::error::{DriverError, DriverResult};
use crate::models::SlowQueryStatistics;
use crate::slow_query::{aggregate, RawSlowQueryEntry, SqlDialect};

const SLOW_LOG_SETTINGS_QUERY: &str = r#"
    SELECT
        CAST(@@GLOBAL.slow_query_log AS SIGNED) AS slow_query_log,
        CAST(@@GLOBAL.log_output AS CHAR) AS log_output
"#;

const SLOW_LOG_DAY_QUERY: &str = r#"
    SELECT
        start_time,
        CAST(
            (HOUR(query_time) * 3600 + MINUTE(query_time) * 60 + SECOND(query_time)) * 1000000
                + MICROSECOND(query_time)
            AS SIGNED
        ) AS query_time_us,
        CAST(rows_sent AS SIGNED) AS rows_sent,
        CAST(rows_examined AS SIGNED) AS rows_examined,
        CAST(db AS CHAR) AS db,
        CAST(sql_text AS CHAR) AS sql_text
    FROM mysql.slow_log
    WHERE start_time >= ? AND start_time < ?
"#;

#[derive(Debug, FromRow)]
struct SlowLogRow {
    start_time: DateTime<Utc>,
    query_time_us: i64,
    rows_sent: i64,
    rows_examined: i64,
    db: Option<String>,
    sql_text: Option<String>,
}

impl From<SlowLogRow> for RawSlowQueryEntry {
    fn from(row: SlowLogRow) -> Self {
        let non_negative = |value: i64| u64::try_from(value).unwrap_or(0);
        RawSlowQueryEntry::execution(
            row.db.unwrap_or_default(),
            row.sql_text.unwrap_or_default(),
            Duration::from_micros(non_negative(row.query_time_us)),
            non_negative(row.rows_sent),
            non_negative(row.rows_examined),
            row.start_time,
        )
    }
}

/// Decide whether the server settings make `mysql.slow_log` usable
pub(crate) fn check_slow_log_settings(slow_query_log: i64, log_output: &str) -> DriverResult<()> {
    if slow_query_log != 1 {
        return Err(DriverError::FeatureUnavailable(
            "slow_query_log is OFF".to_string(),
        ));
    }
    let writes_table = log_output
        .split(',')
        .any(|target| target.trim().eq_ignore_ascii_case("TABLE"));
    if !writes_table {
        return Err(DriverError::FeatureUnavailable(format!(
            "log_output is {log_output}, expected it to include TABLE"
        )));
    }
    Ok(())
}

/// Slow query driver for MySQL, MariaDB and TiDB
#[derive(Debug, Clone)]
pub struct MySqlSlowQueryDriver {
    pool: MySqlPool,
}

impl MySqlSlowQueryDriver {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SlowQueryDriver for MySqlSlowQueryDriver {
    async fn check_slow_query_log_enabled(&self) -> DriverResult<()> {
        let row = sqlx::query(SLOW_LOG_SETTINGS_QUERY)
            .fetch_one(&self.pool)
            .await?;
        let slow_query_log: i64 = row.try_get("slow_query_log")?;
        let log_output: String = row.try_get("log_output")?;
        check_slow_log_settings(slow_query_log, &log_output)
    }

    async fn sync_slow_query(
        &self,
        log_date_ts: DateTime<Utc>,
    ) -> DriverResult<HashMap<String, SlowQueryStatistics>> {
        let day_end = log_date_ts + ChronoDuration::days(1);
        let rows = sqlx::query_as::<_, SlowLogRow>(SLOW_LOG_DAY_QUERY)
            .bind(log_date_ts)
            .bind(day_end)
            .fetch_all(&self.pool)
            .await?;

        debug!(
            log_date = %log_date_ts.date_naive(),
            rows = rows.len(),
            "Read mysql.slow_log"
        );
        Ok(aggregate(
            rows.into_iter().map(RawSlowQueryEntry::from),
            SqlDialect::MySql,
        ))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
