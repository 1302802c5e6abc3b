//! Test data builders for instances, databases and slow query statistics.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::HashMap;
use std::time::Duration;

use rollout_core::constants::{Engine, SyncState};
use rollout_core::models::{
    DataSource, Database, Instance, SlowLogRecord, SlowQueryStatistics, SlowQueryStatisticsItem,
};

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

pub fn at(day: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(
        &day.and_time(NaiveTime::from_hms_opt(hour, minute, 0).expect("valid test time")),
    )
}

pub fn days_before(day: NaiveDate, days: u64) -> NaiveDate {
    day.checked_sub_days(chrono::Days::new(days))
        .expect("date in range")
}

pub fn instance(resource_id: &str, engine: Engine) -> Instance {
    Instance {
        resource_id: resource_id.to_string(),
        engine,
        deleted: false,
        data_source: DataSource {
            host: "127.0.0.1".to_string(),
            port: match engine {
                Engine::Postgres => 5432,
                _ => 3306,
            },
            username: "console".to_string(),
            password: "secret".to_string(),
            database: None,
        },
    }
}

pub fn database(instance_id: &str, name: &str) -> Database {
    Database {
        instance_id: instance_id.to_string(),
        database_name: name.to_string(),
        sync_state: SyncState::Ok,
    }
}

pub fn item(
    fingerprint: &str,
    count: u64,
    total_ms: u64,
    max_ms: u64,
    latest_log_time: DateTime<Utc>,
) -> SlowQueryStatisticsItem {
    SlowQueryStatisticsItem {
        sql_fingerprint: fingerprint.to_string(),
        count,
        total_query_time: Duration::from_millis(total_ms),
        maximum_query_time: Duration::from_millis(max_ms),
        latest_log_time,
        total_rows_sent: count,
        total_rows_examined: count * 10,
        sample_sql: None,
    }
}

pub fn stats(items: Vec<SlowQueryStatisticsItem>) -> SlowQueryStatistics {
    SlowQueryStatistics::new(items)
}

/// Statistics for a single database, keyed the way drivers return them
pub fn per_database(
    database_name: &str,
    statistics: SlowQueryStatistics,
) -> HashMap<String, SlowQueryStatistics> {
    HashMap::from([(database_name.to_string(), statistics)])
}

pub fn record(
    instance_id: &str,
    database_name: &str,
    log_date: NaiveDate,
    statistics: SlowQueryStatistics,
) -> SlowLogRecord {
    SlowLogRecord {
        instance_id: instance_id.to_string(),
        database_name: database_name.to_string(),
        log_date,
        statistics,
    }
}
