//! # Statistics Merge
//!
//! Combines a fresh snapshot with entries already persisted for the same
//! database and day. Persisted entries only carry averages, so their totals
//! are reconstructed as `average * count`; the integer averaging makes this
//! an approximation that can drift below the true total.

use std::collections::HashMap;
use std::time::Duration;

use crate::models::{SlowQueryLogEntry, SlowQueryStatistics, SlowQueryStatisticsItem};

fn reconstruct_total(average: Duration, count: u64) -> Duration {
    let micros = average.as_micros().saturating_mul(u128::from(count));
    Duration::from_micros(u64::try_from(micros).unwrap_or(u64::MAX))
}

/// Merge `persisted` entries into `existing`, keyed by fingerprint.
///
/// An item already present in `existing` keeps its own `latest_log_time`.
/// Output order is unspecified.
pub fn merge(existing: SlowQueryStatistics, persisted: &[SlowQueryLogEntry]) -> SlowQueryStatistics {
    let mut by_fingerprint: HashMap<String, SlowQueryStatisticsItem> = existing
        .items
        .into_iter()
        .map(|item| (item.sql_fingerprint.clone(), item))
        .collect();

    for entry in persisted {
        let stats = &entry.statistics;
        let total_query_time = reconstruct_total(stats.average_query_time, stats.count);
        let total_rows_sent = stats.average_rows_sent.saturating_mul(stats.count);

        match by_fingerprint.get_mut(&stats.sql_fingerprint) {
            Some(item) => {
                item.count += stats.count;
                item.total_query_time += total_query_time;
                item.maximum_query_time = item.maximum_query_time.max(stats.maximum_query_time);
                item.total_rows_sent += total_rows_sent;
            }
            None => {
                by_fingerprint.insert(
                    stats.sql_fingerprint.clone(),
                    SlowQueryStatisticsItem {
                        sql_fingerprint: stats.sql_fingerprint.clone(),
                        count: stats.count,
                        total_query_time,
                        maximum_query_time: stats.maximum_query_time,
                        latest_log_time: stats.latest_log_time,
                        total_rows_sent,
                        total_rows_examined: 0,
                        sample_sql: None,
                    },
                );
            }
        }
    }

    SlowQueryStatistics::new(by_fingerprint.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SlowQueryLogStatistics;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn item(fingerprint: &str, count: u64, total_ms: u64, max_ms: u64) -> SlowQueryStatisticsItem {
        SlowQueryStatisticsItem {
            sql_fingerprint: fingerprint.to_string(),
            count,
            total_query_time: Duration::from_millis(total_ms),
            maximum_query_time: Duration::from_millis(max_ms),
            latest_log_time: at(10),
            total_rows_sent: count * 5,
            total_rows_examined: 0,
            sample_sql: None,
        }
    }

    fn persisted(fingerprint: &str, count: u64, avg_ms: u64, max_ms: u64) -> SlowQueryLogEntry {
        SlowQueryLogEntry {
            database_name: "orders".to_string(),
            log_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            statistics: SlowQueryLogStatistics {
                sql_fingerprint: fingerprint.to_string(),
                count,
                latest_log_time: at(4),
                average_query_time: Duration::from_millis(avg_ms),
                maximum_query_time: Duration::from_millis(max_ms),
                average_rows_sent: 2,
            },
        }
    }

    #[test]
    fn test_present_fingerprint_accumulates() {
        let existing = SlowQueryStatistics::new(vec![item("select ?", 2, 400, 300)]);
        let merged = merge(existing, &[persisted("select ?", 3, 100, 500)]);

        let by_key = merged.by_fingerprint();
        let merged_item = by_key["select ?"];
        assert_eq!(merged_item.count, 5);
        assert_eq!(merged_item.total_query_time, Duration::from_millis(700));
        assert_eq!(merged_item.maximum_query_time, Duration::from_millis(500));
        assert_eq!(merged_item.total_rows_sent, 10 + 6);
        assert_eq!(merged_item.latest_log_time, at(10));
    }

    #[test]
    fn test_absent_fingerprint_is_reconstructed() {
        let merged = merge(
            SlowQueryStatistics::default(),
            &[persisted("delete from t where id = ?", 4, 250, 900)],
        );

        assert_eq!(merged.items.len(), 1);
        let merged_item = &merged.items[0];
        assert_eq!(merged_item.count, 4);
        assert_eq!(merged_item.total_query_time, Duration::from_secs(1));
        assert_eq!(merged_item.total_rows_sent, 8);
        assert_eq!(merged_item.latest_log_time, at(4));
    }

    #[test]
    fn test_empty_persisted_is_identity() {
        let existing = SlowQueryStatistics::new(vec![item("a", 1, 1, 1), item("b", 2, 2, 2)]);
        let merged = merge(existing.clone(), &[]);
        assert_eq!(merged.by_fingerprint(), existing.by_fingerprint());
    }
}
