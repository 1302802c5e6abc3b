//! Proptest strategies for DAG edge sets and slow query statistics.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::time::Duration;

use rollout_core::models::{SlowQueryStatisticsItem, TaskDagEdge};

/// Edges that always point from a lower to a higher task id, so the
/// generated graph is acyclic by construction
pub fn acyclic_edges_strategy() -> impl Strategy<Value = Vec<TaskDagEdge>> {
    prop::collection::vec((1i64..=30, 1i64..=30), 0..40).prop_map(|pairs| {
        pairs
            .into_iter()
            .filter(|(a, b)| a != b)
            .map(|(a, b)| TaskDagEdge::new(a.min(b), a.max(b)))
            .collect()
    })
}

pub fn fingerprint_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("select * from orders where id = ?".to_string()),
        Just("update stock set qty = ? where sku = ?".to_string()),
        Just("delete from sessions where expires_at < ?".to_string()),
        Just("select count(*) from users".to_string()),
    ]
}

pub fn statistics_item_strategy() -> impl Strategy<Value = SlowQueryStatisticsItem> {
    (
        fingerprint_strategy(),
        1u64..1_000,
        1u64..5_000,
        0u64..1_000,
        0i64..86_400,
    )
        .prop_map(|(sql_fingerprint, count, avg_ms, rows, offset)| {
            let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
            SlowQueryStatisticsItem {
                sql_fingerprint,
                count,
                total_query_time: Duration::from_millis(avg_ms * count),
                maximum_query_time: Duration::from_millis(avg_ms * 2),
                latest_log_time: base + chrono::Duration::seconds(offset),
                total_rows_sent: rows * count,
                total_rows_examined: 0,
                sample_sql: None,
            }
        })
}

/// Items with pairwise distinct fingerprints
pub fn statistics_items_strategy() -> impl Strategy<Value = Vec<SlowQueryStatisticsItem>> {
    prop::collection::vec(statistics_item_strategy(), 0..4).prop_map(|items| {
        let mut seen = std::collections::HashSet::new();
        items
            .into_iter()
            .filter(|item| seen.insert(item.sql_fingerprint.clone()))
            .collect()
    })
}
