//! # In-Memory Stores
//!
//! Process-local implementations of [`TaskDagStore`] and [`SlowQueryStore`]
//! with the same semantics as the PostgreSQL ones. Used for embedding the
//! syncer without a metadata database and by the test suites.

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::slow_query::SlowQueryStore;
use super::task_dag::TaskDagStore;
use crate::dag::{detect_cycle, replace_predecessors};
use crate::error::{DagError, DagResult, StoreResult};
use crate::models::{
    Database, DatabaseFilter, Instance, InstanceFilter, ListSlowQueryFilter, SlowLogRecord,
    SlowQueryLogEntry, SlowQueryPolicy, SlowQueryStatistics, TaskDagEdge, TaskDagFilter, TaskId,
    TaskPlacement, UpsertSlowLog,
};

/// In-memory [`TaskDagStore`]
#[derive(Debug, Default)]
pub struct InMemoryTaskDagStore {
    edges: RwLock<BTreeSet<TaskDagEdge>>,
    placements: RwLock<HashMap<TaskId, TaskPlacement>>,
    /// Serializes rebuilds per target task
    target_locks: DashMap<TaskId, Arc<Mutex<()>>>,
}

impl InMemoryTaskDagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record which stage and pipeline a task belongs to, for filtered listing
    pub fn register_task(&self, task_id: TaskId, stage_id: i64, pipeline_id: i64) {
        self.placements.write().insert(
            task_id,
            TaskPlacement {
                task_id,
                stage_id,
                pipeline_id,
            },
        );
    }

    fn target_lock(&self, to_task_id: TaskId) -> Arc<Mutex<()>> {
        self.target_locks
            .entry(to_task_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl TaskDagStore for InMemoryTaskDagStore {
    async fn rebuild_predecessors(
        &self,
        to_task_id: TaskId,
        from_task_ids: &BTreeSet<TaskId>,
    ) -> DagResult<()> {
        let lock = self.target_lock(to_task_id);
        let _guard = lock.lock().await;

        let mut edges = self.edges.write();
        let current: Vec<TaskDagEdge> = edges.iter().copied().collect();
        let proposed = replace_predecessors(&current, to_task_id, from_task_ids);
        if detect_cycle(&proposed) {
            return Err(DagError::CycleDetected { to_task_id });
        }
        *edges = proposed.into_iter().collect();
        Ok(())
    }

    async fn create_edge(&self, from_task_id: TaskId, to_task_id: TaskId) -> DagResult<()> {
        let lock = self.target_lock(to_task_id);
        let _guard = lock.lock().await;

        let mut edges = self.edges.write();
        let edge = TaskDagEdge::new(from_task_id, to_task_id);
        if edges.contains(&edge) {
            return Err(DagError::DuplicateEdge {
                from: from_task_id,
                to: to_task_id,
            });
        }
        let mut proposed: Vec<TaskDagEdge> = edges.iter().copied().collect();
        proposed.push(edge);
        if detect_cycle(&proposed) {
            return Err(DagError::CycleDetected { to_task_id });
        }
        edges.insert(edge);
        Ok(())
    }

    async fn list_edges(&self, filter: &TaskDagFilter) -> DagResult<Vec<TaskDagEdge>> {
        let edges = self.edges.read();
        if filter.is_empty() {
            return Ok(edges.iter().copied().collect());
        }
        let placements = self.placements.read();
        Ok(edges
            .iter()
            .filter(|edge| {
                placements
                    .get(&edge.from_task_id)
                    .is_some_and(|placement| placement.matches(filter))
            })
            .copied()
            .collect())
    }
}

type RecordKey = (String, String, NaiveDate);

#[derive(Debug, Default)]
struct SlowQueryState {
    instances: BTreeMap<String, Instance>,
    databases: BTreeMap<(String, String), Database>,
    policies: HashMap<String, SlowQueryPolicy>,
    records: BTreeMap<RecordKey, SlowQueryStatistics>,
}

/// In-memory [`SlowQueryStore`]
#[derive(Debug, Default)]
pub struct InMemorySlowQueryStore {
    state: RwLock<SlowQueryState>,
    writes: AtomicU64,
}

impl InMemorySlowQueryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_instance(&self, instance: Instance) {
        self.state
            .write()
            .instances
            .insert(instance.resource_id.clone(), instance);
    }

    pub fn add_database(&self, database: Database) {
        self.state.write().databases.insert(
            (database.instance_id.clone(), database.database_name.clone()),
            database,
        );
    }

    pub fn set_policy(&self, instance_id: &str, policy: SlowQueryPolicy) {
        self.state
            .write()
            .policies
            .insert(instance_id.to_string(), policy);
    }

    /// Seed a record without counting it as a write
    pub fn insert_record(&self, record: SlowLogRecord) {
        self.state.write().records.insert(
            (record.instance_id, record.database_name, record.log_date),
            record.statistics,
        );
    }

    /// Snapshot of every persisted record, ordered by instance, database, day
    pub fn records(&self) -> Vec<SlowLogRecord> {
        self.state
            .read()
            .records
            .iter()
            .map(|((instance_id, database_name, log_date), statistics)| SlowLogRecord {
                instance_id: instance_id.clone(),
                database_name: database_name.clone(),
                log_date: *log_date,
                statistics: statistics.clone(),
            })
            .collect()
    }

    pub fn record(
        &self,
        instance_id: &str,
        database_name: &str,
        log_date: NaiveDate,
    ) -> Option<SlowQueryStatistics> {
        self.state
            .read()
            .records
            .get(&(instance_id.to_string(), database_name.to_string(), log_date))
            .cloned()
    }

    /// Number of mutating store calls (deletes and upserts) served so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SlowQueryStore for InMemorySlowQueryStore {
    async fn list_instances(&self, filter: &InstanceFilter) -> StoreResult<Vec<Instance>> {
        Ok(self
            .state
            .read()
            .instances
            .values()
            .filter(|instance| filter.matches(instance))
            .cloned()
            .collect())
    }

    async fn list_databases(&self, filter: &DatabaseFilter) -> StoreResult<Vec<Database>> {
        Ok(self
            .state
            .read()
            .databases
            .values()
            .filter(|database| filter.matches(database))
            .cloned()
            .collect())
    }

    async fn get_slow_query_policy(
        &self,
        instance_id: &str,
    ) -> StoreResult<Option<SlowQueryPolicy>> {
        Ok(self.state.read().policies.get(instance_id).copied())
    }

    async fn delete_outdated_slow_logs(
        &self,
        instance_id: &str,
        cutoff: NaiveDate,
    ) -> StoreResult<u64> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write();
        let before = state.records.len();
        state
            .records
            .retain(|(instance, _, log_date), _| instance != instance_id || *log_date >= cutoff);
        Ok((before - state.records.len()) as u64)
    }

    async fn get_latest_slow_log_date(&self, instance_id: &str) -> StoreResult<Option<NaiveDate>> {
        Ok(self
            .state
            .read()
            .records
            .keys()
            .filter(|(instance, _, _)| instance == instance_id)
            .map(|(_, _, log_date)| *log_date)
            .max())
    }

    async fn list_slow_query_logs(
        &self,
        filter: &ListSlowQueryFilter,
    ) -> StoreResult<Vec<SlowQueryLogEntry>> {
        Ok(self
            .records()
            .into_iter()
            .filter(|record| filter.matches(record))
            .flat_map(|record| record.entries())
            .collect())
    }

    async fn upsert_slow_log(&self, upsert: UpsertSlowLog) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let record = SlowLogRecord::from(upsert);
        self.insert_record(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rebuild_replaces_inbound_edges() {
        let store = InMemoryTaskDagStore::new();
        store
            .rebuild_predecessors(5, &BTreeSet::from([1, 2]))
            .await
            .unwrap();
        store
            .rebuild_predecessors(5, &BTreeSet::from([3]))
            .await
            .unwrap();

        let edges = store.list_edges(&TaskDagFilter::default()).await.unwrap();
        assert_eq!(edges, vec![TaskDagEdge::new(3, 5)]);
    }

    #[tokio::test]
    async fn test_rebuild_refusing_cycle_leaves_edges_untouched() {
        let store = InMemoryTaskDagStore::new();
        store
            .rebuild_predecessors(2, &BTreeSet::from([1]))
            .await
            .unwrap();
        store
            .rebuild_predecessors(3, &BTreeSet::from([2]))
            .await
            .unwrap();

        let result = store.rebuild_predecessors(1, &BTreeSet::from([3])).await;
        assert_eq!(result, Err(DagError::CycleDetected { to_task_id: 1 }));

        let edges = store.list_edges(&TaskDagFilter::default()).await.unwrap();
        assert_eq!(edges, vec![TaskDagEdge::new(1, 2), TaskDagEdge::new(2, 3)]);
    }

    #[tokio::test]
    async fn test_create_edge_rejects_duplicates() {
        let store = InMemoryTaskDagStore::new();
        store.create_edge(1, 2).await.unwrap();
        assert_eq!(
            store.create_edge(1, 2).await,
            Err(DagError::DuplicateEdge { from: 1, to: 2 })
        );
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_day() {
        let store = InMemorySlowQueryStore::new();
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        for _ in 0..2 {
            store
                .upsert_slow_log(UpsertSlowLog {
                    instance_id: "prod".to_string(),
                    database_name: "orders".to_string(),
                    log_date: day,
                    statistics: SlowQueryStatistics::default(),
                })
                .await
                .unwrap();
        }
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.write_count(), 2);
    }
}
