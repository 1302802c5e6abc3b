//! Scripted drivers and a failure-injecting store for driving the syncer
//! without live database instances.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use rollout_core::config::SlowQuerySyncConfig;
use rollout_core::drivers::{DriverFactory, SlowQueryDriver};
use rollout_core::error::{DriverError, DriverResult, StoreError, StoreResult};
use rollout_core::models::{
    Database, DatabaseFilter, Instance, InstanceFilter, ListSlowQueryFilter, SlowQueryLogEntry,
    SlowQueryPolicy, SlowQueryStatistics, UpsertSlowLog,
};
use rollout_core::store::{InMemorySlowQueryStore, SlowQueryStore};
use rollout_core::sync::{FixedClock, SlowQuerySyncer, SyncContext, SyncStrategyRegistry};

use super::builders::at;

/// What a scripted instance reports
#[derive(Debug, Clone, Default)]
pub struct InstanceScript {
    /// Day-partitioned data, by day
    pub days: BTreeMap<NaiveDate, HashMap<String, SlowQueryStatistics>>,
    /// Days whose fetch fails with a query error
    pub failing_days: HashSet<NaiveDate>,
    /// Rolling-window snapshot
    pub snapshot: HashMap<String, SlowQueryStatistics>,
    /// Capture disabled at instance level
    pub disabled: bool,
    /// Capture disabled for these databases only
    pub disabled_databases: HashSet<String>,
    /// Opening a driver fails
    pub unreachable: bool,
    /// Fetching panics
    pub panic_on_fetch: bool,
}

#[derive(Debug, Default)]
struct ScriptState {
    scripts: HashMap<String, InstanceScript>,
    opened: Vec<(String, Option<String>)>,
    fetched: Vec<(String, NaiveDate)>,
    closed: usize,
}

/// [`DriverFactory`] whose drivers replay per-instance scripts
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriverFactory {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedDriverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, instance_id: &str, script: InstanceScript) {
        self.state
            .lock()
            .scripts
            .insert(instance_id.to_string(), script);
    }

    pub fn update(&self, instance_id: &str, update: impl FnOnce(&mut InstanceScript)) {
        let mut state = self.state.lock();
        update(state.scripts.entry(instance_id.to_string()).or_default());
    }

    /// `(instance, database)` of every driver opened, in order
    pub fn opened(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().opened.clone()
    }

    /// Days fetched for `instance_id`, in order
    pub fn fetched_days(&self, instance_id: &str) -> Vec<NaiveDate> {
        self.state
            .lock()
            .fetched
            .iter()
            .filter(|(instance, _)| instance == instance_id)
            .map(|(_, day)| *day)
            .collect()
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().fetched.len()
    }

    pub fn closed_count(&self) -> usize {
        self.state.lock().closed
    }
}

#[async_trait]
impl DriverFactory for ScriptedDriverFactory {
    async fn open(
        &self,
        instance: &Instance,
        database: Option<&Database>,
    ) -> DriverResult<Box<dyn SlowQueryDriver>> {
        let database_name = database.map(|db| db.database_name.clone());
        let mut state = self.state.lock();
        state
            .opened
            .push((instance.resource_id.clone(), database_name.clone()));

        let unreachable = state
            .scripts
            .get(&instance.resource_id)
            .is_some_and(|script| script.unreachable);
        if unreachable {
            return Err(DriverError::Connection(format!(
                "{} is unreachable",
                instance.resource_id
            )));
        }

        Ok(Box::new(ScriptedDriver {
            instance_id: instance.resource_id.clone(),
            database_name,
            state: self.state.clone(),
        }))
    }
}

struct ScriptedDriver {
    instance_id: String,
    database_name: Option<String>,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedDriver {
    fn script(&self) -> InstanceScript {
        self.state
            .lock()
            .scripts
            .get(&self.instance_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SlowQueryDriver for ScriptedDriver {
    async fn check_slow_query_log_enabled(&self) -> DriverResult<()> {
        let script = self.script();
        let database_disabled = self
            .database_name
            .as_ref()
            .is_some_and(|name| script.disabled_databases.contains(name));
        if script.disabled || database_disabled {
            return Err(DriverError::FeatureUnavailable(
                "slow query capture is off".to_string(),
            ));
        }
        Ok(())
    }

    async fn sync_slow_query(
        &self,
        log_date_ts: DateTime<Utc>,
    ) -> DriverResult<HashMap<String, SlowQueryStatistics>> {
        let script = self.script();
        if script.panic_on_fetch {
            panic!("scripted driver for {} panicked", self.instance_id);
        }

        let day = log_date_ts.date_naive();
        self.state
            .lock()
            .fetched
            .push((self.instance_id.clone(), day));

        if self.database_name.is_some() {
            return Ok(script.snapshot);
        }
        if script.failing_days.contains(&day) {
            return Err(DriverError::Query(format!("slow_log unreadable for {day}")));
        }
        Ok(script.days.get(&day).cloned().unwrap_or_default())
    }

    async fn close(&self) {
        self.state.lock().closed += 1;
    }
}

/// Delegating store that fails or panics on selected operations
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: Arc<InMemorySlowQueryStore>,
    pub failing_upserts: HashSet<String>,
    pub fail_listing_logs: bool,
    pub panic_on_list_instances: bool,
}

impl FlakyStore {
    pub fn wrap(inner: Arc<InMemorySlowQueryStore>) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }
}

#[async_trait]
impl SlowQueryStore for FlakyStore {
    async fn list_instances(&self, filter: &InstanceFilter) -> StoreResult<Vec<Instance>> {
        if self.panic_on_list_instances {
            panic!("instance listing exploded");
        }
        self.inner.list_instances(filter).await
    }

    async fn list_databases(&self, filter: &DatabaseFilter) -> StoreResult<Vec<Database>> {
        self.inner.list_databases(filter).await
    }

    async fn get_slow_query_policy(
        &self,
        instance_id: &str,
    ) -> StoreResult<Option<SlowQueryPolicy>> {
        self.inner.get_slow_query_policy(instance_id).await
    }

    async fn delete_outdated_slow_logs(
        &self,
        instance_id: &str,
        cutoff: NaiveDate,
    ) -> StoreResult<u64> {
        self.inner.delete_outdated_slow_logs(instance_id, cutoff).await
    }

    async fn get_latest_slow_log_date(&self, instance_id: &str) -> StoreResult<Option<NaiveDate>> {
        self.inner.get_latest_slow_log_date(instance_id).await
    }

    async fn list_slow_query_logs(
        &self,
        filter: &ListSlowQueryFilter,
    ) -> StoreResult<Vec<SlowQueryLogEntry>> {
        if self.fail_listing_logs {
            return Err(StoreError::Database("connection reset".to_string()));
        }
        self.inner.list_slow_query_logs(filter).await
    }

    async fn upsert_slow_log(&self, upsert: UpsertSlowLog) -> StoreResult<()> {
        if self.failing_upserts.contains(&upsert.database_name) {
            return Err(StoreError::Database(format!(
                "upsert of {} rejected",
                upsert.database_name
            )));
        }
        self.inner.upsert_slow_log(upsert).await
    }
}

/// In-memory store, scripted drivers and a fixed clock wired together
pub struct SyncHarness {
    pub store: Arc<InMemorySlowQueryStore>,
    pub drivers: Arc<ScriptedDriverFactory>,
    pub clock: Arc<FixedClock>,
    pub today: NaiveDate,
}

impl SyncHarness {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            store: Arc::new(InMemorySlowQueryStore::new()),
            drivers: Arc::new(ScriptedDriverFactory::new()),
            clock: Arc::new(FixedClock::new(at(today, 12, 0))),
            today,
        }
    }

    pub fn add_instance(&self, instance: Instance, active: Option<bool>) {
        if let Some(active) = active {
            self.store
                .set_policy(&instance.resource_id, SlowQueryPolicy { active });
        }
        self.store.add_instance(instance);
    }

    pub fn context(&self) -> SyncContext {
        self.context_with_store(self.store.clone())
    }

    pub fn context_with_store(&self, store: Arc<dyn SlowQueryStore>) -> SyncContext {
        SyncContext::new(
            store,
            self.drivers.clone(),
            self.clock.clone(),
            SlowQuerySyncConfig::default().retention_days,
        )
    }

    pub fn syncer(&self) -> SlowQuerySyncer {
        self.syncer_with_interval(SlowQuerySyncConfig::default().interval_seconds)
    }

    pub fn syncer_with_interval(&self, interval_seconds: u64) -> SlowQuerySyncer {
        let config = SlowQuerySyncConfig {
            interval_seconds,
            ..SlowQuerySyncConfig::default()
        };
        SlowQuerySyncer::new(
            self.context(),
            SyncStrategyRegistry::with_defaults(),
            &config,
        )
    }
}
