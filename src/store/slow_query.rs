//! # Slow Query Store
//!
//! The narrow persistence contract the slow query syncer depends on, and
//! its PostgreSQL implementation. Statistics are stored as one JSONB
//! document per `(instance, db_name, log_date)`; writes are idempotent
//! overwrites on that key.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::constants::{Engine, SyncState};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    DataSource, Database, DatabaseFilter, Instance, InstanceFilter, ListSlowQueryFilter,
    SlowLogRecord, SlowQueryLogEntry, SlowQueryPolicy, SlowQueryStatistics, UpsertSlowLog,
};

/// Persistence operations consumed by the slow query syncer
#[async_trait]
pub trait SlowQueryStore: Send + Sync {
    async fn list_instances(&self, filter: &InstanceFilter) -> StoreResult<Vec<Instance>>;

    async fn list_databases(&self, filter: &DatabaseFilter) -> StoreResult<Vec<Database>>;

    async fn get_slow_query_policy(&self, instance_id: &str)
        -> StoreResult<Option<SlowQueryPolicy>>;

    /// Delete every record of the instance dated strictly before `cutoff`
    async fn delete_outdated_slow_logs(&self, instance_id: &str, cutoff: NaiveDate)
        -> StoreResult<u64>;

    async fn get_latest_slow_log_date(&self, instance_id: &str) -> StoreResult<Option<NaiveDate>>;

    /// Average-based entries of every matching record, one per fingerprint
    async fn list_slow_query_logs(
        &self,
        filter: &ListSlowQueryFilter,
    ) -> StoreResult<Vec<SlowQueryLogEntry>>;

    async fn upsert_slow_log(&self, upsert: UpsertSlowLog) -> StoreResult<()>;
}

#[derive(Debug, FromRow)]
struct InstanceRow {
    resource_id: String,
    engine: String,
    deleted: bool,
    data_source: Json<DataSource>,
}

impl TryFrom<InstanceRow> for Instance {
    type Error = StoreError;

    fn try_from(row: InstanceRow) -> StoreResult<Self> {
        let engine: Engine = row
            .engine
            .parse()
            .map_err(|e| StoreError::corrupt_row("instance", e))?;
        Ok(Instance {
            resource_id: row.resource_id,
            engine,
            deleted: row.deleted,
            data_source: row.data_source.0,
        })
    }
}

#[derive(Debug, FromRow)]
struct DatabaseRow {
    instance: String,
    name: String,
    sync_state: String,
}

impl TryFrom<DatabaseRow> for Database {
    type Error = StoreError;

    fn try_from(row: DatabaseRow) -> StoreResult<Self> {
        let sync_state: SyncState = row
            .sync_state
            .parse()
            .map_err(|e| StoreError::corrupt_row("db", e))?;
        Ok(Database {
            instance_id: row.instance,
            database_name: row.name,
            sync_state,
        })
    }
}

#[derive(Debug, FromRow)]
struct SlowQueryRow {
    instance: String,
    db_name: String,
    log_date: NaiveDate,
    slow_query_statistics: Json<SlowQueryStatistics>,
}

impl From<SlowQueryRow> for SlowLogRecord {
    fn from(row: SlowQueryRow) -> Self {
        SlowLogRecord {
            instance_id: row.instance,
            database_name: row.db_name,
            log_date: row.log_date,
            statistics: row.slow_query_statistics.0,
        }
    }
}

/// PostgreSQL-backed [`SlowQueryStore`]
#[derive(Debug, Clone)]
pub struct PgSlowQueryStore {
    pool: PgPool,
}

impl PgSlowQueryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SlowQueryStore for PgSlowQueryStore {
    async fn list_instances(&self, filter: &InstanceFilter) -> StoreResult<Vec<Instance>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT resource_id, engine, deleted, data_source FROM instance WHERE TRUE",
        );
        if let Some(resource_id) = &filter.resource_id {
            builder.push(" AND resource_id = ").push_bind(resource_id.clone());
        }
        if !filter.show_deleted {
            builder.push(" AND deleted = FALSE");
        }
        builder.push(" ORDER BY resource_id");

        builder
            .build_query_as::<InstanceRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Instance::try_from)
            .collect()
    }

    async fn list_databases(&self, filter: &DatabaseFilter) -> StoreResult<Vec<Database>> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT instance, name, sync_state FROM db WHERE TRUE");
        if let Some(instance_id) = &filter.instance_id {
            builder.push(" AND instance = ").push_bind(instance_id.clone());
        }
        if let Some(database_name) = &filter.database_name {
            builder.push(" AND name = ").push_bind(database_name.clone());
        }
        builder.push(" ORDER BY instance, name");

        builder
            .build_query_as::<DatabaseRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Database::try_from)
            .collect()
    }

    async fn get_slow_query_policy(
        &self,
        instance_id: &str,
    ) -> StoreResult<Option<SlowQueryPolicy>> {
        let active = sqlx::query_scalar::<_, bool>(
            "SELECT active FROM slow_query_policy WHERE instance = $1",
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(active.map(|active| SlowQueryPolicy { active }))
    }

    async fn delete_outdated_slow_logs(
        &self,
        instance_id: &str,
        cutoff: NaiveDate,
    ) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM slow_query WHERE instance = $1 AND log_date < $2")
            .bind(instance_id)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        debug!(
            instance = %instance_id,
            cutoff = %cutoff,
            deleted = result.rows_affected(),
            "Deleted outdated slow query logs"
        );
        Ok(result.rows_affected())
    }

    async fn get_latest_slow_log_date(&self, instance_id: &str) -> StoreResult<Option<NaiveDate>> {
        let latest = sqlx::query_scalar::<_, Option<NaiveDate>>(
            "SELECT MAX(log_date) FROM slow_query WHERE instance = $1",
        )
        .bind(instance_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(latest)
    }

    async fn list_slow_query_logs(
        &self,
        filter: &ListSlowQueryFilter,
    ) -> StoreResult<Vec<SlowQueryLogEntry>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT instance, db_name, log_date, slow_query_statistics FROM slow_query WHERE TRUE",
        );
        if let Some(instance_id) = &filter.instance_id {
            builder.push(" AND instance = ").push_bind(instance_id.clone());
        }
        if let Some(database_name) = &filter.database_name {
            builder.push(" AND db_name = ").push_bind(database_name.clone());
        }
        if let Some(start) = filter.start_log_date {
            builder.push(" AND log_date >= ").push_bind(start);
        }
        if let Some(end) = filter.end_log_date {
            builder.push(" AND log_date < ").push_bind(end);
        }
        builder.push(" ORDER BY log_date, db_name");

        let rows = builder
            .build_query_as::<SlowQueryRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(SlowLogRecord::from)
            .flat_map(|record| record.entries())
            .collect())
    }

    async fn upsert_slow_log(&self, upsert: UpsertSlowLog) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO slow_query (instance, db_name, log_date, slow_query_statistics)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (instance, db_name, log_date) DO UPDATE SET
                slow_query_statistics = EXCLUDED.slow_query_statistics,
                updated_at = NOW()
            "#,
        )
        .bind(&upsert.instance_id)
        .bind(&upsert.database_name)
        .bind(upsert.log_date)
        .bind(Json(&upsert.statistics))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
