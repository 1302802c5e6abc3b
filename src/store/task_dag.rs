//! # Task DAG Store
//!
//! Persistence of task DAG edges. A task's inbound edge set is only ever
//! replaced wholesale, inside one transaction:
//!
//! 1. take a transaction-scoped advisory lock keyed on `to_task_id`, so
//!    rebuilds of the same target serialize while other targets proceed
//! 2. load the surrounding pipeline's edges and refuse the rebuild if the
//!    replacement would close a cycle
//! 3. `DELETE` the old inbound edges, `INSERT ... SELECT unnest($1)` the new ones
//! 4. commit (or roll back on any failure, leaving the old edges intact)

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

use crate::dag::{detect_cycle, replace_predecessors, TaskDag};
use crate::error::{DagError, DagResult};
use crate::models::{TaskDagEdge, TaskDagFilter, TaskId};

/// Read/write contract for task DAG edges
#[async_trait]
pub trait TaskDagStore: Send + Sync {
    /// Atomically replace every edge ending at `to_task_id` with edges from
    /// `from_task_ids`. Last writer wins; nothing is merged.
    async fn rebuild_predecessors(
        &self,
        to_task_id: TaskId,
        from_task_ids: &BTreeSet<TaskId>,
    ) -> DagResult<()>;

    /// Insert one edge. Fails with [`DagError::DuplicateEdge`] if it exists.
    async fn create_edge(&self, from_task_id: TaskId, to_task_id: TaskId) -> DagResult<()>;

    /// Snapshot of the edges whose endpoints belong to the filtered stage/pipeline
    async fn list_edges(&self, filter: &TaskDagFilter) -> DagResult<Vec<TaskDagEdge>>;

    /// Load the filtered edges as a traversable DAG
    async fn load_dag(&self, filter: &TaskDagFilter) -> DagResult<TaskDag> {
        let edges = self.list_edges(filter).await?;
        Ok(TaskDag::new(&edges))
    }
}

/// PostgreSQL-backed [`TaskDagStore`]
#[derive(Debug, Clone)]
pub struct PgTaskDagStore {
    pool: PgPool,
}

impl PgTaskDagStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn lock_target(tx: &mut Transaction<'_, Postgres>, to_task_id: TaskId) -> DagResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(to_task_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Edges of the pipeline `task_id` belongs to. Tasks not registered in
    /// `task` have no known pipeline and yield no edges.
    async fn pipeline_edges(
        tx: &mut Transaction<'_, Postgres>,
        task_id: TaskId,
    ) -> DagResult<Vec<TaskDagEdge>> {
        let edges = sqlx::query_as::<_, TaskDagEdge>(
            r#"
            SELECT task_dag.from_task_id, task_dag.to_task_id
            FROM task_dag
            JOIN task ON task.id = task_dag.from_task_id
            WHERE task.pipeline_id = (SELECT pipeline_id FROM task WHERE id = $1)
            "#,
        )
        .bind(task_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(edges)
    }
}

#[async_trait]
impl TaskDagStore for PgTaskDagStore {
    #[instrument(skip(self), fields(predecessor_count = from_task_ids.len()))]
    async fn rebuild_predecessors(
        &self,
        to_task_id: TaskId,
        from_task_ids: &BTreeSet<TaskId>,
    ) -> DagResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_target(&mut tx, to_task_id).await?;

        let current = Self::pipeline_edges(&mut tx, to_task_id).await?;
        let proposed = replace_predecessors(&current, to_task_id, from_task_ids);
        if detect_cycle(&proposed) {
            return Err(DagError::CycleDetected { to_task_id });
        }

        sqlx::query("DELETE FROM task_dag WHERE to_task_id = $1")
            .bind(to_task_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DagError::Database(format!("failed to delete old task dags: {e}")))?;

        let from_ids: Vec<TaskId> = from_task_ids.iter().copied().collect();
        sqlx::query(
            r#"
            INSERT INTO task_dag (from_task_id, to_task_id)
            SELECT unnest(CAST($1 AS BIGINT[])), $2
            "#,
        )
        .bind(&from_ids)
        .bind(to_task_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(to_task_id, "Rebuilt task predecessors");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_edge(&self, from_task_id: TaskId, to_task_id: TaskId) -> DagResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_target(&mut tx, to_task_id).await?;

        let mut proposed = Self::pipeline_edges(&mut tx, to_task_id).await?;
        proposed.push(TaskDagEdge::new(from_task_id, to_task_id));
        if detect_cycle(&proposed) {
            return Err(DagError::CycleDetected { to_task_id });
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO task_dag (from_task_id, to_task_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(from_task_id)
        .bind(to_task_id)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(DagError::DuplicateEdge {
                    from: from_task_id,
                    to: to_task_id,
                });
            }
            Err(e) => return Err(DagError::Database(format!("failed to create task dag: {e}"))),
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_edges(&self, filter: &TaskDagFilter) -> DagResult<Vec<TaskDagEdge>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;

        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT task_dag.from_task_id, task_dag.to_task_id FROM task_dag",
        );
        if !filter.is_empty() {
            builder.push(" JOIN task ON task.id = task_dag.from_task_id");
        }
        builder.push(" WHERE TRUE");
        if let Some(stage_id) = filter.stage_id {
            builder.push(" AND task.stage_id = ").push_bind(stage_id);
        }
        if let Some(pipeline_id) = filter.pipeline_id {
            builder.push(" AND task.pipeline_id = ").push_bind(pipeline_id);
        }
        builder.push(" ORDER BY task_dag.to_task_id, task_dag.from_task_id");

        let edges = builder
            .build_query_as::<TaskDagEdge>()
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(edges)
    }
}
