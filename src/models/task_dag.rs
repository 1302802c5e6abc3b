//! # Task DAG Edge
//!
//! Dependency relationships between rollout pipeline tasks. Each edge means
//! `to_task_id` may not start until `from_task_id` has completed. The edges
//! of a pipeline must form a DAG.
//!
//! Edges are never updated in place: a task's predecessor set is replaced
//! wholesale by [`crate::store::TaskDagStore::rebuild_predecessors`].

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Opaque pipeline task identifier
pub type TaskId = i64;

/// A directed edge in the task DAG
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, FromRow,
)]
pub struct TaskDagEdge {
    pub from_task_id: TaskId,
    pub to_task_id: TaskId,
}

impl TaskDagEdge {
    pub fn new(from_task_id: TaskId, to_task_id: TaskId) -> Self {
        Self {
            from_task_id,
            to_task_id,
        }
    }
}

impl From<(TaskId, TaskId)> for TaskDagEdge {
    fn from((from_task_id, to_task_id): (TaskId, TaskId)) -> Self {
        Self::new(from_task_id, to_task_id)
    }
}

/// Restricts edge listing to one stage and/or pipeline.
///
/// Both endpoints of every edge belong to the same stage, so filtering on
/// the source task is sufficient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskDagFilter {
    pub stage_id: Option<i64>,
    pub pipeline_id: Option<i64>,
}

impl TaskDagFilter {
    pub fn stage(stage_id: i64) -> Self {
        Self {
            stage_id: Some(stage_id),
            pipeline_id: None,
        }
    }

    pub fn pipeline(pipeline_id: i64) -> Self {
        Self {
            stage_id: None,
            pipeline_id: Some(pipeline_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stage_id.is_none() && self.pipeline_id.is_none()
    }
}

/// Stage/pipeline membership of a task, as registered by the pipeline builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TaskPlacement {
    pub task_id: TaskId,
    pub stage_id: i64,
    pub pipeline_id: i64,
}

impl TaskPlacement {
    pub fn matches(&self, filter: &TaskDagFilter) -> bool {
        filter.stage_id.map_or(true, |id| id == self.stage_id)
            && filter.pipeline_id.map_or(true, |id| id == self.pipeline_id)
    }
}
