//! # Task DAG Traversal
//!
//! In-memory view of a pipeline's task DAG used by the executor to decide
//! which tasks may run next.
//!
//! ```text
//! [schema check] ──▶ [migrate db1] ──▶ [verify]
//!        │                                 ▲
//!        └─────────▶ [migrate db2] ────────┘
//! ```
//!
//! `verify` is ready only once both migrations are `Done` or `Skipped`.
//! Readiness never implies an order among simultaneously ready tasks; the
//! ready set is returned unordered (as a sorted set for determinism only).

use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

use crate::constants::TaskStatus;
use crate::error::{DagError, DagResult};
use crate::models::{TaskDagEdge, TaskId};

/// Directed graph of must-complete-before relationships
#[derive(Debug, Clone, Default)]
pub struct TaskDag {
    graph: DiGraphMap<TaskId, ()>,
}

impl TaskDag {
    pub fn new(edges: &[TaskDagEdge]) -> Self {
        Self::from_edges(edges.iter().copied())
    }

    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = TaskDagEdge>,
    {
        let mut graph = DiGraphMap::new();
        for edge in edges {
            graph.add_edge(edge.from_task_id, edge.to_task_id, ());
        }
        Self { graph }
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.graph.contains_node(task_id)
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn predecessors(&self, task_id: TaskId) -> BTreeSet<TaskId> {
        self.neighbors(task_id, Direction::Incoming)
    }

    pub fn successors(&self, task_id: TaskId) -> BTreeSet<TaskId> {
        self.neighbors(task_id, Direction::Outgoing)
    }

    fn neighbors(&self, task_id: TaskId, direction: Direction) -> BTreeSet<TaskId> {
        if !self.graph.contains_node(task_id) {
            return BTreeSet::new();
        }
        self.graph
            .neighbors_directed(task_id, direction)
            .collect()
    }

    /// True iff every predecessor is terminal-success. Tasks without incoming
    /// edges, including tasks unknown to the graph, are always ready. A
    /// predecessor missing from `statuses` counts as incomplete.
    pub fn is_ready(&self, task_id: TaskId, statuses: &HashMap<TaskId, TaskStatus>) -> bool {
        self.predecessors(task_id).into_iter().all(|pred| {
            statuses
                .get(&pred)
                .is_some_and(|status| status.is_terminal_success())
        })
    }

    /// Tasks that have not started yet and whose predecessors have all succeeded
    pub fn ready_tasks(&self, statuses: &HashMap<TaskId, TaskStatus>) -> BTreeSet<TaskId> {
        self.graph
            .nodes()
            .chain(statuses.keys().copied())
            .filter(|task_id| {
                statuses.get(task_id).map_or(true, |status| {
                    matches!(status, TaskStatus::NotStarted | TaskStatus::Pending)
                })
            })
            .filter(|task_id| self.is_ready(*task_id, statuses))
            .collect()
    }

    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Tasks grouped by dependency depth: level 0 has no predecessors, level
    /// `n` depends on at least one task of level `n - 1`.
    pub fn execution_levels(&self) -> DagResult<Vec<Vec<TaskId>>> {
        let order = toposort(&self.graph, None).map_err(|cycle| DagError::CycleDetected {
            to_task_id: cycle.node_id(),
        })?;

        let mut depth: HashMap<TaskId, usize> = HashMap::with_capacity(order.len());
        let mut levels: Vec<Vec<TaskId>> = Vec::new();
        for task_id in order {
            let level = self
                .graph
                .neighbors_directed(task_id, Direction::Incoming)
                .filter_map(|pred| depth.get(&pred))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(task_id, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(task_id);
        }
        for level in &mut levels {
            level.sort_unstable();
        }
        Ok(levels)
    }
}

/// Standard directed cycle detection over an edge list. A self edge is a cycle.
pub fn detect_cycle(edges: &[TaskDagEdge]) -> bool {
    edges.iter().any(|edge| edge.from_task_id == edge.to_task_id) || TaskDag::new(edges).has_cycle()
}

/// Replace the inbound edges of `to_task_id` in `edges` with `from_task_ids`.
/// Shared by every store implementation before it persists a rebuild.
pub fn replace_predecessors(
    edges: &[TaskDagEdge],
    to_task_id: TaskId,
    from_task_ids: &BTreeSet<TaskId>,
) -> Vec<TaskDagEdge> {
    edges
        .iter()
        .filter(|edge| edge.to_task_id != to_task_id)
        .copied()
        .chain(
            from_task_ids
                .iter()
                .map(|from| TaskDagEdge::new(*from, to_task_id)),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(TaskId, TaskId)]) -> Vec<TaskDagEdge> {
        pairs.iter().copied().map(TaskDagEdge::from).collect()
    }

    fn statuses(pairs: &[(TaskId, TaskStatus)]) -> HashMap<TaskId, TaskStatus> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_detect_cycle_examples() {
        assert!(detect_cycle(&edges(&[(1, 2), (2, 3), (3, 1)])));
        assert!(!detect_cycle(&edges(&[(1, 2), (2, 3)])));
        assert!(detect_cycle(&edges(&[(4, 4)])));
        assert!(!detect_cycle(&[]));
    }

    #[test]
    fn test_task_without_incoming_edges_is_ready() {
        let dag = TaskDag::new(&edges(&[(1, 2)]));
        assert!(dag.is_ready(1, &HashMap::new()));
        assert!(dag.is_ready(99, &HashMap::new()));
    }

    #[test]
    fn test_readiness_requires_all_predecessors_succeeded() {
        let dag = TaskDag::new(&edges(&[(1, 3), (2, 3)]));

        let partial = statuses(&[(1, TaskStatus::Done), (2, TaskStatus::Running)]);
        assert!(!dag.is_ready(3, &partial));

        let failed = statuses(&[(1, TaskStatus::Done), (2, TaskStatus::Failed)]);
        assert!(!dag.is_ready(3, &failed));

        let done = statuses(&[(1, TaskStatus::Done), (2, TaskStatus::Skipped)]);
        assert!(dag.is_ready(3, &done));

        let unknown = statuses(&[(1, TaskStatus::Done)]);
        assert!(!dag.is_ready(3, &unknown));
    }

    #[test]
    fn test_ready_tasks_excludes_started_and_blocked() {
        let dag = TaskDag::new(&edges(&[(1, 2), (1, 3), (2, 4), (3, 4)]));
        let current = statuses(&[
            (1, TaskStatus::Done),
            (2, TaskStatus::NotStarted),
            (3, TaskStatus::Running),
            (4, TaskStatus::NotStarted),
        ]);

        let ready = dag.ready_tasks(&current);
        assert_eq!(ready, BTreeSet::from([2]));
    }

    #[test]
    fn test_predecessors_and_successors() {
        let dag = TaskDag::new(&edges(&[(1, 3), (2, 3), (3, 4)]));
        assert_eq!(dag.predecessors(3), BTreeSet::from([1, 2]));
        assert_eq!(dag.successors(3), BTreeSet::from([4]));
        assert!(dag.predecessors(42).is_empty());
        assert_eq!(dag.task_count(), 4);
        assert_eq!(dag.edge_count(), 3);
        assert!(dag.contains(4));
        assert!(!dag.contains(42));
    }

    #[test]
    fn test_execution_levels() {
        let dag = TaskDag::new(&edges(&[(1, 2), (1, 3), (2, 4), (3, 4), (4, 5), (1, 5)]));
        let levels = dag.execution_levels().unwrap();
        assert_eq!(levels, vec![vec![1], vec![2, 3], vec![4], vec![5]]);
    }

    #[test]
    fn test_execution_levels_reject_cycles() {
        let dag = TaskDag::new(&edges(&[(1, 2), (2, 1)]));
        assert!(matches!(
            dag.execution_levels(),
            Err(DagError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_replace_predecessors_keeps_other_targets() {
        let current = edges(&[(1, 5), (2, 5), (1, 6)]);
        let replaced = replace_predecessors(&current, 5, &BTreeSet::from([3]));
        let replaced: BTreeSet<_> = replaced.into_iter().collect();
        assert_eq!(
            replaced,
            BTreeSet::from([TaskDagEdge::new(1, 6), TaskDagEdge::new(3, 5)])
        );
    }
}
