//! Task DAG store behavior through the `TaskDagStore` contract.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rollout_core::constants::TaskStatus;
use rollout_core::error::DagError;
use rollout_core::models::{TaskDagEdge, TaskDagFilter, TaskId};
use rollout_core::store::{InMemoryTaskDagStore, TaskDagStore};

fn set(ids: &[TaskId]) -> BTreeSet<TaskId> {
    ids.iter().copied().collect()
}

fn edges(pairs: &[(TaskId, TaskId)]) -> Vec<TaskDagEdge> {
    pairs.iter().copied().map(TaskDagEdge::from).collect()
}

#[tokio::test]
async fn test_rebuild_replaces_previous_predecessors() {
    let store = InMemoryTaskDagStore::new();

    store.rebuild_predecessors(5, &set(&[1, 2])).await.unwrap();
    assert_eq!(
        store.list_edges(&TaskDagFilter::default()).await.unwrap(),
        edges(&[(1, 5), (2, 5)])
    );

    store.rebuild_predecessors(5, &set(&[3])).await.unwrap();
    assert_eq!(
        store.list_edges(&TaskDagFilter::default()).await.unwrap(),
        edges(&[(3, 5)])
    );

    store.rebuild_predecessors(5, &BTreeSet::new()).await.unwrap();
    assert!(store
        .list_edges(&TaskDagFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_rebuild_that_closes_cycle_is_refused() {
    let store = InMemoryTaskDagStore::new();
    store.rebuild_predecessors(2, &set(&[1])).await.unwrap();
    store.rebuild_predecessors(3, &set(&[2])).await.unwrap();

    let err = store.rebuild_predecessors(1, &set(&[3])).await.unwrap_err();
    assert!(matches!(err, DagError::CycleDetected { to_task_id: 1 }));
    assert_eq!(
        store.list_edges(&TaskDagFilter::default()).await.unwrap(),
        edges(&[(1, 2), (2, 3)])
    );

    let err = store.rebuild_predecessors(4, &set(&[4])).await.unwrap_err();
    assert!(matches!(err, DagError::CycleDetected { .. }));
}

#[tokio::test]
async fn test_create_edge_checks_duplicates_and_cycles() {
    let store = InMemoryTaskDagStore::new();
    store.create_edge(1, 2).await.unwrap();

    assert!(matches!(
        store.create_edge(1, 2).await.unwrap_err(),
        DagError::DuplicateEdge { from: 1, to: 2 }
    ));
    assert!(matches!(
        store.create_edge(2, 1).await.unwrap_err(),
        DagError::CycleDetected { .. }
    ));
}

#[tokio::test]
async fn test_list_edges_filters_by_pipeline_and_stage() {
    let store = InMemoryTaskDagStore::new();
    store.register_task(1, 10, 100);
    store.register_task(2, 10, 100);
    store.register_task(3, 20, 100);
    store.register_task(4, 20, 100);
    store.register_task(7, 30, 200);
    store.register_task(8, 30, 200);

    store.rebuild_predecessors(2, &set(&[1])).await.unwrap();
    store.rebuild_predecessors(4, &set(&[3])).await.unwrap();
    store.rebuild_predecessors(8, &set(&[7])).await.unwrap();

    assert_eq!(
        store.list_edges(&TaskDagFilter::pipeline(100)).await.unwrap(),
        edges(&[(1, 2), (3, 4)])
    );
    assert_eq!(
        store.list_edges(&TaskDagFilter::stage(30)).await.unwrap(),
        edges(&[(7, 8)])
    );
    assert!(store
        .list_edges(&TaskDagFilter::pipeline(999))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_loaded_dag_drives_scheduling() {
    let store = InMemoryTaskDagStore::new();
    store.rebuild_predecessors(3, &set(&[1, 2])).await.unwrap();
    store.rebuild_predecessors(4, &set(&[3])).await.unwrap();

    let dag = store.load_dag(&TaskDagFilter::default()).await.unwrap();
    assert_eq!(
        dag.execution_levels().unwrap(),
        vec![vec![1, 2], vec![3], vec![4]]
    );

    let mut statuses: HashMap<TaskId, TaskStatus> = HashMap::from([
        (1, TaskStatus::Done),
        (2, TaskStatus::Running),
        (3, TaskStatus::NotStarted),
        (4, TaskStatus::NotStarted),
    ]);
    assert!(dag.ready_tasks(&statuses).is_empty());

    statuses.insert(2, TaskStatus::Skipped);
    assert_eq!(dag.ready_tasks(&statuses), set(&[3]));

    statuses.insert(3, TaskStatus::Failed);
    assert!(!dag.is_ready(4, &statuses));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rebuilds_of_one_target_leave_one_winner() {
    let store = Arc::new(InMemoryTaskDagStore::new());

    let mut handles = Vec::new();
    for from in 1..=8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.rebuild_predecessors(100, &set(&[from])).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let inbound = store.list_edges(&TaskDagFilter::default()).await.unwrap();
    assert_eq!(inbound.len(), 1);
    assert_eq!(inbound[0].to_task_id, 100);
    assert!((1..=8).contains(&inbound[0].from_task_id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rebuilds_of_different_targets_all_apply() {
    let store = Arc::new(InMemoryTaskDagStore::new());

    let mut handles = Vec::new();
    for to in 10..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.rebuild_predecessors(to, &set(&[1, 2])).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let all = store.list_edges(&TaskDagFilter::default()).await.unwrap();
    assert_eq!(all.len(), 20);
}
