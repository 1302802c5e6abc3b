pub mod instance;
pub mod slow_query;
pub mod task_dag;

// Re-export core models for easy access
pub use instance::{
    DataSource, Database, DatabaseFilter, Instance, InstanceFilter, InstanceSyncRequest,
    SlowQueryPolicy,
};
pub use slow_query::{
    ListSlowQueryFilter, SlowLogRecord, SlowQueryLogEntry, SlowQueryLogStatistics,
    SlowQueryStatistics, SlowQueryStatisticsItem, UpsertSlowLog,
};
pub use task_dag::{TaskDagEdge, TaskDagFilter, TaskId, TaskPlacement};
