//! # Persistence Contracts
//!
//! Traits the core depends on, with PostgreSQL and in-memory implementations.

pub mod memory;
pub mod slow_query;
pub mod task_dag;

pub use memory::{InMemorySlowQueryStore, InMemoryTaskDagStore};
pub use slow_query::{PgSlowQueryStore, SlowQueryStore};
pub use task_dag::{PgTaskDagStore, TaskDagStore};
