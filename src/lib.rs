#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Rollout Core
//!
//! Back-end core of a database DevOps console: the dependency graph between
//! rollout tasks, and the background synchronization of slow query logs
//! from managed database instances.
//!
//! ## Module Organization
//!
//! - [`dag`] - task DAG traversal: readiness, cycle detection, execution levels
//! - [`store`] - persistence contracts with PostgreSQL and in-memory implementations
//! - [`drivers`] - live connections to managed MySQL-family and PostgreSQL instances
//! - [`slow_query`] - fingerprinting, aggregation and merging of slow query statistics
//! - [`sync`] - retention sweep and the slow query sync scheduler
//! - [`models`] - task, instance and slow query data types
//! - [`config`] - layered configuration
//! - [`database`] - metadata database pool and migrations
//! - [`error`] - structured error handling
//! - [`logging`] - `tracing` subscriber setup
//! - [`metrics`] - OpenTelemetry instruments
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rollout_core::config::SlowQuerySyncConfig;
//! use rollout_core::drivers::SqlxDriverFactory;
//! use rollout_core::store::InMemorySlowQueryStore;
//! use rollout_core::sync::{SlowQuerySyncer, SyncContext, SyncStrategyRegistry, SystemClock};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SlowQuerySyncConfig::default();
//! let context = SyncContext::new(
//!     Arc::new(InMemorySlowQueryStore::new()),
//!     Arc::new(SqlxDriverFactory::new()),
//!     Arc::new(SystemClock),
//!     config.retention_days,
//! );
//! let syncer = SlowQuerySyncer::new(context, SyncStrategyRegistry::with_defaults(), &config);
//!
//! let report = syncer.sync_now(None).await?;
//! println!("synced {} instances", report.synced);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod dag;
pub mod database;
pub mod drivers;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod slow_query;
pub mod store;
pub mod sync;
pub mod utils;

pub use constants::{Engine, SyncState, TaskStatus};
pub use dag::{detect_cycle, TaskDag};
pub use error::{
    ConsoleError, ConsoleResult, DagError, DagResult, DriverError, DriverResult, StoreError,
    StoreResult, SyncError, SyncResult,
};
pub use store::{SlowQueryStore, TaskDagStore};
pub use sync::{SlowQuerySyncer, SyncHandle};
