//! # Slow Query Sync
//!
//! Retention sweep and synchronization of slow query logs from managed
//! instances into the console's store.
//!
//! - [`SlowQuerySyncer`] - the scheduling loop and its [`SyncHandle`]
//! - [`SyncStrategyRegistry`] - engine → [`SyncStrategy`] lookup
//! - [`DailyPartitionedSync`] - MySQL-family engines
//! - [`RollingWindowSync`] - PostgreSQL-family engines
//! - [`Clock`] - "today", injectable for tests

pub mod clock;
pub mod daily;
pub mod rolling;
pub mod strategy;
pub mod syncer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use daily::DailyPartitionedSync;
pub use rolling::RollingWindowSync;
pub use strategy::{InstanceSyncSummary, SyncContext, SyncStrategy, SyncStrategyRegistry};
pub use syncer::{SlowQuerySyncer, SyncCycleReport, SyncHandle};
