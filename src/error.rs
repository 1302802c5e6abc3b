//! Error types for the rollout core.
//!
//! Each subsystem owns a narrow error enum; [`ConsoleError`] is the crate-wide
//! umbrella used at the edges (binary, bootstrap, store wiring).

use crate::config::ConfigurationError;
use crate::constants::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("DAG error: {0}")]
    Dag(#[from] DagError),
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for ConsoleError {
    fn from(err: sqlx::Error) -> Self {
        ConsoleError::DatabaseError(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for ConsoleError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        ConsoleError::DatabaseError(format!("migration failed: {err}"))
    }
}

impl From<ConfigurationError> for ConsoleError {
    fn from(error: ConfigurationError) -> Self {
        ConsoleError::ConfigurationError(error.to_string())
    }
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Failures of the task DAG store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DagError {
    #[error("Task DAG edge {from} -> {to} already exists")]
    DuplicateEdge { from: i64, to: i64 },
    #[error("Rebuilding predecessors of task {to_task_id} would introduce a cycle")]
    CycleDetected { to_task_id: i64 },
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for DagError {
    fn from(err: sqlx::Error) -> Self {
        DagError::Database(err.to_string())
    }
}

pub type DagResult<T> = Result<T, DagError>;

/// Failures reported by an engine driver while probing or pulling slow query data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Slow query capture is not enabled on the live instance.
    #[error("Slow query log unavailable: {0}")]
    FeatureUnavailable(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Query error: {0}")]
    Query(String),
}

impl DriverError {
    pub fn is_feature_unavailable(&self) -> bool {
        matches!(self, DriverError::FeatureUnavailable(_))
    }
}

impl From<sqlx::Error> for DriverError {
    fn from(err: sqlx::Error) -> Self {
        let message = err.to_string();
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_) => DriverError::Connection(message),
            _ => DriverError::Query(message),
        }
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Failures of the slow query persistence contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: String, reason: String },
}

impl StoreError {
    pub fn corrupt_row<T: Into<String>, R: std::fmt::Display>(table: T, reason: R) -> Self {
        Self::CorruptRow {
            table: table.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures of one instance's slow query sync. Always contained at the instance boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// No policy or an inactive one. Callers treat this as a skip, never as a failure.
    #[error("Slow query policy absent or inactive for instance {instance_id}")]
    ConfigurationAbsent { instance_id: String },
    #[error("Slow query log not enabled for instance {instance_id}: {reason}")]
    FeatureUnavailable { instance_id: String, reason: String },
    #[error("Driver failure: {0}")]
    Driver(DriverError),
    #[error("No database is available for slow query sync in instance {instance_id}")]
    NoEligibleDatabase { instance_id: String },
    #[error("Persistence failure: {0}")]
    Persistence(String),
    #[error("Unsupported database engine: {0}")]
    UnsupportedEngine(Engine),
    /// A sync unit panicked; the message is the panic payload
    #[error("Sync unit panicked: {0}")]
    Panicked(String),
}

impl SyncError {
    /// Conditions that mean "nothing to do for this instance" rather than a failure.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            SyncError::ConfigurationAbsent { .. } | SyncError::FeatureUnavailable { .. }
        )
    }
}

impl From<DriverError> for SyncError {
    fn from(err: DriverError) -> Self {
        SyncError::Driver(err)
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::Persistence(err.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
