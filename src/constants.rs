//! # System Constants
//!
//! Enums and fixed values that bound the rollout core: task states used for
//! DAG readiness, database engine identifiers, and slow query sync defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Slow query sync defaults
pub mod slow_query {
    /// Interval between scheduled sync cycles (12 hours).
    pub const DEFAULT_SYNC_INTERVAL_SECONDS: u64 = 12 * 60 * 60;

    /// Days of slow query history retained per instance.
    pub const RETENTION_DAYS: i64 = 30;

    /// Pool size of a driver connection to a managed instance.
    pub const DRIVER_MAX_CONNECTIONS: u32 = 2;

    /// Seconds to wait for a managed instance connection.
    pub const DRIVER_ACQUIRE_TIMEOUT_SECONDS: u64 = 10;

    /// First PostgreSQL release whose `pg_stat_statements` reports `*_exec_time` columns.
    pub const PG_STAT_STATEMENTS_EXEC_TIME_VERSION: i32 = 130_000;

    /// Databases never queried for `pg_stat_statements`.
    pub const POSTGRES_SYSTEM_DATABASES: &[&str] = &[
        "postgres",
        "template0",
        "template1",
        "cloudsqladmin",
        "rdsadmin",
        "alloydbadmin",
        "alloydbmetadata",
        "azure_maintenance",
        "azure_sys",
    ];

    pub fn is_postgres_system_database(name: &str) -> bool {
        POSTGRES_SYSTEM_DATABASES.contains(&name)
    }
}

/// Pipeline task states, as reported by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    Pending,
    Running,
    Done,
    Failed,
    Canceled,
    Skipped,
}

impl TaskStatus {
    /// Successors may start once every predecessor is in one of these states.
    pub fn is_terminal_success(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Skipped)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::Failed | TaskStatus::Canceled | TaskStatus::Skipped
        )
    }
}

/// Database engines known to the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Engine {
    #[serde(rename = "MYSQL")]
    MySql,
    #[serde(rename = "MARIADB")]
    MariaDb,
    #[serde(rename = "TIDB")]
    TiDb,
    #[serde(rename = "OCEANBASE")]
    OceanBase,
    Postgres,
    Redshift,
    Oracle,
    Mssql,
    Sqlite,
    #[serde(rename = "CLICKHOUSE")]
    ClickHouse,
    Snowflake,
    #[serde(rename = "MONGODB")]
    MongoDb,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::MySql => "MYSQL",
            Engine::MariaDb => "MARIADB",
            Engine::TiDb => "TIDB",
            Engine::OceanBase => "OCEANBASE",
            Engine::Postgres => "POSTGRES",
            Engine::Redshift => "REDSHIFT",
            Engine::Oracle => "ORACLE",
            Engine::Mssql => "MSSQL",
            Engine::Sqlite => "SQLITE",
            Engine::ClickHouse => "CLICKHOUSE",
            Engine::Snowflake => "SNOWFLAKE",
            Engine::MongoDb => "MONGODB",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MYSQL" => Ok(Engine::MySql),
            "MARIADB" => Ok(Engine::MariaDb),
            "TIDB" => Ok(Engine::TiDb),
            "OCEANBASE" => Ok(Engine::OceanBase),
            "POSTGRES" | "POSTGRESQL" => Ok(Engine::Postgres),
            "REDSHIFT" => Ok(Engine::Redshift),
            "ORACLE" => Ok(Engine::Oracle),
            "MSSQL" => Ok(Engine::Mssql),
            "SQLITE" => Ok(Engine::Sqlite),
            "CLICKHOUSE" => Ok(Engine::ClickHouse),
            "SNOWFLAKE" => Ok(Engine::Snowflake),
            "MONGODB" => Ok(Engine::MongoDb),
            other => Err(format!("unknown database engine: {other}")),
        }
    }
}

/// Result of the console's last schema sync for a database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    Ok,
    NotFound,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Ok => "OK",
            SyncState::NotFound => "NOT_FOUND",
        }
    }
}

impl FromStr for SyncState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Ok(SyncState::Ok),
            "NOT_FOUND" => Ok(SyncState::NotFound),
            other => Err(format!("unknown sync state: {other}")),
        }
    }
}
