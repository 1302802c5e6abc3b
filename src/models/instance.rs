//! # Instances, Databases, and Slow Query Policy
//!
//! The slices of the console's instance inventory that the slow query
//! syncer reads. Owned and written elsewhere.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{Engine, SyncState};

/// Connection details for a live database instance
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Default database to connect to when none is requested
    #[serde(default)]
    pub database: Option<String>,
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

/// A managed database instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub resource_id: String,
    pub engine: Engine,
    pub deleted: bool,
    pub data_source: DataSource,
}

/// A database living on an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    pub instance_id: String,
    pub database_name: String,
    pub sync_state: SyncState,
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "instances/{}/databases/{}",
            self.instance_id, self.database_name
        )
    }
}

/// Whether slow query sync is switched on for an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowQueryPolicy {
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFilter {
    pub resource_id: Option<String>,
    pub show_deleted: bool,
}

impl InstanceFilter {
    pub fn resource(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: Some(resource_id.into()),
            show_deleted: false,
        }
    }

    pub fn matches(&self, instance: &Instance) -> bool {
        self.resource_id
            .as_ref()
            .map_or(true, |id| *id == instance.resource_id)
            && (self.show_deleted || !instance.deleted)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseFilter {
    pub instance_id: Option<String>,
    pub database_name: Option<String>,
}

impl DatabaseFilter {
    pub fn instance(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: Some(instance_id.into()),
            database_name: None,
        }
    }

    pub fn matches(&self, database: &Database) -> bool {
        self.instance_id
            .as_ref()
            .map_or(true, |id| *id == database.instance_id)
            && self
                .database_name
                .as_ref()
                .map_or(true, |name| *name == database.database_name)
    }
}

/// On-demand sync trigger for a single instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSyncRequest {
    pub instance_id: String,
    pub project_id: String,
}
