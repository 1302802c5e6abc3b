//! # Schema Migrations
//!
//! Migrations live in `migrations/` as `YYYYMMDDHHMMSS_description.sql` and
//! are embedded at build time. sqlx records applied versions in
//! `_sqlx_migrations` and serializes concurrent runners with an advisory
//! lock, so running them from every process on startup is safe.

use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

use crate::error::ConsoleResult;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Apply every outstanding migration
    pub async fn run_all(pool: &PgPool) -> ConsoleResult<()> {
        MIGRATOR.run(pool).await?;
        info!(
            migrations = MIGRATOR.iter().count(),
            "Metadata database schema is current"
        );
        Ok(())
    }

    /// Versions of the embedded migrations, ascending
    pub fn versions() -> Vec<i64> {
        MIGRATOR.iter().map(|migration| migration.version).collect()
    }
}
