//! # Slow Query Syncer
//!
//! Runs the slow query sync service against the metadata database until
//! Ctrl-C. Configuration comes from `config/` and `DBCONSOLE_` environment
//! variables; see [`rollout_core::config`].

use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use rollout_core::config::ConfigManager;
use rollout_core::database::{DatabaseConnection, DatabaseMigrations};
use rollout_core::drivers::SqlxDriverFactory;
use rollout_core::logging::init_structured_logging;
use rollout_core::store::PgSlowQueryStore;
use rollout_core::sync::{SlowQuerySyncer, SyncContext, SyncStrategyRegistry, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let manager = ConfigManager::load().context("failed to load configuration")?;
    let config = manager.config();

    if !config.slow_query_sync.enabled {
        info!("Slow query sync is disabled, exiting");
        return Ok(());
    }

    let db = DatabaseConnection::connect(&config.database)
        .await
        .context("failed to connect to metadata database")?;
    if !config.database.skip_migrations {
        DatabaseMigrations::run_all(db.pool())
            .await
            .context("failed to run migrations")?;
    }

    let context = SyncContext::new(
        Arc::new(PgSlowQueryStore::new(db.pool().clone())),
        Arc::new(SqlxDriverFactory::new()),
        Arc::new(SystemClock),
        config.slow_query_sync.retention_days,
    );
    let syncer = SlowQuerySyncer::new(
        context,
        SyncStrategyRegistry::with_defaults(),
        &config.slow_query_sync,
    );

    let shutdown = CancellationToken::new();
    let service = tokio::spawn(syncer.run(shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    shutdown.cancel();

    if let Err(e) = service.await {
        error!(error = %e, "Slow query syncer task ended abnormally");
    }
    db.close().await;
    Ok(())
}
