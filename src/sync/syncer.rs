//! # Slow Query Syncer
//!
//! Long-running service that keeps each instance's stored slow query
//! history current.
//!
//! ## Triggers
//!
//! - a fixed interval (12 hours by default); the first tick fires one full
//!   interval after start, never at startup
//! - an [`InstanceSyncRequest`] sent through a [`SyncHandle`], which syncs
//!   only the requested instance
//!
//! ## Cycle
//!
//! 1. Resolve instances (the requested one, or all of them), skipping deleted ones
//! 2. Spawn one unit per instance on a [`JoinSet`] and wait for all of them
//! 3. Each unit checks the instance's policy, looks up the engine's
//!    [`SyncStrategy`](super::SyncStrategy) and runs it
//!
//! A failure or panic in one unit is logged with the instance id and never
//! affects its siblings. A panic anywhere in a cycle is logged and the loop
//! keeps going.
//!
//! ## Shutdown
//!
//! The loop exits on [`CancellationToken`] cancellation. Cancellation is
//! only observed between cycles; a running cycle finishes first.

use futures::FutureExt;
use opentelemetry::KeyValue;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::strategy::{InstanceSyncSummary, SyncContext, SyncStrategyRegistry};
use crate::config::SlowQuerySyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::metrics;
use crate::models::{Instance, InstanceFilter, InstanceSyncRequest};

/// Outcome counts of one sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCycleReport {
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Day records written across all instances
    pub records_upserted: u64,
    /// Instance ids whose unit failed, in completion order
    pub failed_instances: Vec<String>,
}

impl SyncCycleReport {
    pub fn total(&self) -> usize {
        self.synced + self.skipped + self.failed
    }
}

/// Cloneable sender for on-demand sync requests
#[derive(Debug, Clone)]
pub struct SyncHandle {
    sender: mpsc::UnboundedSender<InstanceSyncRequest>,
}

impl SyncHandle {
    /// Queue a sync of one instance. Returns `false` once the syncer is gone.
    pub fn request_sync(
        &self,
        instance_id: impl Into<String>,
        project_id: impl Into<String>,
    ) -> bool {
        self.sender
            .send(InstanceSyncRequest {
                instance_id: instance_id.into(),
                project_id: project_id.into(),
            })
            .is_ok()
    }
}

enum UnitOutcome {
    Synced(InstanceSyncSummary),
    Skipped,
    Failed,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Shared, cheaply cloned state each instance unit runs against
#[derive(Debug, Clone)]
struct SyncWorker {
    context: SyncContext,
    registry: Arc<SyncStrategyRegistry>,
}

impl SyncWorker {
    async fn resolve_instances(
        &self,
        request: Option<&InstanceSyncRequest>,
    ) -> SyncResult<Vec<Instance>> {
        let filter = match request {
            Some(request) => InstanceFilter::resource(request.instance_id.clone()),
            None => InstanceFilter::default(),
        };
        let instances = self.context.store.list_instances(&filter).await?;
        Ok(instances
            .into_iter()
            .filter(|instance| !instance.deleted)
            .collect())
    }

    async fn sync_instance(&self, instance: &Instance) -> SyncResult<InstanceSyncSummary> {
        let policy = self
            .context
            .store
            .get_slow_query_policy(&instance.resource_id)
            .await?;
        if !policy.is_some_and(|policy| policy.active) {
            return Err(SyncError::ConfigurationAbsent {
                instance_id: instance.resource_id.clone(),
            });
        }

        let strategy = self
            .registry
            .get(instance.engine)
            .ok_or(SyncError::UnsupportedEngine(instance.engine))?;

        debug!(
            instance = %instance.resource_id,
            engine = %instance.engine,
            strategy = strategy.name(),
            "Syncing slow query logs"
        );
        strategy.sync(&self.context, instance).await
    }

    /// Run one instance unit, converting a panic into a failure
    async fn run_unit(self, instance: Instance) -> UnitOutcome {
        let result = AssertUnwindSafe(self.sync_instance(&instance))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(SyncError::Panicked(panic_message(payload))));

        let engine = KeyValue::new("engine", instance.engine.as_str());
        let outcome = match result {
            Ok(summary) => UnitOutcome::Synced(summary),
            Err(SyncError::ConfigurationAbsent { .. }) => {
                debug!(instance = %instance.resource_id, "Slow query policy absent or inactive");
                UnitOutcome::Skipped
            }
            Err(e) if e.is_skip() => {
                warn!(instance = %instance.resource_id, reason = %e, "Skipping slow query sync");
                UnitOutcome::Skipped
            }
            Err(e) => {
                error!(instance = %instance.resource_id, error = %e, "Failed to sync slow query logs");
                UnitOutcome::Failed
            }
        };

        let label = match &outcome {
            UnitOutcome::Synced(_) => "synced",
            UnitOutcome::Skipped => "skipped",
            UnitOutcome::Failed => "failed",
        };
        metrics::sync_instances_total().add(1, &[KeyValue::new("outcome", label), engine]);
        outcome
    }

    async fn run_cycle(&self, request: Option<InstanceSyncRequest>) -> SyncResult<SyncCycleReport> {
        let instances = self.resolve_instances(request.as_ref()).await?;

        let mut units = JoinSet::new();
        for instance in instances {
            let worker = self.clone();
            units.spawn(async move {
                let instance_id = instance.resource_id.clone();
                (instance_id, worker.run_unit(instance).await)
            });
        }

        let mut report = SyncCycleReport::default();
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((_, UnitOutcome::Synced(summary))) => {
                    report.synced += 1;
                    report.records_upserted += summary.records_upserted;
                }
                Ok((_, UnitOutcome::Skipped)) => report.skipped += 1,
                Ok((instance_id, UnitOutcome::Failed)) => {
                    report.failed += 1;
                    report.failed_instances.push(instance_id);
                }
                Err(e) => {
                    error!(error = %e, "Slow query sync unit did not complete");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

/// Periodic and on-demand slow query synchronization
#[derive(Debug)]
pub struct SlowQuerySyncer {
    worker: SyncWorker,
    interval: Duration,
    sender: mpsc::UnboundedSender<InstanceSyncRequest>,
    receiver: mpsc::UnboundedReceiver<InstanceSyncRequest>,
}

impl SlowQuerySyncer {
    pub fn new(
        context: SyncContext,
        registry: SyncStrategyRegistry,
        config: &SlowQuerySyncConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            worker: SyncWorker {
                context,
                registry: Arc::new(registry),
            },
            interval: config.interval().max(Duration::from_secs(1)),
            sender,
            receiver,
        }
    }

    pub fn handle(&self) -> SyncHandle {
        SyncHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one cycle now, for every instance or just the requested one.
    ///
    /// Fails only when the instance list cannot be read or the cycle
    /// itself panics; per-instance failures are counted in the report.
    pub async fn sync_now(
        &self,
        request: Option<InstanceSyncRequest>,
    ) -> SyncResult<SyncCycleReport> {
        let trigger = if request.is_some() { "request" } else { "interval" };
        metrics::sync_cycles_total().add(1, &[KeyValue::new("trigger", trigger)]);

        let start = Instant::now();
        let result = AssertUnwindSafe(self.worker.run_cycle(request))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(SyncError::Panicked(panic_message(payload))));

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::sync_cycle_duration().record(duration_ms, &[KeyValue::new("trigger", trigger)]);
        result
    }

    /// Serve interval ticks and requests until `shutdown` is cancelled
    pub async fn run(mut self, shutdown: CancellationToken) {
        let period = self.interval;
        let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_seconds = period.as_secs(),
            engines = ?self.worker.registry.engines(),
            "Starting slow query syncer"
        );

        loop {
            let request = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                Some(request) = self.receiver.recv() => Some(request),
                _ = ticker.tick() => None,
            };

            let scope = request
                .as_ref()
                .map_or_else(|| "all".to_string(), |r| r.instance_id.clone());
            match self.sync_now(request).await {
                Ok(report) => info!(
                    scope = %scope,
                    synced = report.synced,
                    skipped = report.skipped,
                    failed = report.failed,
                    "Slow query sync cycle completed"
                ),
                Err(e) => error!(scope = %scope, error = %e, "Slow query sync cycle failed"),
            }
        }

        info!("Slow query syncer stopped");
    }
}
