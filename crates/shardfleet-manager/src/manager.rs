//! The lifecycle manager: startup sequencing, readiness confirmation,
//! health timer, and diff-based fleet reconciliation.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use shardfleet_assign::{
    calculate_distribution, diff_distributions, optimal_shards_per_cluster,
    validate_distribution, ShardDistribution,
};
use shardfleet_gateway::GatewayInfoSource;
use shardfleet_runtime::{ClusterSpec, ContainerRuntime, HealthStatus};

use crate::config::ManagerConfig;
use crate::error::{ManagerError, ManagerResult};
use crate::metrics::{render_fleet_metrics, MetricsCache};
use crate::registry::{ClusterInstance, ClusterRegistry};

struct HealthTask {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

/// Top-level orchestrator for the cluster fleet.
///
/// All fleet mutation flows through this object; the event channel
/// consumer writes into the same registry through [`ClusterRegistry`]
/// methods, which serialize the two writers.
pub struct ClusterManager {
    config: ManagerConfig,
    gateway: Arc<dyn GatewayInfoSource>,
    runtime: Arc<dyn ContainerRuntime>,
    registry: Arc<ClusterRegistry>,
    metrics: Arc<MetricsCache>,
    /// Distribution the running fleet was built from.
    distribution: RwLock<Option<ShardDistribution>>,
    health_task: Mutex<Option<HealthTask>>,
}

impl ClusterManager {
    pub fn new(
        config: ManagerConfig,
        gateway: Arc<dyn GatewayInfoSource>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        Self {
            config,
            gateway,
            runtime,
            registry: Arc::new(ClusterRegistry::new()),
            metrics: Arc::new(MetricsCache::new()),
            distribution: RwLock::new(None),
            health_task: Mutex::new(None),
        }
    }

    /// The shared fleet registry (for the event sink and the API).
    pub fn registry(&self) -> Arc<ClusterRegistry> {
        self.registry.clone()
    }

    /// The shared per-cluster metrics cache.
    pub fn metrics_cache(&self) -> Arc<MetricsCache> {
        self.metrics.clone()
    }

    /// Distribution the fleet currently runs, if started.
    pub async fn current_distribution(&self) -> Option<ShardDistribution> {
        self.distribution.read().await.clone()
    }

    /// Bring the fleet up: orphan sweep, gateway fetch, distribution
    /// computation and validation, strictly sequential cluster creation,
    /// then the health timer. A creation failure stops whatever was
    /// partially started and propagates.
    pub async fn start(&self) -> ManagerResult<()> {
        info!("lifecycle manager starting");

        match self.runtime.sweep_orphans().await {
            Ok(removed) if removed > 0 => info!(removed, "orphaned units cleared"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "orphan sweep failed"),
        }

        let gateway = self.gateway.gateway_info().await?;
        let max_concurrency = gateway.session_start_limit.max_concurrency;
        let group_size = optimal_shards_per_cluster(
            gateway.shards,
            self.config.shards_per_cluster,
            max_concurrency,
        );
        // The concurrency clamp already happened inside the optimal-size
        // helper; re-clamping here would undo its cluster-ceiling raise.
        let dist = calculate_distribution(gateway.shards, group_size, None)?;
        if !validate_distribution(&dist) {
            return Err(ManagerError::InvalidDistribution(format!(
                "computed distribution does not cover {} shards exactly",
                dist.total_shards
            )));
        }
        info!(
            total_shards = dist.total_shards,
            clusters = dist.total_clusters,
            group_size = dist.shards_per_cluster,
            "initial distribution computed"
        );
        *self.distribution.write().await = Some(dist.clone());

        let ids: Vec<u32> = dist.cluster_ids().collect();
        for (idx, &id) in ids.iter().enumerate() {
            let shards = dist.shards_for(id).unwrap_or_default().to_vec();
            if let Err(e) = self
                .create_cluster_with_total(id, shards, dist.total_shards)
                .await
            {
                error!(cluster_id = id, error = %e, "startup creation failed, stopping fleet");
                self.stop_all_clusters().await;
                return Err(e);
            }
            if idx + 1 < ids.len() {
                tokio::time::sleep(self.config.startup_delay).await;
            }
        }

        self.start_health_loop().await;
        info!(clusters = self.registry.len().await, "lifecycle manager started");
        Ok(())
    }

    /// Graceful shutdown: health timer off, then teardown in reverse
    /// order with the inter-stop delay.
    pub async fn stop(&self) {
        info!("lifecycle manager stopping");
        if let Some(task) = self.health_task.lock().await.take() {
            let _ = task.shutdown_tx.send(true);
            task.handle.abort();
        }
        self.stop_all_clusters().await;
        info!("lifecycle manager stopped");
    }

    /// Create one cluster and wait for its readiness confirmation.
    pub async fn create_cluster(&self, id: u32, shards: Vec<u32>) -> ManagerResult<()> {
        let total = {
            self.distribution
                .read()
                .await
                .as_ref()
                .map(|d| d.total_shards)
        }
        .unwrap_or_else(|| shards.iter().max().map(|m| m + 1).unwrap_or(0));
        self.create_cluster_with_total(id, shards, total).await
    }

    async fn create_cluster_with_total(
        &self,
        id: u32,
        shards: Vec<u32>,
        total_shards: u32,
    ) -> ManagerResult<()> {
        if self.registry.contains(id).await {
            return Err(ManagerError::ClusterExists(id));
        }

        info!(cluster_id = id, shards = ?shards, "creating cluster");
        let spec = ClusterSpec {
            cluster_id: id,
            shards: shards.clone(),
            total_shards,
        };
        let handle = self.runtime.create(&spec).await?;
        self.registry
            .insert(ClusterInstance::new(id, shards, handle))
            .await;

        if self.wait_for_cluster_ready(id).await {
            info!(cluster_id = id, "cluster ready");
            Ok(())
        } else {
            warn!(cluster_id = id, "readiness wait timed out, tearing candidate down");
            if let Err(e) = self.stop_cluster(id).await {
                warn!(cluster_id = id, error = %e, "candidate teardown failed");
            }
            Err(ManagerError::ReadyTimeout {
                cluster_id: id,
                waited_secs: self.config.ready_timeout.as_secs(),
            })
        }
    }

    /// Poll the combined status until the cluster is ready and healthy,
    /// or until the readiness timeout elapses. Timeout-bound only.
    pub async fn wait_for_cluster_ready(&self, id: u32) -> bool {
        let deadline = Instant::now() + self.config.ready_timeout;
        loop {
            let Some(handle) = self.registry.handle_of(id).await else {
                return false;
            };
            let combined = match self.runtime.status(id, &handle).await {
                Ok(engine) => self.registry.record_engine_status(id, &engine).await,
                Err(e) => {
                    debug!(cluster_id = id, error = %e, "status poll failed");
                    None
                }
            };
            if let Some(status) = combined {
                if status.is_ready && status.health == HealthStatus::Healthy {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.config.ready_poll_interval).await;
        }
    }

    /// Best-effort backend teardown; the registry entry and cached
    /// metrics are removed unconditionally so a failed stop can never
    /// block recreation of the same id.
    pub async fn stop_cluster(&self, id: u32) -> ManagerResult<()> {
        let Some(handle) = self.registry.handle_of(id).await else {
            return Err(ManagerError::ClusterNotFound(id));
        };
        if let Err(e) = self.runtime.stop(&handle).await {
            warn!(cluster_id = id, error = %e, "backend stop failed, removing entry anyway");
        }
        self.registry.remove(id).await;
        self.metrics.remove(id).await;
        info!(cluster_id = id, "cluster stopped");
        Ok(())
    }

    /// Reconcile the fleet against a freshly fetched shard total.
    ///
    /// Removals run first to free capacity, then changed clusters are
    /// recreated, then new clusters are added sequentially. The stored
    /// distribution is replaced after the operations are issued.
    pub async fn scale_clusters(&self) -> ManagerResult<()> {
        let gateway = self.gateway.refresh().await?;
        let current_total = self
            .distribution
            .read()
            .await
            .as_ref()
            .map(|d| d.total_shards);
        if current_total == Some(gateway.shards) {
            debug!(total_shards = gateway.shards, "shard total unchanged, nothing to scale");
            return Ok(());
        }

        let max_concurrency = gateway.session_start_limit.max_concurrency;
        let group_size = optimal_shards_per_cluster(
            gateway.shards,
            self.config.shards_per_cluster,
            max_concurrency,
        );
        // As in start(): the optimal-size helper already applied the
        // concurrency clamp and the cluster ceiling.
        let new_dist = calculate_distribution(gateway.shards, group_size, None)?;
        if !validate_distribution(&new_dist) {
            return Err(ManagerError::InvalidDistribution(format!(
                "scale target does not cover {} shards exactly",
                new_dist.total_shards
            )));
        }
        if let Some(old) = self.distribution.read().await.as_ref() {
            let diff = diff_distributions(old, &new_dist);
            info!(
                added = diff.added.len(),
                removed = diff.removed.len(),
                modified = diff.modified.len(),
                "distribution diff computed"
            );
        }
        info!(
            old_total = ?current_total,
            new_total = new_dist.total_shards,
            clusters = new_dist.total_clusters,
            "scaling fleet"
        );

        // Removals first: ids at or beyond the new cluster count, in
        // reverse order.
        let removals: Vec<u32> = self
            .registry
            .ids()
            .await
            .into_iter()
            .filter(|&id| id >= new_dist.total_clusters)
            .rev()
            .collect();
        for id in removals {
            info!(cluster_id = id, "removing cluster");
            self.stop_cluster(id).await?;
            tokio::time::sleep(self.config.inter_stop_delay).await;
        }

        // Modifications: same id, different shard set.
        for (&id, shards) in &new_dist.cluster_shards {
            if let Some(current) = self.registry.shards_of(id).await {
                if &current != shards {
                    info!(cluster_id = id, "cluster shard set changed, recreating");
                    self.stop_cluster(id).await?;
                    tokio::time::sleep(self.config.grace_delay).await;
                    self.create_cluster_with_total(id, shards.clone(), new_dist.total_shards)
                        .await?;
                }
            }
        }

        // Additions last, sequential, spaced by the startup delay.
        for (&id, shards) in &new_dist.cluster_shards {
            if !self.registry.contains(id).await {
                self.create_cluster_with_total(id, shards.clone(), new_dist.total_shards)
                    .await?;
                tokio::time::sleep(self.config.startup_delay).await;
            }
        }

        *self.distribution.write().await = Some(new_dist);
        Ok(())
    }

    /// Recreate one cluster with its unchanged shard set, after a short
    /// grace delay. Picks up a new deployment without renumbering.
    pub async fn rolling_restart(&self, id: u32) -> ManagerResult<()> {
        let shards = self
            .registry
            .shards_of(id)
            .await
            .ok_or(ManagerError::ClusterNotFound(id))?;
        info!(cluster_id = id, "rolling restart");
        self.stop_cluster(id).await?;
        tokio::time::sleep(self.config.grace_delay).await;
        self.create_cluster(id, shards).await
    }

    /// Prometheus exposition for the whole fleet.
    pub async fn render_metrics(&self) -> String {
        let fleet = self.registry.snapshot().await;
        let cached = self.metrics.snapshot().await;
        render_fleet_metrics(&fleet, &cached, &self.config.metric_prefix)
    }

    async fn stop_all_clusters(&self) {
        let mut ids = self.registry.ids().await;
        ids.reverse();
        for id in ids {
            if let Err(e) = self.stop_cluster(id).await {
                warn!(cluster_id = id, error = %e, "cluster stop failed");
            }
            tokio::time::sleep(self.config.inter_stop_delay).await;
        }
    }

    async fn start_health_loop(&self) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = self.registry.clone();
        let runtime = self.runtime.clone();
        let interval = self.config.health_interval;
        let handle = tokio::spawn(async move {
            run_health_loop(registry, runtime, interval, shutdown_rx).await;
        });

        let mut slot = self.health_task.lock().await;
        if let Some(old) = slot.replace(HealthTask { handle, shutdown_tx }) {
            let _ = old.shutdown_tx.send(true);
            old.handle.abort();
        }
        debug!("health loop started");
    }
}

/// The health-check timer. Detection only: degradation is logged, never
/// auto-remediated — recovery is an explicit rolling restart.
async fn run_health_loop(
    registry: Arc<ClusterRegistry>,
    runtime: Arc<dyn ContainerRuntime>,
    interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                for id in registry.ids().await {
                    let Some(handle) = registry.handle_of(id).await else { continue };
                    let was_ready = registry
                        .combined_status(id)
                        .await
                        .map(|s| s.is_ready)
                        .unwrap_or(false);
                    match runtime.status(id, &handle).await {
                        Ok(engine) => {
                            if let Some(now) = registry.record_engine_status(id, &engine).await {
                                if was_ready
                                    && (!now.is_ready || now.health != HealthStatus::Healthy)
                                {
                                    warn!(
                                        cluster_id = id,
                                        running = now.is_running,
                                        "cluster degraded; rolling restart required to recover"
                                    );
                                }
                            }
                        }
                        Err(e) => warn!(cluster_id = id, error = %e, "health check failed"),
                    }
                }
            }
            _ = shutdown.changed() => {
                debug!("health loop shutting down");
                break;
            }
        }
    }
}
