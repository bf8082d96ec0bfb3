//! shardfleet-runtime — compute-unit backends for the cluster fleet.
//!
//! One [`ContainerRuntime`] implementation materializes a cluster as a
//! plain container ([`DockerRuntime`]), the other as a replicated Swarm
//! service ([`SwarmRuntime`]). The backend is chosen once at startup by
//! probing the engine for an active Swarm node and is stored as a single
//! boxed strategy value — no per-call branching anywhere else.
//!
//! Engine-reported state is only half of readiness: `status()` maps the
//! engine's running flag to ready/healthy, and the event channel supplies
//! the application-level confirmation.

pub mod config;
pub mod docker;
pub mod error;
pub mod swarm;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use bollard::Docker;
use bollard::models::LocalNodeState;
use tracing::info;

pub use config::RuntimeConfig;
pub use docker::DockerRuntime;
pub use error::{RuntimeError, RuntimeResult};
pub use swarm::SwarmRuntime;
pub use types::{ClusterSpec, ClusterStatus, HealthStatus, ShardStatus};

/// Ownership label attached to every unit this manager creates. The
/// startup orphan sweep matches on it.
pub const MANAGED_LABEL: &str = "io.shardfleet.managed";
/// Label carrying the owning cluster id.
pub const CLUSTER_ID_LABEL: &str = "io.shardfleet.cluster-id";

/// One compute unit per cluster, created/stopped/inspected through the
/// container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Materialize a compute unit for the cluster; returns the backend
    /// handle (container or service id) owned by the cluster instance.
    async fn create(&self, spec: &ClusterSpec) -> RuntimeResult<String>;

    /// Tear the unit down. Tolerates units that are already gone.
    async fn stop(&self, handle: &str) -> RuntimeResult<()>;

    /// Engine-side status for the unit.
    async fn status(&self, cluster_id: u32, handle: &str) -> RuntimeResult<ClusterStatus>;

    /// Remove every unit carrying the ownership label and name prefix.
    /// Clears orphans left by a previous process lifetime.
    async fn sweep_orphans(&self) -> RuntimeResult<u32>;
}

/// Probe the engine and select the backend: Swarm when the local node
/// participates in an active swarm, plain containers otherwise.
pub async fn select_runtime(config: RuntimeConfig) -> RuntimeResult<Arc<dyn ContainerRuntime>> {
    let docker =
        Docker::connect_with_local_defaults().map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
    docker
        .ping()
        .await
        .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;

    let info = docker
        .info()
        .await
        .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
    let swarm_active = info
        .swarm
        .and_then(|s| s.local_node_state)
        .map(|state| state == LocalNodeState::ACTIVE)
        .unwrap_or(false);

    if swarm_active {
        info!("swarm node active, using the swarm service backend");
        Ok(Arc::new(SwarmRuntime::new(docker, config)))
    } else {
        info!("using the single-host docker backend");
        Ok(Arc::new(DockerRuntime::new(docker, config)))
    }
}
