//! Single-host Docker backend.
//!
//! One container per cluster, named `<prefix>-<id>`. Creation is
//! idempotent: any unit already holding the name is stopped and removed
//! first, tolerating "already stopped" and "not found" outcomes.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::models::{HostConfig, RestartPolicy, RestartPolicyNameEnum};
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::error::{is_benign_teardown_error, RuntimeResult};
use crate::types::{ClusterSpec, ClusterStatus};
use crate::{ContainerRuntime, CLUSTER_ID_LABEL, MANAGED_LABEL};

/// Runs each cluster as a plain container on the local engine.
pub struct DockerRuntime {
    docker: Docker,
    config: RuntimeConfig,
}

impl DockerRuntime {
    pub fn new(docker: Docker, config: RuntimeConfig) -> Self {
        Self { docker, config }
    }

    fn labels(&self, cluster_id: u32) -> HashMap<String, String> {
        HashMap::from([
            (MANAGED_LABEL.to_string(), "true".to_string()),
            (CLUSTER_ID_LABEL.to_string(), cluster_id.to_string()),
        ])
    }

    /// Stop and remove any container already holding `name`.
    async fn remove_existing(&self, name: &str) -> RuntimeResult<()> {
        if let Err(e) = self
            .docker
            .stop_container(name, Some(StopContainerOptions { t: self.config.stop_timeout_secs }))
            .await
        {
            if !is_benign_teardown_error(&e) {
                return Err(e.into());
            }
        }
        match self
            .docker
            .remove_container(name, Some(RemoveContainerOptions { force: true, ..Default::default() }))
            .await
        {
            Ok(()) => debug!(%name, "stale container removed"),
            Err(e) if is_benign_teardown_error(&e) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create(&self, spec: &ClusterSpec) -> RuntimeResult<String> {
        let name = self.config.unit_name(spec.cluster_id);
        self.remove_existing(&name).await?;

        let host_config = HostConfig {
            memory: Some(self.config.memory_limit_bytes),
            nano_cpus: Some(self.config.nano_cpus),
            network_mode: self.config.network.clone(),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
                maximum_retry_count: None,
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.clone(),
                    platform: None,
                }),
                Config {
                    image: Some(self.config.image.clone()),
                    env: Some(self.config.cluster_env(spec)),
                    labels: Some(self.labels(spec.cluster_id)),
                    host_config: Some(host_config),
                    ..Default::default()
                },
            )
            .await?;

        self.docker
            .start_container(&name, None::<StartContainerOptions<String>>)
            .await?;

        info!(
            cluster_id = spec.cluster_id,
            container = %name,
            shards = spec.shards.len(),
            "cluster container started"
        );
        Ok(created.id)
    }

    async fn stop(&self, handle: &str) -> RuntimeResult<()> {
        if let Err(e) = self
            .docker
            .stop_container(handle, Some(StopContainerOptions { t: self.config.stop_timeout_secs }))
            .await
        {
            if !is_benign_teardown_error(&e) {
                return Err(e.into());
            }
        }
        match self
            .docker
            .remove_container(handle, Some(RemoveContainerOptions { force: true, ..Default::default() }))
            .await
        {
            Ok(()) => {}
            Err(e) if is_benign_teardown_error(&e) => {}
            Err(e) => return Err(e.into()),
        }
        debug!(%handle, "cluster container stopped and removed");
        Ok(())
    }

    async fn status(&self, cluster_id: u32, handle: &str) -> RuntimeResult<ClusterStatus> {
        let inspect = self
            .docker
            .inspect_container(handle, None::<InspectContainerOptions>)
            .await?;
        let running = inspect
            .state
            .and_then(|s| s.running)
            .unwrap_or(false);
        debug!(cluster_id, running, "container status inspected");
        Ok(ClusterStatus::from_engine_running(running))
    }

    async fn sweep_orphans(&self) -> RuntimeResult<u32> {
        let filters = HashMap::from([(
            "label".to_string(),
            vec![format!("{MANAGED_LABEL}=true")],
        )]);
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters,
                ..Default::default()
            }))
            .await?;

        let mut removed = 0u32;
        for container in containers {
            let Some(id) = container.id else { continue };
            // Only touch units matching our name pattern.
            let named_ours = container
                .names
                .unwrap_or_default()
                .iter()
                .any(|n| n.trim_start_matches('/').starts_with(&self.config.name_prefix));
            if !named_ours {
                continue;
            }
            match self.stop(&id).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(container = %id, error = %e, "orphan removal failed"),
            }
        }
        if removed > 0 {
            info!(removed, "orphaned cluster containers swept");
        }
        Ok(removed)
    }
}
