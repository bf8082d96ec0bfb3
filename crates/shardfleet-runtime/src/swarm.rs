//! Swarm backend.
//!
//! One replicated service (replica count 1) per cluster, with resource
//! reservations/limits, a start-first rolling update policy, and
//! rollback on failed updates. Status comes from the engine's service
//! status summary: the unit counts as running iff the service reports
//! at least one running task.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{
    Limit, NetworkAttachmentConfig, ResourceObject, ServiceSpec, ServiceSpecMode,
    ServiceSpecModeReplicated, ServiceSpecRollbackConfig,
    ServiceSpecRollbackConfigFailureActionEnum, ServiceSpecRollbackConfigOrderEnum,
    ServiceSpecUpdateConfig, ServiceSpecUpdateConfigFailureActionEnum,
    ServiceSpecUpdateConfigOrderEnum, TaskSpec, TaskSpecContainerSpec, TaskSpecResources,
    TaskSpecRestartPolicy, TaskSpecRestartPolicyConditionEnum,
};
use bollard::service::ListServicesOptions;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::error::{is_benign_teardown_error, RuntimeError, RuntimeResult};
use crate::types::{ClusterSpec, ClusterStatus};
use crate::{ContainerRuntime, CLUSTER_ID_LABEL, MANAGED_LABEL};

const UPDATE_DELAY_NANOS: i64 = 10_000_000_000;

/// Runs each cluster as a replicated Swarm service.
pub struct SwarmRuntime {
    docker: Docker,
    config: RuntimeConfig,
}

impl SwarmRuntime {
    pub fn new(docker: Docker, config: RuntimeConfig) -> Self {
        Self { docker, config }
    }

    fn labels(&self, cluster_id: u32) -> HashMap<String, String> {
        HashMap::from([
            (MANAGED_LABEL.to_string(), "true".to_string()),
            (CLUSTER_ID_LABEL.to_string(), cluster_id.to_string()),
        ])
    }

    fn service_spec(&self, spec: &ClusterSpec, name: &str) -> ServiceSpec {
        ServiceSpec {
            name: Some(name.to_string()),
            labels: Some(self.labels(spec.cluster_id)),
            task_template: Some(TaskSpec {
                container_spec: Some(TaskSpecContainerSpec {
                    image: Some(self.config.image.clone()),
                    env: Some(self.config.cluster_env(spec)),
                    labels: Some(self.labels(spec.cluster_id)),
                    ..Default::default()
                }),
                resources: Some(TaskSpecResources {
                    limits: Some(Limit {
                        memory_bytes: Some(self.config.memory_limit_bytes),
                        nano_cpus: Some(self.config.nano_cpus),
                        ..Default::default()
                    }),
                    reservations: Some(ResourceObject {
                        memory_bytes: Some(self.config.memory_limit_bytes / 2),
                        nano_cpus: Some(self.config.nano_cpus / 2),
                        ..Default::default()
                    }),
                }),
                restart_policy: Some(TaskSpecRestartPolicy {
                    condition: Some(TaskSpecRestartPolicyConditionEnum::ON_FAILURE),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            mode: Some(ServiceSpecMode {
                replicated: Some(ServiceSpecModeReplicated { replicas: Some(1) }),
                ..Default::default()
            }),
            update_config: Some(ServiceSpecUpdateConfig {
                parallelism: Some(1),
                delay: Some(UPDATE_DELAY_NANOS),
                order: Some(ServiceSpecUpdateConfigOrderEnum::START_FIRST),
                failure_action: Some(ServiceSpecUpdateConfigFailureActionEnum::ROLLBACK),
                ..Default::default()
            }),
            rollback_config: Some(ServiceSpecRollbackConfig {
                parallelism: Some(1),
                order: Some(ServiceSpecRollbackConfigOrderEnum::STOP_FIRST),
                failure_action: Some(ServiceSpecRollbackConfigFailureActionEnum::PAUSE),
                ..Default::default()
            }),
            networks: self.config.network.as_ref().map(|net| {
                vec![NetworkAttachmentConfig {
                    target: Some(net.clone()),
                    ..Default::default()
                }]
            }),
            ..Default::default()
        }
    }

    /// Delete any service already holding `name`.
    async fn remove_existing(&self, name: &str) -> RuntimeResult<()> {
        match self.docker.delete_service(name).await {
            Ok(()) => debug!(%name, "stale service removed"),
            Err(e) if is_benign_teardown_error(&e) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for SwarmRuntime {
    async fn create(&self, spec: &ClusterSpec) -> RuntimeResult<String> {
        let name = self.config.unit_name(spec.cluster_id);
        self.remove_existing(&name).await?;

        let response = self
            .docker
            .create_service(self.service_spec(spec, &name), None)
            .await?;
        let handle = response
            .id
            .ok_or(RuntimeError::MissingHandle(spec.cluster_id))?;

        info!(
            cluster_id = spec.cluster_id,
            service = %name,
            shards = spec.shards.len(),
            "cluster service created"
        );
        Ok(handle)
    }

    async fn stop(&self, handle: &str) -> RuntimeResult<()> {
        match self.docker.delete_service(handle).await {
            Ok(()) => debug!(%handle, "cluster service removed"),
            Err(e) if is_benign_teardown_error(&e) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn status(&self, cluster_id: u32, handle: &str) -> RuntimeResult<ClusterStatus> {
        let filters = HashMap::from([("id".to_string(), vec![handle.to_string()])]);
        let services = self
            .docker
            .list_services(Some(ListServicesOptions::<String> {
                filters,
                status: true,
            }))
            .await?;

        let running_tasks = services
            .first()
            .and_then(|s| s.service_status.as_ref())
            .and_then(|s| s.running_tasks)
            .unwrap_or(0);
        debug!(cluster_id, running_tasks, "service status inspected");
        Ok(ClusterStatus::from_engine_running(running_tasks > 0))
    }

    async fn sweep_orphans(&self) -> RuntimeResult<u32> {
        let filters = HashMap::from([(
            "label".to_string(),
            vec![format!("{MANAGED_LABEL}=true")],
        )]);
        let services = self
            .docker
            .list_services(Some(ListServicesOptions::<String> {
                filters,
                ..Default::default()
            }))
            .await?;

        let mut removed = 0u32;
        for service in services {
            let Some(id) = service.id else { continue };
            let named_ours = service
                .spec
                .as_ref()
                .and_then(|s| s.name.as_deref())
                .is_some_and(|n| n.starts_with(&self.config.name_prefix));
            if !named_ours {
                continue;
            }
            match self.stop(&id).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(service = %id, error = %e, "orphan removal failed"),
            }
        }
        if removed > 0 {
            info!(removed, "orphaned cluster services swept");
        }
        Ok(removed)
    }
}
