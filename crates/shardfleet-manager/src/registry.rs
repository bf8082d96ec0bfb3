//! Cluster registry — the single source of truth for the running fleet.
//!
//! An entry exists iff the cluster currently exists; absence means not
//! running regardless of backend state. Two writers feed the registry
//! (the manager's own control flow via engine inspection, and the event
//! channel consumer), so every mutation happens inside a registry
//! method that holds the write lock for the whole read-modify-write.

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use shardfleet_runtime::{ClusterStatus, HealthStatus};

/// One running cluster. `shards` and `handle` are immutable once the
/// instance is created; the status fields have two writers.
#[derive(Debug, Clone)]
pub struct ClusterInstance {
    pub id: u32,
    pub shards: Vec<u32>,
    /// Backend handle (container or service id), exclusively owned.
    pub handle: String,
    pub started_at: Instant,
    pub last_health_check: Option<Instant>,
    /// Engine inspection says the unit's process is up.
    pub engine_running: bool,
    /// The hosted client confirmed startup over the event channel.
    pub app_ready: bool,
    /// Health from the event channel side.
    pub health: HealthStatus,
}

impl ClusterInstance {
    pub fn new(id: u32, shards: Vec<u32>, handle: String) -> Self {
        Self {
            id,
            shards,
            handle,
            started_at: Instant::now(),
            last_health_check: None,
            engine_running: true,
            app_ready: false,
            health: HealthStatus::Unknown,
        }
    }

    /// Combine both signal sources into one status. Ready requires the
    /// engine AND the application-level confirmation.
    pub fn combined_status(&self) -> ClusterStatus {
        ClusterStatus {
            is_running: self.engine_running,
            is_ready: self.engine_running && self.app_ready,
            health: if !self.engine_running {
                HealthStatus::Unhealthy
            } else {
                self.health
            },
            uptime_secs: Some(self.started_at.elapsed().as_secs()),
            shard_status: Vec::new(),
        }
    }
}

/// API-facing snapshot of one registry entry.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub id: u32,
    pub shards: Vec<u32>,
    pub status: ClusterStatus,
}

/// The fleet registry. The inner map is never exposed; all access goes
/// through these methods so each mutation is a single atomic step.
#[derive(Default)]
pub struct ClusterRegistry {
    inner: RwLock<HashMap<u32, ClusterInstance>>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new instance. Returns false when the id is taken.
    pub async fn insert(&self, instance: ClusterInstance) -> bool {
        let mut inner = self.inner.write().await;
        if inner.contains_key(&instance.id) {
            return false;
        }
        inner.insert(instance.id, instance);
        true
    }

    /// Remove and return an instance.
    pub async fn remove(&self, id: u32) -> Option<ClusterInstance> {
        self.inner.write().await.remove(&id)
    }

    pub async fn contains(&self, id: u32) -> bool {
        self.inner.read().await.contains_key(&id)
    }

    /// Registered cluster ids, ascending.
    pub async fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.inner.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn shards_of(&self, id: u32) -> Option<Vec<u32>> {
        self.inner.read().await.get(&id).map(|i| i.shards.clone())
    }

    pub async fn handle_of(&self, id: u32) -> Option<String> {
        self.inner.read().await.get(&id).map(|i| i.handle.clone())
    }

    /// Combined status of one cluster.
    pub async fn combined_status(&self, id: u32) -> Option<ClusterStatus> {
        self.inner.read().await.get(&id).map(|i| i.combined_status())
    }

    /// `cluster.start` arrived: the hosted client finished startup.
    /// Returns false (and changes nothing) for an unknown id.
    pub async fn apply_start_event(&self, id: u32) -> bool {
        let mut inner = self.inner.write().await;
        match inner.get_mut(&id) {
            Some(instance) => {
                instance.app_ready = true;
                instance.health = HealthStatus::Healthy;
                true
            }
            None => false,
        }
    }

    /// `cluster.stop` arrived: the hosted client is going away.
    pub async fn apply_stop_event(&self, id: u32) -> bool {
        let mut inner = self.inner.write().await;
        match inner.get_mut(&id) {
            Some(instance) => {
                instance.engine_running = false;
                instance.app_ready = false;
                instance.health = HealthStatus::Unhealthy;
                true
            }
            None => false,
        }
    }

    /// Record the engine-side status from a poll or health tick and
    /// return the freshly combined view.
    pub async fn record_engine_status(
        &self,
        id: u32,
        engine: &ClusterStatus,
    ) -> Option<ClusterStatus> {
        let mut inner = self.inner.write().await;
        let instance = inner.get_mut(&id)?;
        instance.engine_running = engine.is_running;
        instance.last_health_check = Some(Instant::now());
        debug!(
            cluster_id = id,
            engine_running = instance.engine_running,
            app_ready = instance.app_ready,
            "engine status recorded"
        );
        Some(instance.combined_status())
    }

    /// Snapshot of the whole fleet for the API and metrics surface.
    pub async fn snapshot(&self) -> Vec<ClusterSummary> {
        let inner = self.inner.read().await;
        let mut all: Vec<ClusterSummary> = inner
            .values()
            .map(|i| ClusterSummary {
                id: i.id,
                shards: i.shards.clone(),
                status: i.combined_status(),
            })
            .collect();
        all.sort_by_key(|s| s.id);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: u32) -> ClusterInstance {
        ClusterInstance::new(id, vec![id * 2, id * 2 + 1], format!("handle-{id}"))
    }

    #[tokio::test]
    async fn insert_rejects_duplicates() {
        let registry = ClusterRegistry::new();
        assert!(registry.insert(instance(0)).await);
        assert!(!registry.insert(instance(0)).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn readiness_requires_both_signals() {
        let registry = ClusterRegistry::new();
        registry.insert(instance(1)).await;

        // Engine up, no app confirmation yet.
        let status = registry.combined_status(1).await.unwrap();
        assert!(status.is_running);
        assert!(!status.is_ready);
        assert_eq!(status.health, HealthStatus::Unknown);

        // App confirmation arrives.
        assert!(registry.apply_start_event(1).await);
        let status = registry.combined_status(1).await.unwrap();
        assert!(status.is_ready);
        assert_eq!(status.health, HealthStatus::Healthy);

        // Engine drops: readiness drops with it, whatever the app said.
        registry
            .record_engine_status(1, &ClusterStatus::from_engine_running(false))
            .await;
        let status = registry.combined_status(1).await.unwrap();
        assert!(!status.is_ready);
        assert_eq!(status.health, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn stop_event_clears_all_flags() {
        let registry = ClusterRegistry::new();
        registry.insert(instance(2)).await;
        registry.apply_start_event(2).await;

        assert!(registry.apply_stop_event(2).await);
        let status = registry.combined_status(2).await.unwrap();
        assert!(!status.is_running && !status.is_ready);
        assert_eq!(status.health, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn events_for_unknown_ids_are_ignored() {
        let registry = ClusterRegistry::new();
        assert!(!registry.apply_start_event(9).await);
        assert!(!registry.apply_stop_event(9).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn snapshot_is_sorted() {
        let registry = ClusterRegistry::new();
        for id in [3, 0, 2, 1] {
            registry.insert(instance(id)).await;
        }
        let ids: Vec<u32> = registry.snapshot().await.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(registry.ids().await, vec![0, 1, 2, 3]);
    }
}
