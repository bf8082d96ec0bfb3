//! Event-channel adapter writing into the registry and metrics cache.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use shardfleet_events::{ClusterEvent, ClusterEventKind, EventSink};

use crate::metrics::MetricsCache;
use crate::registry::ClusterRegistry;

/// Applies consumed cluster events to the shared registry. Events for
/// unknown cluster ids are logged and ignored — they are expected
/// during reconciliation windows, not errors.
pub struct RegistryEventSink {
    registry: Arc<ClusterRegistry>,
    metrics: Arc<MetricsCache>,
}

impl RegistryEventSink {
    pub fn new(registry: Arc<ClusterRegistry>, metrics: Arc<MetricsCache>) -> Self {
        Self { registry, metrics }
    }
}

#[async_trait]
impl EventSink for RegistryEventSink {
    async fn on_event(&self, event: ClusterEvent) {
        let id = event.cluster_id;
        match event.kind {
            ClusterEventKind::Start => {
                if self.registry.apply_start_event(id).await {
                    info!(cluster_id = id, "cluster reported ready");
                } else {
                    debug!(cluster_id = id, "start event for unknown cluster ignored");
                }
            }
            ClusterEventKind::Stop => {
                if self.registry.apply_stop_event(id).await {
                    warn!(cluster_id = id, "cluster reported stopping");
                } else {
                    debug!(cluster_id = id, "stop event for unknown cluster ignored");
                }
            }
            ClusterEventKind::Metrics => {
                let Some(text) = event.metrics else {
                    debug!(cluster_id = id, "metrics event without payload ignored");
                    return;
                };
                if self.registry.contains(id).await {
                    self.metrics.insert(id, text).await;
                } else {
                    debug!(cluster_id = id, "metrics for unknown cluster ignored");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ClusterInstance;

    #[tokio::test]
    async fn start_event_marks_ready() {
        let registry = Arc::new(ClusterRegistry::new());
        let metrics = Arc::new(MetricsCache::new());
        let sink = RegistryEventSink::new(registry.clone(), metrics);
        registry
            .insert(ClusterInstance::new(0, vec![0, 1], "h-0".into()))
            .await;

        sink.on_event(ClusterEvent::start(0)).await;
        assert!(registry.combined_status(0).await.unwrap().is_ready);
    }

    #[tokio::test]
    async fn unknown_start_event_is_ignored() {
        let registry = Arc::new(ClusterRegistry::new());
        let metrics = Arc::new(MetricsCache::new());
        let sink = RegistryEventSink::new(registry.clone(), metrics);

        // Must not panic or create an entry.
        sink.on_event(ClusterEvent::start(7)).await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn metrics_event_caches_text_for_known_cluster() {
        let registry = Arc::new(ClusterRegistry::new());
        let metrics = Arc::new(MetricsCache::new());
        let sink = RegistryEventSink::new(registry.clone(), metrics.clone());
        registry
            .insert(ClusterInstance::new(1, vec![2, 3], "h-1".into()))
            .await;

        sink.on_event(ClusterEvent::metrics(1, "bot_guilds 5\n")).await;
        sink.on_event(ClusterEvent::metrics(9, "bot_guilds 9\n")).await;

        let cached = metrics.snapshot().await;
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].0, 1);
    }

    #[tokio::test]
    async fn stop_event_flips_flags() {
        let registry = Arc::new(ClusterRegistry::new());
        let metrics = Arc::new(MetricsCache::new());
        let sink = RegistryEventSink::new(registry.clone(), metrics);
        registry
            .insert(ClusterInstance::new(2, vec![4], "h-2".into()))
            .await;
        registry.apply_start_event(2).await;

        sink.on_event(ClusterEvent::stop(2)).await;
        let status = registry.combined_status(2).await.unwrap();
        assert!(!status.is_running && !status.is_ready);
    }
}
