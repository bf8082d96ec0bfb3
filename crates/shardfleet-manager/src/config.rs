//! Lifecycle manager configuration.

use std::time::Duration;

/// Timers and sizing knobs for the lifecycle manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Configured shard group size; the planner may clamp or raise it.
    pub shards_per_cluster: u32,
    /// How long a candidate cluster may take to confirm readiness.
    pub ready_timeout: Duration,
    /// Poll interval inside the readiness wait.
    pub ready_poll_interval: Duration,
    /// Pause between sequential cluster creations.
    pub startup_delay: Duration,
    /// Grace pause between stop and recreate (modify, rolling restart).
    pub grace_delay: Duration,
    /// Pause between sequential teardowns.
    pub inter_stop_delay: Duration,
    /// Health-check timer interval.
    pub health_interval: Duration,
    /// Metric-name prefix that gets the `cluster_id` label injected.
    pub metric_prefix: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            shards_per_cluster: 16,
            ready_timeout: Duration::from_secs(45),
            ready_poll_interval: Duration::from_secs(1),
            startup_delay: Duration::from_secs(5),
            grace_delay: Duration::from_secs(5),
            inter_stop_delay: Duration::from_secs(2),
            health_interval: Duration::from_secs(5),
            metric_prefix: "bot_".to_string(),
        }
    }
}
