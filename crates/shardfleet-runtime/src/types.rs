//! Runtime-facing cluster types.

use serde::{Deserialize, Serialize};

/// Everything the backend needs to materialize one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    pub cluster_id: u32,
    /// Shard ids this cluster owns, in gateway order.
    pub shards: Vec<u32>,
    /// Fleet-wide shard total, injected into the unit's environment so
    /// the hosted client can identify its slice of the gateway.
    pub total_shards: u32,
}

/// Health as combined from engine inspection and the event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

/// Per-shard connection state as reported by the hosted client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardStatus {
    pub shard_id: u32,
    pub connected: bool,
    pub latency_ms: Option<f64>,
    pub guild_count: Option<u64>,
    pub user_count: Option<u64>,
}

/// Status of one cluster's compute unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClusterStatus {
    pub is_running: bool,
    pub is_ready: bool,
    pub health: HealthStatus,
    /// Seconds since the cluster instance was created, filled in by the
    /// lifecycle manager (the engine doesn't track it across backends).
    pub uptime_secs: Option<u64>,
    pub shard_status: Vec<ShardStatus>,
}

impl ClusterStatus {
    /// Engine-side status: a running unit is presumed ready and healthy
    /// from the engine's point of view alone. The event channel carries
    /// the authoritative application-level confirmation.
    pub fn from_engine_running(running: bool) -> Self {
        Self {
            is_running: running,
            is_ready: running,
            health: if running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            uptime_secs: None,
            shard_status: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_running_maps_to_ready_healthy() {
        let status = ClusterStatus::from_engine_running(true);
        assert!(status.is_running && status.is_ready);
        assert_eq!(status.health, HealthStatus::Healthy);
    }

    #[test]
    fn engine_stopped_maps_to_unhealthy() {
        let status = ClusterStatus::from_engine_running(false);
        assert!(!status.is_running && !status.is_ready);
        assert_eq!(status.health, HealthStatus::Unhealthy);
    }
}
