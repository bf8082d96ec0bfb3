//! Cluster event payloads and subjects.

use serde::{Deserialize, Serialize};

/// Broker subjects the channel consumes, in the agreed queue names.
pub const SUBJECTS: [&str; 3] = ["cluster.start", "cluster.stop", "metrics.cluster"];

/// What a cluster is telling the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterEventKind {
    /// The hosted client finished startup; all shards identified.
    Start,
    /// The hosted client is going away.
    Stop,
    /// Raw metrics text attached in `metrics`.
    Metrics,
}

impl ClusterEventKind {
    /// Subject this event kind is published on.
    pub fn subject(self) -> &'static str {
        match self {
            ClusterEventKind::Start => "cluster.start",
            ClusterEventKind::Stop => "cluster.stop",
            ClusterEventKind::Metrics => "metrics.cluster",
        }
    }

    /// Event kind for a consumed subject, if it is one of ours.
    pub fn from_subject(subject: &str) -> Option<Self> {
        match subject {
            "cluster.start" => Some(ClusterEventKind::Start),
            "cluster.stop" => Some(ClusterEventKind::Stop),
            "metrics.cluster" => Some(ClusterEventKind::Metrics),
            _ => None,
        }
    }
}

/// Wire payload: `{"clusterId": 0, "type": "start", "metrics": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterEvent {
    pub cluster_id: u32,
    #[serde(rename = "type")]
    pub kind: ClusterEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<String>,
}

impl ClusterEvent {
    pub fn start(cluster_id: u32) -> Self {
        Self { cluster_id, kind: ClusterEventKind::Start, metrics: None }
    }

    pub fn stop(cluster_id: u32) -> Self {
        Self { cluster_id, kind: ClusterEventKind::Stop, metrics: None }
    }

    pub fn metrics(cluster_id: u32, text: impl Into<String>) -> Self {
        Self {
            cluster_id,
            kind: ClusterEventKind::Metrics,
            metrics: Some(text.into()),
        }
    }
}
