//! Fleet metrics: cached per-cluster text plus the manager's own gauges.
//!
//! Each cluster pushes its raw Prometheus text over the event channel.
//! The aggregation endpoint replays that text with a `cluster_id` label
//! injected into every line whose metric name carries the agreed prefix
//! and lacks the label, so one scrape covers the whole fleet.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::registry::ClusterSummary;
use shardfleet_runtime::HealthStatus;

/// Per-cluster raw metrics text, keyed by cluster id.
#[derive(Default)]
pub struct MetricsCache {
    inner: RwLock<HashMap<u32, String>>,
}

impl MetricsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, cluster_id: u32, text: String) {
        self.inner.write().await.insert(cluster_id, text);
    }

    pub async fn remove(&self, cluster_id: u32) {
        self.inner.write().await.remove(&cluster_id);
    }

    /// Cached texts, ascending by cluster id.
    pub async fn snapshot(&self) -> Vec<(u32, String)> {
        let inner = self.inner.read().await;
        let mut all: Vec<(u32, String)> = inner.iter().map(|(k, v)| (*k, v.clone())).collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }
}

/// Inject `cluster_id="N"` into every metric line whose name starts
/// with `prefix` and does not already carry the label. Comment lines
/// and foreign metrics pass through untouched.
pub fn inject_cluster_label(text: &str, prefix: &str, cluster_id: u32) -> String {
    let mut out = String::with_capacity(text.len() + 64);
    for line in text.lines() {
        out.push_str(&label_line(line, prefix, cluster_id));
        out.push('\n');
    }
    out
}

fn label_line(line: &str, prefix: &str, cluster_id: u32) -> String {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return line.to_string();
    }

    let name_end = line
        .find(|c: char| c == '{' || c.is_whitespace())
        .unwrap_or(line.len());
    let name = &line[..name_end];
    if !name.starts_with(prefix) {
        return line.to_string();
    }

    match line[name_end..].strip_prefix('{') {
        Some(rest) => {
            let label_end = match rest.find('}') {
                Some(pos) => pos,
                None => return line.to_string(), // malformed, leave alone
            };
            let labels = &rest[..label_end];
            if labels.contains("cluster_id=") {
                return line.to_string();
            }
            let tail = &rest[label_end..];
            if labels.is_empty() {
                format!("{name}{{cluster_id=\"{cluster_id}\"{tail}")
            } else {
                format!("{name}{{cluster_id=\"{cluster_id}\",{labels}{tail}")
            }
        }
        None => {
            let tail = &line[name_end..];
            format!("{name}{{cluster_id=\"{cluster_id}\"}}{tail}")
        }
    }
}

/// Render the full exposition: the manager's own gauges followed by the
/// label-merged per-cluster texts.
pub fn render_fleet_metrics(
    fleet: &[ClusterSummary],
    cached: &[(u32, String)],
    prefix: &str,
) -> String {
    let mut out = String::new();

    let ready = fleet.iter().filter(|c| c.status.is_ready).count();
    let healthy = fleet
        .iter()
        .filter(|c| c.status.health == HealthStatus::Healthy)
        .count();

    out.push_str("# HELP shardfleet_clusters Known clusters in the registry.\n");
    out.push_str("# TYPE shardfleet_clusters gauge\n");
    out.push_str(&format!("shardfleet_clusters {}\n", fleet.len()));

    out.push_str("# HELP shardfleet_clusters_ready Clusters confirmed ready by both signals.\n");
    out.push_str("# TYPE shardfleet_clusters_ready gauge\n");
    out.push_str(&format!("shardfleet_clusters_ready {ready}\n"));

    out.push_str("# HELP shardfleet_clusters_healthy Clusters currently healthy.\n");
    out.push_str("# TYPE shardfleet_clusters_healthy gauge\n");
    out.push_str(&format!("shardfleet_clusters_healthy {healthy}\n"));

    out.push_str("# HELP shardfleet_cluster_up Per-cluster running flag.\n");
    out.push_str("# TYPE shardfleet_cluster_up gauge\n");
    for cluster in fleet {
        out.push_str(&format!(
            "shardfleet_cluster_up{{cluster_id=\"{}\"}} {}\n",
            cluster.id,
            u8::from(cluster.status.is_running)
        ));
    }

    out.push_str("# HELP shardfleet_cluster_uptime_seconds Seconds since cluster creation.\n");
    out.push_str("# TYPE shardfleet_cluster_uptime_seconds gauge\n");
    for cluster in fleet {
        out.push_str(&format!(
            "shardfleet_cluster_uptime_seconds{{cluster_id=\"{}\"}} {}\n",
            cluster.id,
            cluster.status.uptime_secs.unwrap_or(0)
        ));
    }

    for (cluster_id, text) in cached {
        out.push_str(&inject_cluster_label(text, prefix, *cluster_id));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_metric_gets_label() {
        let out = inject_cluster_label("bot_guilds 42\n", "bot_", 3);
        assert_eq!(out, "bot_guilds{cluster_id=\"3\"} 42\n");
    }

    #[test]
    fn labeled_metric_gets_label_prepended() {
        let out = inject_cluster_label("bot_latency{shard=\"0\"} 51.2\n", "bot_", 1);
        assert_eq!(out, "bot_latency{cluster_id=\"1\",shard=\"0\"} 51.2\n");
    }

    #[test]
    fn empty_braces_get_label() {
        let out = inject_cluster_label("bot_events{} 7\n", "bot_", 0);
        assert_eq!(out, "bot_events{cluster_id=\"0\"} 7\n");
    }

    #[test]
    fn existing_label_is_kept() {
        let line = "bot_guilds{cluster_id=\"9\"} 42\n";
        assert_eq!(inject_cluster_label(line, "bot_", 3), line);
    }

    #[test]
    fn foreign_metrics_and_comments_pass_through() {
        let text = "# HELP process_cpu_seconds_total CPU.\nprocess_cpu_seconds_total 1.5\n";
        assert_eq!(inject_cluster_label(text, "bot_", 2), text);
    }

    #[tokio::test]
    async fn cache_snapshot_is_sorted() {
        let cache = MetricsCache::new();
        cache.insert(2, "b".into()).await;
        cache.insert(0, "a".into()).await;
        cache.insert(1, "c".into()).await;
        let ids: Vec<u32> = cache.snapshot().await.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        cache.remove(1).await;
        assert_eq!(cache.snapshot().await.len(), 2);
    }

    #[test]
    fn fleet_render_includes_cached_text() {
        let cached = vec![(0, "bot_guilds 10\n".to_string())];
        let out = render_fleet_metrics(&[], &cached, "bot_");
        assert!(out.contains("shardfleet_clusters 0"));
        assert!(out.contains("bot_guilds{cluster_id=\"0\"} 10"));
    }
}
