//! Runtime configuration and the compute-unit environment contract.

use crate::types::ClusterSpec;

/// Settings shared by both backends.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Image to run for every cluster.
    pub image: String,
    /// Network the units attach to.
    pub network: Option<String>,
    /// Deterministic unit name prefix: units are named `<prefix>-<id>`.
    pub name_prefix: String,
    /// Deployment environment name passed to the hosted client.
    pub environment: String,
    /// Bot credential injected into every unit.
    pub bot_token: String,
    /// Cache (redis) service discovery.
    pub cache_host: String,
    pub cache_port: u16,
    /// Broker URL for the event channel.
    pub broker_url: String,
    /// REST backend base URL.
    pub backend_url: String,
    /// Memory limit per unit, in bytes.
    pub memory_limit_bytes: i64,
    /// CPU limit per unit, in units of 1e-9 CPUs.
    pub nano_cpus: i64,
    /// Grace period for a stop before the unit is killed.
    pub stop_timeout_secs: i64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            image: "shardfleet/bot:latest".to_string(),
            network: None,
            name_prefix: "shardfleet-cluster".to_string(),
            environment: "production".to_string(),
            bot_token: String::new(),
            cache_host: "redis".to_string(),
            cache_port: 6379,
            broker_url: "nats://nats:4222".to_string(),
            backend_url: "http://api:3000".to_string(),
            memory_limit_bytes: 512 * 1024 * 1024,
            nano_cpus: 1_000_000_000,
            stop_timeout_secs: 10,
        }
    }
}

impl RuntimeConfig {
    /// Deterministic unit name for a cluster id.
    pub fn unit_name(&self, cluster_id: u32) -> String {
        format!("{}-{}", self.name_prefix, cluster_id)
    }

    /// Build the environment contract for one cluster's unit.
    ///
    /// Every spawned unit receives its cluster id, its JSON-encoded
    /// shard list, the fleet-wide shard total, the bot credential, and
    /// endpoints for the dependent infrastructure.
    pub fn cluster_env(&self, spec: &ClusterSpec) -> Vec<String> {
        let shards_json =
            serde_json::to_string(&spec.shards).unwrap_or_else(|_| "[]".to_string());
        vec![
            format!("CLUSTER_ID={}", spec.cluster_id),
            format!("SHARDS={shards_json}"),
            format!("TOTAL_SHARDS={}", spec.total_shards),
            format!("BOT_TOKEN={}", self.bot_token),
            format!("REDIS_HOST={}", self.cache_host),
            format!("REDIS_PORT={}", self.cache_port),
            format!("BROKER_URL={}", self.broker_url),
            format!("API_BASE_URL={}", self.backend_url),
            format!("ENVIRONMENT={}", self.environment),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ClusterSpec {
        ClusterSpec {
            cluster_id: 2,
            shards: vec![8, 9, 10, 11],
            total_shards: 12,
        }
    }

    #[test]
    fn unit_names_are_deterministic() {
        let config = RuntimeConfig::default();
        assert_eq!(config.unit_name(0), "shardfleet-cluster-0");
        assert_eq!(config.unit_name(7), "shardfleet-cluster-7");
    }

    #[test]
    fn env_contract_carries_assignment() {
        let config = RuntimeConfig {
            bot_token: "secret".into(),
            ..Default::default()
        };
        let env = config.cluster_env(&spec());
        assert!(env.contains(&"CLUSTER_ID=2".to_string()));
        assert!(env.contains(&"SHARDS=[8,9,10,11]".to_string()));
        assert!(env.contains(&"TOTAL_SHARDS=12".to_string()));
        assert!(env.contains(&"BOT_TOKEN=secret".to_string()));
        assert!(env.contains(&"REDIS_HOST=redis".to_string()));
        assert!(env.contains(&"ENVIRONMENT=production".to_string()));
    }
}
