//! Gateway info domain types.

use std::time::Instant;

use serde::Deserialize;

/// Session-start limits reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SessionStartLimit {
    /// Total session starts allowed in the current window.
    pub total: u32,
    /// Session starts remaining in the current window.
    pub remaining: u32,
    /// Milliseconds until the window resets.
    pub reset_after: u64,
    /// How many shard sessions may be started simultaneously.
    pub max_concurrency: u32,
}

/// Shard and session-limit data from the provider, plus fetch time.
#[derive(Debug, Clone)]
pub struct GatewayInfo {
    /// Recommended shard count.
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
    /// When this value was fetched; drives TTL expiry.
    pub fetched_at: Instant,
}

impl GatewayInfo {
    /// True when this value is older than `ttl`.
    pub fn is_stale(&self, ttl: std::time::Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }
}

/// Wire shape of `GET /gateway/bot`.
#[derive(Debug, Deserialize)]
pub(crate) struct GatewayBotResponse {
    #[allow(dead_code)]
    pub url: Option<String>,
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn wire_shape_parses() {
        let raw = r#"{
            "url": "wss://gateway.example",
            "shards": 48,
            "session_start_limit": {
                "total": 1000,
                "remaining": 985,
                "reset_after": 14400000,
                "max_concurrency": 16
            }
        }"#;
        let parsed: GatewayBotResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.shards, 48);
        assert_eq!(parsed.session_start_limit.max_concurrency, 16);
        assert_eq!(parsed.session_start_limit.reset_after, 14_400_000);
    }

    #[test]
    fn staleness_tracks_ttl() {
        let info = GatewayInfo {
            shards: 2,
            session_start_limit: SessionStartLimit {
                total: 1000,
                remaining: 1000,
                reset_after: 0,
                max_concurrency: 1,
            },
            fetched_at: Instant::now(),
        };
        assert!(!info.is_stale(Duration::from_secs(60)));
        assert!(info.is_stale(Duration::ZERO));
    }
}
