//! Gateway info provider — fetch, cache, and stale fallback.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::GatewayResult;
use crate::types::{GatewayBotResponse, GatewayInfo};

/// Default cache lifetime for gateway info.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Source of gateway info. The lifecycle manager depends on this trait
/// so tests can substitute a fake for the HTTP-backed provider.
#[async_trait]
pub trait GatewayInfoSource: Send + Sync {
    /// Cached-or-fetched gateway info.
    async fn gateway_info(&self) -> GatewayResult<GatewayInfo>;

    /// Bypass the cache and fetch fresh info.
    async fn refresh(&self) -> GatewayResult<GatewayInfo>;
}

/// HTTP-backed gateway info provider with a TTL cache.
pub struct GatewayInfoProvider {
    http: reqwest::Client,
    api_base: String,
    token: String,
    ttl: Duration,
    cached: RwLock<Option<GatewayInfo>>,
}

impl GatewayInfoProvider {
    /// Create a provider against `api_base` (e.g. `https://discord.com/api/v10`).
    pub fn new(api_base: impl Into<String>, token: impl Into<String>, ttl: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            token: token.into(),
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Create a provider pre-seeded with a cached value (for tests).
    #[cfg(test)]
    pub(crate) fn with_cached(
        api_base: impl Into<String>,
        token: impl Into<String>,
        ttl: Duration,
        cached: GatewayInfo,
    ) -> Self {
        let mut provider = Self::new(api_base, token, ttl);
        provider.cached = RwLock::new(Some(cached));
        provider
    }

    async fn fetch(&self) -> GatewayResult<GatewayInfo> {
        let url = format!("{}/gateway/bot", self.api_base);
        let response: GatewayBotResponse = self
            .http
            .get(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let info = GatewayInfo {
            shards: response.shards,
            session_start_limit: response.session_start_limit,
            fetched_at: Instant::now(),
        };
        info!(
            shards = info.shards,
            max_concurrency = info.session_start_limit.max_concurrency,
            remaining_starts = info.session_start_limit.remaining,
            "gateway info fetched"
        );
        Ok(info)
    }
}

#[async_trait]
impl GatewayInfoSource for GatewayInfoProvider {
    async fn gateway_info(&self) -> GatewayResult<GatewayInfo> {
        {
            let cached = self.cached.read().await;
            if let Some(info) = cached.as_ref() {
                if !info.is_stale(self.ttl) {
                    debug!("serving gateway info from cache");
                    return Ok(info.clone());
                }
            }
        }

        match self.fetch().await {
            Ok(info) => {
                *self.cached.write().await = Some(info.clone());
                Ok(info)
            }
            Err(e) => {
                // Serve stale data rather than failing a running fleet.
                let cached = self.cached.read().await;
                match cached.as_ref() {
                    Some(stale) => {
                        warn!(error = %e, "gateway fetch failed, serving stale cache");
                        Ok(stale.clone())
                    }
                    None => Err(e),
                }
            }
        }
    }

    async fn refresh(&self) -> GatewayResult<GatewayInfo> {
        let info = self.fetch().await?;
        *self.cached.write().await = Some(info.clone());
        Ok(info)
    }
}
