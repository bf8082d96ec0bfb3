//! shardfleet-gateway — provider gateway info with a TTL cache.
//!
//! Fetches `GET /gateway/bot` from the messaging provider and caches the
//! recommended shard count and session-start limits. A fetch failure is
//! recovered from the last good value when one exists (stale-but-available);
//! with no cache the error propagates, which is fatal at startup.

pub mod error;
pub mod provider;
pub mod types;

pub use error::{GatewayError, GatewayResult};
pub use provider::{GatewayInfoProvider, GatewayInfoSource, DEFAULT_TTL};
pub use types::{GatewayInfo, SessionStartLimit};
