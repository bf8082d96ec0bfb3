//! Gateway info error types.

use thiserror::Error;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur while fetching gateway info.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
}
