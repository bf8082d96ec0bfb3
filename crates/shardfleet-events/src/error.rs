//! Event channel error types.

use thiserror::Error;

/// Result type alias for event channel operations.
pub type EventResult<T> = Result<T, EventError>;

/// Errors that can occur on the event channel.
#[derive(Debug, Error)]
pub enum EventError {
    /// Broker unreachable after the bounded retry budget.
    #[error("broker connect failed after {attempts} attempt(s): {source}")]
    Connect {
        attempts: u32,
        #[source]
        source: async_nats::ConnectError,
    },

    #[error("subscribe failed: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    #[error("publish failed: {0}")]
    Publish(#[from] async_nats::PublishError),

    #[error("payload encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}
