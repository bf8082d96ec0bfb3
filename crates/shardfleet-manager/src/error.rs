//! Lifecycle manager error types.

use thiserror::Error;

/// Result type alias for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors that can occur during cluster lifecycle operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("cluster {0} is already registered")]
    ClusterExists(u32),

    #[error("cluster {0} is not registered")]
    ClusterNotFound(u32),

    #[error("cluster {cluster_id} did not become ready within {waited_secs}s")]
    ReadyTimeout { cluster_id: u32, waited_secs: u64 },

    #[error("distribution failed validation: {0}")]
    InvalidDistribution(String),

    #[error(transparent)]
    Assign(#[from] shardfleet_assign::AssignError),

    #[error(transparent)]
    Gateway(#[from] shardfleet_gateway::GatewayError),

    #[error(transparent)]
    Runtime(#[from] shardfleet_runtime::RuntimeError),
}
