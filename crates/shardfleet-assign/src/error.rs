//! Shard assignment error types.

use thiserror::Error;

/// Result type alias for assignment operations.
pub type AssignResult<T> = Result<T, AssignError>;

/// Errors that can occur while computing or validating a distribution.
#[derive(Debug, Error)]
pub enum AssignError {
    #[error("total shard count must be positive, got {0}")]
    InvalidShardCount(u32),

    #[error("shards per cluster must be positive, got {0}")]
    InvalidGroupSize(u32),

    #[error("distribution left {count} shard(s) unassigned starting at {first}")]
    UnassignedShards { count: usize, first: u32 },
}
