//! shardfleet-assign — shard partitioning for the cluster fleet.
//!
//! Turns a gateway-reported shard total into a set of fixed-size,
//! non-overlapping, gap-free shard groups, one group per cluster. The
//! functions here are pure: the lifecycle manager owns all mutation.
//!
//! # Algorithm
//!
//! ```text
//! total_clusters = ceil(total_shards / shards_per_cluster)
//! cluster i owns [i*size, min((i+1)*size - 1, total_shards - 1)]
//! ```
//!
//! The provider's `max_concurrency` (simultaneous session starts) clamps
//! the group size; an operational ceiling keeps the cluster count at or
//! below [`MAX_CLUSTERS`] so a scale-up never produces an unmanageable
//! number of compute units.

pub mod distribution;
pub mod error;
pub mod planner;

pub use distribution::{validate_distribution, DistributionDiff, ShardDistribution};
pub use error::{AssignError, AssignResult};
pub use planner::{
    calculate_distribution, diff_distributions, optimal_shards_per_cluster,
    rebalance_distribution, MAX_CLUSTERS,
};
