//! Shard distribution types and validation.
//!
//! A [`ShardDistribution`] is the desired mapping from cluster ids to
//! ordered shard id lists. Validation is the hard gate the lifecycle
//! manager runs before it executes any fleet change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mapping of the full shard set onto clusters.
///
/// A valid distribution covers `{0 .. total_shards - 1}` exactly once
/// across `cluster_shards` and has an empty `remaining_shards`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardDistribution {
    pub total_shards: u32,
    pub shards_per_cluster: u32,
    pub total_clusters: u32,
    /// Cluster id → ordered, contiguous shard id block.
    pub cluster_shards: BTreeMap<u32, Vec<u32>>,
    /// Shard ids not assigned to any cluster. Always empty for a
    /// distribution produced by the planner; non-empty indicates a
    /// logic defect and is surfaced, never dropped.
    pub remaining_shards: Vec<u32>,
}

impl ShardDistribution {
    /// Shard list for one cluster, if it exists in this distribution.
    pub fn shards_for(&self, cluster_id: u32) -> Option<&[u32]> {
        self.cluster_shards.get(&cluster_id).map(Vec::as_slice)
    }

    /// Ids of all clusters in this distribution, ascending.
    pub fn cluster_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.cluster_shards.keys().copied()
    }
}

/// Result of diffing two distributions during reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionDiff {
    /// Cluster ids present only in the new distribution.
    pub added: Vec<u32>,
    /// Cluster ids present only in the old distribution.
    pub removed: Vec<u32>,
    /// Cluster ids present in both with a different shard list.
    pub modified: Vec<u32>,
}

impl DistributionDiff {
    /// True when the two distributions were identical.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Check that a distribution covers `[0, total_shards)` exactly once.
///
/// Returns false on any duplicated id, any missing id, or any id at or
/// beyond `total_shards` — in `cluster_shards` or `remaining_shards`.
pub fn validate_distribution(dist: &ShardDistribution) -> bool {
    let total = dist.total_shards as usize;
    let mut seen = vec![false; total];

    let all_ids = dist
        .cluster_shards
        .values()
        .flatten()
        .chain(dist.remaining_shards.iter());

    let mut count = 0usize;
    for &id in all_ids {
        let Some(slot) = seen.get_mut(id as usize) else {
            return false; // id >= total_shards
        };
        if *slot {
            return false; // duplicate
        }
        *slot = true;
        count += 1;
    }

    count == total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::calculate_distribution;

    #[test]
    fn planner_output_validates() {
        let dist = calculate_distribution(10, 4, None).unwrap();
        assert!(validate_distribution(&dist));
    }

    #[test]
    fn duplicate_id_fails() {
        let mut dist = calculate_distribution(10, 4, None).unwrap();
        dist.cluster_shards.get_mut(&1).unwrap()[0] = 0;
        assert!(!validate_distribution(&dist));
    }

    #[test]
    fn missing_id_fails() {
        let mut dist = calculate_distribution(10, 4, None).unwrap();
        dist.cluster_shards.get_mut(&2).unwrap().pop();
        assert!(!validate_distribution(&dist));
    }

    #[test]
    fn out_of_range_id_fails() {
        let mut dist = calculate_distribution(10, 4, None).unwrap();
        dist.cluster_shards.get_mut(&2).unwrap().push(10);
        assert!(!validate_distribution(&dist));
    }

    #[test]
    fn out_of_range_remaining_fails() {
        let mut dist = calculate_distribution(10, 4, None).unwrap();
        dist.remaining_shards.push(42);
        assert!(!validate_distribution(&dist));
    }
}
