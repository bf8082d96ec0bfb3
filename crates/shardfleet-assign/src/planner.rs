//! Distribution planner — computes and diffs shard distributions.

use tracing::info;

use crate::distribution::{DistributionDiff, ShardDistribution};
use crate::error::{AssignError, AssignResult};

/// Operational ceiling on the number of compute units the fleet may
/// grow to. Above this the group size is raised instead.
pub const MAX_CLUSTERS: u32 = 10;

/// Partition `total_shards` into contiguous, gap-free groups.
///
/// When `max_concurrency` is given the group size is clamped to it so a
/// single cluster never starts more sessions at once than the provider
/// allows. Cluster `i` owns the block starting at `i * size`.
pub fn calculate_distribution(
    total_shards: u32,
    shards_per_cluster: u32,
    max_concurrency: Option<u32>,
) -> AssignResult<ShardDistribution> {
    if total_shards == 0 {
        return Err(AssignError::InvalidShardCount(total_shards));
    }
    if shards_per_cluster == 0 {
        return Err(AssignError::InvalidGroupSize(shards_per_cluster));
    }

    let size = match max_concurrency {
        Some(limit) if limit > 0 => shards_per_cluster.min(limit),
        _ => shards_per_cluster,
    };

    let total_clusters = total_shards.div_ceil(size);

    let mut cluster_shards = std::collections::BTreeMap::new();
    for cluster_id in 0..total_clusters {
        let start = cluster_id * size;
        let end = (start + size).min(total_shards);
        cluster_shards.insert(cluster_id, (start..end).collect::<Vec<u32>>());
    }

    // The ceiling computation assigns every id; anything left over is a
    // defect and must be surfaced to the caller.
    let assigned = total_clusters * size;
    if assigned < total_shards {
        return Err(AssignError::UnassignedShards {
            count: (total_shards - assigned) as usize,
            first: assigned,
        });
    }

    Ok(ShardDistribution {
        total_shards,
        shards_per_cluster: size,
        total_clusters,
        cluster_shards,
        remaining_shards: Vec::new(),
    })
}

/// Pick a group size that respects the provider's session-start limit
/// without letting the cluster count exceed [`MAX_CLUSTERS`].
pub fn optimal_shards_per_cluster(
    total_shards: u32,
    configured: u32,
    max_concurrency: u32,
) -> u32 {
    let mut size = configured.max(1);
    if max_concurrency > 0 {
        size = size.min(max_concurrency);
    }
    if total_shards.div_ceil(size) > MAX_CLUSTERS {
        size = total_shards.div_ceil(MAX_CLUSTERS);
    }
    size
}

/// Recompute a distribution for a new shard total, keeping the old
/// group size policy. Informational only: logs the resulting diff and
/// performs no mutation — reconciliation is the manager's job.
pub fn rebalance_distribution(
    old: &ShardDistribution,
    new_total_shards: u32,
) -> AssignResult<ShardDistribution> {
    let new = calculate_distribution(new_total_shards, old.shards_per_cluster, None)?;
    let diff = diff_distributions(old, &new);
    info!(
        old_total = old.total_shards,
        new_total = new_total_shards,
        added = diff.added.len(),
        removed = diff.removed.len(),
        modified = diff.modified.len(),
        "rebalance computed"
    );
    Ok(new)
}

/// Diff two distributions by cluster id.
pub fn diff_distributions(
    old: &ShardDistribution,
    new: &ShardDistribution,
) -> DistributionDiff {
    let mut diff = DistributionDiff::default();

    for (&id, shards) in &new.cluster_shards {
        match old.cluster_shards.get(&id) {
            None => diff.added.push(id),
            Some(old_shards) if old_shards != shards => diff.modified.push(id),
            Some(_) => {}
        }
    }
    for &id in old.cluster_shards.keys() {
        if !new.cluster_shards.contains_key(&id) {
            diff.removed.push(id);
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::validate_distribution;

    #[test]
    fn ten_shards_groups_of_four() {
        let dist = calculate_distribution(10, 4, None).unwrap();
        assert_eq!(dist.total_clusters, 3);
        assert_eq!(dist.shards_for(0).unwrap(), &[0, 1, 2, 3]);
        assert_eq!(dist.shards_for(1).unwrap(), &[4, 5, 6, 7]);
        assert_eq!(dist.shards_for(2).unwrap(), &[8, 9]);
        assert!(dist.remaining_shards.is_empty());
    }

    #[test]
    fn group_size_larger_than_total() {
        let dist = calculate_distribution(5, 16, None).unwrap();
        assert_eq!(dist.total_clusters, 1);
        assert_eq!(dist.shards_for(0).unwrap(), &[0, 1, 2, 3, 4]);
        assert!(dist.remaining_shards.is_empty());
    }

    #[test]
    fn cluster_count_matches_ceiling() {
        for total in 1..=64 {
            for size in 1..=20 {
                let dist = calculate_distribution(total, size, None).unwrap();
                assert_eq!(dist.total_clusters, total.div_ceil(dist.shards_per_cluster));
                assert!(validate_distribution(&dist), "total={total} size={size}");
            }
        }
    }

    #[test]
    fn zero_inputs_rejected() {
        assert!(matches!(
            calculate_distribution(0, 4, None),
            Err(AssignError::InvalidShardCount(0))
        ));
        assert!(matches!(
            calculate_distribution(4, 0, None),
            Err(AssignError::InvalidGroupSize(0))
        ));
    }

    #[test]
    fn concurrency_limit_clamps_group_size() {
        let dist = calculate_distribution(32, 16, Some(8)).unwrap();
        assert_eq!(dist.shards_per_cluster, 8);
        assert_eq!(dist.total_clusters, 4);
        assert!(validate_distribution(&dist));
    }

    #[test]
    fn optimal_size_respects_cluster_ceiling() {
        let size = optimal_shards_per_cluster(200, 16, 16);
        assert!(200u32.div_ceil(size) <= MAX_CLUSTERS);
        assert_eq!(size, 20);
    }

    #[test]
    fn optimal_size_clamps_to_concurrency() {
        assert_eq!(optimal_shards_per_cluster(32, 16, 4), 4);
    }

    #[test]
    fn optimal_size_keeps_configured_when_fine() {
        assert_eq!(optimal_shards_per_cluster(48, 16, 16), 16);
    }

    #[test]
    fn rebalance_keeps_unchanged_clusters() {
        let old = calculate_distribution(48, 16, None).unwrap();
        assert_eq!(old.total_clusters, 3);

        let new = rebalance_distribution(&old, 64).unwrap();
        assert_eq!(new.total_clusters, 4);
        for id in 0..3 {
            assert_eq!(old.shards_for(id), new.shards_for(id));
        }
        assert_eq!(new.shards_for(3).unwrap(), (48..64).collect::<Vec<u32>>().as_slice());
    }

    #[test]
    fn diff_classifies_changes() {
        let old = calculate_distribution(48, 16, None).unwrap();
        let new = calculate_distribution(64, 16, None).unwrap();
        let diff = diff_distributions(&old, &new);
        assert_eq!(diff.added, vec![3]);
        assert!(diff.removed.is_empty());
        assert!(diff.modified.is_empty());

        let shrunk = calculate_distribution(40, 16, None).unwrap();
        let diff = diff_distributions(&old, &shrunk);
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        // Cluster 2 drops from [32..48) to [32..40).
        assert_eq!(diff.modified, vec![2]);
    }

    #[test]
    fn diff_empty_for_identical() {
        let a = calculate_distribution(48, 16, None).unwrap();
        let b = calculate_distribution(48, 16, None).unwrap();
        assert!(diff_distributions(&a, &b).is_empty());
    }
}
