//! Replica placement across the cluster.
//!
//! A [`PartitionDistributor`] maps `{members, partition ids, replication
//! factor}` to one [`PartitionMetadata`] per partition: which nodes hold a
//! replica, which election priority each replica gets, and which node is the
//! primary. The computation is pure, synchronous, and reentrant: safe to
//! call from any thread, no hidden global instance; callers pass the strategy
//! value explicitly.
//!
//! The provided [`RoundRobinDistributor`] rotates a sorted member list, so
//! every node computing a distribution from the same membership arrives at
//! the same answer without coordination.

use std::collections::HashMap;

use super::metadata::{NodeId, PartitionId, PartitionMetadata};

/// Strategy for assigning partition replicas to cluster members.
pub trait PartitionDistributor: Send + Sync {
    /// Compute one metadata entry per partition id.
    ///
    /// Guarantees for non-empty `members`:
    /// - every id in `partition_ids` appears exactly once in the result
    /// - each partition's member set has size
    ///   `min(replication_factor, members.len())`
    /// - the priority mapping of each partition is injective and its primary
    ///   holds the maximum priority
    ///
    /// `members` must be non-empty; callers guard this (the group
    /// constructor validates membership before distributing).
    fn distribute(
        &self,
        members: &[NodeId],
        partition_ids: &[PartitionId],
        replication_factor: u32,
    ) -> Vec<PartitionMetadata>;
}

/// Round-robin placement over the sorted member list.
///
/// Partition at position `i` of the sorted id list takes members
/// `sorted[(i + j) % L]` for `j in 0..count`, with `sorted[i % L]` as the
/// primary at priority `R`.
///
/// Secondary priorities alternate direction between rotation windows: in
/// even windows (`(i / L) % 2 == 0`) the members following the primary get
/// strictly decreasing priorities starting at `R - 1`; in odd windows they
/// get ascending priorities starting at `1`. Without the alternation, the
/// member immediately after each primary would hold the second-highest
/// priority for every partition in the range and inherit all of its
/// neighbour's leaderships on failover; alternating spreads that
/// likely-next-leader load across all non-primary members.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinDistributor;

impl PartitionDistributor for RoundRobinDistributor {
    fn distribute(
        &self,
        members: &[NodeId],
        partition_ids: &[PartitionId],
        replication_factor: u32,
    ) -> Vec<PartitionMetadata> {
        debug_assert!(!members.is_empty(), "caller must guard empty membership");
        debug_assert!(replication_factor >= 1, "caller must guard a zero factor");

        let mut sorted: Vec<NodeId> = members.to_vec();
        sorted.sort();

        let cluster_size = sorted.len();
        let count = (replication_factor as usize).min(cluster_size);

        partition_ids
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let mut replica_members = Vec::with_capacity(count);
                let mut priorities = HashMap::with_capacity(count);

                let primary = sorted[index % cluster_size].clone();
                replica_members.push(primary.clone());
                priorities.insert(primary.clone(), replication_factor);

                let ascending = (index / cluster_size) % 2 == 1;
                for j in 1..count {
                    let member = sorted[(index + j) % cluster_size].clone();
                    let priority = if ascending {
                        j as u32
                    } else {
                        replication_factor - j as u32
                    };
                    priorities.insert(member.clone(), priority);
                    replica_members.push(member);
                }

                PartitionMetadata::new(id.clone(), replica_members, priorities, primary)
            })
            .collect()
    }
}
