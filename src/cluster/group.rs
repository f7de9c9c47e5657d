//! Cluster-wide partition orchestration.
//!
//! A [`PartitionGroup`] is the single entry point for "start all partitions
//! this node might own" and "stop all partitions". Construction builds the
//! full partition list from configuration, computes the cluster-wide
//! distribution once via the configured [`PartitionDistributor`], and pushes
//! each resulting metadata into its partition on join.
//!
//! # Failure semantics
//!
//! Partition open and close failures are per-partition: a failing partition
//! never aborts its siblings. `join` awaits every open and reports the first
//! failure only after all of them have run; `close` always completes,
//! logging individual failures.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use super::config::PartitionGroupConfig;
use super::distributor::PartitionDistributor;
use super::error::{ClusterError, ClusterResult};
use super::metadata::{NodeId, PartitionId, PartitionMetadata};
use super::partition::{ClusterServices, Partition};
use super::traits::RaftHandleFactory;

/// Owns every partition of one named group.
///
/// Invariant: the sorted id sequence, the partition map's key set, and the
/// metadata collection's id set are all equal, for the group's lifetime.
pub struct PartitionGroup {
    config: PartitionGroupConfig,
    partitions: BTreeMap<PartitionId, Arc<Partition>>,
    sorted_ids: Vec<PartitionId>,
    metadata: Vec<PartitionMetadata>,
    services: ClusterServices,
}

impl PartitionGroup {
    /// Build the group's partitions and compute their distribution.
    ///
    /// Partition ids are 1-based; partition `i` stores its state under
    /// `<data-dir>/<group>/partitions/<i>`. The distribution is computed
    /// here, once; a membership change requires constructing a new group.
    pub fn new(
        config: PartitionGroupConfig,
        members: Vec<NodeId>,
        local_node: NodeId,
        distributor: &dyn PartitionDistributor,
        handle_factory: Arc<dyn RaftHandleFactory>,
    ) -> ClusterResult<Self> {
        config.validate()?;
        if members.is_empty() {
            return Err(ClusterError::Config(
                "cannot distribute partitions over an empty member set".into(),
            ));
        }

        let group_name: Arc<str> = Arc::from(config.group_name.as_str());
        let sorted_ids: Vec<PartitionId> = (1..=config.partition_count as i32)
            .map(|index| PartitionId::new(group_name.clone(), index))
            .collect();

        let metadata = distributor.distribute(&members, &sorted_ids, config.replication_factor);
        debug_assert_eq!(metadata.len(), sorted_ids.len());

        let partitions: BTreeMap<PartitionId, Arc<Partition>> = sorted_ids
            .iter()
            .map(|id| {
                let data_dir = config.partition_data_dir(id.index());
                (id.clone(), Arc::new(Partition::new(id.clone(), data_dir)))
            })
            .collect();

        info!(
            group = %config.group_name,
            partitions = sorted_ids.len(),
            members = members.len(),
            replication_factor = config.replication_factor,
            "partition group constructed"
        );

        let services = ClusterServices {
            local_node,
            handle_factory,
            config: config.clone(),
        };

        Ok(Self {
            config,
            partitions,
            sorted_ids,
            metadata,
            services,
        })
    }

    /// Open every partition this node might own, concurrently.
    ///
    /// The returned future completes when all opens have completed. Each
    /// partition's open runs independently; the first failure's error is
    /// propagated as the overall error only after every open has had its
    /// chance to run.
    pub async fn join(&self) -> ClusterResult<()> {
        let opens = self.metadata.iter().map(|md| {
            let partition = self
                .partitions
                .get(md.id())
                .expect("metadata id without partition entry")
                .clone();
            let metadata = md.clone();
            let services = self.services.clone();
            async move { partition.open(metadata, &services).await }
        });

        let results = join_all(opens).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(
                group = %self.config.group_name,
                failed,
                total = results.len(),
                "some partitions failed to open"
            );
        }
        results.into_iter().collect()
    }

    /// Close every partition, concurrently.
    ///
    /// Individual close failures are swallowed inside `Partition::close`;
    /// the group-wide close always completes.
    pub async fn close(&self) {
        let closes = self
            .partitions
            .values()
            .map(|partition| {
                let partition = partition.clone();
                async move { partition.close().await }
            })
            .collect::<Vec<_>>();
        join_all(closes).await;
        info!(group = %self.config.group_name, "partition group closed");
    }

    #[inline]
    pub fn config(&self) -> &PartitionGroupConfig {
        &self.config
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.config.group_name
    }

    /// Partition ids in their stable sorted order.
    #[inline]
    pub fn sorted_partition_ids(&self) -> &[PartitionId] {
        &self.sorted_ids
    }

    /// The distribution computed at construction.
    #[inline]
    pub fn metadata(&self) -> &[PartitionMetadata] {
        &self.metadata
    }

    /// One partition by id.
    pub fn partition(&self, id: &PartitionId) -> Option<&Arc<Partition>> {
        self.partitions.get(id)
    }

    /// All partitions in id order.
    pub fn partitions(&self) -> impl Iterator<Item = &Arc<Partition>> {
        self.partitions.values()
    }

    /// Ids of the partitions this node holds a replica of.
    pub fn local_partition_ids(&self) -> Vec<PartitionId> {
        self.metadata
            .iter()
            .filter(|md| md.is_member(&self.services.local_node))
            .map(|md| md.id().clone())
            .collect()
    }
}

impl std::fmt::Debug for PartitionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionGroup")
            .field("name", &self.config.group_name)
            .field("partitions", &self.sorted_ids.len())
            .finish()
    }
}
