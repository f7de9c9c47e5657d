//! Partition distribution, lifecycle, and management request handling.
//!
//! This module is the cluster-facing half of the crate:
//!
//! ```text
//!                 ┌───────────────────┐
//!                 │  PartitionGroup   │  builds partitions, computes the
//!                 └────────┬──────────┘  distribution, fans out join/close
//!                          │
//!          ┌───────────────┼────────────────┐
//!          ▼               ▼                ▼
//!    ┌───────────┐   ┌───────────┐    ┌───────────┐
//!    │ Partition │   │ Partition │    │ Partition │   one consensus handle
//!    └───────────┘   └───────────┘    └───────────┘   each, if local
//!
//!    ┌────────────────────────┐   ┌──────────────────────────┐
//!    │ RoundRobinDistributor  │   │ ManagementRequestHandler │
//!    │ (pure placement)       │   │ (invitations, snapshot   │
//!    └────────────────────────┘   │  listing, chunked fetch) │
//!                                 └──────────────────────────┘
//! ```
//!
//! The consensus algorithm, the snapshot storage engine, and the durable
//! configuration store are external collaborators consumed through the
//! traits in [`traits`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use raftshard::cluster::{
//!     NodeId, PartitionGroup, PartitionGroupConfig, RoundRobinDistributor,
//! };
//! # use raftshard::cluster::RaftHandleFactory;
//!
//! # async fn example(factory: Arc<dyn RaftHandleFactory>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = PartitionGroupConfig::from_env()?;
//! let members = vec![NodeId::from("node-0"), NodeId::from("node-1")];
//! let group = PartitionGroup::new(
//!     config,
//!     members,
//!     NodeId::from("node-0"),
//!     &RoundRobinDistributor,
//!     factory,
//! )?;
//! group.join().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod distributor;
mod error;
mod group;
mod handler;
mod metadata;
mod partition;
mod traits;

#[cfg(any(test, feature = "test-utilities"))]
pub mod mock;

pub use config::PartitionGroupConfig;
pub use distributor::{PartitionDistributor, RoundRobinDistributor};
pub use error::{ClusterError, ClusterResult};
pub use group::PartitionGroup;
pub use handler::{ManagementRequestHandler, TrackedPartitions};
pub use metadata::{NodeId, PartitionId, PartitionMetadata};
pub use partition::{ClusterServices, Partition, PartitionLifecycle};
pub use traits::{
    ConfigurationManager, CreateOutcome, FailureListener, ListenerId, PartitionConfiguration,
    PartitionInstaller, RaftHandle, RaftHandleFactory, RaftRole, RoleChangeListener,
    SnapshotMetadata, SnapshotReader, SnapshotStore,
};
