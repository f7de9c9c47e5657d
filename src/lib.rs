//! # Raftshard
//! Partition management for a sharded, consensus-replicated log.
//!
//! This crate decides which nodes own which replica of which partition,
//! assigns election priorities among replicas, drives the per-partition
//! lifecycle, and speaks the binary management protocol used to bootstrap a
//! new replica: partition creation invitations, snapshot discovery, and
//! chunked snapshot transfer over a length-limited transport.
//!
//! # Goals
//! - Deterministic, coordination-free replica placement with fair failover
//! - Explicit lifecycle state machines; no failure path crashes the process
//! - A byte-compatible, forward-tolerant wire protocol with an explicit
//!   error taxonomy
//!
//! The consensus algorithm itself, the log storage engine, and the snapshot
//! store are external collaborators consumed through narrow traits; see
//! [`cluster::RaftHandle`], [`cluster::SnapshotStore`], and
//! [`cluster::ConfigurationManager`].
//!
//! ## Placing partitions
//!
//! ```rust
//! use raftshard::cluster::{NodeId, PartitionId, PartitionDistributor, RoundRobinDistributor};
//!
//! let members = vec![NodeId::from("a"), NodeId::from("b"), NodeId::from("c")];
//! let ids: Vec<_> = (1..=6).map(|i| PartitionId::new("orders", i)).collect();
//!
//! let distribution = RoundRobinDistributor.distribute(&members, &ids, 3);
//! for metadata in &distribution {
//!     println!(
//!         "{} -> primary {} ({} replicas)",
//!         metadata.id(),
//!         metadata.primary(),
//!         metadata.replica_count()
//!     );
//! }
//! ```
//!
//! ## Serving management requests
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dashmap::DashMap;
//! use raftshard::cluster::ManagementRequestHandler;
//! # use raftshard::cluster::{ConfigurationManager, PartitionInstaller};
//! use raftshard::constants::DEFAULT_SNAPSHOT_READ_BUFFER_CAPACITY;
//!
//! # async fn example(
//! #     configuration_manager: Arc<dyn ConfigurationManager>,
//! #     installer: Arc<dyn PartitionInstaller>,
//! #     frame: bytes::Bytes,
//! # ) {
//! let tracked = Arc::new(DashMap::new());
//! let mut handler = ManagementRequestHandler::new(
//!     tracked,
//!     configuration_manager,
//!     installer,
//!     DEFAULT_SNAPSHOT_READ_BUFFER_CAPACITY,
//! );
//! // One frame in, one frame out; errors come back as error response frames.
//! let response = handler.handle(frame).await;
//! # }
//! ```

pub mod cluster;
pub mod constants;
pub mod encode;
pub mod error;
pub mod parser;
pub mod protocol;
pub mod telemetry;

pub use error::{Error, ErrorCode, Result};

/// Commonly used types, re-exported for convenience.
pub mod prelude {
    pub use crate::cluster::{
        ManagementRequestHandler, NodeId, Partition, PartitionDistributor, PartitionGroup,
        PartitionGroupConfig, PartitionId, PartitionMetadata, RoundRobinDistributor,
    };
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::protocol::{
        ManagementRequest, ManagementResponse, decode_request, decode_response, encode_frame,
    };
}
