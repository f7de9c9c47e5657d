//! Collaborator traits for the partition management layer.
//!
//! These traits abstract the external systems this layer drives but does not
//! implement:
//!
//! - [`RaftHandle`] / [`RaftHandleFactory`]: the consensus group of one
//!   partition, consumed as an opaque start/stop/snapshot surface
//! - [`SnapshotStore`] / [`SnapshotReader`]: point-in-time state snapshots
//!   produced by the storage layer
//! - [`ConfigurationManager`]: durable partition configuration records
//! - [`PartitionInstaller`]: materializes a partition-management unit after
//!   an accepted invitation
//!
//! Keeping these surfaces narrow is what makes the layer testable: the mock
//! implementations in [`super::mock`] stand in for all of them.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::config::PartitionGroupConfig;
use super::error::ClusterResult;
use super::metadata::{NodeId, PartitionMetadata};

// =============================================================================
// Consensus handle
// =============================================================================

/// Role of a replica within its consensus group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaftRole {
    Leader,
    Follower,
    Candidate,
    Inactive,
}

/// Token identifying a registered listener so it can be removed again.
///
/// Listeners are closures and have no identity of their own; registration
/// hands out a token instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Callback invoked when a replica's role or term changes.
pub type RoleChangeListener = Arc<dyn Fn(RaftRole, u64) + Send + Sync>;

/// Callback invoked when a partition fails; may complete asynchronously.
pub type FailureListener = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// The narrow surface of one partition's consensus group.
///
/// Everything returns an async completion; this layer never blocks on
/// consensus progress. Role-change listener registration is part of the
/// surface because listeners registered on a partition before its handle
/// exists are flushed onto the handle at creation time.
#[async_trait]
pub trait RaftHandle: Send + Sync {
    /// Start the replica. Resolves when the replica is running.
    async fn start(&self) -> ClusterResult<()>;

    /// Stop the replica.
    async fn stop(&self) -> ClusterResult<()>;

    /// Ask the leader to yield leadership.
    async fn step_down(&self) -> ClusterResult<()>;

    /// Transition the replica to inactive; it stops participating in
    /// elections but keeps its state.
    async fn go_inactive(&self) -> ClusterResult<()>;

    /// Current consensus term.
    fn term(&self) -> u64;

    /// Current role of this replica.
    fn role(&self) -> RaftRole;

    /// Trigger an out-of-band snapshot of the replica's state machine.
    async fn take_snapshot(&self) -> ClusterResult<()>;

    /// Register a role-change listener.
    fn add_role_change_listener(&self, id: ListenerId, listener: RoleChangeListener);

    /// Remove a previously registered role-change listener.
    fn remove_role_change_listener(&self, id: ListenerId);
}

/// Creates consensus handles bound to a partition's storage directory.
///
/// This is the seam between the lifecycle layer and the consensus
/// implementation: `Partition::open` asks the factory for a handle only when
/// the local node is among the partition's members.
#[async_trait]
pub trait RaftHandleFactory: Send + Sync {
    async fn create(
        &self,
        metadata: &PartitionMetadata,
        data_dir: &Path,
        config: &PartitionGroupConfig,
    ) -> ClusterResult<Arc<dyn RaftHandle>>;
}

// =============================================================================
// Snapshot store
// =============================================================================

/// Descriptor of one point-in-time state snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMetadata {
    /// Unique name within the partition's store.
    pub name: String,
    /// Log position the snapshot was taken at.
    pub log_position: i64,
    /// Total byte length.
    pub length: u64,
    /// Opaque checksum as produced by the storage layer.
    pub checksum: Bytes,
    /// Whether this snapshot may be served to a lagging replica. Snapshots
    /// still being written, or superseded ones pending deletion, are not.
    pub replicable: bool,
}

/// Open handle onto one snapshot's bytes.
///
/// Reads are synchronous blocking I/O by design: the request handler serves
/// one chunk at a time on its own task and bounds each read by its buffer
/// capacity.
pub trait SnapshotReader: Send {
    /// Total size of the snapshot in bytes.
    fn size(&self) -> u64;

    /// Open the snapshot's byte stream from the beginning.
    fn data(&self) -> io::Result<Box<dyn io::Read + Send>>;
}

/// Per-partition store of state snapshots, owned by the storage layer.
pub trait SnapshotStore: Send + Sync {
    /// Enumerate all snapshots, replicable or not.
    fn list_snapshots(&self) -> ClusterResult<Vec<SnapshotMetadata>>;

    /// Look up the latest snapshot with the given name, if any.
    fn latest_snapshot(&self, name: &str) -> ClusterResult<Option<Box<dyn SnapshotReader>>>;
}

// =============================================================================
// Configuration manager
// =============================================================================

/// Durable configuration record of one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionConfiguration {
    partition_id: i32,
    replication_factor: i32,
    members: Vec<NodeId>,
}

impl PartitionConfiguration {
    pub fn new(partition_id: i32, replication_factor: i32, members: Vec<NodeId>) -> Self {
        Self {
            partition_id,
            replication_factor,
            members,
        }
    }

    #[inline]
    pub fn partition_id(&self) -> i32 {
        self.partition_id
    }

    #[inline]
    pub fn replication_factor(&self) -> i32 {
        self.replication_factor
    }

    #[inline]
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }
}

/// Outcome of a configuration creation attempt.
///
/// "Already exists" is an expected, successful outcome (invitations are
/// retried by the inviter and must be idempotent on the receiving side), so
/// it is part of the result type rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The configuration was created by this call.
    Created(PartitionConfiguration),
    /// A configuration for this partition already existed.
    AlreadyExists(PartitionConfiguration),
}

impl CreateOutcome {
    /// The configuration, whether freshly created or pre-existing.
    pub fn configuration(&self) -> &PartitionConfiguration {
        match self {
            CreateOutcome::Created(c) | CreateOutcome::AlreadyExists(c) => c,
        }
    }
}

/// Durable store of partition configurations, keyed by partition id.
#[async_trait]
pub trait ConfigurationManager: Send + Sync {
    /// Create the configuration for a partition, or report the existing one.
    async fn create_configuration(
        &self,
        partition_id: i32,
        replication_factor: i32,
        members: Vec<NodeId>,
    ) -> ClusterResult<CreateOutcome>;
}

// =============================================================================
// Partition installer
// =============================================================================

/// Installs the partition-management unit for a newly configured partition.
///
/// Invoked after an invitation's configuration has been created; binds the
/// partition to a transport client and starts replication. Failures here are
/// logged by the handler but never negatively acked; the inviter retries.
#[async_trait]
pub trait PartitionInstaller: Send + Sync {
    async fn install(&self, configuration: PartitionConfiguration) -> ClusterResult<()>;
}
