//! Server-side dispatcher for the management protocol.
//!
//! [`ManagementRequestHandler`] decodes an inbound frame, dispatches on its
//! template id, and always produces a valid response frame, an error
//! response at worst. Nothing that happens while serving a request is
//! allowed to propagate and take down the handling loop: decode failures,
//! missing partitions, bad parameters, and I/O errors all come back as
//! message-level error codes.
//!
//! # Request kinds
//!
//! - **Invitation / CreatePartition**: create the partition's durable
//!   configuration (idempotent: an existing configuration is success, not
//!   failure) and install the partition-management unit; respond with an
//!   empty acknowledgement regardless of installation outcome. The inviter's
//!   timeout-and-retry is the only failure signal it gets.
//! - **ListSnapshots**: enumerate the replicable snapshots of one tracked
//!   partition.
//! - **FetchSnapshotChunk**: serve one bounded slice of a named snapshot
//!   through the handler's reusable read buffer.
//!
//! # Threading
//!
//! A handler instance is deliberately **not thread-safe**: it reuses a single
//! read buffer across requests and takes `&mut self`. Run one instance per
//! serving task; concurrent requests are serialized at the task level, not
//! parallelized. The tracked-partitions map is externally owned and safe for
//! concurrent lookup; the handler only reads it.

use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::error::ErrorCode;
use crate::protocol::{
    CreatePartitionRequest, ErrorResponse, FetchSnapshotChunkRequest, FetchSnapshotChunkResponse,
    InvitationRequest, InvitationResponse, ListSnapshotsRequest, ListSnapshotsResponse,
    ManagementRequest, SnapshotEntry, WireMessage, decode_request, encode_frame,
};

use super::metadata::NodeId;
use super::traits::{ConfigurationManager, CreateOutcome, PartitionInstaller, SnapshotStore};

/// Partitions this node serves snapshots for, keyed by partition id.
///
/// Externally owned: populated by whoever installs partitions, consulted by
/// the handler. `DashMap` keeps lookups safe while the map is concurrently
/// populated elsewhere.
pub type TrackedPartitions = Arc<DashMap<i32, Arc<dyn SnapshotStore>>>;

/// Server-side dispatcher for management requests.
pub struct ManagementRequestHandler {
    tracked_partitions: TrackedPartitions,
    configuration_manager: Arc<dyn ConfigurationManager>,
    installer: Arc<dyn PartitionInstaller>,
    /// Reusable bounded buffer for snapshot chunk reads. Its capacity caps
    /// the size of a single served chunk.
    read_buffer: Vec<u8>,
}

impl ManagementRequestHandler {
    pub fn new(
        tracked_partitions: TrackedPartitions,
        configuration_manager: Arc<dyn ConfigurationManager>,
        installer: Arc<dyn PartitionInstaller>,
        read_buffer_capacity: usize,
    ) -> Self {
        Self {
            tracked_partitions,
            configuration_manager,
            installer,
            read_buffer: vec![0; read_buffer_capacity],
        }
    }

    /// Handle one inbound frame, producing the response frame.
    pub async fn handle(&mut self, frame: Bytes) -> Bytes {
        let request = match decode_request(frame) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "failed to decode management request");
                return error_frame(ErrorCode::InvalidParameters, e.to_string());
            }
        };

        match request {
            ManagementRequest::Invitation(request) => self.on_invitation(request).await,
            ManagementRequest::CreatePartition(request) => self.on_create_partition(request).await,
            ManagementRequest::ListSnapshots(request) => self.on_list_snapshots(request),
            ManagementRequest::FetchSnapshotChunk(request) => self.on_fetch_chunk(request),
        }
    }

    // =========================================================================
    // Invitation / CreatePartition
    // =========================================================================

    async fn on_invitation(&self, request: InvitationRequest) -> Bytes {
        debug!(
            partition = request.partition_id,
            term = request.term,
            members = request.members.len(),
            topic = %request.topic,
            "invitation received"
        );

        let members: Vec<NodeId> = request
            .members
            .iter()
            .map(|m| NodeId::from(format!("{}:{}", m.host, m.port)))
            .collect();

        self.create_and_install(request.partition_id, request.replication_factor, members)
            .await;

        // Fire-and-forget from the handler's perspective: the response is
        // always the empty acknowledgement, the inviter retries on timeout.
        response_frame(&InvitationResponse { term: request.term })
    }

    async fn on_create_partition(&self, request: CreatePartitionRequest) -> Bytes {
        debug!(
            partition = request.partition_id,
            topic = %request.topic,
            "create-partition received"
        );
        self.create_and_install(request.partition_id, request.replication_factor, Vec::new())
            .await;
        response_frame(&InvitationResponse { term: 0 })
    }

    async fn create_and_install(
        &self,
        partition_id: i32,
        replication_factor: i32,
        members: Vec<NodeId>,
    ) {
        let configuration = match self
            .configuration_manager
            .create_configuration(partition_id, replication_factor, members)
            .await
        {
            Ok(CreateOutcome::Created(configuration)) => {
                info!(partition = partition_id, "partition configuration created");
                configuration
            }
            Ok(CreateOutcome::AlreadyExists(configuration)) => {
                debug!(
                    partition = partition_id,
                    "partition configuration already exists"
                );
                configuration
            }
            Err(e) => {
                warn!(
                    partition = partition_id,
                    error = %e,
                    "failed to create partition configuration"
                );
                return;
            }
        };

        if let Err(e) = self.installer.install(configuration).await {
            warn!(
                partition = partition_id,
                error = %e,
                "partition installation failed"
            );
        }
    }

    // =========================================================================
    // ListSnapshots
    // =========================================================================

    fn on_list_snapshots(&self, request: ListSnapshotsRequest) -> Bytes {
        let Some(store) = self.lookup_partition(request.partition_id) else {
            return partition_not_found(request.partition_id);
        };

        let snapshots = match store.list_snapshots() {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(
                    partition = request.partition_id,
                    error = %e,
                    "failed to list snapshots"
                );
                return error_frame(e.to_error_code(), e.to_string());
            }
        };

        let entries: Vec<SnapshotEntry> = snapshots
            .into_iter()
            .filter(|s| s.replicable)
            .map(|s| SnapshotEntry {
                name: s.name,
                log_position: s.log_position,
                length: s.length as i64,
                checksum: s.checksum,
            })
            .collect();

        debug!(
            partition = request.partition_id,
            count = entries.len(),
            "listed replicable snapshots"
        );
        response_frame(&ListSnapshotsResponse { snapshots: entries })
    }

    // =========================================================================
    // FetchSnapshotChunk
    // =========================================================================

    fn on_fetch_chunk(&mut self, request: FetchSnapshotChunkRequest) -> Bytes {
        let Some(store) = self.lookup_partition(request.partition_id) else {
            return partition_not_found(request.partition_id);
        };

        let reader = match store.latest_snapshot(&request.name) {
            Ok(Some(reader)) => reader,
            Ok(None) => {
                return error_frame(
                    ErrorCode::InvalidParameters,
                    format!("no snapshot found with name {}", request.name),
                );
            }
            Err(e) => return error_frame(e.to_error_code(), e.to_string()),
        };

        if request.chunk_offset < 0 {
            return error_frame(
                ErrorCode::InvalidParameters,
                format!("chunkOffset must be >= 0, got {}", request.chunk_offset),
            );
        }

        let capacity = self.read_buffer.len() as i64;
        let remaining = reader.size() as i64 - request.chunk_offset;
        let chunk_length = request.chunk_length.min(remaining).min(capacity);
        if chunk_length < 1 {
            return error_frame(
                ErrorCode::InvalidParameters,
                format!("chunkLength must be between 1 and {capacity}"),
            );
        }

        let mut stream = match reader.data() {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    partition = request.partition_id,
                    snapshot = %request.name,
                    error = %e,
                    "failed to open snapshot stream"
                );
                return error_frame(ErrorCode::ReadError, e.to_string());
            }
        };

        // Skip to the requested offset. A shortfall means the snapshot is
        // smaller than its advertised size.
        let skipped = match std::io::copy(
            &mut stream.by_ref().take(request.chunk_offset as u64),
            &mut std::io::sink(),
        ) {
            Ok(skipped) => skipped,
            Err(e) => return error_frame(ErrorCode::ReadError, e.to_string()),
        };
        if skipped < request.chunk_offset as u64 {
            return error_frame(
                ErrorCode::ReadError,
                format!(
                    "could not seek to offset {} in snapshot {}",
                    request.chunk_offset, request.name
                ),
            );
        }

        let read = match stream.read(&mut self.read_buffer[..chunk_length as usize]) {
            Ok(read) => read,
            Err(e) => return error_frame(ErrorCode::ReadError, e.to_string()),
        };
        if read < 1 {
            return error_frame(
                ErrorCode::ReadError,
                format!("could not read snapshot {}", request.name),
            );
        }

        debug!(
            partition = request.partition_id,
            snapshot = %request.name,
            offset = request.chunk_offset,
            bytes = read,
            "served snapshot chunk"
        );
        response_frame(&FetchSnapshotChunkResponse {
            data: Bytes::copy_from_slice(&self.read_buffer[..read]),
        })
    }

    fn lookup_partition(&self, partition_id: i32) -> Option<Arc<dyn SnapshotStore>> {
        self.tracked_partitions
            .get(&partition_id)
            .map(|entry| entry.value().clone())
    }
}

impl std::fmt::Debug for ManagementRequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementRequestHandler")
            .field("tracked_partitions", &self.tracked_partitions.len())
            .field("read_buffer_capacity", &self.read_buffer.len())
            .finish()
    }
}

fn partition_not_found(partition_id: i32) -> Bytes {
    debug!(partition = partition_id, "partition not tracked");
    error_frame(
        ErrorCode::PartitionNotFound,
        format!("partition {partition_id} not tracked by this node"),
    )
}

fn error_frame(code: ErrorCode, message: String) -> Bytes {
    response_frame(&ErrorResponse { code, message })
}

fn response_frame<M: WireMessage>(message: &M) -> Bytes {
    // Encoding into a growable buffer has no failure path.
    encode_frame(message).expect("response encoding is infallible")
}
