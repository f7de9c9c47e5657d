//! Request message parsing and encoding.

use bytes::BufMut;
use nom::{
    IResult,
    number::complete::{be_i32, be_i64},
};
use nombytes::NomBytes;

use crate::encode::{ToByte, encode_group};
use crate::error::Result;
use crate::parser::{bytes_to_string, parse_group, parse_string};

use super::{
    MessageHeader, TEMPLATE_CREATE_PARTITION_REQUEST, TEMPLATE_FETCH_SNAPSHOT_CHUNK_REQUEST,
    TEMPLATE_INVITATION_REQUEST, TEMPLATE_LIST_SNAPSHOTS_REQUEST, WireMessage, skip_block_padding,
};

/// The request kinds a management server dispatches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementRequest {
    Invitation(InvitationRequest),
    CreatePartition(CreatePartitionRequest),
    ListSnapshots(ListSnapshotsRequest),
    FetchSnapshotChunk(FetchSnapshotChunkRequest),
}

impl ManagementRequest {
    /// Partition addressed by the request.
    pub fn partition_id(&self) -> i32 {
        match self {
            ManagementRequest::Invitation(r) => r.partition_id,
            ManagementRequest::CreatePartition(r) => r.partition_id,
            ManagementRequest::ListSnapshots(r) => r.partition_id,
            ManagementRequest::FetchSnapshotChunk(r) => r.partition_id,
        }
    }
}

// =============================================================================
// InvitationRequest
// =============================================================================

/// Network address of a replica member, carried in invitation requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEndpoint {
    pub host: String,
    pub port: i32,
}

impl MemberEndpoint {
    fn parse(s: NomBytes) -> IResult<NomBytes, MemberEndpoint> {
        let (s, host) = parse_string(s)?;
        let host = bytes_to_string(&host)?;
        let (s, port) = be_i32(s)?;
        Ok((s, MemberEndpoint { host, port }))
    }

    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        self.host.encode(buffer)?;
        self.port.encode(buffer)
    }
}

/// Asks the receiving node to materialize a partition replica and join its
/// consensus group.
///
/// Wire order: fixed block (partition_id, replication_factor, term), then the
/// members group, then the trailing topic name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationRequest {
    pub partition_id: i32,
    pub replication_factor: i32,
    pub term: i32,
    pub members: Vec<MemberEndpoint>,
    pub topic: String,
}

impl WireMessage for InvitationRequest {
    const TEMPLATE_ID: u16 = TEMPLATE_INVITATION_REQUEST;
    const BLOCK_LENGTH: u16 = 12;

    fn encode_body<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        self.partition_id.encode(buffer)?;
        self.replication_factor.encode(buffer)?;
        self.term.encode(buffer)?;
        encode_group(buffer, &self.members, |b, m| m.encode(b))?;
        self.topic.encode(buffer)
    }

    fn parse_body(s: NomBytes, header: &MessageHeader) -> IResult<NomBytes, Self> {
        let (s, partition_id) = be_i32(s)?;
        let (s, replication_factor) = be_i32(s)?;
        let (s, term) = be_i32(s)?;
        let (s, ()) = skip_block_padding(s, header, Self::BLOCK_LENGTH)?;
        let (s, members) = parse_group(MemberEndpoint::parse)(s)?;
        let (s, topic) = parse_string(s)?;
        let topic = bytes_to_string(&topic)?;
        Ok((
            s,
            InvitationRequest {
                partition_id,
                replication_factor,
                term,
                members,
                topic,
            },
        ))
    }
}

// =============================================================================
// CreatePartitionRequest
// =============================================================================

/// Asks the receiving node to materialize a partition locally without the
/// surrounding invitation handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePartitionRequest {
    pub partition_id: i32,
    pub replication_factor: i32,
    pub topic: String,
}

impl WireMessage for CreatePartitionRequest {
    const TEMPLATE_ID: u16 = TEMPLATE_CREATE_PARTITION_REQUEST;
    const BLOCK_LENGTH: u16 = 8;

    fn encode_body<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        self.partition_id.encode(buffer)?;
        self.replication_factor.encode(buffer)?;
        self.topic.encode(buffer)
    }

    fn parse_body(s: NomBytes, header: &MessageHeader) -> IResult<NomBytes, Self> {
        let (s, partition_id) = be_i32(s)?;
        let (s, replication_factor) = be_i32(s)?;
        let (s, ()) = skip_block_padding(s, header, Self::BLOCK_LENGTH)?;
        let (s, topic) = parse_string(s)?;
        let topic = bytes_to_string(&topic)?;
        Ok((
            s,
            CreatePartitionRequest {
                partition_id,
                replication_factor,
                topic,
            },
        ))
    }
}

// =============================================================================
// ListSnapshotsRequest
// =============================================================================

/// Asks for the replicable snapshots of one tracked partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListSnapshotsRequest {
    pub partition_id: i32,
}

impl WireMessage for ListSnapshotsRequest {
    const TEMPLATE_ID: u16 = TEMPLATE_LIST_SNAPSHOTS_REQUEST;
    const BLOCK_LENGTH: u16 = 4;

    fn encode_body<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        self.partition_id.encode(buffer)
    }

    fn parse_body(s: NomBytes, header: &MessageHeader) -> IResult<NomBytes, Self> {
        let (s, partition_id) = be_i32(s)?;
        let (s, ()) = skip_block_padding(s, header, Self::BLOCK_LENGTH)?;
        Ok((s, ListSnapshotsRequest { partition_id }))
    }
}

// =============================================================================
// FetchSnapshotChunkRequest
// =============================================================================

/// Asks for one bounded slice of a named snapshot.
///
/// Wire order: fixed block (partition_id, log_position, chunk_offset,
/// chunk_length), then the trailing snapshot name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSnapshotChunkRequest {
    pub partition_id: i32,
    pub name: String,
    pub log_position: i64,
    pub chunk_offset: i64,
    pub chunk_length: i64,
}

impl WireMessage for FetchSnapshotChunkRequest {
    const TEMPLATE_ID: u16 = TEMPLATE_FETCH_SNAPSHOT_CHUNK_REQUEST;
    const BLOCK_LENGTH: u16 = 28;

    fn encode_body<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        self.partition_id.encode(buffer)?;
        self.log_position.encode(buffer)?;
        self.chunk_offset.encode(buffer)?;
        self.chunk_length.encode(buffer)?;
        self.name.encode(buffer)
    }

    fn parse_body(s: NomBytes, header: &MessageHeader) -> IResult<NomBytes, Self> {
        let (s, partition_id) = be_i32(s)?;
        let (s, log_position) = be_i64(s)?;
        let (s, chunk_offset) = be_i64(s)?;
        let (s, chunk_length) = be_i64(s)?;
        let (s, ()) = skip_block_padding(s, header, Self::BLOCK_LENGTH)?;
        let (s, name) = parse_string(s)?;
        let name = bytes_to_string(&name)?;
        Ok((
            s,
            FetchSnapshotChunkRequest {
                partition_id,
                name,
                log_position,
                chunk_offset,
                chunk_length,
            },
        ))
    }
}
