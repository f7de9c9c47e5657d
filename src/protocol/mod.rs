//! Management protocol codec layer.
//!
//! This module provides a unified trait for encoding/decoding the partition
//! management wire protocol. Each message kind implements [`WireMessage`] to
//! handle both body encoding and body parsing; framing and header handling
//! are shared.
//!
//! # Frame Layout
//!
//! ```text
//! [frame_length: i32]                          counts everything after itself
//! [block_length: u16] [template_id: u16]       message header
//! [schema_id: u16]    [version: u16]
//! [fixed block: block_length bytes]
//! [repeated groups / var-data]
//! ```
//!
//! All integers are big-endian. Variable-length fields always follow the
//! fixed block: repeated groups first, then trailing var-data.
//!
//! # Message Kinds
//!
//! | Message | Template |
//! |---------|----------|
//! | ErrorResponse | 0 |
//! | InvitationRequest | 1 |
//! | InvitationResponse | 2 |
//! | CreatePartitionRequest | 3 |
//! | ListSnapshotsRequest | 4 |
//! | ListSnapshotsResponse | 5 |
//! | FetchSnapshotChunkRequest | 6 |
//! | FetchSnapshotChunkResponse | 7 |
//!
//! # Compatibility
//!
//! Decoding rejects frames whose declared length does not match the bytes
//! actually available (no out-of-bounds reads, no sentinel scanning), and
//! rejects frames carrying a foreign schema id. Frames written by a *newer*
//! version of this schema are tolerated: the header's block length tells the
//! decoder how many fixed-block bytes the writer produced, and unknown
//! trailing block bytes are skipped.
//!
//! # Example
//!
//! ```rust
//! use raftshard::protocol::{ListSnapshotsRequest, encode_frame, decode_frame};
//!
//! let request = ListSnapshotsRequest { partition_id: 3 };
//! let frame = encode_frame(&request).unwrap();
//! let decoded: ListSnapshotsRequest = decode_frame(frame).unwrap();
//! assert_eq!(decoded, request);
//! ```

mod request;
mod response;

pub use request::{
    CreatePartitionRequest, FetchSnapshotChunkRequest, InvitationRequest, ListSnapshotsRequest,
    ManagementRequest, MemberEndpoint,
};
pub use response::{
    ErrorResponse, FetchSnapshotChunkResponse, InvitationResponse, ListSnapshotsResponse,
    ManagementResponse, SnapshotEntry,
};

use bytes::{BufMut, Bytes, BytesMut};
use nom::{IResult, number::complete::be_u16};
use nombytes::NomBytes;

use crate::constants::{
    FRAME_LENGTH_FIELD_SIZE, MANAGEMENT_SCHEMA_ID, MANAGEMENT_SCHEMA_VERSION, MESSAGE_HEADER_SIZE,
};
use crate::error::{Error, Result};
use crate::parser::skip_bytes;

// =============================================================================
// Template ids
// =============================================================================

pub const TEMPLATE_ERROR_RESPONSE: u16 = 0;
pub const TEMPLATE_INVITATION_REQUEST: u16 = 1;
pub const TEMPLATE_INVITATION_RESPONSE: u16 = 2;
pub const TEMPLATE_CREATE_PARTITION_REQUEST: u16 = 3;
pub const TEMPLATE_LIST_SNAPSHOTS_REQUEST: u16 = 4;
pub const TEMPLATE_LIST_SNAPSHOTS_RESPONSE: u16 = 5;
pub const TEMPLATE_FETCH_SNAPSHOT_CHUNK_REQUEST: u16 = 6;
pub const TEMPLATE_FETCH_SNAPSHOT_CHUNK_RESPONSE: u16 = 7;

// =============================================================================
// Message header
// =============================================================================

/// The fixed message header following the frame length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Byte length of the fixed block written by the encoder.
    pub block_length: u16,
    /// Which message kind the body carries.
    pub template_id: u16,
    /// Protocol schema; always [`MANAGEMENT_SCHEMA_ID`] for frames we emit.
    pub schema_id: u16,
    /// Schema version of the writer.
    pub version: u16,
}

impl MessageHeader {
    /// Header for an outgoing message of type `M` at the current version.
    pub fn for_message<M: WireMessage>() -> Self {
        MessageHeader {
            block_length: M::BLOCK_LENGTH,
            template_id: M::TEMPLATE_ID,
            schema_id: MANAGEMENT_SCHEMA_ID,
            version: MANAGEMENT_SCHEMA_VERSION,
        }
    }

    pub fn encode<B: BufMut>(&self, buffer: &mut B) {
        buffer.put_u16(self.block_length);
        buffer.put_u16(self.template_id);
        buffer.put_u16(self.schema_id);
        buffer.put_u16(self.version);
    }

    pub fn parse(s: NomBytes) -> IResult<NomBytes, MessageHeader> {
        let (s, block_length) = be_u16(s)?;
        let (s, template_id) = be_u16(s)?;
        let (s, schema_id) = be_u16(s)?;
        let (s, version) = be_u16(s)?;
        Ok((
            s,
            MessageHeader {
                block_length,
                template_id,
                schema_id,
                version,
            },
        ))
    }
}

// =============================================================================
// WireMessage
// =============================================================================

/// Trait implemented by every management protocol message.
///
/// Implementations encode and parse only their body; framing, header
/// encoding, schema validation, and forward-compatible block skipping are
/// handled by [`encode_frame`] and [`decode_frame`].
pub trait WireMessage: Sized {
    /// Template id distinguishing this message kind.
    const TEMPLATE_ID: u16;

    /// Byte length of the fixed block this version writes.
    const BLOCK_LENGTH: u16;

    /// Encode the message body (fixed block, then groups/var-data).
    fn encode_body<B: BufMut>(&self, buffer: &mut B) -> Result<()>;

    /// Parse the message body. `header` carries the writer's block length so
    /// the implementation can skip unknown trailing block bytes.
    fn parse_body(input: NomBytes, header: &MessageHeader) -> IResult<NomBytes, Self>;
}

/// Skip any fixed-block bytes a newer writer appended beyond what this
/// version knows about.
pub(crate) fn skip_block_padding(
    s: NomBytes,
    header: &MessageHeader,
    known_block_length: u16,
) -> IResult<NomBytes, ()> {
    if header.block_length > known_block_length {
        skip_bytes(s, (header.block_length - known_block_length) as usize)
    } else {
        Ok((s, ()))
    }
}

// =============================================================================
// Framing
// =============================================================================

/// Encode a message into a complete length-prefixed frame.
pub fn encode_frame<M: WireMessage>(message: &M) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(MESSAGE_HEADER_SIZE + 64);
    MessageHeader::for_message::<M>().encode(&mut body);
    message.encode_body(&mut body)?;

    let mut framed = BytesMut::with_capacity(FRAME_LENGTH_FIELD_SIZE + body.len());
    framed.put_i32(body.len() as i32);
    framed.extend_from_slice(&body);
    Ok(framed.freeze())
}

/// Strip and validate the frame length prefix.
///
/// The declared length must match the available bytes exactly; the decoder
/// never scans for a terminator and never reads past the frame boundary.
fn split_frame(frame: &Bytes) -> Result<Bytes> {
    if frame.len() < FRAME_LENGTH_FIELD_SIZE {
        return Err(Error::ParsingError(frame.clone()));
    }
    let declared = i32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
    if declared < 0 {
        return Err(Error::ParsingError(frame.clone()));
    }
    let available = frame.len() - FRAME_LENGTH_FIELD_SIZE;
    if declared as usize != available {
        return Err(Error::TruncatedFrame {
            declared: declared as usize,
            available,
        });
    }
    Ok(frame.slice(FRAME_LENGTH_FIELD_SIZE..))
}

/// Parse and validate the message header of a frame.
///
/// Returns the header and the remaining body bytes.
pub fn decode_header(frame: &Bytes) -> Result<(MessageHeader, Bytes)> {
    let body = split_frame(frame)?;
    if body.len() < MESSAGE_HEADER_SIZE {
        return Err(Error::ParsingError(body));
    }
    let (rest, header) =
        MessageHeader::parse(NomBytes::new(body.clone())).map_err(|_| Error::ParsingError(body))?;
    if header.schema_id != MANAGEMENT_SCHEMA_ID {
        return Err(Error::UnsupportedSchema(
            header.schema_id,
            MANAGEMENT_SCHEMA_ID,
        ));
    }
    Ok((header, rest.into_bytes()))
}

fn parse_message_body<M: WireMessage>(body: Bytes, header: &MessageHeader) -> Result<M> {
    if header.block_length < M::BLOCK_LENGTH {
        // Written by an older, structurally incompatible version.
        return Err(Error::ParsingError(body));
    }
    match M::parse_body(NomBytes::new(body.clone()), header) {
        Ok((rest, message)) => {
            let rest = rest.into_bytes();
            if rest.is_empty() {
                Ok(message)
            } else {
                Err(Error::ParsingError(rest))
            }
        }
        Err(_) => Err(Error::ParsingError(body)),
    }
}

/// Decode a complete frame into a specific message type.
///
/// Fails with [`Error::UnknownTemplate`] if the frame carries a different
/// message kind.
pub fn decode_frame<M: WireMessage>(frame: Bytes) -> Result<M> {
    let (header, body) = decode_header(&frame)?;
    if header.template_id != M::TEMPLATE_ID {
        return Err(Error::UnknownTemplate(header.template_id));
    }
    parse_message_body(body, &header)
}

/// Decode a complete frame into whichever request kind it carries.
pub fn decode_request(frame: Bytes) -> Result<ManagementRequest> {
    let (header, body) = decode_header(&frame)?;
    match header.template_id {
        TEMPLATE_INVITATION_REQUEST => {
            parse_message_body(body, &header).map(ManagementRequest::Invitation)
        }
        TEMPLATE_CREATE_PARTITION_REQUEST => {
            parse_message_body(body, &header).map(ManagementRequest::CreatePartition)
        }
        TEMPLATE_LIST_SNAPSHOTS_REQUEST => {
            parse_message_body(body, &header).map(ManagementRequest::ListSnapshots)
        }
        TEMPLATE_FETCH_SNAPSHOT_CHUNK_REQUEST => {
            parse_message_body(body, &header).map(ManagementRequest::FetchSnapshotChunk)
        }
        other => Err(Error::UnknownTemplate(other)),
    }
}

/// Decode a complete frame into whichever response kind it carries.
///
/// This is the client-side counterpart of [`decode_request`], used by
/// inviters and snapshot fetchers.
pub fn decode_response(frame: Bytes) -> Result<ManagementResponse> {
    let (header, body) = decode_header(&frame)?;
    match header.template_id {
        TEMPLATE_ERROR_RESPONSE => parse_message_body(body, &header).map(ManagementResponse::Error),
        TEMPLATE_INVITATION_RESPONSE => {
            parse_message_body(body, &header).map(ManagementResponse::Invitation)
        }
        TEMPLATE_LIST_SNAPSHOTS_RESPONSE => {
            parse_message_body(body, &header).map(ManagementResponse::ListSnapshots)
        }
        TEMPLATE_FETCH_SNAPSHOT_CHUNK_RESPONSE => {
            parse_message_body(body, &header).map(ManagementResponse::FetchSnapshotChunk)
        }
        other => Err(Error::UnknownTemplate(other)),
    }
}
