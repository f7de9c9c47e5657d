//! Response message parsing and encoding.

use bytes::{BufMut, Bytes};
use nom::{
    IResult,
    number::complete::{be_i16, be_i32, be_i64},
};
use nombytes::NomBytes;
use num_traits::FromPrimitive;

use crate::encode::{ToByte, encode_group};
use crate::error::{ErrorCode, Result};
use crate::parser::{bytes_to_string, parse_blob, parse_group, parse_string};

use super::{
    MessageHeader, TEMPLATE_ERROR_RESPONSE, TEMPLATE_FETCH_SNAPSHOT_CHUNK_RESPONSE,
    TEMPLATE_INVITATION_RESPONSE, TEMPLATE_LIST_SNAPSHOTS_RESPONSE, WireMessage,
    skip_block_padding,
};

/// The response kinds a management client dispatches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementResponse {
    Error(ErrorResponse),
    Invitation(InvitationResponse),
    ListSnapshots(ListSnapshotsResponse),
    FetchSnapshotChunk(FetchSnapshotChunkResponse),
}

// =============================================================================
// ErrorResponse
// =============================================================================

/// Terminal response for any handler failure.
///
/// Carries a wire [`ErrorCode`] plus a human-readable message. Every failure
/// path produces one of these instead of closing the connection; the protocol
/// has no connection-level failure signaling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ErrorResponse {
            code,
            message: message.into(),
        }
    }
}

impl WireMessage for ErrorResponse {
    const TEMPLATE_ID: u16 = TEMPLATE_ERROR_RESPONSE;
    const BLOCK_LENGTH: u16 = 2;

    fn encode_body<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        self.code.as_i16().encode(buffer)?;
        self.message.encode(buffer)
    }

    fn parse_body(s: NomBytes, header: &MessageHeader) -> IResult<NomBytes, Self> {
        let (s, raw_code) = be_i16(s)?;
        let code = match ErrorCode::from_i16(raw_code) {
            Some(code) => code,
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    s,
                    nom::error::ErrorKind::Verify,
                )));
            }
        };
        let (s, ()) = skip_block_padding(s, header, Self::BLOCK_LENGTH)?;
        let (s, message) = parse_string(s)?;
        let message = bytes_to_string(&message)?;
        Ok((s, ErrorResponse { code, message }))
    }
}

// =============================================================================
// InvitationResponse
// =============================================================================

/// Empty acknowledgement of an invitation (or create-partition) request.
///
/// The invitation protocol is fire-and-forget: installation failures are
/// never negatively acked, the inviter times out and retries instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvitationResponse {
    pub term: i32,
}

impl WireMessage for InvitationResponse {
    const TEMPLATE_ID: u16 = TEMPLATE_INVITATION_RESPONSE;
    const BLOCK_LENGTH: u16 = 4;

    fn encode_body<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        self.term.encode(buffer)
    }

    fn parse_body(s: NomBytes, header: &MessageHeader) -> IResult<NomBytes, Self> {
        let (s, term) = be_i32(s)?;
        let (s, ()) = skip_block_padding(s, header, Self::BLOCK_LENGTH)?;
        Ok((s, InvitationResponse { term }))
    }
}

// =============================================================================
// ListSnapshotsResponse
// =============================================================================

/// One replicable snapshot advertised by a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub name: String,
    pub log_position: i64,
    pub length: i64,
    pub checksum: Bytes,
}

impl SnapshotEntry {
    fn parse(s: NomBytes) -> IResult<NomBytes, SnapshotEntry> {
        let (s, name) = parse_string(s)?;
        let name = bytes_to_string(&name)?;
        let (s, log_position) = be_i64(s)?;
        let (s, length) = be_i64(s)?;
        let (s, checksum) = parse_blob(s)?;
        Ok((
            s,
            SnapshotEntry {
                name,
                log_position,
                length,
                checksum,
            },
        ))
    }

    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        self.name.encode(buffer)?;
        self.log_position.encode(buffer)?;
        self.length.encode(buffer)?;
        self.checksum.encode(buffer)
    }
}

/// The replicable snapshots of one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSnapshotsResponse {
    pub snapshots: Vec<SnapshotEntry>,
}

impl WireMessage for ListSnapshotsResponse {
    const TEMPLATE_ID: u16 = TEMPLATE_LIST_SNAPSHOTS_RESPONSE;
    const BLOCK_LENGTH: u16 = 0;

    fn encode_body<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        encode_group(buffer, &self.snapshots, |b, e| e.encode(b))
    }

    fn parse_body(s: NomBytes, header: &MessageHeader) -> IResult<NomBytes, Self> {
        let (s, ()) = skip_block_padding(s, header, Self::BLOCK_LENGTH)?;
        let (s, snapshots) = parse_group(SnapshotEntry::parse)(s)?;
        Ok((s, ListSnapshotsResponse { snapshots }))
    }
}

// =============================================================================
// FetchSnapshotChunkResponse
// =============================================================================

/// Raw chunk bytes, no further structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSnapshotChunkResponse {
    pub data: Bytes,
}

impl WireMessage for FetchSnapshotChunkResponse {
    const TEMPLATE_ID: u16 = TEMPLATE_FETCH_SNAPSHOT_CHUNK_RESPONSE;
    const BLOCK_LENGTH: u16 = 0;

    fn encode_body<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        self.data.encode(buffer)
    }

    fn parse_body(s: NomBytes, header: &MessageHeader) -> IResult<NomBytes, Self> {
        let (s, ()) = skip_block_padding(s, header, Self::BLOCK_LENGTH)?;
        let (s, data) = parse_blob(s)?;
        Ok((s, FetchSnapshotChunkResponse { data }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::{decode_frame, decode_response, encode_frame};
    use super::*;

    #[test]
    fn error_response_roundtrip() {
        let response = ErrorResponse::new(ErrorCode::PartitionNotFound, "partition 9 not tracked");
        let frame = encode_frame(&response).unwrap();
        let decoded: ErrorResponse = decode_frame(frame).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn error_response_rejects_unknown_code() {
        let response = ErrorResponse::new(ErrorCode::ReadError, "boom");
        let frame = encode_frame(&response).unwrap();
        let mut raw = frame.to_vec();
        // code lives right after frame length (4) + header (8)
        raw[12] = 0x7F;
        raw[13] = 0x42;
        assert!(decode_frame::<ErrorResponse>(Bytes::from(raw)).is_err());
    }

    #[test]
    fn invitation_response_roundtrip() {
        let response = InvitationResponse { term: 11 };
        let frame = encode_frame(&response).unwrap();
        let decoded: InvitationResponse = decode_frame(frame).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn list_snapshots_roundtrip() {
        let response = ListSnapshotsResponse {
            snapshots: vec![
                SnapshotEntry {
                    name: "snapshot-1".to_string(),
                    log_position: 100,
                    length: 4096,
                    checksum: Bytes::from(vec![0xDE, 0xAD]),
                },
                SnapshotEntry {
                    name: "snapshot-2".to_string(),
                    log_position: 250,
                    length: 1 << 30,
                    checksum: Bytes::new(),
                },
            ],
        };
        let frame = encode_frame(&response).unwrap();
        let decoded: ListSnapshotsResponse = decode_frame(frame).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn list_snapshots_roundtrip_empty() {
        let response = ListSnapshotsResponse::default();
        let frame = encode_frame(&response).unwrap();
        let decoded: ListSnapshotsResponse = decode_frame(frame).unwrap();
        assert!(decoded.snapshots.is_empty());
    }

    #[test]
    fn fetch_chunk_response_roundtrip() {
        let response = FetchSnapshotChunkResponse {
            data: Bytes::from(vec![1, 2, 3, 4, 5]),
        };
        let frame = encode_frame(&response).unwrap();
        let decoded: FetchSnapshotChunkResponse = decode_frame(frame).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn fetch_chunk_response_roundtrip_empty() {
        let response = FetchSnapshotChunkResponse { data: Bytes::new() };
        let frame = encode_frame(&response).unwrap();
        let decoded: FetchSnapshotChunkResponse = decode_frame(frame).unwrap();
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn decode_response_dispatches_on_template() {
        let response = ErrorResponse::new(ErrorCode::InvalidParameters, "no snapshot found");
        let frame = encode_frame(&response).unwrap();
        match decode_response(frame).unwrap() {
            ManagementResponse::Error(e) => {
                assert_eq!(e.code, ErrorCode::InvalidParameters);
                assert_eq!(e.message, "no snapshot found");
            }
            other => panic!("wrong dispatch: {other:?}"),
        }
    }
}
