//! Crate & protocol level errors.
//!
//! # Error Hierarchy
//!
//! The crate uses a two-layer error hierarchy:
//!
//! ## Protocol Layer (`crate::error`)
//!
//! - [`Error`]: frame decoding and I/O errors
//! - [`ErrorCode`]: wire-level error codes carried by error response frames
//!
//! ## Cluster Layer (`crate::cluster::error`)
//!
//! - `ClusterError`: partition lifecycle, placement, and snapshot store
//!   errors; has `to_error_code()` for mapping to [`ErrorCode`]
//!
//! Every handler failure ends up as a valid error response frame on the wire
//! rather than a closed connection; the protocol has no connection-level
//! failure signaling, only message-level.

use bytes::Bytes;
use num_derive::FromPrimitive;
use std::{io, result};
use thiserror::Error as ThisError;

pub type Result<T> = result::Result<T, Error>;

/// Frame decoding and connection level errors.
///
/// These are low-level errors that occur while framing, encoding, or decoding
/// management protocol messages. For lifecycle and snapshot errors, see
/// [`crate::cluster::ClusterError`].
#[derive(Clone, Debug, ThisError)]
pub enum Error {
    /// An error in the network or snapshot stream.
    #[error("IO error: {0:?}")]
    IoError(io::ErrorKind),

    /// Could not parse the data.
    #[error("Parsing error: invalid data ({} bytes)", .0.len())]
    ParsingError(Bytes),

    /// Frame declared more bytes than were available.
    #[error("Truncated frame: declared {declared} bytes, {available} available")]
    TruncatedFrame { declared: usize, available: usize },

    /// Header carried a template id no message type claims.
    #[error("Unknown template id: {0}")]
    UnknownTemplate(u16),

    /// Header carried a schema id other than the management schema.
    #[error("Unsupported schema id: {0} (expected {1})")]
    UnsupportedSchema(u16, u16),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::IoError(a), Error::IoError(b)) => a == b,
            (Error::ParsingError(a), Error::ParsingError(b)) => a == b,
            (
                Error::TruncatedFrame {
                    declared: d1,
                    available: a1,
                },
                Error::TruncatedFrame {
                    declared: d2,
                    available: a2,
                },
            ) => d1 == d2 && a1 == a2,
            (Error::UnknownTemplate(a), Error::UnknownTemplate(b)) => a == b,
            (Error::UnsupportedSchema(a1, b1), Error::UnsupportedSchema(a2, b2)) => {
                a1 == a2 && b1 == b2
            }
            (Error::Config(a), Error::Config(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IoError(e.kind())
    }
}

/// Wire-level error codes carried by error response frames.
///
/// Every failure path in the request handler produces one of these codes
/// inside a well-formed error response frame. The requester decides whether
/// to retry (transient read failures) or to treat the condition as permanent
/// (no such snapshot).
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, Default)]
pub enum ErrorCode {
    /// No error; never sent on the wire, used as the in-memory default.
    #[default]
    None = 0,
    /// The addressed partition is not tracked by the receiving node.
    PartitionNotFound = 1,
    /// A request field failed validation (bad offset, unknown snapshot name,
    /// unusable chunk length).
    InvalidParameters = 2,
    /// Reading the snapshot byte stream failed; the requester may retry.
    ReadError = 3,
}

impl ErrorCode {
    /// Wire representation (big-endian i16 in the error response block).
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    /// Whether this code represents an actual failure.
    pub fn is_error(self) -> bool {
        !matches!(self, ErrorCode::None)
    }
}
