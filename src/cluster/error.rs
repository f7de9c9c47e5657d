//! Error types for the cluster layer.
//!
//! # Error Handling Patterns
//!
//! This layer uses two patterns based on operation criticality:
//!
//! ## Fail-Fast (Propagate Errors)
//!
//! Used where failure means the caller must not proceed:
//! - Partition open (the replica is not usable)
//! - Distribution input validation (empty membership)
//! - Snapshot chunk reads (the requester needs a definite error code)
//!
//! ## Best-Effort (Log and Continue)
//!
//! Used where partial failure is acceptable:
//! - Partition close (stop failures are logged and swallowed)
//! - Group-wide close fan-out (one partition's failure never blocks others)
//! - Partition installation after an accepted invitation (the inviter
//!   retries on timeout)
//!
//! # Wire Mapping
//!
//! [`ClusterError::to_error_code`] maps handler-side failures onto the three
//! wire-level codes; every failure the handler sees becomes a well-formed
//! error response frame rather than a dropped connection.

use std::io;
use thiserror::Error;

use crate::error::ErrorCode;

/// Result type for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur in partition lifecycle, placement, and snapshot
/// serving.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The addressed partition is not tracked by this node.
    #[error("partition {0} not tracked by this node")]
    PartitionNotFound(i32),

    /// A request field failed validation.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Reading a snapshot byte stream failed.
    #[error("read error: {0}")]
    Read(String),

    /// The consensus handle reported a failure.
    #[error("consensus error: {0}")]
    Consensus(String),

    /// Filesystem-level failure while managing partition state.
    #[error("storage error: {0}")]
    Storage(#[from] io::Error),

    /// An operation required a local consensus handle but the partition has
    /// none (the local node is not a member). Callers are expected to check
    /// membership first.
    #[error("partition {0} has no local consensus handle")]
    NoLocalHandle(String),

    /// Invalid group or partition configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClusterError {
    /// Map this error onto the wire-level error code taxonomy.
    ///
    /// I/O and consensus failures surface as `ReadError`: from the
    /// requester's point of view the node failed to produce the bytes, and
    /// retrying is the right move.
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            ClusterError::PartitionNotFound(_) => ErrorCode::PartitionNotFound,
            ClusterError::InvalidParameters(_) => ErrorCode::InvalidParameters,
            ClusterError::Read(_) | ClusterError::Storage(_) | ClusterError::Consensus(_) => {
                ErrorCode::ReadError
            }
            ClusterError::NoLocalHandle(_) | ClusterError::Config(_) => {
                ErrorCode::InvalidParameters
            }
        }
    }
}
