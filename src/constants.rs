//! Centralized protocol and configuration constants.
//!
//! This module consolidates the magic numbers used throughout the partition
//! management layer. Having them in one place makes it easier to:
//!
//! - Understand the wire format constraints
//! - Update values consistently
//! - Document the rationale for each constant
//!
//! # Categories
//!
//! - **Wire Protocol Constants**: management protocol framing and limits
//! - **Snapshot Transfer Constants**: chunked replication limits
//! - **Group Constants**: partition group defaults

// =============================================================================
// Wire Protocol Constants (Management Protocol)
// =============================================================================

/// Schema id identifying the partition management protocol.
///
/// Every frame carries this id in its header; frames with a different schema
/// id are rejected before any body parsing happens.
pub const MANAGEMENT_SCHEMA_ID: u16 = 5;

/// Current version of the management protocol schema.
///
/// Newer versions of the same schema are tolerated on decode: the header's
/// block length tells the decoder how many fixed-block bytes to consume, so
/// unknown trailing block fields are skipped rather than misparsed.
pub const MANAGEMENT_SCHEMA_VERSION: u16 = 1;

/// Size of the frame length prefix (i32, big-endian).
///
/// The prefix counts the bytes that follow it: message header plus body.
pub const FRAME_LENGTH_FIELD_SIZE: usize = 4;

/// Size of the message header following the frame length prefix.
///
/// The header consists of four big-endian u16 fields:
/// ```text
/// Offset  Size  Field
/// 0       2     block_length
/// 2       2     template_id
/// 4       2     schema_id
/// 6       2     version
/// ```
pub const MESSAGE_HEADER_SIZE: usize = 8;

/// Maximum number of entries accepted in a repeated group.
///
/// Guards decode against absurd declared counts before any allocation. A
/// cluster has at most a handful of members and a partition a handful of
/// snapshots; this bound is generous.
pub const MAX_GROUP_COUNT: i32 = 1 << 16;

/// Maximum length accepted for a length-prefixed byte blob.
///
/// Snapshot chunks are the largest variable-length payload and are bounded by
/// the read buffer capacity on the serving side; this decode-side bound adds
/// headroom for configuration drift between peers.
pub const MAX_BLOB_LENGTH: i32 = 4 * 1024 * 1024;

// =============================================================================
// Snapshot Transfer Constants
// =============================================================================

/// Default capacity of the handler's reusable snapshot read buffer.
///
/// Also the upper bound for a single snapshot chunk: requested chunk lengths
/// are clamped to `min(requested, remaining, capacity)`. 512 KiB keeps each
/// response frame comfortably inside common transport frame-size limits while
/// amortizing per-chunk request overhead.
pub const DEFAULT_SNAPSHOT_READ_BUFFER_CAPACITY: usize = 512 * 1024;

// =============================================================================
// Partition Group Constants
// =============================================================================

/// Default number of partitions in a group.
pub const DEFAULT_PARTITION_COUNT: u32 = 1;

/// Default replication factor (replicas per partition).
pub const DEFAULT_REPLICATION_FACTOR: u32 = 1;

/// Default partition group name.
pub const DEFAULT_GROUP_NAME: &str = "raft";

/// Directory name under the group directory holding per-partition state.
///
/// Partition data lives at `<data-dir>/<group>/partitions/<1-based-index>`.
pub const PARTITIONS_DIR_NAME: &str = "partitions";
