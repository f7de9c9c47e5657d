//! Identity types and the immutable distribution result.
//!
//! This module provides the strongly-typed identifiers the rest of the
//! cluster layer is built on:
//!
//! - [`PartitionId`]: a group-scoped, totally ordered partition identifier
//! - [`NodeId`]: a node identity ordered lexicographically over its string
//!   form; the ordering is load-bearing because placement rotates a sorted
//!   member list
//! - [`PartitionMetadata`]: the immutable result of distribution for one
//!   partition

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

// =============================================================================
// PartitionId
// =============================================================================

/// A strongly-typed partition identifier, scoped to a named group.
///
/// Encapsulates the (group, index) pair to prevent argument mix-ups and give
/// map keys a clear type. Ordering is by group name, then index; the ordered
/// id sequence of a group is stable for the group's lifetime.
#[derive(Clone, Eq)]
pub struct PartitionId {
    group: Arc<str>,
    index: i32,
}

impl PartitionId {
    /// Create a new partition identifier.
    #[inline]
    pub fn new(group: impl Into<Arc<str>>, index: i32) -> Self {
        Self {
            group: group.into(),
            index,
        }
    }

    #[inline]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// 1-based index within the group.
    #[inline]
    pub fn index(&self) -> i32 {
        self.index
    }
}

impl fmt::Debug for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartitionId({}/{})", self.group, self.index)
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.index)
    }
}

impl PartialEq for PartitionId {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.group == other.group
    }
}

impl Hash for PartitionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group.hash(state);
        self.index.hash(state);
    }
}

impl PartialOrd for PartitionId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PartitionId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.group
            .cmp(&other.group)
            .then(self.index.cmp(&other.index))
    }
}

// =============================================================================
// NodeId
// =============================================================================

/// An opaque node identity.
///
/// Ordered lexicographically over its string form. The distributor sorts
/// members by this ordering before rotating, so two nodes computing the same
/// distribution from the same membership always agree.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        NodeId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId::new(s)
    }
}

// =============================================================================
// PartitionMetadata
// =============================================================================

/// Immutable result of distribution for one partition.
///
/// Holds the replica members in rotation order, the election priority of
/// each member, and the designated primary (the member with the maximum
/// priority). Created once when the group is constructed and never mutated;
/// a reconfiguration produces a whole new distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMetadata {
    id: PartitionId,
    members: Vec<NodeId>,
    priorities: HashMap<NodeId, u32>,
    primary: NodeId,
}

impl PartitionMetadata {
    /// Assemble metadata from a computed distribution.
    ///
    /// The priority map must be injective and `primary` must hold the
    /// maximum priority; the distributor guarantees both.
    pub fn new(
        id: PartitionId,
        members: Vec<NodeId>,
        priorities: HashMap<NodeId, u32>,
        primary: NodeId,
    ) -> Self {
        debug_assert_eq!(members.len(), priorities.len());
        debug_assert!(members.contains(&primary));
        debug_assert!({
            let mut seen: Vec<u32> = priorities.values().copied().collect();
            seen.sort_unstable();
            seen.windows(2).all(|w| w[0] != w[1])
        });
        Self {
            id,
            members,
            priorities,
            primary,
        }
    }

    #[inline]
    pub fn id(&self) -> &PartitionId {
        &self.id
    }

    /// Replica members in rotation order (primary first).
    #[inline]
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    /// Election priority of a member, if it holds a replica.
    #[inline]
    pub fn priority(&self, member: &NodeId) -> Option<u32> {
        self.priorities.get(member).copied()
    }

    /// The member intended to become leader first.
    #[inline]
    pub fn primary(&self) -> &NodeId {
        &self.primary
    }

    #[inline]
    pub fn is_member(&self, node: &NodeId) -> bool {
        self.priorities.contains_key(node)
    }

    /// Number of replicas this partition actually has.
    #[inline]
    pub fn replica_count(&self) -> usize {
        self.members.len()
    }
}
