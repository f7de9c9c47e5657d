//! Per-partition lifecycle.
//!
//! A [`Partition`] wraps one partition's distribution metadata plus a
//! lazily-created local consensus handle. The handle exists only if the
//! local node is among the partition's members; every operation degrades to
//! a no-op (or an explicit error, for leader-only operations) when it is
//! not.
//!
//! # Lifecycle
//!
//! ```text
//! Unopened -> Opening -> Opened -> Closing -> Closed
//!      |
//!      v
//!   NotLocal (terminal, no handle is ever created)
//! ```
//!
//! Open, close, and delete are not internally sequenced against each other;
//! callers sequence them. The only mandated coupling is inside `delete`:
//! stop first, then remove on-disk state unconditionally.
//!
//! # Listeners
//!
//! Role-change and failure listeners may be registered before the handle
//! exists. Registration is tracked by an explicit two-state binding:
//! `Unbound` buffers the listeners, and the single transition to `Bound`
//! drains the buffer onto the freshly created handle.

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::config::PartitionGroupConfig;
use super::error::{ClusterError, ClusterResult};
use super::metadata::{NodeId, PartitionId, PartitionMetadata};
use super::traits::{
    FailureListener, ListenerId, RaftHandle, RaftHandleFactory, RaftRole, RoleChangeListener,
};

/// Everything a partition needs from its surroundings to open.
#[derive(Clone)]
pub struct ClusterServices {
    /// Identity of this node, checked against partition membership.
    pub local_node: NodeId,
    /// Creates consensus handles bound to a partition's data directory.
    pub handle_factory: Arc<dyn RaftHandleFactory>,
    /// Group configuration, passed through to handle creation.
    pub config: PartitionGroupConfig,
}

// =============================================================================
// Lifecycle state
// =============================================================================

/// State of a partition from this node's perspective.
#[derive(Default)]
pub enum PartitionLifecycle {
    /// Constructed but not yet opened.
    #[default]
    Unopened,

    /// The local consensus handle is being created and started.
    Opening {
        /// When the open began.
        since: Instant,
    },

    /// The local replica is running.
    Opened {
        /// The running consensus handle.
        handle: Arc<dyn RaftHandle>,
        /// When the open completed.
        since: Instant,
    },

    /// The local node is not among this partition's members. Terminal; no
    /// handle is ever created.
    NotLocal,

    /// The handle is being stopped.
    Closing {
        /// When the close began.
        since: Instant,
    },

    /// The handle has been stopped (or the open failed).
    Closed {
        /// When the close completed.
        since: Instant,
    },
}

impl PartitionLifecycle {
    pub fn is_opened(&self) -> bool {
        matches!(self, PartitionLifecycle::Opened { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PartitionLifecycle::Closed { .. })
    }

    pub fn is_not_local(&self) -> bool {
        matches!(self, PartitionLifecycle::NotLocal)
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            PartitionLifecycle::Opening { .. } | PartitionLifecycle::Closing { .. }
        )
    }

    /// The running handle, if any.
    pub fn handle(&self) -> Option<Arc<dyn RaftHandle>> {
        match self {
            PartitionLifecycle::Opened { handle, .. } => Some(handle.clone()),
            _ => None,
        }
    }

    /// How long the partition has been in the current state.
    pub fn duration_in_state(&self) -> Option<std::time::Duration> {
        match self {
            PartitionLifecycle::Unopened | PartitionLifecycle::NotLocal => None,
            PartitionLifecycle::Opening { since }
            | PartitionLifecycle::Opened { since, .. }
            | PartitionLifecycle::Closing { since }
            | PartitionLifecycle::Closed { since } => Some(since.elapsed()),
        }
    }

    pub fn state_name(&self) -> &'static str {
        match self {
            PartitionLifecycle::Unopened => "unopened",
            PartitionLifecycle::Opening { .. } => "opening",
            PartitionLifecycle::Opened { .. } => "opened",
            PartitionLifecycle::NotLocal => "not-local",
            PartitionLifecycle::Closing { .. } => "closing",
            PartitionLifecycle::Closed { .. } => "closed",
        }
    }
}

impl std::fmt::Debug for PartitionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionLifecycle::Unopened => write!(f, "Unopened"),
            PartitionLifecycle::NotLocal => write!(f, "NotLocal"),
            PartitionLifecycle::Opening { since } => f
                .debug_struct("Opening")
                .field("duration", &since.elapsed())
                .finish(),
            PartitionLifecycle::Opened { since, .. } => f
                .debug_struct("Opened")
                .field("duration", &since.elapsed())
                .finish(),
            PartitionLifecycle::Closing { since } => f
                .debug_struct("Closing")
                .field("duration", &since.elapsed())
                .finish(),
            PartitionLifecycle::Closed { since } => f
                .debug_struct("Closed")
                .field("duration", &since.elapsed())
                .finish(),
        }
    }
}

// =============================================================================
// Listener binding
// =============================================================================

/// Two-state registration target for role-change listeners.
///
/// Before the handle exists, listeners are buffered; the single `bind`
/// transition drains the buffer onto the handle. Registration and removal
/// work in both states.
enum ListenerBinding {
    Unbound {
        buffered: Vec<(ListenerId, RoleChangeListener)>,
    },
    Bound {
        handle: Arc<dyn RaftHandle>,
    },
}

struct ListenerRegistry {
    next_id: AtomicU64,
    binding: Mutex<ListenerBinding>,
    failure: DashMap<u64, FailureListener>,
}

impl ListenerRegistry {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            binding: Mutex::new(ListenerBinding::Unbound { buffered: Vec::new() }),
            failure: DashMap::new(),
        }
    }

    fn allocate_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn add_role_change(&self, listener: RoleChangeListener) -> ListenerId {
        let id = self.allocate_id();
        let mut binding = self.binding.lock().expect("listener binding poisoned");
        match &mut *binding {
            ListenerBinding::Unbound { buffered } => buffered.push((id, listener)),
            ListenerBinding::Bound { handle } => handle.add_role_change_listener(id, listener),
        }
        id
    }

    fn remove_role_change(&self, id: ListenerId) {
        let mut binding = self.binding.lock().expect("listener binding poisoned");
        match &mut *binding {
            ListenerBinding::Unbound { buffered } => buffered.retain(|(other, _)| *other != id),
            ListenerBinding::Bound { handle } => handle.remove_role_change_listener(id),
        }
    }

    /// Transition to bound, draining buffered listeners onto the handle.
    fn bind(&self, handle: Arc<dyn RaftHandle>) {
        let mut binding = self.binding.lock().expect("listener binding poisoned");
        let previous = mem::replace(
            &mut *binding,
            ListenerBinding::Bound {
                handle: handle.clone(),
            },
        );
        if let ListenerBinding::Unbound { buffered } = previous {
            for (id, listener) in buffered {
                handle.add_role_change_listener(id, listener);
            }
        }
    }

    fn add_failure(&self, listener: FailureListener) -> ListenerId {
        let id = self.allocate_id();
        self.failure.insert(id.0, listener);
        id
    }

    fn remove_failure(&self, id: ListenerId) {
        self.failure.remove(&id.0);
    }

    /// Invoke every failure listener and wait for all completions.
    async fn notify_failure(&self) {
        let pending: Vec<_> = self
            .failure
            .iter()
            .map(|entry| (entry.value().clone())())
            .collect();
        join_all(pending).await;
    }
}

// =============================================================================
// Partition
// =============================================================================

/// One partition's runtime entity.
pub struct Partition {
    id: PartitionId,
    data_dir: PathBuf,
    state: Mutex<PartitionLifecycle>,
    metadata: Mutex<Option<PartitionMetadata>>,
    listeners: ListenerRegistry,
}

impl Partition {
    /// Construct an unopened partition rooted at `data_dir`.
    pub fn new(id: PartitionId, data_dir: PathBuf) -> Self {
        Self {
            id,
            data_dir,
            state: Mutex::new(PartitionLifecycle::Unopened),
            metadata: Mutex::new(None),
            listeners: ListenerRegistry::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> &PartitionId {
        &self.id
    }

    #[inline]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Distribution metadata, once `open` has recorded it.
    pub fn metadata(&self) -> Option<PartitionMetadata> {
        self.metadata.lock().expect("metadata poisoned").clone()
    }

    /// Current lifecycle state name, for logs and introspection.
    pub fn state_name(&self) -> &'static str {
        self.state.lock().expect("state poisoned").state_name()
    }

    fn set_state(&self, next: PartitionLifecycle) {
        *self.state.lock().expect("state poisoned") = next;
    }

    fn current_handle(&self) -> Option<Arc<dyn RaftHandle>> {
        self.state.lock().expect("state poisoned").handle()
    }

    /// Take the handle out of the state, marking the partition as closing.
    ///
    /// Leaves `NotLocal` untouched (it is terminal) and returns `None` when
    /// there is nothing to stop.
    fn begin_close(&self) -> Option<Arc<dyn RaftHandle>> {
        let mut state = self.state.lock().expect("state poisoned");
        if state.is_not_local() {
            return None;
        }
        let previous = mem::replace(
            &mut *state,
            PartitionLifecycle::Closing {
                since: Instant::now(),
            },
        );
        match previous {
            PartitionLifecycle::Opened { handle, .. } => Some(handle),
            _ => {
                // Nothing was running; settle directly into Closed.
                *state = PartitionLifecycle::Closed {
                    since: Instant::now(),
                };
                None
            }
        }
    }

    /// Record metadata and start the local replica if this node is a member.
    ///
    /// Resolves when the replica has started, or immediately when the local
    /// node holds no replica of this partition.
    pub async fn open(
        &self,
        metadata: PartitionMetadata,
        services: &ClusterServices,
    ) -> ClusterResult<()> {
        *self.metadata.lock().expect("metadata poisoned") = Some(metadata.clone());

        if !metadata.is_member(&services.local_node) {
            debug!(
                partition = %self.id,
                node = %services.local_node,
                "node holds no replica, skipping local open"
            );
            self.set_state(PartitionLifecycle::NotLocal);
            return Ok(());
        }

        self.set_state(PartitionLifecycle::Opening {
            since: Instant::now(),
        });

        let handle = match services
            .handle_factory
            .create(&metadata, &self.data_dir, &services.config)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                error!(partition = %self.id, error = %e, "failed to create consensus handle");
                self.set_state(PartitionLifecycle::Closed {
                    since: Instant::now(),
                });
                return Err(e);
            }
        };

        // Flush listeners registered before the handle existed.
        self.listeners.bind(handle.clone());

        if let Err(e) = handle.start().await {
            error!(partition = %self.id, error = %e, "failed to start replica");
            self.set_state(PartitionLifecycle::Closed {
                since: Instant::now(),
            });
            return Err(e);
        }

        info!(
            partition = %self.id,
            priority = metadata.priority(&services.local_node),
            primary = %metadata.primary(),
            "partition opened"
        );
        self.set_state(PartitionLifecycle::Opened {
            handle,
            since: Instant::now(),
        });
        Ok(())
    }

    /// Stop the local replica if one is running.
    ///
    /// Best-effort: stop failures are logged and swallowed, close never
    /// fails the caller. Completes immediately for non-local partitions.
    pub async fn close(&self) {
        let Some(handle) = self.begin_close() else {
            return;
        };
        if let Err(e) = handle.stop().await {
            warn!(partition = %self.id, error = %e, "failed to stop replica, ignoring");
        }
        self.set_state(PartitionLifecycle::Closed {
            since: Instant::now(),
        });
        debug!(partition = %self.id, "partition closed");
    }

    /// Stop the local replica and remove on-disk partition state.
    ///
    /// Deletion is attempted unconditionally after the stop, regardless of
    /// the stop's outcome, so an interrupted shutdown cannot strand partial
    /// state behind a failed stop.
    pub async fn delete(&self) -> ClusterResult<()> {
        if let Some(handle) = self.begin_close() {
            if let Err(e) = handle.stop().await {
                warn!(
                    partition = %self.id,
                    error = %e,
                    "failed to stop replica, proceeding with deletion"
                );
            }
            self.set_state(PartitionLifecycle::Closed {
                since: Instant::now(),
            });
        }

        match tokio::fs::remove_dir_all(&self.data_dir).await {
            Ok(()) => {
                info!(partition = %self.id, dir = %self.data_dir.display(), "partition state deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                error!(partition = %self.id, error = %e, "failed to delete partition state");
                Err(ClusterError::Storage(e))
            }
        }
    }

    /// Trigger an out-of-band snapshot.
    ///
    /// No-op completing immediately when this node holds no replica.
    pub async fn trigger_snapshot(&self) -> ClusterResult<()> {
        match self.current_handle() {
            Some(handle) => handle.take_snapshot().await,
            None => Ok(()),
        }
    }

    /// Ask the local leader replica to yield leadership.
    ///
    /// Errors if no local handle exists; callers must check `metadata()`
    /// membership first.
    pub async fn step_down(&self) -> ClusterResult<()> {
        self.current_handle()
            .ok_or_else(|| ClusterError::NoLocalHandle(self.id.to_string()))?
            .step_down()
            .await
    }

    /// Transition the local replica to inactive.
    ///
    /// Errors if no local handle exists; callers must check `metadata()`
    /// membership first.
    pub async fn go_inactive(&self) -> ClusterResult<()> {
        self.current_handle()
            .ok_or_else(|| ClusterError::NoLocalHandle(self.id.to_string()))?
            .go_inactive()
            .await
    }

    /// Current consensus term, if a local replica is running.
    pub fn term(&self) -> Option<u64> {
        self.current_handle().map(|h| h.term())
    }

    /// Current replica role, if a local replica is running.
    pub fn role(&self) -> Option<RaftRole> {
        self.current_handle().map(|h| h.role())
    }

    /// Register a role-change listener.
    ///
    /// Safe to call before `open`; listeners registered early are buffered
    /// and flushed onto the handle when it is created.
    pub fn add_role_change_listener(&self, listener: RoleChangeListener) -> ListenerId {
        self.listeners.add_role_change(listener)
    }

    pub fn remove_role_change_listener(&self, id: ListenerId) {
        self.listeners.remove_role_change(id);
    }

    /// Register a failure listener.
    pub fn add_failure_listener(&self, listener: FailureListener) -> ListenerId {
        self.listeners.add_failure(listener)
    }

    pub fn remove_failure_listener(&self, id: ListenerId) {
        self.listeners.remove_failure(id);
    }

    /// Broadcast a failure to all registered listeners and wait for every
    /// completion.
    pub async fn notify_failure(&self) {
        warn!(partition = %self.id, "partition failure reported, notifying listeners");
        self.listeners.notify_failure().await;
    }
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition")
            .field("id", &self.id)
            .field("state", &self.state_name())
            .finish()
    }
}
