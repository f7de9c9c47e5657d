//! In-memory mock collaborators for testing.
//!
//! These stand in for the consensus, snapshot, and configuration systems the
//! cluster layer drives. They record calls so tests can assert on lifecycle
//! behavior without a real consensus implementation.

use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use super::config::PartitionGroupConfig;
use super::error::{ClusterError, ClusterResult};
use super::metadata::{NodeId, PartitionId, PartitionMetadata};
use super::traits::{
    ConfigurationManager, CreateOutcome, ListenerId, PartitionConfiguration, PartitionInstaller,
    RaftHandle, RaftHandleFactory, RaftRole, RoleChangeListener, SnapshotMetadata, SnapshotReader,
    SnapshotStore,
};

// =============================================================================
// Consensus mocks
// =============================================================================

/// In-memory consensus handle recording lifecycle calls.
pub struct MockRaftHandle {
    started: AtomicBool,
    stopped: AtomicBool,
    step_downs: AtomicUsize,
    snapshots: AtomicUsize,
    term: AtomicU64,
    role: Mutex<RaftRole>,
    listeners: DashMap<u64, RoleChangeListener>,
    fail_start: bool,
    fail_stop: bool,
}

impl MockRaftHandle {
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            step_downs: AtomicUsize::new(0),
            snapshots: AtomicUsize::new(0),
            term: AtomicU64::new(1),
            role: Mutex::new(RaftRole::Follower),
            listeners: DashMap::new(),
            fail_start: false,
            fail_stop: false,
        }
    }

    /// A handle whose `start` fails.
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::new()
        }
    }

    /// A handle whose `stop` fails.
    pub fn failing_stop() -> Self {
        Self {
            fail_stop: true,
            ..Self::new()
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn step_down_count(&self) -> usize {
        self.step_downs.load(Ordering::SeqCst)
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Drive every registered role-change listener.
    pub fn emit_role_change(&self, role: RaftRole, term: u64) {
        self.term.store(term, Ordering::SeqCst);
        *self.role.lock().unwrap() = role;
        for entry in self.listeners.iter() {
            (entry.value())(role, term);
        }
    }
}

impl Default for MockRaftHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RaftHandle for MockRaftHandle {
    async fn start(&self) -> ClusterResult<()> {
        if self.fail_start {
            return Err(ClusterError::Consensus("start failed".into()));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> ClusterResult<()> {
        if self.fail_stop {
            return Err(ClusterError::Consensus("stop failed".into()));
        }
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn step_down(&self) -> ClusterResult<()> {
        self.step_downs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn go_inactive(&self) -> ClusterResult<()> {
        *self.role.lock().unwrap() = RaftRole::Inactive;
        Ok(())
    }

    fn term(&self) -> u64 {
        self.term.load(Ordering::SeqCst)
    }

    fn role(&self) -> RaftRole {
        *self.role.lock().unwrap()
    }

    async fn take_snapshot(&self) -> ClusterResult<()> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn add_role_change_listener(&self, id: ListenerId, listener: RoleChangeListener) {
        self.listeners.insert(id.0, listener);
    }

    fn remove_role_change_listener(&self, id: ListenerId) {
        self.listeners.remove(&id.0);
    }
}

/// Factory handing out [`MockRaftHandle`]s, recording what it created.
pub struct MockRaftHandleFactory {
    created: Mutex<Vec<(PartitionId, PathBuf, Arc<MockRaftHandle>)>>,
    fail_for_index: Option<i32>,
    fail_start_for_index: Option<i32>,
    fail_stop_for_index: Option<i32>,
}

impl MockRaftHandleFactory {
    pub fn new() -> Self {
        Self {
            created: Mutex::new(Vec::new()),
            fail_for_index: None,
            fail_start_for_index: None,
            fail_stop_for_index: None,
        }
    }

    /// Creation itself fails for the partition with this index.
    pub fn failing_create_for(index: i32) -> Self {
        Self {
            fail_for_index: Some(index),
            ..Self::new()
        }
    }

    /// The created handle's `start` fails for the partition with this index.
    pub fn failing_start_for(index: i32) -> Self {
        Self {
            fail_start_for_index: Some(index),
            ..Self::new()
        }
    }

    /// The created handle's `stop` fails for the partition with this index.
    pub fn failing_stop_for(index: i32) -> Self {
        Self {
            fail_stop_for_index: Some(index),
            ..Self::new()
        }
    }

    /// Handles created so far, with the partition and data dir they were
    /// bound to.
    pub fn created(&self) -> Vec<(PartitionId, PathBuf, Arc<MockRaftHandle>)> {
        self.created.lock().unwrap().clone()
    }

    /// The handle created for one partition index, if any.
    pub fn handle_for(&self, index: i32) -> Option<Arc<MockRaftHandle>> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _, _)| id.index() == index)
            .map(|(_, _, handle)| handle.clone())
    }
}

impl Default for MockRaftHandleFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RaftHandleFactory for MockRaftHandleFactory {
    async fn create(
        &self,
        metadata: &PartitionMetadata,
        data_dir: &Path,
        _config: &PartitionGroupConfig,
    ) -> ClusterResult<Arc<dyn RaftHandle>> {
        if self.fail_for_index == Some(metadata.id().index()) {
            return Err(ClusterError::Consensus("handle creation failed".into()));
        }
        let handle = if self.fail_start_for_index == Some(metadata.id().index()) {
            Arc::new(MockRaftHandle::failing_start())
        } else if self.fail_stop_for_index == Some(metadata.id().index()) {
            Arc::new(MockRaftHandle::failing_stop())
        } else {
            Arc::new(MockRaftHandle::new())
        };
        self.created.lock().unwrap().push((
            metadata.id().clone(),
            data_dir.to_path_buf(),
            handle.clone(),
        ));
        Ok(handle)
    }
}

// =============================================================================
// Snapshot mocks
// =============================================================================

struct MockSnapshotReader {
    size: u64,
    content: Bytes,
}

impl SnapshotReader for MockSnapshotReader {
    fn size(&self) -> u64 {
        self.size
    }

    fn data(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.content.clone())))
    }
}

/// In-memory snapshot store.
pub struct MockSnapshotStore {
    snapshots: Vec<(SnapshotMetadata, Bytes)>,
    fail_listing: bool,
}

impl MockSnapshotStore {
    pub fn empty() -> Self {
        Self {
            snapshots: Vec::new(),
            fail_listing: false,
        }
    }

    /// A store whose `list_snapshots` fails.
    pub fn failing() -> Self {
        Self {
            snapshots: Vec::new(),
            fail_listing: true,
        }
    }

    /// Add a snapshot whose advertised length matches its content.
    pub fn with_snapshot(mut self, name: &str, log_position: i64, content: Bytes) -> Self {
        self.snapshots.push((
            SnapshotMetadata {
                name: name.to_string(),
                log_position,
                length: content.len() as u64,
                checksum: Bytes::from(format!("crc-{}", content.len())),
                replicable: true,
            },
            content,
        ));
        self
    }

    /// Add a snapshot that must not be served to lagging replicas.
    pub fn with_pending_snapshot(mut self, name: &str, log_position: i64, content: Bytes) -> Self {
        self.snapshots.push((
            SnapshotMetadata {
                name: name.to_string(),
                log_position,
                length: content.len() as u64,
                checksum: Bytes::new(),
                replicable: false,
            },
            content,
        ));
        self
    }

    /// Add a snapshot whose advertised length exceeds its actual content,
    /// for exercising seek/read failure paths.
    pub fn with_oversized_snapshot(
        mut self,
        name: &str,
        advertised_length: u64,
        content: Bytes,
    ) -> Self {
        self.snapshots.push((
            SnapshotMetadata {
                name: name.to_string(),
                log_position: 0,
                length: advertised_length,
                checksum: Bytes::new(),
                replicable: true,
            },
            content,
        ));
        self
    }
}

impl SnapshotStore for MockSnapshotStore {
    fn list_snapshots(&self) -> ClusterResult<Vec<SnapshotMetadata>> {
        if self.fail_listing {
            return Err(ClusterError::Read("snapshot listing failed".into()));
        }
        Ok(self.snapshots.iter().map(|(md, _)| md.clone()).collect())
    }

    fn latest_snapshot(&self, name: &str) -> ClusterResult<Option<Box<dyn SnapshotReader>>> {
        Ok(self
            .snapshots
            .iter()
            .find(|(md, _)| md.name == name)
            .map(|(md, content)| {
                Box::new(MockSnapshotReader {
                    size: md.length,
                    content: content.clone(),
                }) as Box<dyn SnapshotReader>
            }))
    }
}

// =============================================================================
// Configuration mocks
// =============================================================================

/// In-memory configuration manager with idempotent creation.
pub struct MockConfigurationManager {
    configurations: DashMap<i32, PartitionConfiguration>,
    create_calls: AtomicUsize,
    fail_creation: AtomicBool,
}

impl MockConfigurationManager {
    pub fn new() -> Self {
        Self {
            configurations: DashMap::new(),
            create_calls: AtomicUsize::new(0),
            fail_creation: AtomicBool::new(false),
        }
    }

    /// Pre-populate an existing configuration.
    pub fn with_existing(self, configuration: PartitionConfiguration) -> Self {
        self.configurations
            .insert(configuration.partition_id(), configuration);
        self
    }

    pub fn fail_next_creations(&self) {
        self.fail_creation.store(true, Ordering::SeqCst);
    }

    pub fn create_call_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn configuration(&self, partition_id: i32) -> Option<PartitionConfiguration> {
        self.configurations
            .get(&partition_id)
            .map(|entry| entry.value().clone())
    }
}

impl Default for MockConfigurationManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigurationManager for MockConfigurationManager {
    async fn create_configuration(
        &self,
        partition_id: i32,
        replication_factor: i32,
        members: Vec<NodeId>,
    ) -> ClusterResult<CreateOutcome> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_creation.load(Ordering::SeqCst) {
            return Err(ClusterError::Config("configuration store down".into()));
        }
        if let Some(existing) = self.configurations.get(&partition_id) {
            return Ok(CreateOutcome::AlreadyExists(existing.value().clone()));
        }
        let configuration =
            PartitionConfiguration::new(partition_id, replication_factor, members);
        self.configurations.insert(partition_id, configuration.clone());
        Ok(CreateOutcome::Created(configuration))
    }
}

/// Installer recording what it was asked to install.
pub struct RecordingInstaller {
    installed: Mutex<Vec<PartitionConfiguration>>,
    fail: AtomicBool,
}

impl RecordingInstaller {
    pub fn new() -> Self {
        Self {
            installed: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_next_installs(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn installed(&self) -> Vec<PartitionConfiguration> {
        self.installed.lock().unwrap().clone()
    }
}

impl Default for RecordingInstaller {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PartitionInstaller for RecordingInstaller {
    async fn install(&self, configuration: PartitionConfiguration) -> ClusterResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClusterError::Consensus("installation failed".into()));
        }
        self.installed.lock().unwrap().push(configuration);
        Ok(())
    }
}
