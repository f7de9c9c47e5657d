//! Configuration for a partition group.
//!
//! A [`PartitionGroupConfig`] describes one named group: how many partitions
//! it has, how many replicas each partition targets, and where partition
//! state lives on disk. Configuration can be assembled directly, or loaded
//! from the environment with [`PartitionGroupConfig::from_env`].
//!
//! # Environment Variables
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `GROUP_NAME` | `group_name` | `raft` |
//! | `PARTITION_COUNT` | `partition_count` | `1` |
//! | `REPLICATION_FACTOR` | `replication_factor` | `1` |
//! | `DATA_DIR` | `data_dir` | `./data` |
//! | `PRIORITY_ELECTION` | `priority_election_enabled` | `true` |
//! | `LOG_COMPACTION` | `log_compaction_enabled` | `true` |
//! | `SNAPSHOT_READ_BUFFER_CAPACITY` | `snapshot_read_buffer_capacity` | `524288` |

use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{ClusterError, ClusterResult};
use crate::constants::{
    DEFAULT_GROUP_NAME, DEFAULT_PARTITION_COUNT, DEFAULT_REPLICATION_FACTOR,
    DEFAULT_SNAPSHOT_READ_BUFFER_CAPACITY, PARTITIONS_DIR_NAME,
};

/// Configuration for one partition group.
#[derive(Debug, Clone)]
pub struct PartitionGroupConfig {
    /// Name of the group; scopes partition ids and the on-disk layout.
    pub group_name: String,

    /// Number of partitions in the group. Ids are 1-based.
    pub partition_count: u32,

    /// Target number of replicas per partition. A partition gets
    /// `min(replication_factor, cluster size)` replicas.
    pub replication_factor: u32,

    /// Root storage directory. Partition state lives at
    /// `<data_dir>/<group_name>/partitions/<index>`.
    pub data_dir: PathBuf,

    /// Whether consensus handles should bias leader election by the
    /// distributor's priorities.
    pub priority_election_enabled: bool,

    /// Whether consensus handles should compact their log after snapshots.
    /// The compaction policy itself belongs to the storage layer; this is
    /// only the toggle passed through at handle creation.
    pub log_compaction_enabled: bool,

    /// Capacity of the snapshot read buffer, which also bounds the size of a
    /// single snapshot chunk served to a fetching replica.
    pub snapshot_read_buffer_capacity: usize,
}

impl Default for PartitionGroupConfig {
    fn default() -> Self {
        Self {
            group_name: DEFAULT_GROUP_NAME.to_string(),
            partition_count: DEFAULT_PARTITION_COUNT,
            replication_factor: DEFAULT_REPLICATION_FACTOR,
            data_dir: PathBuf::from("./data"),
            priority_election_enabled: true,
            log_compaction_enabled: true,
            snapshot_read_buffer_capacity: DEFAULT_SNAPSHOT_READ_BUFFER_CAPACITY,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> ClusterResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ClusterError::Config(format!("could not parse {key}={raw}"))),
        Err(_) => Ok(None),
    }
}

impl PartitionGroupConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> ClusterResult<Self> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("GROUP_NAME") {
            config.group_name = name;
        }
        if let Some(count) = env_parse::<u32>("PARTITION_COUNT")? {
            config.partition_count = count;
        }
        if let Some(factor) = env_parse::<u32>("REPLICATION_FACTOR")? {
            config.replication_factor = factor;
        }
        if let Ok(dir) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(enabled) = env_parse::<bool>("PRIORITY_ELECTION")? {
            config.priority_election_enabled = enabled;
        }
        if let Some(enabled) = env_parse::<bool>("LOG_COMPACTION")? {
            config.log_compaction_enabled = enabled;
        }
        if let Some(capacity) = env_parse::<usize>("SNAPSHOT_READ_BUFFER_CAPACITY")? {
            config.snapshot_read_buffer_capacity = capacity;
        }

        config.validate()?;
        debug!(
            group = %config.group_name,
            partitions = config.partition_count,
            replication_factor = config.replication_factor,
            "loaded partition group configuration"
        );
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ClusterResult<()> {
        if self.group_name.is_empty() {
            return Err(ClusterError::Config("group name must not be empty".into()));
        }
        if self.group_name.contains(['/', '\\']) {
            return Err(ClusterError::Config(format!(
                "group name {:?} must not contain path separators",
                self.group_name
            )));
        }
        if self.partition_count == 0 {
            return Err(ClusterError::Config(
                "partition count must be at least 1".into(),
            ));
        }
        if self.replication_factor == 0 {
            return Err(ClusterError::Config(
                "replication factor must be at least 1".into(),
            ));
        }
        if self.snapshot_read_buffer_capacity == 0 {
            return Err(ClusterError::Config(
                "snapshot read buffer capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Directory holding one partition's on-disk state.
    ///
    /// Layout: `<data_dir>/<group_name>/partitions/<1-based-index>`.
    pub fn partition_data_dir(&self, index: i32) -> PathBuf {
        self.data_dir
            .join(&self.group_name)
            .join(PARTITIONS_DIR_NAME)
            .join(index.to_string())
    }

    /// Root directory of the whole group.
    pub fn group_dir(&self) -> PathBuf {
        self.data_dir.join(&self.group_name)
    }

    #[inline]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
