//! Integration tests for partition lifecycle and group orchestration.
//!
//! These drive partitions and groups against the mock consensus factory,
//! verifying the open/close/delete state machine, deferred listener binding,
//! non-local no-ops, and the group's fan-out/fan-in failure semantics.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use raftshard::cluster::mock::MockRaftHandleFactory;
use raftshard::cluster::{
    ClusterError, ClusterServices, NodeId, Partition, PartitionDistributor, PartitionGroup,
    PartitionGroupConfig, PartitionId, RaftRole, RoundRobinDistributor,
};

fn nodes(names: &[&str]) -> Vec<NodeId> {
    names.iter().map(|n| NodeId::from(*n)).collect()
}

fn test_config(partitions: u32, replication_factor: u32) -> PartitionGroupConfig {
    PartitionGroupConfig {
        group_name: "grp".to_string(),
        partition_count: partitions,
        replication_factor,
        data_dir: std::env::temp_dir().join("raftshard-lifecycle-tests"),
        ..Default::default()
    }
}

fn services(local: &str, factory: Arc<MockRaftHandleFactory>) -> ClusterServices {
    ClusterServices {
        local_node: NodeId::from(local),
        handle_factory: factory,
        config: test_config(1, 3),
    }
}

fn metadata_for(
    members: &[&str],
    partition_count: u32,
    replication_factor: u32,
) -> Vec<raftshard::cluster::PartitionMetadata> {
    let ids: Vec<PartitionId> = (1..=partition_count as i32)
        .map(|i| PartitionId::new("grp", i))
        .collect();
    RoundRobinDistributor.distribute(&nodes(members), &ids, replication_factor)
}

// ============================================================================
// Partition lifecycle
// ============================================================================

#[tokio::test]
async fn open_starts_local_replica() {
    let factory = Arc::new(MockRaftHandleFactory::new());
    let services = services("a", factory.clone());
    let partition = Partition::new(PartitionId::new("grp", 1), std::env::temp_dir().join("p1"));

    let md = metadata_for(&["a", "b", "c"], 1, 3).remove(0);
    partition.open(md, &services).await.unwrap();

    assert_eq!(partition.state_name(), "opened");
    let handle = factory.handle_for(1).unwrap();
    assert!(handle.is_started());
    assert_eq!(partition.role(), Some(RaftRole::Follower));
    assert_eq!(partition.term(), Some(1));
}

#[tokio::test]
async fn open_skips_non_member() {
    let factory = Arc::new(MockRaftHandleFactory::new());
    let services = services("z", factory.clone());
    let partition = Partition::new(PartitionId::new("grp", 1), std::env::temp_dir().join("p1"));

    let md = metadata_for(&["a", "b", "c"], 1, 3).remove(0);
    partition.open(md, &services).await.unwrap();

    assert_eq!(partition.state_name(), "not-local");
    assert!(factory.created().is_empty());
    assert!(partition.term().is_none());
}

#[tokio::test]
async fn close_without_handle_completes_immediately() {
    let factory = Arc::new(MockRaftHandleFactory::new());
    let services = services("z", factory);
    let partition = Partition::new(PartitionId::new("grp", 1), std::env::temp_dir().join("p1"));

    let md = metadata_for(&["a", "b"], 1, 2).remove(0);
    partition.open(md, &services).await.unwrap();

    // Non-member: close is a no-op and the partition stays terminal.
    partition.close().await;
    assert_eq!(partition.state_name(), "not-local");
}

#[tokio::test]
async fn close_stops_the_replica() {
    let factory = Arc::new(MockRaftHandleFactory::new());
    let services = services("a", factory.clone());
    let partition = Partition::new(PartitionId::new("grp", 1), std::env::temp_dir().join("p1"));

    partition
        .open(metadata_for(&["a"], 1, 1).remove(0), &services)
        .await
        .unwrap();
    partition.close().await;

    assert_eq!(partition.state_name(), "closed");
    assert!(factory.handle_for(1).unwrap().is_stopped());
}

#[tokio::test]
async fn close_swallows_stop_failure() {
    let factory = Arc::new(MockRaftHandleFactory::failing_stop_for(1));
    let services = services("a", factory.clone());
    let partition = Partition::new(PartitionId::new("grp", 1), std::env::temp_dir().join("p1"));
    partition
        .open(metadata_for(&["a"], 1, 1).remove(0), &services)
        .await
        .unwrap();

    // close() must not propagate the stop failure.
    partition.close().await;
    assert_eq!(partition.state_name(), "closed");
}

#[tokio::test]
async fn delete_proceeds_past_stop_failure() {
    let dir = tempfile::tempdir().unwrap();
    let partition_dir = dir.path().join("grp").join("partitions").join("1");
    std::fs::create_dir_all(&partition_dir).unwrap();

    let factory = Arc::new(MockRaftHandleFactory::failing_stop_for(1));
    let services = services("a", factory);
    let partition = Partition::new(PartitionId::new("grp", 1), partition_dir.clone());
    partition
        .open(metadata_for(&["a"], 1, 1).remove(0), &services)
        .await
        .unwrap();

    // Deletion is attempted unconditionally after the failed stop.
    partition.delete().await.unwrap();
    assert!(!partition_dir.exists());
}

#[tokio::test]
async fn delete_removes_on_disk_state() {
    let dir = tempfile::tempdir().unwrap();
    let partition_dir = dir.path().join("grp").join("partitions").join("1");
    std::fs::create_dir_all(&partition_dir).unwrap();
    std::fs::write(partition_dir.join("segment-1.log"), b"entries").unwrap();

    let factory = Arc::new(MockRaftHandleFactory::new());
    let services = services("a", factory.clone());
    let partition = Partition::new(PartitionId::new("grp", 1), partition_dir.clone());
    partition
        .open(metadata_for(&["a"], 1, 1).remove(0), &services)
        .await
        .unwrap();

    partition.delete().await.unwrap();

    assert!(factory.handle_for(1).unwrap().is_stopped());
    assert!(!partition_dir.exists());
}

#[tokio::test]
async fn delete_without_on_disk_state_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    let partition = Partition::new(
        PartitionId::new("grp", 1),
        dir.path().join("never-created"),
    );
    partition.delete().await.unwrap();
}

#[tokio::test]
async fn step_down_requires_local_handle() {
    let partition = Partition::new(PartitionId::new("grp", 1), std::env::temp_dir().join("p1"));
    let err = partition.step_down().await.unwrap_err();
    assert!(matches!(err, ClusterError::NoLocalHandle(_)));
    let err = partition.go_inactive().await.unwrap_err();
    assert!(matches!(err, ClusterError::NoLocalHandle(_)));
}

#[tokio::test]
async fn step_down_forwards_to_handle() {
    let factory = Arc::new(MockRaftHandleFactory::new());
    let services = services("a", factory.clone());
    let partition = Partition::new(PartitionId::new("grp", 1), std::env::temp_dir().join("p1"));
    partition
        .open(metadata_for(&["a"], 1, 1).remove(0), &services)
        .await
        .unwrap();

    partition.step_down().await.unwrap();
    assert_eq!(factory.handle_for(1).unwrap().step_down_count(), 1);

    partition.go_inactive().await.unwrap();
    assert_eq!(partition.role(), Some(RaftRole::Inactive));
}

#[tokio::test]
async fn snapshot_is_noop_without_handle() {
    let partition = Partition::new(PartitionId::new("grp", 1), std::env::temp_dir().join("p1"));
    // Completes immediately with no error for non-local partitions.
    partition.trigger_snapshot().await.unwrap();
}

#[tokio::test]
async fn snapshot_forwards_to_handle() {
    let factory = Arc::new(MockRaftHandleFactory::new());
    let services = services("a", factory.clone());
    let partition = Partition::new(PartitionId::new("grp", 1), std::env::temp_dir().join("p1"));
    partition
        .open(metadata_for(&["a"], 1, 1).remove(0), &services)
        .await
        .unwrap();

    partition.trigger_snapshot().await.unwrap();
    assert_eq!(factory.handle_for(1).unwrap().snapshot_count(), 1);
}

#[tokio::test]
async fn failed_open_surfaces_error_and_closes() {
    let factory = Arc::new(MockRaftHandleFactory::failing_start_for(1));
    let services = services("a", factory);
    let partition = Partition::new(PartitionId::new("grp", 1), std::env::temp_dir().join("p1"));

    let err = partition
        .open(metadata_for(&["a"], 1, 1).remove(0), &services)
        .await
        .unwrap_err();
    assert!(matches!(err, ClusterError::Consensus(_)));
    assert_eq!(partition.state_name(), "closed");
}

// ============================================================================
// Deferred listener binding
// ============================================================================

#[tokio::test]
async fn listeners_registered_before_open_reach_the_handle() {
    let factory = Arc::new(MockRaftHandleFactory::new());
    let services = services("a", factory.clone());
    let partition = Partition::new(PartitionId::new("grp", 1), std::env::temp_dir().join("p1"));

    let observed = Arc::new(AtomicUsize::new(0));
    let observed2 = observed.clone();
    partition.add_role_change_listener(Arc::new(move |role, term| {
        if role == RaftRole::Leader && term == 3 {
            observed2.fetch_add(1, Ordering::SeqCst);
        }
    }));

    partition
        .open(metadata_for(&["a"], 1, 1).remove(0), &services)
        .await
        .unwrap();

    let handle = factory.handle_for(1).unwrap();
    assert_eq!(handle.listener_count(), 1);

    handle.emit_role_change(RaftRole::Leader, 3);
    assert_eq!(observed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn listener_removed_before_open_never_binds() {
    let factory = Arc::new(MockRaftHandleFactory::new());
    let services = services("a", factory.clone());
    let partition = Partition::new(PartitionId::new("grp", 1), std::env::temp_dir().join("p1"));

    let id = partition.add_role_change_listener(Arc::new(|_, _| {}));
    partition.remove_role_change_listener(id);

    partition
        .open(metadata_for(&["a"], 1, 1).remove(0), &services)
        .await
        .unwrap();
    assert_eq!(factory.handle_for(1).unwrap().listener_count(), 0);
}

#[tokio::test]
async fn listeners_registered_after_open_forward_directly() {
    let factory = Arc::new(MockRaftHandleFactory::new());
    let services = services("a", factory.clone());
    let partition = Partition::new(PartitionId::new("grp", 1), std::env::temp_dir().join("p1"));
    partition
        .open(metadata_for(&["a"], 1, 1).remove(0), &services)
        .await
        .unwrap();

    let id = partition.add_role_change_listener(Arc::new(|_, _| {}));
    let handle = factory.handle_for(1).unwrap();
    assert_eq!(handle.listener_count(), 1);

    partition.remove_role_change_listener(id);
    assert_eq!(handle.listener_count(), 0);
}

// ============================================================================
// Group orchestration
// ============================================================================

#[tokio::test]
async fn join_opens_only_local_partitions() {
    let factory = Arc::new(MockRaftHandleFactory::new());
    let group = PartitionGroup::new(
        test_config(8, 3),
        nodes(&["a", "b", "c", "d"]),
        NodeId::from("a"),
        &RoundRobinDistributor,
        factory.clone(),
    )
    .unwrap();

    group.join().await.unwrap();

    let local = group.local_partition_ids();
    assert_eq!(factory.created().len(), local.len());
    for id in &local {
        assert_eq!(group.partition(id).unwrap().state_name(), "opened");
    }
    // Non-local partitions never created a handle.
    for id in group.sorted_partition_ids() {
        if !local.contains(id) {
            assert_eq!(group.partition(id).unwrap().state_name(), "not-local");
        }
    }
}

#[tokio::test]
async fn join_failure_does_not_abort_siblings() {
    // Partition 2's open fails; every other partition still opens, and the
    // overall join reports the failure only after all opens ran.
    let factory = Arc::new(MockRaftHandleFactory::failing_start_for(2));
    let group = PartitionGroup::new(
        test_config(4, 1),
        nodes(&["a"]),
        NodeId::from("a"),
        &RoundRobinDistributor,
        factory.clone(),
    )
    .unwrap();

    let err = group.join().await.unwrap_err();
    assert!(matches!(err, ClusterError::Consensus(_)));

    for id in group.sorted_partition_ids() {
        let expected = if id.index() == 2 { "closed" } else { "opened" };
        assert_eq!(group.partition(id).unwrap().state_name(), expected);
    }
}

#[tokio::test]
async fn close_always_completes() {
    let factory = Arc::new(MockRaftHandleFactory::new());
    let group = PartitionGroup::new(
        test_config(3, 1),
        nodes(&["a"]),
        NodeId::from("a"),
        &RoundRobinDistributor,
        factory.clone(),
    )
    .unwrap();

    group.join().await.unwrap();
    group.close().await;

    for (_, _, handle) in factory.created() {
        assert!(handle.is_stopped());
    }
    for id in group.sorted_partition_ids() {
        assert_eq!(group.partition(id).unwrap().state_name(), "closed");
    }
}

#[tokio::test]
async fn metadata_is_pushed_into_partitions_on_join() {
    let factory = Arc::new(MockRaftHandleFactory::new());
    let group = PartitionGroup::new(
        test_config(2, 2),
        nodes(&["a", "b"]),
        NodeId::from("b"),
        &RoundRobinDistributor,
        factory,
    )
    .unwrap();

    group.join().await.unwrap();

    for id in group.sorted_partition_ids() {
        let partition = group.partition(id).unwrap();
        let md = partition.metadata().expect("metadata recorded on open");
        assert_eq!(md.id(), id);
        assert_eq!(md.replica_count(), 2);
    }
}
