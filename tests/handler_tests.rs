//! Integration tests for the management request handler.
//!
//! These drive the handler with encoded frames and assert on the decoded
//! responses, covering the invitation install path, snapshot listing, the
//! chunked-fetch validation ladder, and the error-code taxonomy.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;

use raftshard::cluster::mock::{
    MockConfigurationManager, MockSnapshotStore, RecordingInstaller,
};
use raftshard::cluster::{
    ManagementRequestHandler, NodeId, PartitionConfiguration, SnapshotStore, TrackedPartitions,
};
use raftshard::error::ErrorCode;
use raftshard::protocol::{
    CreatePartitionRequest, FetchSnapshotChunkRequest, InvitationRequest, ListSnapshotsRequest,
    ManagementResponse, MemberEndpoint, decode_response, encode_frame,
};

const BUFFER_CAPACITY: usize = 64;

struct Fixture {
    tracked: TrackedPartitions,
    configuration_manager: Arc<MockConfigurationManager>,
    installer: Arc<RecordingInstaller>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            tracked: Arc::new(DashMap::new()),
            configuration_manager: Arc::new(MockConfigurationManager::new()),
            installer: Arc::new(RecordingInstaller::new()),
        }
    }

    fn track(&self, partition_id: i32, store: MockSnapshotStore) {
        self.tracked
            .insert(partition_id, Arc::new(store) as Arc<dyn SnapshotStore>);
    }

    fn handler(&self) -> ManagementRequestHandler {
        ManagementRequestHandler::new(
            self.tracked.clone(),
            self.configuration_manager.clone(),
            self.installer.clone(),
            BUFFER_CAPACITY,
        )
    }
}

fn fetch_request(partition_id: i32, name: &str, offset: i64, length: i64) -> Bytes {
    encode_frame(&FetchSnapshotChunkRequest {
        partition_id,
        name: name.to_string(),
        log_position: 0,
        chunk_offset: offset,
        chunk_length: length,
    })
    .unwrap()
}

fn expect_error(response: Bytes, code: ErrorCode) -> String {
    match decode_response(response).unwrap() {
        ManagementResponse::Error(e) => {
            assert_eq!(e.code, code, "unexpected code, message: {}", e.message);
            e.message
        }
        other => panic!("expected error response, got {other:?}"),
    }
}

fn expect_chunk(response: Bytes) -> Bytes {
    match decode_response(response).unwrap() {
        ManagementResponse::FetchSnapshotChunk(c) => c.data,
        other => panic!("expected chunk response, got {other:?}"),
    }
}

// ============================================================================
// Invitation handling
// ============================================================================

#[tokio::test]
async fn invitation_creates_configuration_and_installs() {
    let fixture = Fixture::new();
    let mut handler = fixture.handler();

    let frame = encode_frame(&InvitationRequest {
        partition_id: 3,
        replication_factor: 3,
        term: 5,
        members: vec![
            MemberEndpoint {
                host: "10.0.0.1".to_string(),
                port: 26502,
            },
            MemberEndpoint {
                host: "10.0.0.2".to_string(),
                port: 26502,
            },
        ],
        topic: "orders".to_string(),
    })
    .unwrap();

    let response = handler.handle(frame).await;
    match decode_response(response).unwrap() {
        ManagementResponse::Invitation(ack) => assert_eq!(ack.term, 5),
        other => panic!("expected invitation ack, got {other:?}"),
    }

    let configuration = fixture.configuration_manager.configuration(3).unwrap();
    assert_eq!(configuration.replication_factor(), 3);
    assert_eq!(
        configuration.members(),
        &[NodeId::from("10.0.0.1:26502"), NodeId::from("10.0.0.2:26502")]
    );

    let installed = fixture.installer.installed();
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0].partition_id(), 3);
}

#[tokio::test]
async fn repeated_invitation_is_idempotent() {
    let fixture = Fixture::new();
    let mut handler = fixture.handler();

    let frame = encode_frame(&InvitationRequest {
        partition_id: 8,
        replication_factor: 3,
        term: 1,
        members: vec![MemberEndpoint {
            host: "n1".to_string(),
            port: 1000,
        }],
        topic: "t".to_string(),
    })
    .unwrap();

    // Inviter retries: both attempts must succeed with the same ack.
    for _ in 0..2 {
        let response = handler.handle(frame.clone()).await;
        assert!(matches!(
            decode_response(response).unwrap(),
            ManagementResponse::Invitation(_)
        ));
    }
    assert_eq!(fixture.configuration_manager.create_call_count(), 2);
}

#[tokio::test]
async fn preexisting_configuration_is_not_an_error() {
    let fixture = Fixture {
        configuration_manager: Arc::new(
            MockConfigurationManager::new()
                .with_existing(PartitionConfiguration::new(4, 3, vec![])),
        ),
        ..Fixture::new()
    };
    let mut handler = fixture.handler();

    let frame = encode_frame(&InvitationRequest {
        partition_id: 4,
        replication_factor: 3,
        term: 9,
        members: vec![],
        topic: "t".to_string(),
    })
    .unwrap();

    let response = handler.handle(frame).await;
    assert!(matches!(
        decode_response(response).unwrap(),
        ManagementResponse::Invitation(_)
    ));
    // The pre-existing configuration is installed, not recreated.
    assert_eq!(fixture.installer.installed().len(), 1);
}

#[tokio::test]
async fn installation_failure_still_acks() {
    let fixture = Fixture::new();
    fixture.installer.fail_next_installs();
    let mut handler = fixture.handler();

    let frame = encode_frame(&InvitationRequest {
        partition_id: 2,
        replication_factor: 1,
        term: 3,
        members: vec![],
        topic: "t".to_string(),
    })
    .unwrap();

    // Fire-and-forget: no negative ack even when installation fails.
    let response = handler.handle(frame).await;
    assert!(matches!(
        decode_response(response).unwrap(),
        ManagementResponse::Invitation(_)
    ));
}

#[tokio::test]
async fn configuration_failure_still_acks() {
    let fixture = Fixture::new();
    fixture.configuration_manager.fail_next_creations();
    let mut handler = fixture.handler();

    let frame = encode_frame(&InvitationRequest {
        partition_id: 2,
        replication_factor: 1,
        term: 3,
        members: vec![],
        topic: "t".to_string(),
    })
    .unwrap();

    let response = handler.handle(frame).await;
    assert!(matches!(
        decode_response(response).unwrap(),
        ManagementResponse::Invitation(_)
    ));
    assert!(fixture.installer.installed().is_empty());
}

#[tokio::test]
async fn create_partition_uses_the_same_path() {
    let fixture = Fixture::new();
    let mut handler = fixture.handler();

    let frame = encode_frame(&CreatePartitionRequest {
        partition_id: 6,
        replication_factor: 2,
        topic: "payments".to_string(),
    })
    .unwrap();

    let response = handler.handle(frame).await;
    assert!(matches!(
        decode_response(response).unwrap(),
        ManagementResponse::Invitation(_)
    ));
    assert!(fixture.configuration_manager.configuration(6).is_some());
    assert_eq!(fixture.installer.installed().len(), 1);
}

// ============================================================================
// ListSnapshots
// ============================================================================

#[tokio::test]
async fn list_snapshots_unknown_partition() {
    let fixture = Fixture::new();
    let mut handler = fixture.handler();

    let frame = encode_frame(&ListSnapshotsRequest { partition_id: 99 }).unwrap();
    let response = handler.handle(frame).await;
    expect_error(response, ErrorCode::PartitionNotFound);
}

#[tokio::test]
async fn list_snapshots_filters_non_replicable() {
    let fixture = Fixture::new();
    fixture.track(
        1,
        MockSnapshotStore::empty()
            .with_snapshot("snapshot-1", 100, Bytes::from_static(b"aaaa"))
            .with_pending_snapshot("snapshot-2", 200, Bytes::from_static(b"bbbb"))
            .with_snapshot("snapshot-3", 300, Bytes::from_static(b"cccccc")),
    );
    let mut handler = fixture.handler();

    let frame = encode_frame(&ListSnapshotsRequest { partition_id: 1 }).unwrap();
    let response = handler.handle(frame).await;

    match decode_response(response).unwrap() {
        ManagementResponse::ListSnapshots(listing) => {
            let names: Vec<_> = listing.snapshots.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(names, vec!["snapshot-1", "snapshot-3"]);
            assert_eq!(listing.snapshots[0].log_position, 100);
            assert_eq!(listing.snapshots[0].length, 4);
            assert!(!listing.snapshots[0].checksum.is_empty());
        }
        other => panic!("expected listing, got {other:?}"),
    }
}

#[tokio::test]
async fn list_snapshots_empty_store() {
    let fixture = Fixture::new();
    fixture.track(1, MockSnapshotStore::empty());
    let mut handler = fixture.handler();

    let frame = encode_frame(&ListSnapshotsRequest { partition_id: 1 }).unwrap();
    let response = handler.handle(frame).await;

    match decode_response(response).unwrap() {
        ManagementResponse::ListSnapshots(listing) => assert!(listing.snapshots.is_empty()),
        other => panic!("expected listing, got {other:?}"),
    }
}

#[tokio::test]
async fn list_snapshots_store_failure_is_read_error() {
    let fixture = Fixture::new();
    fixture.track(1, MockSnapshotStore::failing());
    let mut handler = fixture.handler();

    let frame = encode_frame(&ListSnapshotsRequest { partition_id: 1 }).unwrap();
    let response = handler.handle(frame).await;
    expect_error(response, ErrorCode::ReadError);
}

// ============================================================================
// FetchSnapshotChunk
// ============================================================================

#[tokio::test]
async fn fetch_chunk_unknown_partition() {
    let fixture = Fixture::new();
    let mut handler = fixture.handler();

    let response = handler.handle(fetch_request(42, "snapshot-1", 0, 16)).await;
    expect_error(response, ErrorCode::PartitionNotFound);
}

#[tokio::test]
async fn fetch_chunk_unknown_snapshot_name() {
    let fixture = Fixture::new();
    fixture.track(1, MockSnapshotStore::empty());
    let mut handler = fixture.handler();

    let response = handler.handle(fetch_request(1, "missing", 0, 16)).await;
    let message = expect_error(response, ErrorCode::InvalidParameters);
    assert!(message.contains("no snapshot found"), "message: {message}");
}

#[tokio::test]
async fn fetch_chunk_negative_offset() {
    let fixture = Fixture::new();
    fixture.track(
        1,
        MockSnapshotStore::empty().with_snapshot("s", 0, Bytes::from_static(b"data")),
    );
    let mut handler = fixture.handler();

    let response = handler.handle(fetch_request(1, "s", -1, 16)).await;
    expect_error(response, ErrorCode::InvalidParameters);
}

#[tokio::test]
async fn fetch_chunk_offset_at_snapshot_length() {
    // Zero remaining bytes: the computed chunk length drops below 1.
    let content = Bytes::from_static(b"0123456789");
    let fixture = Fixture::new();
    fixture.track(1, MockSnapshotStore::empty().with_snapshot("s", 0, content));
    let mut handler = fixture.handler();

    let response = handler.handle(fetch_request(1, "s", 10, 16)).await;
    let message = expect_error(response, ErrorCode::InvalidParameters);
    assert!(message.contains("chunkLength"), "message: {message}");
}

#[tokio::test]
async fn fetch_chunk_zero_requested_length() {
    let fixture = Fixture::new();
    fixture.track(
        1,
        MockSnapshotStore::empty().with_snapshot("s", 0, Bytes::from_static(b"data")),
    );
    let mut handler = fixture.handler();

    let response = handler.handle(fetch_request(1, "s", 0, 0)).await;
    expect_error(response, ErrorCode::InvalidParameters);
}

#[tokio::test]
async fn fetch_chunk_serves_exact_bytes() {
    let content = Bytes::from_static(b"the quick brown fox jumps over the lazy dog");
    let fixture = Fixture::new();
    fixture.track(
        1,
        MockSnapshotStore::empty().with_snapshot("s", 0, content.clone()),
    );
    let mut handler = fixture.handler();

    let data = expect_chunk(handler.handle(fetch_request(1, "s", 4, 5)).await);
    assert_eq!(data, content.slice(4..9));
}

#[tokio::test]
async fn fetch_chunk_clamps_to_remaining_bytes() {
    let content = Bytes::from_static(b"0123456789");
    let fixture = Fixture::new();
    fixture.track(
        1,
        MockSnapshotStore::empty().with_snapshot("s", 0, content.clone()),
    );
    let mut handler = fixture.handler();

    // Ask for far more than remains past offset 6: get exactly the tail.
    let data = expect_chunk(handler.handle(fetch_request(1, "s", 6, 1 << 20)).await);
    assert_eq!(data, content.slice(6..));
}

#[tokio::test]
async fn fetch_chunk_clamps_to_buffer_capacity() {
    let content = Bytes::from(vec![7u8; BUFFER_CAPACITY * 3]);
    let fixture = Fixture::new();
    fixture.track(
        1,
        MockSnapshotStore::empty().with_snapshot("s", 0, content.clone()),
    );
    let mut handler = fixture.handler();

    let data = expect_chunk(
        handler
            .handle(fetch_request(1, "s", 0, (BUFFER_CAPACITY * 2) as i64))
            .await,
    );
    assert_eq!(data.len(), BUFFER_CAPACITY);
}

#[tokio::test]
async fn fetch_chunk_whole_snapshot_by_chunks() {
    let content = Bytes::from((0..=255u8).cycle().take(200).collect::<Vec<_>>());
    let fixture = Fixture::new();
    fixture.track(
        1,
        MockSnapshotStore::empty().with_snapshot("s", 0, content.clone()),
    );
    let mut handler = fixture.handler();

    let mut assembled = Vec::new();
    let mut offset = 0i64;
    while (offset as usize) < content.len() {
        let data = expect_chunk(
            handler
                .handle(fetch_request(1, "s", offset, BUFFER_CAPACITY as i64))
                .await,
        );
        assert!(!data.is_empty());
        offset += data.len() as i64;
        assembled.extend_from_slice(&data);
    }
    assert_eq!(Bytes::from(assembled), content);
}

#[tokio::test]
async fn fetch_chunk_seek_shortfall_is_read_error() {
    // Advertised length exceeds the actual stream: skipping to an offset
    // inside the advertised-but-missing range fails.
    let fixture = Fixture::new();
    fixture.track(
        1,
        MockSnapshotStore::empty().with_oversized_snapshot(
            "s",
            100,
            Bytes::from_static(b"short"),
        ),
    );
    let mut handler = fixture.handler();

    let response = handler.handle(fetch_request(1, "s", 50, 10)).await;
    let message = expect_error(response, ErrorCode::ReadError);
    assert!(message.contains("could not seek"), "message: {message}");
}

#[tokio::test]
async fn fetch_chunk_empty_read_is_read_error() {
    // Offset lands exactly at the end of the actual stream while the
    // advertised length promises more.
    let fixture = Fixture::new();
    fixture.track(
        1,
        MockSnapshotStore::empty().with_oversized_snapshot(
            "s",
            100,
            Bytes::from_static(b"short"),
        ),
    );
    let mut handler = fixture.handler();

    let response = handler.handle(fetch_request(1, "s", 5, 10)).await;
    expect_error(response, ErrorCode::ReadError);
}

// ============================================================================
// Malformed frames
// ============================================================================

#[tokio::test]
async fn malformed_frame_yields_error_response() {
    let fixture = Fixture::new();
    let mut handler = fixture.handler();

    let response = handler.handle(Bytes::from_static(&[0, 1, 2])).await;
    expect_error(response, ErrorCode::InvalidParameters);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn concurrent_requests_against_different_partitions() {
    // The tracked map is shared; each serving task runs its own handler
    // instance. Both requests succeed independently.
    let fixture = Fixture::new();
    fixture.track(
        1,
        MockSnapshotStore::empty().with_snapshot("a", 10, Bytes::from_static(b"partition-one")),
    );
    fixture.track(
        2,
        MockSnapshotStore::empty().with_snapshot("b", 20, Bytes::from_static(b"partition-two")),
    );

    let mut list_handler = fixture.handler();
    let mut fetch_handler = fixture.handler();

    let list = async {
        list_handler
            .handle(encode_frame(&ListSnapshotsRequest { partition_id: 1 }).unwrap())
            .await
    };
    let fetch = async { fetch_handler.handle(fetch_request(2, "b", 0, 13)).await };

    let (list_response, fetch_response) = tokio::join!(list, fetch);

    match decode_response(list_response).unwrap() {
        ManagementResponse::ListSnapshots(listing) => {
            assert_eq!(listing.snapshots.len(), 1);
            assert_eq!(listing.snapshots[0].name, "a");
        }
        other => panic!("expected listing, got {other:?}"),
    }
    assert_eq!(expect_chunk(fetch_response), Bytes::from_static(b"partition-two"));
}

#[tokio::test]
async fn concurrent_requests_against_same_untracked_partition() {
    let fixture = Fixture::new();
    let mut list_handler = fixture.handler();
    let mut fetch_handler = fixture.handler();

    let list = async {
        list_handler
            .handle(encode_frame(&ListSnapshotsRequest { partition_id: 7 }).unwrap())
            .await
    };
    let fetch = async { fetch_handler.handle(fetch_request(7, "s", 0, 1)).await };

    let (list_response, fetch_response) = tokio::join!(list, fetch);
    expect_error(list_response, ErrorCode::PartitionNotFound);
    expect_error(fetch_response, ErrorCode::PartitionNotFound);
}
