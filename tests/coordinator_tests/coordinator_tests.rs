//! Tests for Coordinator
//!
//! These tests verify:
//! - Opening (directories, ledger, stale scratch cleanup, config validation)
//! - Distribution outcomes: complete, partial, total failure
//! - Retrieval of complete files and failure on missing or unreachable parts
//! - Removal from nodes and ledger
//! - Re-upload replacing the previous version, and keeping it on failure
//! - Part counts other than two

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use atlasfs::coordinator::{DistributionOutcome, MissingReason, RemovalOutcome};
use atlasfs::network::{Server, ShutdownHandle};
use atlasfs::node::{NodeService, PartStore};
use atlasfs::{AtlasError, Coordinator, CoordinatorConfig, StorageServerInfo};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

struct RunningNode {
    info: StorageServerInfo,
    store: Arc<PartStore>,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<()>>,
}

impl RunningNode {
    fn stop(&mut self) {
        self.shutdown.shutdown();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
    }
}

impl Drop for RunningNode {
    fn drop(&mut self) {
        self.stop();
    }
}

fn start_node(root: &Path) -> RunningNode {
    let store = Arc::new(PartStore::open(root).unwrap());
    let server = Server::bind("127.0.0.1:0", NodeService::new(Arc::clone(&store))).unwrap();
    let port = server.local_addr().port();
    let shutdown = server.shutdown_handle();
    let thread = thread::spawn(move || server.run().unwrap());

    RunningNode {
        info: StorageServerInfo::new("127.0.0.1", port),
        store,
        shutdown,
        thread: Some(thread),
    }
}

fn config_for(temp: &TempDir, nodes: &[&RunningNode]) -> CoordinatorConfig {
    config_with_parts(temp, nodes, 2)
}

fn config_with_parts(
    temp: &TempDir,
    nodes: &[&RunningNode],
    part_count: usize,
) -> CoordinatorConfig {
    CoordinatorConfig::builder()
        .data_dir(temp.path().join("coordinator"))
        .storage_nodes(nodes.iter().map(|n| n.info.clone()).collect())
        .part_count(part_count)
        .connect_timeout_ms(2000)
        .read_timeout_ms(5000)
        .write_timeout_ms(5000)
        .build()
}

/// Coordinator splitting into `part_count` parts over as many live nodes
fn setup_cluster(part_count: usize) -> (TempDir, Coordinator, Vec<RunningNode>) {
    let temp = TempDir::new().unwrap();
    let nodes: Vec<RunningNode> = (0..part_count)
        .map(|i| start_node(&temp.path().join(format!("node_{}", i))))
        .collect();
    let refs: Vec<&RunningNode> = nodes.iter().collect();
    let coordinator = Coordinator::open(config_with_parts(&temp, &refs, part_count)).unwrap();
    (temp, coordinator, nodes)
}

/// Coordinator with two live nodes
fn setup() -> (TempDir, Coordinator, RunningNode, RunningNode) {
    let temp = TempDir::new().unwrap();
    let a = start_node(&temp.path().join("node_a"));
    let b = start_node(&temp.path().join("node_b"));
    let coordinator = Coordinator::open(config_for(&temp, &[&a, &b])).unwrap();
    (temp, coordinator, a, b)
}

fn upload(coordinator: &Coordinator, name: &str, data: &[u8]) -> DistributionOutcome {
    let mut reader = Cursor::new(data.to_vec());
    coordinator
        .distribute(name, data.len() as u64, &mut reader)
        .unwrap()
}

fn read_retrieved(coordinator: &Coordinator, name: &str) -> Vec<u8> {
    let mut retrieved = coordinator.retrieve(name).unwrap();
    let mut data = Vec::new();
    retrieved.file.read_to_end(&mut data).unwrap();
    assert_eq!(data.len() as u64, retrieved.length);
    data
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_layout() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("coordinator");
    let config = CoordinatorConfig::builder().data_dir(&data_dir).build();

    let coordinator = Coordinator::open(config).unwrap();

    assert!(data_dir.join("file_mapping.txt").exists());
    assert!(data_dir.join("tmp").is_dir());
    assert!(data_dir.join("download").is_dir());
    assert_eq!(coordinator.download_dir(), data_dir.join("download"));
    assert!(coordinator.list_files().is_empty());
}

#[test]
fn test_open_clears_stale_scratch() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("coordinator");
    let stale = data_dir.join("tmp").join("op-1-1");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("upload.tmp"), b"leftover").unwrap();

    let config = CoordinatorConfig::builder().data_dir(&data_dir).build();
    Coordinator::open(config).unwrap();

    assert!(!stale.exists());
    assert!(data_dir.join("tmp").is_dir());
}

#[test]
fn test_open_rejects_zero_parts() {
    let temp = TempDir::new().unwrap();
    let config = CoordinatorConfig::builder()
        .data_dir(temp.path())
        .part_count(0)
        .build();

    assert!(matches!(
        Coordinator::open(config),
        Err(AtlasError::Config(_))
    ));
}

// =============================================================================
// Distribution Tests
// =============================================================================

#[test]
fn test_distribute_hello() {
    let (_temp, coordinator, a, b) = setup();

    let outcome = upload(&coordinator, "hello.txt", b"0123456789");

    assert_eq!(outcome, DistributionOutcome::Complete { parts: 2 });
    assert_eq!(outcome.to_string(), "UPLOAD_COMPLETE: 2 parts stored");
    assert_eq!(fs::read(a.store.root().join("hello.txt.part1")).unwrap(), b"01234");
    assert_eq!(fs::read(b.store.root().join("hello.txt.part2")).unwrap(), b"56789");

    let ledger = fs::read_to_string(coordinator.ledger().path()).unwrap();
    assert_eq!(
        ledger,
        format!(
            "hello.txt,hello.txt.part1,{}\nhello.txt,hello.txt.part2,{}\n",
            a.info, b.info
        )
    );
}

#[test]
fn test_distribute_cleans_scratch() {
    let (_temp, coordinator, _a, _b) = setup();

    upload(&coordinator, "f.bin", b"some bytes");

    let scratch_root = coordinator.data_dir().join("tmp");
    assert_eq!(fs::read_dir(&scratch_root).unwrap().count(), 0);
}

#[test]
fn test_distribute_with_one_node_is_partial() {
    let temp = TempDir::new().unwrap();
    let a = start_node(&temp.path().join("node_a"));
    let coordinator = Coordinator::open(config_for(&temp, &[&a])).unwrap();

    let outcome = upload(&coordinator, "half.txt", b"0123456789");

    match &outcome {
        DistributionOutcome::PartialFailure { placed, missing } => {
            assert_eq!(*placed, 1);
            assert_eq!(missing.len(), 1);
            assert_eq!(missing[0].part_name, "half.txt.part2");
            assert_eq!(missing[0].reason, MissingReason::NoStorageNode);
        }
        other => panic!("Expected PartialFailure, got {:?}", other),
    }
    assert!(outcome.to_string().starts_with("UPLOAD_PARTIAL"));
    assert_eq!(coordinator.ledger().records_for("half.txt").len(), 1);
}

#[test]
fn test_distribute_with_no_nodes_is_total_failure() {
    let temp = TempDir::new().unwrap();
    let coordinator = Coordinator::open(config_for(&temp, &[])).unwrap();

    let outcome = upload(&coordinator, "none.txt", b"abc");

    assert!(matches!(outcome, DistributionOutcome::TotalFailure { .. }));
    assert!(outcome.to_string().starts_with("UPLOAD_FAILED"));
    assert!(coordinator.list_files().is_empty());
}

#[test]
fn test_distribute_unreachable_node_is_partial() {
    let (_temp, coordinator, _a, mut b) = setup();
    b.stop();

    let outcome = upload(&coordinator, "f.txt", b"0123456789");

    match outcome {
        DistributionOutcome::PartialFailure { placed, missing } => {
            assert_eq!(placed, 1);
            assert!(matches!(missing[0].reason, MissingReason::TransferFailed(_)));
        }
        other => panic!("Expected PartialFailure, got {:?}", other),
    }
}

#[test]
fn test_distribute_invalid_name_consumes_body() {
    let (_temp, coordinator, _a, _b) = setup();
    let mut reader = Cursor::new(b"0123456789NEXT".to_vec());

    let result = coordinator.distribute("../evil", 10, &mut reader);

    assert!(matches!(result, Err(AtlasError::InvalidName(_))));
    assert_eq!(reader.position(), 10);
}

#[test]
fn test_distribute_name_too_long_for_part_suffix() {
    let (_temp, coordinator, a, _b) = setup();
    let name = "n".repeat(252);
    let mut reader = Cursor::new(b"0123456789NEXT".to_vec());

    let result = coordinator.distribute(&name, 10, &mut reader);

    assert!(matches!(result, Err(AtlasError::InvalidName(_))));
    assert_eq!(reader.position(), 10);
    assert!(coordinator.list_files().is_empty());
    assert!(a.store.list_parts().unwrap().is_empty());

    // Longest name whose ".part2" still fits
    let name = "n".repeat(249);
    assert!(upload(&coordinator, &name, b"0123456789").is_complete());
    assert_eq!(read_retrieved(&coordinator, &name), b"0123456789");
}

#[test]
fn test_distribute_short_body_is_io_error() {
    let (_temp, coordinator, _a, _b) = setup();
    let mut reader = Cursor::new(b"abc".to_vec());

    let result = coordinator.distribute("short.txt", 10, &mut reader);

    assert!(matches!(result, Err(AtlasError::Io(_))));
    assert!(coordinator.list_files().is_empty());
}

// =============================================================================
// Retrieval Tests
// =============================================================================

#[test]
fn test_retrieve_roundtrip() {
    let (_temp, coordinator, _a, _b) = setup();
    let data: Vec<u8> = (0..4099u32).map(|i| (i * 7 % 256) as u8).collect();
    upload(&coordinator, "blob.bin", &data);

    assert_eq!(read_retrieved(&coordinator, "blob.bin"), data);
    assert_eq!(
        fs::read(coordinator.download_dir().join("blob.bin")).unwrap(),
        data
    );
}

#[test]
fn test_retrieve_empty_file() {
    let (_temp, coordinator, _a, _b) = setup();

    assert!(upload(&coordinator, "empty", b"").is_complete());

    assert!(read_retrieved(&coordinator, "empty").is_empty());
}

#[test]
fn test_retrieve_unknown_file() {
    let (_temp, coordinator, _a, _b) = setup();

    assert!(matches!(
        coordinator.retrieve("nope.txt"),
        Err(AtlasError::FileNotFound(_))
    ));
}

#[test]
fn test_retrieve_partial_upload_is_incomplete() {
    let temp = TempDir::new().unwrap();
    let a = start_node(&temp.path().join("node_a"));
    let coordinator = Coordinator::open(config_for(&temp, &[&a])).unwrap();
    upload(&coordinator, "half.txt", b"0123456789");

    match coordinator.retrieve("half.txt") {
        Err(AtlasError::IncompleteFile { file, missing }) => {
            assert_eq!(file, "half.txt");
            assert_eq!(missing, vec!["half.txt.part2"]);
        }
        other => panic!("Expected IncompleteFile, got {:?}", other),
    }
}

#[test]
fn test_retrieve_with_node_down_fails() {
    let (_temp, coordinator, _a, mut b) = setup();
    upload(&coordinator, "hello.txt", b"0123456789");
    b.stop();

    assert!(matches!(
        coordinator.retrieve("hello.txt"),
        Err(AtlasError::PartUnavailable { .. })
    ));
    let scratch_root = coordinator.data_dir().join("tmp");
    assert_eq!(fs::read_dir(&scratch_root).unwrap().count(), 0);
}

#[test]
fn test_retrieve_part_deleted_on_node_fails() {
    let (_temp, coordinator, a, _b) = setup();
    upload(&coordinator, "hello.txt", b"0123456789");
    fs::remove_file(a.store.root().join("hello.txt.part1")).unwrap();

    match coordinator.retrieve("hello.txt") {
        Err(AtlasError::PartUnavailable { part, .. }) => assert_eq!(part, "hello.txt.part1"),
        other => panic!("Expected PartUnavailable, got {:?}", other),
    }
}

// =============================================================================
// Removal Tests
// =============================================================================

#[test]
fn test_remove_file() {
    let (_temp, coordinator, a, b) = setup();
    upload(&coordinator, "hello.txt", b"0123456789");

    let outcome = coordinator.remove_file("hello.txt").unwrap();

    assert_eq!(
        outcome,
        RemovalOutcome::Deleted {
            parts: 2,
            node_failures: Vec::new()
        }
    );
    assert!(!a.store.contains("hello.txt.part1"));
    assert!(!b.store.contains("hello.txt.part2"));
    assert!(coordinator.list_files().is_empty());
    assert_eq!(fs::read_to_string(coordinator.ledger().path()).unwrap(), "");

    assert_eq!(
        coordinator.remove_file("hello.txt").unwrap(),
        RemovalOutcome::NotFound
    );
}

#[test]
fn test_remove_with_node_down_still_strikes_ledger() {
    let (_temp, coordinator, _a, mut b) = setup();
    upload(&coordinator, "hello.txt", b"0123456789");
    b.stop();

    match coordinator.remove_file("hello.txt").unwrap() {
        RemovalOutcome::Deleted { parts, node_failures } => {
            assert_eq!(parts, 2);
            assert_eq!(node_failures, vec!["hello.txt.part2"]);
        }
        other => panic!("Expected Deleted, got {:?}", other),
    }
    assert!(!coordinator.ledger().contains("hello.txt"));
}

// =============================================================================
// Listing / Re-upload / Persistence Tests
// =============================================================================

#[test]
fn test_list_is_unique() {
    let (_temp, coordinator, _a, _b) = setup();
    upload(&coordinator, "b.txt", b"bbbb");
    upload(&coordinator, "a.txt", b"aaaa");
    upload(&coordinator, "b.txt", b"bbbb");

    assert_eq!(coordinator.list_files(), vec!["a.txt", "b.txt"]);
}

#[test]
fn test_reupload_replaces_content() {
    let (_temp, coordinator, _a, _b) = setup();
    upload(&coordinator, "f.txt", b"first version");
    upload(&coordinator, "f.txt", b"second");

    assert_eq!(read_retrieved(&coordinator, "f.txt"), b"second");
    assert_eq!(coordinator.ledger().records_for("f.txt").len(), 2);
}

#[test]
fn test_failed_reupload_keeps_previous_version() {
    let (_temp, coordinator, mut a, mut b) = setup();
    upload(&coordinator, "f.txt", b"first version");
    let before = fs::read_to_string(coordinator.ledger().path()).unwrap();

    a.stop();
    b.stop();
    let outcome = upload(&coordinator, "f.txt", b"second");

    assert!(matches!(outcome, DistributionOutcome::TotalFailure { .. }));
    assert_eq!(coordinator.list_files(), vec!["f.txt"]);
    assert_eq!(coordinator.ledger().records_for("f.txt").len(), 2);
    assert_eq!(fs::read_to_string(coordinator.ledger().path()).unwrap(), before);
    assert_eq!(fs::read(a.store.root().join("f.txt.part1")).unwrap(), b"first ");
    assert_eq!(fs::read(b.store.root().join("f.txt.part2")).unwrap(), b"version");
}

#[test]
fn test_ledger_survives_restart() {
    let temp = TempDir::new().unwrap();
    let a = start_node(&temp.path().join("node_a"));
    let b = start_node(&temp.path().join("node_b"));

    {
        let coordinator = Coordinator::open(config_for(&temp, &[&a, &b])).unwrap();
        upload(&coordinator, "keep.txt", b"persistent");
    }

    let coordinator = Coordinator::open(config_for(&temp, &[&a, &b])).unwrap();
    assert_eq!(coordinator.list_files(), vec!["keep.txt"]);
    assert_eq!(read_retrieved(&coordinator, "keep.txt"), b"persistent");
}

#[test]
fn test_concurrent_uploads_of_distinct_files() {
    let (_temp, coordinator, _a, _b) = setup();
    let coordinator = Arc::new(coordinator);

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                let data = format!("contents of file {}", i).into_bytes();
                let outcome = upload(&coordinator, &format!("file{}.txt", i), &data);
                assert!(outcome.is_complete());
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(coordinator.list_files().len(), 6);
    for i in 0..6 {
        assert_eq!(
            read_retrieved(&coordinator, &format!("file{}.txt", i)),
            format!("contents of file {}", i).into_bytes()
        );
    }
}

// =============================================================================
// Part Count Tests
// =============================================================================

fn assert_spread(coordinator: &Coordinator, nodes: &[RunningNode], name: &str, data: &[u8]) {
    let k = nodes.len();
    let outcome = upload(coordinator, name, data);
    assert_eq!(outcome, DistributionOutcome::Complete { parts: k });

    let base = data.len() / k;
    for (i, node) in nodes.iter().enumerate() {
        let part = fs::read(node.store.root().join(format!("{}.part{}", name, i + 1))).unwrap();
        let expected = if i + 1 == k { data.len() - base * (k - 1) } else { base };
        assert_eq!(part.len(), expected, "size of part {}", i + 1);
    }

    let records = coordinator.ledger().records_for(name);
    assert_eq!(records.len(), k);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.part_name, format!("{}.part{}", name, i + 1));
        assert_eq!(record.node, nodes[i].info);
    }

    assert_eq!(read_retrieved(coordinator, name), data);
}

#[test]
fn test_three_parts() {
    let (_temp, coordinator, nodes) = setup_cluster(3);
    let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();

    assert_spread(&coordinator, &nodes, "three.bin", &data);

    let ledger = fs::read_to_string(coordinator.ledger().path()).unwrap();
    assert_eq!(ledger.lines().count(), 3);
}

#[test]
fn test_eleven_parts() {
    let (temp, coordinator, nodes) = setup_cluster(11);
    let data: Vec<u8> = (0..1007u32).map(|i| (i * 7 % 256) as u8).collect();

    assert_spread(&coordinator, &nodes, "wide.bin", &data);

    let ledger = fs::read_to_string(coordinator.ledger().path()).unwrap();
    assert_eq!(ledger.lines().count(), 11);
    assert!(ledger.contains(&format!("wide.bin,wide.bin.part10,{}\n", nodes[9].info)));
    assert!(ledger.contains(&format!("wide.bin,wide.bin.part11,{}\n", nodes[10].info)));

    // Reload orders part10 and part11 after part9, not after part1
    drop(coordinator);
    let refs: Vec<&RunningNode> = nodes.iter().collect();
    let reopened = Coordinator::open(config_with_parts(&temp, &refs, 11)).unwrap();
    let parts: Vec<String> = reopened
        .ledger()
        .records_for("wide.bin")
        .into_iter()
        .map(|r| r.part_name)
        .collect();
    assert_eq!(parts[8], "wide.bin.part9");
    assert_eq!(parts[9], "wide.bin.part10");
    assert_eq!(parts[10], "wide.bin.part11");
    assert_eq!(read_retrieved(&reopened, "wide.bin"), data);
}

#[test]
fn test_more_parts_than_bytes() {
    let (_temp, coordinator, nodes) = setup_cluster(3);

    assert_spread(&coordinator, &nodes, "tiny.txt", b"ab");
}
