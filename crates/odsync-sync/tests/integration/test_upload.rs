//! Upload direction: local tree mirrored onto the in-memory drive

use std::sync::Arc;

use tempfile::TempDir;

use odsync_core::domain::SyncDirection;
use odsync_core::ports::CloudError;
use odsync_sync::{LocalFileSystemAdapter, SyncEngine, SyncOptions, SyncSummary};

use crate::common::{self, ts, Call, MemoryCloud};

async fn run(cloud: &Arc<MemoryCloud>, dir: &TempDir, options: SyncOptions) -> SyncSummary {
    let engine = SyncEngine::new(
        cloud.clone(),
        Arc::new(LocalFileSystemAdapter::new()),
        options,
    );
    engine
        .run(cloud.root(), dir.path().to_path_buf())
        .await
        .expect("run completes")
}

fn upload_options() -> SyncOptions {
    common::options(SyncDirection::Upload)
}

// ============================================================================
// Full tree and idempotency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_uploads_new_tree_with_dates() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    common::write_file(&dir.path().join("a.txt"), b"alpha", ts(1_600_000_000));
    common::write_file(&dir.path().join("sub/b.txt"), b"bravo!", ts(1_600_000_100));
    common::write_file(&dir.path().join("sub/deeper/c.txt"), b"c", ts(1_600_000_200));

    let summary = run(&cloud, &dir, upload_options()).await;

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.files_uploaded, 3);
    assert_eq!(summary.bytes_uploaded, 12);
    assert_eq!(summary.folders_created, 2);
    assert_eq!(summary.metadata_updated, 3);

    assert_eq!(cloud.content("a.txt").unwrap(), b"alpha");
    assert_eq!(cloud.content("sub/b.txt").unwrap(), b"bravo!");
    assert_eq!(cloud.content("sub/deeper/c.txt").unwrap(), b"c");
    assert_eq!(cloud.find("sub/b.txt").unwrap().modified, ts(1_600_000_100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_run_makes_no_changes() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    common::write_file(&dir.path().join("a.txt"), b"alpha", ts(1_600_000_000));
    common::write_file(&dir.path().join("sub/b.txt"), b"bravo", ts(1_600_000_100));

    run(&cloud, &dir, upload_options()).await;
    cloud.clear_calls();

    let summary = run(&cloud, &dir, upload_options()).await;

    assert!(cloud.mutations().is_empty(), "unexpected calls: {:?}", cloud.mutations());
    assert_eq!(summary.unchanged, 2);
    assert_eq!(summary.files_transferred(), 0);
    assert!(summary.is_success());
}

// ============================================================================
// Change detection
// ============================================================================

#[tokio::test]
async fn test_changed_content_is_replaced() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.txt");
    common::write_file(&path, b"version one", ts(1_600_000_000));
    run(&cloud, &dir, upload_options()).await;
    let original_id = cloud.find("notes.txt").unwrap().id;

    common::write_file(&path, b"version two, longer", ts(1_600_000_500));
    cloud.clear_calls();
    let summary = run(&cloud, &dir, upload_options()).await;

    assert_eq!(summary.files_uploaded, 1);
    assert_eq!(cloud.content("notes.txt").unwrap(), b"version two, longer");
    assert_eq!(cloud.find("notes.txt").unwrap().id, original_id);
    assert_eq!(cloud.find("notes.txt").unwrap().modified, ts(1_600_000_500));
}

#[tokio::test]
async fn test_dates_only_change_updates_metadata() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("photo.jpg");
    common::write_file(&path, b"jpeg bytes", ts(1_600_000_000));
    run(&cloud, &dir, upload_options()).await;

    common::set_mtime(&path, ts(1_700_000_000));
    cloud.clear_calls();
    let summary = run(&cloud, &dir, upload_options()).await;

    assert_eq!(summary.files_uploaded, 0);
    assert_eq!(summary.metadata_updated, 1);
    assert_eq!(cloud.mutations(), vec![Call::UpdateDates("photo.jpg".to_string())]);
    assert_eq!(cloud.find("photo.jpg").unwrap().modified, ts(1_700_000_000));
}

#[tokio::test]
async fn test_force_hash_with_identical_content_changes_nothing() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    common::write_file(&dir.path().join("same.txt"), b"same", ts(1_600_000_000));
    run(&cloud, &dir, upload_options()).await;
    cloud.clear_calls();

    let options = SyncOptions {
        force_hash: true,
        ..upload_options()
    };
    let summary = run(&cloud, &dir, options).await;

    assert!(cloud.mutations().is_empty());
    assert_eq!(summary.unchanged, 1);
}

#[tokio::test]
async fn test_file_over_size_limit_is_skipped() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    common::write_file(&dir.path().join("big.bin"), &[7u8; 64], ts(1_600_000_000));
    common::write_file(&dir.path().join("small.bin"), &[1u8; 8], ts(1_600_000_000));

    let options = SyncOptions {
        max_size: Some(16),
        ..upload_options()
    };
    let summary = run(&cloud, &dir, options).await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.files_uploaded, 1);
    assert!(cloud.find("big.bin").is_none());
    assert!(cloud.find("small.bin").is_some());
}

#[tokio::test]
async fn test_names_differing_only_in_case_are_skipped_not_lost() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    common::write_file(&dir.path().join("A.txt"), b"upper", ts(1_600_000_000));
    common::write_file(&dir.path().join("a.txt"), b"lower", ts(1_600_000_000));
    common::write_file(&dir.path().join("sub/B.txt"), b"upper", ts(1_600_000_000));
    common::write_file(&dir.path().join("sub/b.txt"), b"lower", ts(1_600_000_000));

    let summary = run(&cloud, &dir, upload_options()).await;

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.files_uploaded, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(cloud.content("A.txt").unwrap(), b"upper");
    assert_eq!(cloud.content("sub/B.txt").unwrap(), b"upper");
    assert!(cloud.find("a.txt").is_none());
}

// ============================================================================
// Upload sessions
// ============================================================================

fn session_options() -> SyncOptions {
    SyncOptions {
        simple_upload_max: 100,
        chunk_size: 100,
        chunk_attempts: 3,
        ..upload_options()
    }
}

#[tokio::test]
async fn test_large_file_is_sent_in_contiguous_chunks() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    let content: Vec<u8> = (0..550u32).map(|i| (i % 256) as u8).collect();
    common::write_file(&dir.path().join("big.bin"), &content, ts(1_600_000_000));

    let summary = run(&cloud, &dir, session_options()).await;

    assert_eq!(summary.failed, 0);
    assert_eq!(
        cloud.chunk_calls(),
        vec![(0, 100), (100, 100), (200, 100), (300, 100), (400, 100), (500, 50)]
    );
    assert_eq!(cloud.content("big.bin").unwrap(), content);
    assert_eq!(summary.bytes_uploaded, 550);
}

#[tokio::test]
async fn test_failed_chunk_is_resent_in_place() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    let content: Vec<u8> = (0..550u32).map(|i| (i * 7 % 256) as u8).collect();
    common::write_file(&dir.path().join("big.bin"), &content, ts(1_600_000_000));
    cloud.fail_chunk(200, 1);

    let summary = run(&cloud, &dir, session_options()).await;

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.files_uploaded, 1);
    assert_eq!(
        cloud.chunk_calls(),
        vec![
            (0, 100),
            (100, 100),
            (200, 100),
            (200, 100),
            (300, 100),
            (400, 100),
            (500, 50)
        ]
    );
    assert_eq!(cloud.content("big.bin").unwrap(), content);
}

#[tokio::test]
async fn test_chunk_attempts_exhausted_fails_task() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    common::write_file(&dir.path().join("big.bin"), &[3u8; 250], ts(1_600_000_000));
    common::write_file(&dir.path().join("ok.txt"), b"fine", ts(1_600_000_000));
    cloud.fail_chunk(100, 10);

    let options = SyncOptions {
        transfer_attempts: 1,
        ..session_options()
    };
    let summary = run(&cloud, &dir, options).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.files_uploaded, 1);
    assert!(cloud.find("big.bin").is_none());
    assert!(cloud.find("ok.txt").is_some());
    let attempts_at_100 = cloud.chunk_calls().iter().filter(|(o, _)| *o == 100).count();
    assert_eq!(attempts_at_100, 3);
}

#[tokio::test]
async fn test_verification_failure_retries_whole_transfer() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    common::write_file(&dir.path().join("a.txt"), b"payload", ts(1_600_000_000));
    cloud.corrupt_uploads(1);

    let summary = run(&cloud, &dir, upload_options()).await;

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.files_uploaded, 1);
    let uploads = cloud
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::UploadFile(_)))
        .count();
    assert_eq!(uploads, 2);
}

// ============================================================================
// Deletes, kind changes, folders
// ============================================================================

#[tokio::test]
async fn test_mirror_deletes_remote_only_items() {
    let cloud = MemoryCloud::new();
    let root = cloud.root();
    cloud.add_file(&root, "stale.txt", b"old", ts(1), ts(1));
    let gone = cloud.add_folder(&root, "gone");
    cloud.add_file(&gone, "inner.txt", b"x", ts(1), ts(1));
    let dir = TempDir::new().unwrap();

    let summary = run(&cloud, &dir, upload_options()).await;

    assert_eq!(summary.deleted, 2);
    assert!(cloud.find("stale.txt").is_none());
    assert!(cloud.find("gone/inner.txt").is_none());
}

#[tokio::test]
async fn test_without_mirror_remote_only_items_stay() {
    let cloud = MemoryCloud::new();
    let root = cloud.root();
    cloud.add_file(&root, "keep.txt", b"keep", ts(1), ts(1));
    let dir = TempDir::new().unwrap();

    let options = SyncOptions {
        mirror_deletes: false,
        ..upload_options()
    };
    let summary = run(&cloud, &dir, options).await;

    assert_eq!(summary.deleted, 0);
    assert!(cloud.mutations().is_empty());
    assert!(cloud.find("keep.txt").is_some());
}

#[tokio::test]
async fn test_delete_of_vanished_item_is_not_a_failure() {
    let cloud = MemoryCloud::new();
    let root = cloud.root();
    cloud.add_file(&root, "racy.txt", b"x", ts(1), ts(1));
    cloud.inject("delete", CloudError::NotFound("racy.txt".into()));
    let dir = TempDir::new().unwrap();

    let summary = run(&cloud, &dir, upload_options()).await;

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.deleted, 0);
}

#[tokio::test]
async fn test_folder_replaced_by_file_is_deleted_then_uploaded() {
    let cloud = MemoryCloud::new();
    let root = cloud.root();
    let clash = cloud.add_folder(&root, "clash");
    cloud.add_file(&clash, "old.txt", b"old", ts(1), ts(1));
    let dir = TempDir::new().unwrap();
    common::write_file(&dir.path().join("clash"), b"now a file", ts(1_600_000_000));

    let summary = run(&cloud, &dir, upload_options()).await;

    assert_eq!(summary.failed, 0);
    let entry = cloud.find("clash").unwrap();
    assert!(!entry.is_directory);
    assert_eq!(cloud.content("clash").unwrap(), b"now a file");

    let calls = cloud.mutations();
    let delete_at = calls.iter().position(|c| *c == Call::Delete("clash".into())).unwrap();
    let upload_at = calls.iter().position(|c| *c == Call::UploadFile("clash".into())).unwrap();
    assert!(delete_at < upload_at);
}

#[tokio::test]
async fn test_existing_folder_is_reused_on_create_conflict() {
    let cloud = MemoryCloud::new();
    let root = cloud.root();
    let docs = cloud.add_folder(&root, "Docs");
    let dir = TempDir::new().unwrap();
    common::write_file(&dir.path().join("docs/readme.md"), b"# hi", ts(1_600_000_000));

    // Case-sensitive matching pairs nothing, so the engine tries to create
    // "docs" and the drive answers with a conflict on "Docs".
    let options = SyncOptions {
        case_sensitive: true,
        mirror_deletes: false,
        ..upload_options()
    };
    let summary = run(&cloud, &dir, options).await;

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.folders_created, 0);
    let readme = cloud.find("Docs/readme.md").unwrap();
    assert_eq!(readme.parent_id, Some(docs.id));
}

#[tokio::test]
async fn test_transient_listing_error_is_retried() {
    let cloud = MemoryCloud::new();
    cloud.inject(
        "list_children",
        CloudError::Server {
            status: 503,
            message: "busy".into(),
        },
    );
    let dir = TempDir::new().unwrap();
    common::write_file(&dir.path().join("a.txt"), b"a", ts(1_600_000_000));

    let summary = run(&cloud, &dir, upload_options()).await;

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.files_uploaded, 1);
}

// ============================================================================
// Dry run
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dry_run_counts_but_changes_nothing() {
    let cloud = MemoryCloud::new();
    let root = cloud.root();
    cloud.add_file(&root, "remote-only.txt", b"r", ts(1), ts(1));
    let dir = TempDir::new().unwrap();
    common::write_file(&dir.path().join("a.txt"), b"alpha", ts(1_600_000_000));
    common::write_file(&dir.path().join("sub/b.txt"), b"bravo", ts(1_600_000_000));
    let big: Vec<u8> = vec![9u8; 250];
    common::write_file(&dir.path().join("sub/big.bin"), &big, ts(1_600_000_000));

    let options = SyncOptions {
        dry_run: true,
        ..session_options()
    };
    let summary = run(&cloud, &dir, options).await;

    assert!(cloud.mutations().is_empty(), "unexpected calls: {:?}", cloud.mutations());
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.files_uploaded, 3);
    assert_eq!(summary.folders_created, 1);
    assert_eq!(summary.deleted, 1);
    assert!(cloud.find("remote-only.txt").is_some());
    assert!(cloud.find("a.txt").is_none());
}
