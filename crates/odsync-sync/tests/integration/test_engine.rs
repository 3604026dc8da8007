//! Run preconditions and engine-level behavior

use std::sync::Arc;

use tempfile::TempDir;

use odsync_core::domain::SyncDirection;
use odsync_sync::{LocalFileSystemAdapter, SyncEngine, SyncError};

use crate::common::{self, ts, MemoryCloud};

fn engine(cloud: &Arc<MemoryCloud>, direction: SyncDirection) -> SyncEngine {
    SyncEngine::new(
        cloud.clone(),
        Arc::new(LocalFileSystemAdapter::new()),
        common::options(direction),
    )
}

#[tokio::test]
async fn test_remote_root_must_be_a_folder() {
    let cloud = MemoryCloud::new();
    let file = cloud.add_file(&cloud.root(), "file.txt", b"x", ts(1), ts(1));
    let dir = TempDir::new().unwrap();

    let err = engine(&cloud, SyncDirection::Upload)
        .run(file, dir.path().to_path_buf())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::RemoteRootNotFolder(name)) if name == "file.txt"
    ));
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn test_upload_requires_existing_local_root() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing");

    let err = engine(&cloud, SyncDirection::Upload)
        .run(cloud.root(), missing.clone())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::LocalRootMissing(path)) if *path == missing
    ));
}

#[tokio::test]
async fn test_local_root_must_be_a_directory() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("plain.txt");
    common::write_file(&file, b"x", ts(1));

    for direction in [SyncDirection::Upload, SyncDirection::Download] {
        let err = engine(&cloud, direction)
            .run(cloud.root(), file.clone())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::LocalRootNotDirectory(_))
        ));
    }
}

#[tokio::test]
async fn test_empty_trees_complete_immediately() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();

    let summary = engine(&cloud, SyncDirection::Upload)
        .run(cloud.root(), dir.path().to_path_buf())
        .await
        .unwrap();

    assert!(summary.is_success());
    assert!(!summary.interrupted);
    assert_eq!(summary.files_transferred(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_single_worker_completes_deep_tree() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    let mut path = dir.path().to_path_buf();
    for level in 0..6 {
        path = path.join(format!("level{level}"));
        common::write_file(&path.join("file.txt"), format!("{level}").as_bytes(), ts(1_600_000_000));
    }

    let mut options = common::options(SyncDirection::Upload);
    options.threads = 1;
    let summary = SyncEngine::new(cloud.clone(), Arc::new(LocalFileSystemAdapter::new()), options)
        .run(cloud.root(), dir.path().to_path_buf())
        .await
        .unwrap();

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.folders_created, 6);
    assert_eq!(summary.files_uploaded, 6);
    assert!(cloud
        .find("level0/level1/level2/level3/level4/level5/file.txt")
        .is_some());
}

#[tokio::test]
async fn test_cancelled_before_start_reports_interrupted() {
    let cloud = MemoryCloud::new();
    let dir = TempDir::new().unwrap();
    common::write_file(&dir.path().join("a.txt"), b"a", ts(1));

    let engine = engine(&cloud, SyncDirection::Upload);
    engine.cancellation_token().cancel();
    let summary = engine
        .run(cloud.root(), dir.path().to_path_buf())
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert!(!summary.is_success());
}
