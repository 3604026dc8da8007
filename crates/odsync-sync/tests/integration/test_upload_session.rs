//! Chunked upload sessions driven directly against the in-memory drive

use tempfile::TempDir;

use odsync_core::ports::ConflictBehavior;
use odsync_sync::retry::RetryPolicy;
use odsync_sync::upload_session::{SessionState, UploadSession};
use odsync_sync::LocalFileSystemAdapter;

use crate::common::{self, ts, Call, MemoryCloud};

#[tokio::test]
async fn test_session_completes_and_reports_crc() {
    let cloud = MemoryCloud::new();
    let fs = LocalFileSystemAdapter::new();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("big.bin");
    let content: Vec<u8> = (0..250u32).map(|i| (i % 256) as u8).collect();
    common::write_file(&path, &content, ts(1_600_000_000));

    let mut session = UploadSession::new(
        cloud.as_ref(),
        &fs,
        path,
        250,
        100,
        3,
        RetryPolicy::immediate(3),
    );
    assert_eq!(session.state(), &SessionState::Pending);

    let (entry, crc) = session
        .run(&cloud.root(), "big.bin", ConflictBehavior::Fail)
        .await
        .unwrap();

    assert_eq!(session.state(), &SessionState::Completed);
    assert_eq!(entry.size, 250);
    assert_eq!(crc.value(), crc32fast::hash(&content));
    assert_eq!(cloud.chunk_calls(), vec![(0, 100), (100, 100), (200, 50)]);
}

#[tokio::test]
async fn test_exhausted_chunk_attempts_record_confirmed_bytes() {
    let cloud = MemoryCloud::new();
    let fs = LocalFileSystemAdapter::new();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("big.bin");
    common::write_file(&path, &[3u8; 250], ts(1_600_000_000));
    cloud.fail_chunk(200, 5);

    let mut session = UploadSession::new(
        cloud.as_ref(),
        &fs,
        path,
        250,
        100,
        2,
        RetryPolicy::immediate(3),
    );
    let result = session
        .run(&cloud.root(), "big.bin", ConflictBehavior::Fail)
        .await;

    assert!(result.is_err());
    assert_eq!(session.state(), &SessionState::Failed { sent: 200 });
    assert_eq!(cloud.chunk_calls(), vec![(0, 100), (100, 100), (200, 50), (200, 50)]);
    assert!(cloud.find("big.bin").is_none());
}

#[tokio::test]
async fn test_empty_file_fails_before_starting() {
    let cloud = MemoryCloud::new();
    let fs = LocalFileSystemAdapter::new();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.bin");
    common::write_file(&path, b"", ts(1_600_000_000));

    let mut session =
        UploadSession::new(cloud.as_ref(), &fs, path, 0, 100, 3, RetryPolicy::immediate(3));
    let result = session
        .run(&cloud.root(), "empty.bin", ConflictBehavior::Fail)
        .await;

    assert!(result.is_err());
    assert_eq!(session.state(), &SessionState::Failed { sent: 0 });
    assert!(!cloud.calls().iter().any(|c| matches!(c, Call::StartSession(..))));
}
