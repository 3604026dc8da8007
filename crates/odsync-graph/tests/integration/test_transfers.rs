//! Integration tests for uploads and downloads
//!
//! Verifies end-to-end behavior of the single-request upload, the upload
//! session endpoints and streaming downloads against a wiremock server.

use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use odsync_core::domain::newtypes::Crc32;
use odsync_core::ports::{ChunkOutcome, ConflictBehavior, ICloudProvider, UploadSessionHandle};

use crate::common;

// ============================================================================
// Download tests
// ============================================================================

#[tokio::test]
async fn test_download_streams_content_to_file() {
    let (server, provider) = common::setup_graph_mock().await;

    let content: Vec<u8> = (0..1_048_576).map(|i| (i % 256) as u8).collect();
    common::mount_download(&server, "large-001", &content).await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("large.bin");
    let written = provider
        .download(&common::file_entry("large-001", content.len() as u64), &target)
        .await
        .expect("download");

    assert_eq!(written, content.len() as u64);
    assert_eq!(std::fs::read(&target).unwrap(), content);
}

#[tokio::test]
async fn test_download_empty_file() {
    let (server, provider) = common::setup_graph_mock().await;
    common::mount_download(&server, "empty-001", &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("empty.bin");
    let written = provider
        .download(&common::file_entry("empty-001", 0), &target)
        .await
        .expect("download");

    assert_eq!(written, 0);
    assert!(target.exists());
}

// ============================================================================
// Upload tests
// ============================================================================

#[tokio::test]
async fn test_upload_small_file_with_replace() {
    let (server, provider) = common::setup_graph_mock().await;

    Mock::given(method("PUT"))
        .and(path("/me/drive/items/ROOT:/hello.txt:/content"))
        .and(query_param("@microsoft.graph.conflictBehavior", "replace"))
        .and(body_bytes(b"hello".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::file_json(
            "UP1",
            "hello.txt",
            5,
            "86A61036",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let entry = provider
        .upload_file(
            &common::parent("ROOT"),
            "hello.txt",
            b"hello".to_vec(),
            ConflictBehavior::Replace,
        )
        .await
        .expect("upload");

    assert_eq!(entry.id.as_str(), "UP1");
    assert_eq!(entry.size, 5);
    assert_eq!(entry.hash, Some(Crc32::new(0x3610_a686)));
}

#[tokio::test]
async fn test_upload_session_creation() {
    let (server, provider) = common::setup_graph_mock().await;

    Mock::given(method("POST"))
        .and(path("/me/drive/items/ROOT:/big.bin:/createUploadSession"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "uploadUrl": format!("{}/upload/session-1", server.uri()),
            "expirationDateTime": "2026-01-20T10:00:00Z",
            "nextExpectedRanges": ["0-"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = provider
        .start_upload_session(
            &common::parent("ROOT"),
            "big.bin",
            1_000_000,
            ConflictBehavior::Fail,
        )
        .await
        .expect("session");

    assert_eq!(session.upload_url, format!("{}/upload/session-1", server.uri()));
    assert!(session.expires_at.is_some());
}

#[tokio::test]
async fn test_upload_chunk_accepted_then_completed() {
    let (server, provider) = common::setup_graph_mock().await;
    let session = UploadSessionHandle {
        upload_url: format!("{}/upload/session-2", server.uri()),
        expires_at: None,
    };

    Mock::given(method("PUT"))
        .and(path("/upload/session-2"))
        .and(header("Content-Range", "bytes 0-3/6"))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
            "expirationDateTime": "2026-01-20T10:00:00Z",
            "nextExpectedRanges": ["4-"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload/session-2"))
        .and(header("Content-Range", "bytes 4-5/6"))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::file_json(
            "DONE", "six.bin", 6, "00000000",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let first = provider
        .upload_chunk(&session, 0, 6, b"abcd".to_vec())
        .await
        .expect("chunk 1");
    assert_eq!(first, ChunkOutcome::Accepted { next_offset: 4 });

    let last = provider
        .upload_chunk(&session, 4, 6, b"ef".to_vec())
        .await
        .expect("chunk 2");
    match last {
        ChunkOutcome::Completed(entry) => {
            assert_eq!(entry.id.as_str(), "DONE");
            assert_eq!(entry.size, 6);
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_upload_chunk_does_not_send_authorization() {
    let (server, provider) = common::setup_graph_mock().await;
    let session = UploadSessionHandle {
        upload_url: format!("{}/upload/session-3", server.uri()),
        expires_at: None,
    };

    Mock::given(method("PUT"))
        .and(path("/upload/session-3"))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
            "nextExpectedRanges": ["2-"]
        })))
        .mount(&server)
        .await;

    provider
        .upload_chunk(&session, 0, 10, b"ab".to_vec())
        .await
        .expect("chunk");

    let requests = server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|r| r.url.path() == "/upload/session-3")
        .unwrap();
    assert!(!put.headers.contains_key("authorization"));
}
