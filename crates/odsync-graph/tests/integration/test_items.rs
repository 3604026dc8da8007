//! Integration tests for item lookups, listings and metadata updates

use chrono::{TimeZone, Utc};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use odsync_core::domain::newtypes::{Crc32, RemotePath};
use odsync_core::ports::ICloudProvider;

use crate::common;

#[tokio::test]
async fn test_drive_info() {
    let (_server, provider) = common::setup_graph_mock().await;

    let info = provider.drive_info().await.expect("drive info");
    assert_eq!(info.id, "drive-test-001");
    assert_eq!(info.drive_type, "personal");
    assert_eq!(info.quota_total, 5_368_709_120);
    assert_eq!(info.quota_used, 1_073_741_824);
}

#[tokio::test]
async fn test_get_root_path_uses_root_endpoint() {
    let (_server, provider) = common::setup_graph_mock().await;

    let root = provider.get_path(&RemotePath::root()).await.expect("root");
    assert_eq!(root.id.as_str(), "ROOT");
    assert!(root.is_directory);
}

#[tokio::test]
async fn test_get_path_resolves_nested_folder() {
    let (server, provider) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Documents/Work"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::folder_json("WORK", "Work")))
        .expect(1)
        .mount(&server)
        .await;

    let entry = provider
        .get_path(&RemotePath::new("/Documents/Work".to_string()).unwrap())
        .await
        .expect("lookup");
    assert_eq!(entry.id.as_str(), "WORK");
    assert_eq!(entry.name, "Work");
}

#[tokio::test]
async fn test_list_children_follows_next_link() {
    let (server, provider) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/items/ROOT/children"))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [ common::file_json("F2", "b.txt", 5, "86A61036") ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/me/drive/items/ROOT/children"))
        .and(query_param("$top", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                common::folder_json("D1", "docs"),
                common::file_json("F1", "a.txt", 3, "00000000")
            ],
            "@odata.nextLink": format!(
                "{}/me/drive/items/ROOT/children?$skiptoken=page2",
                server.uri()
            )
        })))
        .expect(1)
        .mount(&server)
        .await;

    let root = provider.get_root().await.unwrap();
    let children = provider.list_children(&root).await.expect("children");

    let names: Vec<_> = children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["docs", "a.txt", "b.txt"]);
    assert!(children[0].is_directory);
    assert_eq!(children[2].hash, Some(Crc32::new(0x3610_a686)));
}

#[tokio::test]
async fn test_create_folder_sends_fail_conflict_behavior() {
    let (server, provider) = common::setup_graph_mock().await;

    Mock::given(method("POST"))
        .and(path("/me/drive/items/ROOT/children"))
        .and(body_json(serde_json::json!({
            "name": "Photos",
            "folder": {},
            "@microsoft.graph.conflictBehavior": "fail"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::folder_json("NEW", "Photos")))
        .expect(1)
        .mount(&server)
        .await;

    let folder = provider
        .create_folder(&common::parent("ROOT"), "Photos")
        .await
        .expect("create");
    assert_eq!(folder.id.as_str(), "NEW");
    assert!(folder.is_directory);
}

#[tokio::test]
async fn test_create_existing_folder_is_conflict() {
    let (server, provider) = common::setup_graph_mock().await;

    Mock::given(method("POST"))
        .and(path("/me/drive/items/ROOT/children"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error": { "code": "nameAlreadyExists", "message": "Name already exists" }
        })))
        .mount(&server)
        .await;

    let err = provider
        .create_folder(&common::parent("ROOT"), "Photos")
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_update_file_dates_patches_file_system_info() {
    let (server, provider) = common::setup_graph_mock().await;

    Mock::given(method("PATCH"))
        .and(path("/me/drive/items/F1"))
        .and(body_json(serde_json::json!({
            "fileSystemInfo": {
                "createdDateTime": "2025-01-01T08:00:00Z",
                "lastModifiedDateTime": "2025-02-01T09:30:00Z"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::file_json(
            "F1", "a.txt", 3, "00000000",
        )))
        .expect(1)
        .mount(&server)
        .await;

    provider
        .update_file_dates(
            &common::file_entry("F1", 3),
            Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 1, 9, 30, 0).unwrap(),
        )
        .await
        .expect("patch");
}

#[tokio::test]
async fn test_delete_item() {
    let (server, provider) = common::setup_graph_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/me/drive/items/F1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    provider
        .delete(&common::file_entry("F1", 0))
        .await
        .expect("delete");
}

#[tokio::test]
async fn test_delete_missing_item_is_not_found() {
    let (server, provider) = common::setup_graph_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/me/drive/items/GONE"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = provider.delete(&common::file_entry("GONE", 0)).await.unwrap_err();
    assert!(err.is_not_found());
}
