//! Integration tests for transparent token refresh on HTTP 401

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use odsync_core::ports::cloud_provider::Tokens;
use odsync_core::ports::{CloudError, ICloudProvider};
use odsync_graph::auth::{save_tokens, KeyFileTokenStore, OAuth2Config, TokenRefresher, TokenSource};
use odsync_graph::{GraphClient, GraphCloudProvider};

use crate::common;

/// Hands out "stale" until refreshed, then "fresh-N"
#[derive(Default)]
struct CountingTokens {
    refreshes: AtomicU32,
    refreshable: bool,
}

#[async_trait::async_trait]
impl TokenSource for CountingTokens {
    async fn access_token(&self) -> anyhow::Result<String> {
        match self.refreshes.load(Ordering::SeqCst) {
            0 => Ok("stale".to_string()),
            n => Ok(format!("fresh-{n}")),
        }
    }

    async fn refresh(&self, _rejected: &str) -> anyhow::Result<String> {
        if !self.refreshable {
            anyhow::bail!("refresh disabled");
        }
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("fresh-{n}"))
    }
}

#[tokio::test]
async fn test_401_triggers_one_refresh_and_retry() {
    let (server, _) = common::setup_graph_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/me/drive/items/F1"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/me/drive/items/F1"))
        .and(header("authorization", "Bearer fresh-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = Arc::new(CountingTokens {
        refreshable: true,
        ..Default::default()
    });
    let provider = GraphCloudProvider::new(GraphClient::with_token_source(
        tokens.clone(),
        server.uri(),
    ));

    provider
        .delete(&common::file_entry("F1", 0))
        .await
        .expect("delete after refresh");
    assert_eq!(tokens.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_refresh_surfaces_unauthorized() {
    let (server, _) = common::setup_graph_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/me/drive/items/F1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = Arc::new(CountingTokens::default());
    let provider = GraphCloudProvider::new(GraphClient::with_token_source(tokens, server.uri()));

    let err = provider
        .delete(&common::file_entry("F1", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, CloudError::Unauthorized(_)));
}

#[tokio::test]
async fn test_persistent_401_is_not_retried_twice() {
    let (server, _) = common::setup_graph_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/me/drive/items/F1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let tokens = Arc::new(CountingTokens {
        refreshable: true,
        ..Default::default()
    });
    let provider = GraphCloudProvider::new(GraphClient::with_token_source(
        tokens.clone(),
        server.uri(),
    ));

    let err = provider
        .delete(&common::file_entry("F1", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, CloudError::Unauthorized(_)));
    assert_eq!(tokens.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_401s_share_one_refresh_grant() {
    let (server, _) = common::setup_graph_mock().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "rt-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    for id in ["F1", "F2"] {
        Mock::given(method("DELETE"))
            .and(path(format!("/me/drive/items/{id}")))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("/me/drive/items/{id}")))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let key_file = dir.path().join("keys.json");
    save_tokens(
        &key_file,
        &Tokens {
            access_token: "stale".into(),
            refresh_token: Some("rt-1".into()),
            expires_at: Utc::now() + Duration::hours(1),
        },
    )
    .await
    .unwrap();
    let oauth = OAuth2Config::new("app").with_token_url(format!("{}/token", server.uri()));
    let refresher = TokenRefresher::new(&oauth).unwrap();
    let store = KeyFileTokenStore::load(&key_file, Some(refresher)).unwrap();
    let provider = GraphCloudProvider::new(GraphClient::with_token_source(
        Arc::new(store),
        server.uri(),
    ));

    let f1 = common::file_entry("F1", 0);
    let f2 = common::file_entry("F2", 0);
    let (first, second) = tokio::join!(provider.delete(&f1), provider.delete(&f2),);
    first.expect("first delete after refresh");
    second.expect("second delete after refresh");
}
