//! Access token management for Microsoft Graph API
//!
//! Interactive sign-in is out of scope: tokens are obtained once by another
//! tool and stored in a JSON key file. This module keeps them fresh.
//!
//! ## Components
//!
//! - [`TokenSource`] - What the [`GraphClient`](crate::client::GraphClient) asks for a bearer token
//! - [`StaticToken`] - A fixed token that can't be refreshed
//! - [`OAuth2Config`] - Client ID and token endpoint used for refresh
//! - [`TokenRefresher`] - OAuth2 refresh-token grant via the `oauth2` crate
//! - [`KeyFileTokenStore`] - Tokens loaded from, and written back to, a key file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use oauth2::{
    basic::BasicClient, ClientId, EndpointNotSet, EndpointSet, RefreshToken, TokenResponse,
    TokenUrl,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use odsync_core::ports::cloud_provider::Tokens;

/// Default Microsoft OAuth2 token endpoint (consumers tenant)
const TOKEN_URL: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/token";

/// Refresh proactively when the access token expires within this window
const EXPIRY_MARGIN_MINUTES: i64 = 2;

// ============================================================================
// AuthError
// ============================================================================

/// Failures specific to token handling
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token cannot be refreshed (no refresh token or no client ID)
    #[error("Access token cannot be refreshed: {0}")]
    NotRefreshable(String),

    /// The key file is missing or malformed
    #[error("Invalid key file {path}: {reason}")]
    InvalidKeyFile { path: PathBuf, reason: String },
}

// ============================================================================
// TokenSource
// ============================================================================

/// Supplier of bearer tokens for Graph requests
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns a token believed to be valid
    async fn access_token(&self) -> Result<String>;

    /// Obtains a new token after the server rejected `rejected`
    ///
    /// Sources shared between concurrent requests should hand out the token
    /// that already replaced `rejected` instead of refreshing again.
    async fn refresh(&self, rejected: &str) -> Result<String>;
}

/// A fixed access token
///
/// Used in tests and for short-lived runs with a pasted token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    async fn refresh(&self, _rejected: &str) -> Result<String> {
        Err(AuthError::NotRefreshable("static token".to_string()).into())
    }
}

// ============================================================================
// OAuth2Config / TokenRefresher
// ============================================================================

/// Configuration for the OAuth2 refresh-token grant
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// Application (client) ID from Azure AD app registration
    pub client_id: String,
    /// Token endpoint
    pub token_url: String,
}

impl OAuth2Config {
    /// Creates a config for the consumers tenant
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            token_url: TOKEN_URL.to_string(),
        }
    }

    /// Uses a custom token endpoint
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }
}

/// OAuth2 refresh-token grant using the `oauth2` crate
pub struct TokenRefresher {
    client: BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    http: reqwest::Client,
}

impl TokenRefresher {
    /// Creates a refresher for the given configuration
    ///
    /// # Errors
    /// Returns an error if the token URL is invalid
    pub fn new(config: &OAuth2Config) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_token_uri(TokenUrl::new(config.token_url.clone()).context("Invalid token URL")?);

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build OAuth HTTP client")?;

        Ok(Self { client, http })
    }

    /// Exchanges a refresh token for a new token set
    ///
    /// The old refresh token is kept when the server does not rotate it.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Tokens> {
        info!("Refreshing access token");

        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .context("Failed to refresh token")?;

        let expires_at = token_result
            .expires_in()
            .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
            .unwrap_or_else(|| Utc::now() + Duration::hours(1));

        let tokens = Tokens {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: token_result
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or_else(|| Some(refresh_token.to_string())),
            expires_at,
        };

        info!("Successfully refreshed access token");
        Ok(tokens)
    }
}

// ============================================================================
// KeyFileTokenStore
// ============================================================================

/// Tokens persisted in a JSON key file
///
/// Refreshed tokens are written back so the next run starts with a valid
/// refresh token. The write goes through a temporary file and a rename.
pub struct KeyFileTokenStore {
    path: PathBuf,
    tokens: Mutex<Tokens>,
    refresher: Option<TokenRefresher>,
}

impl KeyFileTokenStore {
    /// Loads tokens from `path`
    ///
    /// Without a refresher the store behaves like a [`StaticToken`] once the
    /// access token expires.
    pub fn load(path: &Path, refresher: Option<TokenRefresher>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AuthError::InvalidKeyFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let tokens: Tokens =
            serde_json::from_str(&content).map_err(|e| AuthError::InvalidKeyFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        debug!(path = %path.display(), expires_at = %tokens.expires_at, "Loaded key file");

        Ok(Self {
            path: path.to_path_buf(),
            tokens: Mutex::new(tokens),
            refresher,
        })
    }

    /// Path of the backing key file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn refresh_locked(&self, tokens: &mut Tokens) -> Result<String> {
        let refresher = self
            .refresher
            .as_ref()
            .ok_or_else(|| AuthError::NotRefreshable("no client id configured".to_string()))?;
        let refresh_token = tokens
            .refresh_token
            .clone()
            .ok_or_else(|| AuthError::NotRefreshable("no refresh token in key file".to_string()))?;

        let fresh = refresher.refresh_token(&refresh_token).await?;
        if let Err(e) = save_tokens(&self.path, &fresh).await {
            warn!(path = %self.path.display(), error = %e, "Failed to write refreshed tokens back");
        }
        *tokens = fresh;
        Ok(tokens.access_token.clone())
    }
}

#[async_trait::async_trait]
impl TokenSource for KeyFileTokenStore {
    async fn access_token(&self) -> Result<String> {
        let mut tokens = self.tokens.lock().await;
        if self.refresher.is_some()
            && tokens.refresh_token.is_some()
            && tokens.expires_within(Duration::minutes(EXPIRY_MARGIN_MINUTES))
        {
            return self.refresh_locked(&mut tokens).await;
        }
        Ok(tokens.access_token.clone())
    }

    async fn refresh(&self, rejected: &str) -> Result<String> {
        let mut tokens = self.tokens.lock().await;
        if tokens.access_token != rejected {
            debug!("Access token already replaced, skipping refresh");
            return Ok(tokens.access_token.clone());
        }
        self.refresh_locked(&mut tokens).await
    }
}

/// Writes tokens to `path` atomically
pub async fn save_tokens(path: &Path, tokens: &Tokens) -> Result<()> {
    let json = serde_json::to_vec_pretty(tokens).context("Failed to serialize tokens")?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
