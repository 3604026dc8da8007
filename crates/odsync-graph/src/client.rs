//! Microsoft Graph API client
//!
//! Provides a typed HTTP client for interacting with the Microsoft Graph API.
//! Handles authentication headers, token refresh on 401, status-to-error
//! mapping and JSON deserialization.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use odsync_graph::client::GraphClient;
//!
//! # async fn example() -> Result<(), odsync_core::ports::CloudError> {
//! let client = GraphClient::new("access-token-here");
//! let drive = client.get_drive_info().await?;
//! println!("Connected to drive {}", drive.id);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use odsync_core::ports::cloud_provider::{CloudError, DriveInfo};

use crate::auth::{StaticToken, TokenSource};
use crate::items::DriveResponse;

/// Base URL for Microsoft Graph API v1.0
const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Default retry-after duration when the header can't be parsed
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

// ============================================================================
// Error mapping
// ============================================================================

/// Maps a transport-level reqwest failure to [`CloudError`]
pub(crate) fn network_error(err: reqwest::Error) -> CloudError {
    if err.is_decode() {
        CloudError::InvalidResponse(err.to_string())
    } else {
        CloudError::Network(err.to_string())
    }
}

/// Parses a Retry-After header value into a Duration
///
/// Supports both formats defined in RFC 7231:
/// - Integer seconds: `"120"`
/// - HTTP-date: `"Wed, 21 Oct 2015 07:28:00 GMT"`
///
/// Dates more than an hour away and unparseable values fall back to `default`.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        if target > now {
            let diff = target - now;
            if let Some(secs) = diff
                .num_seconds()
                .try_into()
                .ok()
                .filter(|&s: &u64| s <= 3600)
            {
                return Duration::from_secs(secs);
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}

/// Converts a non-success response into the matching [`CloudError`]
pub(crate) async fn error_from_response(response: Response) -> CloudError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER));
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read error body".to_string());

    let message = if body.is_empty() {
        status.canonical_reason().unwrap_or("").to_string()
    } else {
        body
    };
    CloudError::from_status(status.as_u16(), message, retry_after)
}

/// Returns the response if successful, otherwise the mapped error
pub(crate) async fn check_status(response: Response) -> Result<Response, CloudError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(error_from_response(response).await)
    }
}

// ============================================================================
// GraphClient
// ============================================================================

/// HTTP client for Microsoft Graph API calls
///
/// Wraps `reqwest::Client` with bearer authentication and base URL
/// construction. On HTTP 401 the token source is asked for a fresh token
/// and the request is sent once more.
#[derive(Clone)]
pub struct GraphClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
    /// Supplier of bearer tokens
    tokens: Arc<dyn TokenSource>,
}

impl GraphClient {
    /// Creates a new GraphClient with a fixed access token
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth2 access token for Microsoft Graph
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_token_source(Arc::new(StaticToken::new(access_token)), GRAPH_BASE_URL)
    }

    /// Creates a new GraphClient with a custom base URL (useful for testing)
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth2 access token
    /// * `base_url` - Custom base URL for API requests
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::with_token_source(Arc::new(StaticToken::new(access_token)), base_url)
    }

    /// Creates a GraphClient that obtains tokens from `tokens`
    pub fn with_token_source(tokens: Arc<dyn TokenSource>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            tokens,
        }
    }

    /// Creates a GraphClient for the production endpoint
    pub fn from_token_source(tokens: Arc<dyn TokenSource>) -> Self {
        Self::with_token_source(tokens, GRAPH_BASE_URL)
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns a reference to the underlying HTTP client
    ///
    /// Upload session URLs are absolute and pre-authenticated, so chunk
    /// uploads bypass [`GraphClient::send`].
    pub(crate) fn http_client(&self) -> &Client {
        &self.client
    }

    /// Resolves `path` against the base URL unless it is already absolute
    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Creates an unauthenticated request builder for the given method and path
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, PUT, DELETE, etc.)
    /// * `path` - API path relative to base URL (e.g., "/me/drive") or an
    ///   absolute URL such as an `@odata.nextLink`
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url_for(path))
    }

    /// Sends an authenticated request, refreshing the token once on 401
    ///
    /// `build` adds headers and body; it is called again for the retry.
    ///
    /// # Errors
    /// Any non-success status is mapped to [`CloudError`]
    pub async fn send<F>(&self, method: Method, path: &str, build: F) -> Result<Response, CloudError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| CloudError::Unauthorized(format!("{e:#}")))?;

        let response = build(self.request(method.clone(), path).bearer_auth(&token))
            .send()
            .await
            .map_err(network_error)?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        info!(path, "Received 401, refreshing access token");
        let token = match self.tokens.refresh(&token).await {
            Ok(token) => token,
            Err(e) => {
                warn!(path, error = %e, "Token refresh failed");
                return Err(error_from_response(response).await);
            }
        };

        let response = build(self.request(method, path).bearer_auth(&token))
            .send()
            .await
            .map_err(network_error)?;
        check_status(response).await
    }

    /// Sends an authenticated GET and deserializes the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CloudError> {
        self.send(Method::GET, path, |r| r)
            .await?
            .json()
            .await
            .map_err(network_error)
    }

    /// Retrieves the connected drive's id, type and quota
    pub async fn get_drive_info(&self) -> Result<DriveInfo, CloudError> {
        debug!("Fetching drive info from /me/drive");
        let drive: DriveResponse = self.get_json("/me/drive").await?;
        let info = DriveInfo::from(drive);
        if info.quota_total == 0 {
            warn!("Drive quota total is 0, this may indicate an API issue");
        }
        Ok(info)
    }
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}
