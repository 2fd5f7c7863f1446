//! Google Drive v3 listing client.
//!
//! Credentials are taken as given: an already-issued OAuth access token or
//! an API key. Token acquisition and refresh are out of scope.

use super::ListingSource;
use crate::config::DriveConfig;
use crate::models::RawEntry;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size, modifiedTime, \
     parents, lastModifyingUser(displayName, emailAddress), owners(displayName, emailAddress))";

/// How requests are authorized.
#[derive(Debug, Clone)]
pub enum DriveAuth {
    /// `Authorization: Bearer <token>`.
    BearerToken(String),
    /// `key=<api key>` query parameter.
    ApiKey(String),
}

impl DriveAuth {
    /// Pick the credential from configuration, preferring the access token.
    pub fn from_config(config: &DriveConfig) -> Option<Self> {
        config
            .access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .map(DriveAuth::BearerToken)
            .or_else(|| {
                config
                    .api_key
                    .clone()
                    .filter(|k| !k.trim().is_empty())
                    .map(DriveAuth::ApiKey)
            })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    /// Drive encodes int64 values as strings.
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    modified_time: Option<String>,
    #[serde(default)]
    parents: Option<Vec<String>>,
    #[serde(default)]
    last_modifying_user: Option<DriveUser>,
    #[serde(default)]
    owners: Option<Vec<DriveUser>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveUser {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email_address: Option<String>,
}

impl DriveUser {
    fn label(&self) -> Option<String> {
        let display = self
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        if let Some(name) = display {
            return Some(name.to_string());
        }
        self.email_address
            .as_deref()
            .and_then(|email| email.split('@').next())
            .map(str::trim)
            .filter(|local| !local.is_empty())
            .map(String::from)
    }
}

impl DriveFile {
    fn into_raw_entry(self, listed_folder: &str) -> RawEntry {
        let owner_hint = self
            .last_modifying_user
            .as_ref()
            .and_then(DriveUser::label)
            .or_else(|| {
                self.owners
                    .as_ref()
                    .and_then(|owners| owners.first())
                    .and_then(DriveUser::label)
            });

        // Listing is by parent, so the queried folder is a valid fallback.
        let parent_id = self
            .parents
            .and_then(|p| p.into_iter().next())
            .or_else(|| Some(listed_folder.to_string()));

        RawEntry {
            id: self.id,
            name: self.name,
            parent_id,
            is_folder: self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE),
            size: self.size.and_then(|s| s.parse().ok()),
            modified_at: self.modified_time,
            owner_hint,
            mime_type: self.mime_type,
        }
    }
}

/// Raw HTTP response as the client needs it.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Why a request never produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout,
    Connect,
    Other(String),
}

/// Sends one authorized GET request.
#[async_trait]
pub trait DriveTransport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        params: &[(&str, &str)],
        auth: &DriveAuth,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// `reqwest` transport with the configured timeouts.
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { http_client })
    }
}

fn transport_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect
    } else {
        TransportError::Other(e.to_string())
    }
}

#[async_trait]
impl DriveTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        params: &[(&str, &str)],
        auth: &DriveAuth,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let mut request = self.http_client.get(url).query(params);
        request = match auth {
            DriveAuth::BearerToken(token) => request.bearer_auth(token),
            DriveAuth::ApiKey(key) => request.query(&[("key", key.as_str())]),
        };

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        Ok(TransportResponse { status, body })
    }
}

const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Exponential backoff for the given retry (1-based), capped.
fn backoff_delay(base: Duration, attempt: usize) -> Duration {
    let factor = u32::try_from(attempt.saturating_sub(1))
        .ok()
        .and_then(|shift| 1u32.checked_shl(shift))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Drive v3 `files.list` client.
pub struct DriveClient {
    transport: Box<dyn DriveTransport>,
    base_url: String,
    auth: DriveAuth,
    page_size: u32,
    retries: usize,
    timeout_seconds: u64,
    base_backoff: Duration,
}

impl DriveClient {
    /// Create a client from the drive configuration.
    pub fn new(config: &DriveConfig, auth: DriveAuth) -> Result<Self> {
        info!("Initializing Drive client for {}", config.api_base_url);
        let transport = ReqwestTransport::new(config.timeout_seconds)?;
        Ok(Self::with_transport(config, auth, Box::new(transport)))
    }

    /// Create a client on top of any transport.
    pub fn with_transport(
        config: &DriveConfig,
        auth: DriveAuth,
        transport: Box<dyn DriveTransport>,
    ) -> Self {
        Self {
            transport,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth,
            page_size: config.page_size.clamp(1, 1000),
            retries: config.retries,
            timeout_seconds: config.timeout_seconds,
            base_backoff: BASE_BACKOFF,
        }
    }

    /// Fetch one page, retrying transient failures.
    async fn fetch_page(&self, folder_id: &str, page_token: Option<&str>) -> Result<FileList> {
        let mut attempt = 0;
        loop {
            match self.try_fetch_page(folder_id, page_token).await {
                Ok(page) => return Ok(page),
                Err(PageError::Transient(e)) if attempt < self.retries => {
                    attempt += 1;
                    let delay = backoff_delay(self.base_backoff, attempt);
                    warn!(
                        "Listing {} failed ({}), retry {}/{} in {:?}",
                        folder_id, e, attempt, self.retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(PageError::Transient(e)) | Err(PageError::Fatal(e)) => return Err(e),
            }
        }
    }

    async fn try_fetch_page(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> std::result::Result<FileList, PageError> {
        let url = format!("{}/files", self.base_url);
        let query = format!("'{}' in parents and trashed=false", escape_query(folder_id));
        let page_size = self.page_size.to_string();

        let mut params: Vec<(&str, &str)> = vec![
            ("q", query.as_str()),
            ("fields", LIST_FIELDS),
            ("pageSize", page_size.as_str()),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let response = self
            .transport
            .get(&url, &params, &self.auth)
            .await
            .map_err(|e| match e {
                TransportError::Timeout => PageError::Transient(anyhow::anyhow!(
                    "Request timed out after {}s",
                    self.timeout_seconds
                )),
                TransportError::Connect => {
                    PageError::Transient(anyhow::anyhow!("Cannot connect to {}", self.base_url))
                }
                TransportError::Other(msg) => {
                    PageError::Fatal(anyhow::anyhow!("Failed to send request: {}", msg))
                }
            })?;

        let status = response.status;
        if !status.is_success() {
            let err = anyhow::anyhow!("Drive API error {}: {}", status, response.body);
            return Err(if is_transient(status) {
                PageError::Transient(err)
            } else if status == StatusCode::NOT_FOUND {
                PageError::Fatal(err.context(format!(
                    "Folder {} not found or not shared with these credentials",
                    folder_id
                )))
            } else {
                PageError::Fatal(err)
            });
        }

        serde_json::from_str::<FileList>(&response.body)
            .map_err(|e| PageError::Fatal(anyhow::anyhow!("Failed to parse Drive response: {}", e)))
    }
}

enum PageError {
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Escape a value for use inside a single-quoted Drive query string.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl ListingSource for DriveClient {
    async fn list_folder(&self, folder_id: &str) -> Result<Vec<RawEntry>> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_page(folder_id, page_token.as_deref()).await?;
            entries.extend(
                page.files
                    .into_iter()
                    .map(|file| file.into_raw_entry(folder_id)),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} entries in {}", entries.len(), folder_id);
        Ok(entries)
    }
}
