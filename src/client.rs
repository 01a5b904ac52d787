//! Google Drive API client for listing files.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::auth::TokenSource;
use crate::error::{DriveError, Result};
use crate::models::{ApiErrorResponse, DriveFile, FileListResponse};
use crate::query::LIST_FIELDS;

/// Base URL for Google Drive API v3.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Default and maximum number of items per files.list page.
const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 1000;

/// Something that can answer a Drive query with a list of items.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn list_files(&self, query: &str) -> Result<Vec<DriveFile>>;
}

/// Client for the Drive files.list endpoint.
pub struct DriveClient<A: TokenSource> {
    auth: A,
    http: Client,
    base_url: String,
    page_size: u32,
}

impl<A: TokenSource> DriveClient<A> {
    pub fn new(auth: A) -> Self {
        Self {
            auth,
            http: Client::new(),
            base_url: DRIVE_API_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Point the client at another API root (used by tests).
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Items requested per page, clamped to what the API accepts.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Query files using Google Drive query syntax, following every page.
    pub async fn query_files(&self, query: &str) -> Result<Vec<DriveFile>> {
        let token = self.auth.access_token().await?;
        let page_size = self.page_size.to_string();
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(format!("{}/files", self.base_url))
                .bearer_auth(&token)
                .query(&[
                    ("q", query),
                    ("fields", LIST_FIELDS),
                    ("pageSize", page_size.as_str()),
                ]);

            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await?;
            let status = response.status();

            if !status.is_success() {
                let error_body = response.text().await.unwrap_or_default();
                if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
                    return Err(DriveError::ApiError {
                        status: api_error.error.code,
                        message: api_error.error.message,
                    });
                }
                return Err(DriveError::ApiError {
                    status: status.as_u16(),
                    message: error_body,
                });
            }

            let list_response: FileListResponse = response.json().await?;
            debug!(query, count = list_response.files.len(), "fetched page");
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }
}

#[async_trait]
impl<A: TokenSource> FileSource for DriveClient<A> {
    async fn list_files(&self, query: &str) -> Result<Vec<DriveFile>> {
        self.query_files(query).await
    }
}
