//! Google Drive API client implementing [`RemoteGateway`].

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use reqwest::{Client, Response};

use crate::auth::Authenticator;
use crate::error::{DriveError, Result};
use crate::gateway::{ContentStream, RemoteGateway};
use crate::models::{ApiErrorResponse, FileListResponse, RemoteObject};

/// Base URL for Google Drive API v3.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Fields requested for every object.
const OBJECT_FIELDS: &str = "id, name, size, mimeType";

/// Page size for folder listings.
const PAGE_SIZE: &str = "100";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest silence tolerated on an open response before it is abandoned.
/// Applies per read, so long downloads that keep moving are unaffected.
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for reading objects from Google Drive.
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    base_url: String,
    drive_id: Option<String>,
}

impl DriveClient {
    /// Create a new DriveClient against the public Drive API.
    pub fn new(auth: Authenticator) -> Self {
        Self {
            auth,
            http: http_client(READ_TIMEOUT),
            base_url: DRIVE_API_BASE.to_string(),
            drive_id: None,
        }
    }

    /// Replace the read timeout. Stalled requests and bodies fail with
    /// [`DriveError::TransientNetworkError`] once it elapses.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.http = http_client(timeout);
        self
    }

    /// Point the client at another API root (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Scope folder listings to a Shared Drive.
    pub fn with_drive_id(mut self, drive_id: Option<String>) -> Self {
        self.drive_id = drive_id;
        self
    }

    /// Query files using Google Drive query syntax, following every page.
    pub async fn query_files(&self, query: &str) -> Result<Vec<RemoteObject>> {
        let token = self.auth.get_access_token().await?;
        let fields = format!("nextPageToken, files({})", OBJECT_FIELDS);
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(format!("{}/files", self.base_url))
                .bearer_auth(&token)
                .query(&[
                    ("q", query),
                    ("pageSize", PAGE_SIZE),
                    ("includeItemsFromAllDrives", "true"),
                    ("supportsAllDrives", "true"),
                    ("fields", fields.as_str()),
                ]);

            if let Some(ref drive_id) = self.drive_id {
                request = request.query(&[("driveId", drive_id.as_str()), ("corpora", "drive")]);
            }

            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await.map_err(DriveError::from_transport)?;
            let response = check_status(response).await?;

            let list_response: FileListResponse =
                response.json().await.map_err(DriveError::from_transport)?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// Get file metadata by ID.
    pub async fn get_file(&self, file_id: &str) -> Result<RemoteObject> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}/files/{}", self.base_url, file_id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", OBJECT_FIELDS)])
            .send()
            .await
            .map_err(DriveError::from_transport)?;

        let response = check_status(response).await?;
        let metadata: RemoteObject = response.json().await.map_err(DriveError::from_transport)?;
        Ok(metadata)
    }

    /// Issue the media or export request for an object.
    async fn request_content(&self, object: &RemoteObject) -> Result<ContentStream> {
        let token = self.auth.get_access_token().await?;

        let (request, extension) = match object.export_format() {
            Some(format) => (
                self.http
                    .get(format!("{}/files/{}/export", self.base_url, object.id))
                    .query(&[("mimeType", format.mime_type)]),
                Some(format.extension),
            ),
            None => (
                self.http
                    .get(format!("{}/files/{}", self.base_url, object.id))
                    .query(&[("alt", "media"), ("supportsAllDrives", "true")]),
                None,
            ),
        };

        let response = request
            .bearer_auth(&token)
            .send()
            .await
            .map_err(DriveError::from_transport)?;
        let response = check_status(response).await?;

        let id = object.id.clone();
        let stream = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| DriveError::from_transport(e).into_download(&id)))
            .boxed();

        Ok(ContentStream { stream, extension })
    }
}

#[async_trait]
impl RemoteGateway for DriveClient {
    async fn fetch_object(&self, id: &str) -> Result<RemoteObject> {
        debug!("Getting object (id: '{}')", id);
        self.get_file(id).await
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteObject>> {
        debug!("Getting folder files (folderId: '{}')", folder_id);
        let query = format!(
            "'{}' in parents and trashed = false",
            folder_id.replace('\'', "\\'")
        );
        self.query_files(&query).await
    }

    async fn open_content_stream(&self, object: &RemoteObject) -> Result<ContentStream> {
        debug!(
            "Opening content (fileId: '{}', mimeType: '{}')",
            object.id, object.mime_type
        );
        self.request_content(object)
            .await
            .map_err(|e| e.into_download(&object.id))
    }
}

fn http_client(read_timeout: Duration) -> Client {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(read_timeout)
        .build()
        .unwrap_or_default()
}

/// Turn a non-success response into a classified error.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(DriveError::from_status(
            api_error.error.code,
            api_error.error.message,
        ));
    }
    Err(DriveError::from_status(status.as_u16(), error_body))
}
