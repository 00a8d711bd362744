//! Data models for Google Drive API responses.

use serde::{Deserialize, Serialize};

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Whether an object is a leaf (file) or a branch (folder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    File,
    Folder,
}

/// Metadata snapshot for a file or folder in Google Drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: Option<u64>,
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) => s.parse::<u64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

impl RemoteObject {
    pub fn kind(&self) -> ObjectKind {
        if self.mime_type == FOLDER_MIME_TYPE {
            ObjectKind::Folder
        } else {
            ObjectKind::File
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == ObjectKind::Folder
    }

    /// Export format for native documents, `None` for stored binaries.
    pub fn export_format(&self) -> Option<&'static ExportFormat> {
        export_format(&self.mime_type)
    }
}

/// Binary format a native document is exported to before download.
#[derive(Debug, PartialEq, Eq)]
pub struct ExportFormat {
    pub source_mime_type: &'static str,
    pub mime_type: &'static str,
    pub extension: &'static str,
}

pub const EXPORT_FORMATS: &[ExportFormat] = &[
    ExportFormat {
        source_mime_type: "application/vnd.google-apps.document",
        mime_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        extension: ".docx",
    },
    ExportFormat {
        source_mime_type: "application/vnd.google-apps.presentation",
        mime_type: "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        extension: ".pptx",
    },
    ExportFormat {
        source_mime_type: "application/vnd.google-apps.spreadsheet",
        mime_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        extension: ".xlsx",
    },
    ExportFormat {
        source_mime_type: "application/vnd.google-apps.drawing",
        mime_type: "image/png",
        extension: ".png",
    },
    ExportFormat {
        source_mime_type: "application/vnd.google-apps.form",
        mime_type: "application/zip",
        extension: ".zip",
    },
];

/// Look up the export format for a native document MIME type.
pub fn export_format(mime_type: &str) -> Option<&'static ExportFormat> {
    EXPORT_FORMATS
        .iter()
        .find(|f| f.source_mime_type == mime_type)
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Response from the files.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<RemoteObject>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

/// Service account credentials from a JSON blob or file.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: Option<String>,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}
