//! Extracts the root object id from a sharable link.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{DriveError, Result};

/// Sharable-link shapes; the first capture group is the object id.
static LINK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^https?://drive\.google\.com/drive/(?:u/\d+/)?folders/([a-zA-Z0-9_-]+)",
        r"^https?://drive\.google\.com/file/d/([a-zA-Z0-9_-]+)",
        r"^https?://drive\.google\.com/open\?id=([a-zA-Z0-9_-]+)",
        r"^https?://docs\.google\.com/(?:document|spreadsheets|presentation|drawings|forms)/d/([a-zA-Z0-9_-]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid link regex"))
    .collect()
});

/// Valid Google Drive ID pattern (alphanumeric, underscore, hyphen).
static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid ID regex"));

/// Extract a Google Drive ID from a sharable link or validate a raw ID.
///
/// Supported links:
/// - `https://drive.google.com/drive/folders/<ID>`
/// - `https://drive.google.com/drive/u/0/folders/<ID>`
/// - `https://drive.google.com/file/d/<ID>/view`
/// - `https://drive.google.com/open?id=<ID>`
/// - `https://docs.google.com/<document|spreadsheets|...>/d/<ID>/edit`
///
/// # Examples
///
/// ```
/// use drive_zip::url_parser::extract_id;
///
/// let id = extract_id("https://drive.google.com/drive/folders/1abc123").unwrap();
/// assert_eq!(id, "1abc123");
///
/// let id = extract_id("1abc123").unwrap();
/// assert_eq!(id, "1abc123");
/// ```
pub fn extract_id(url_or_id: &str) -> Result<String> {
    let trimmed = url_or_id.trim();

    let from_link = LINK_PATTERNS
        .iter()
        .find_map(|re| re.captures(trimmed))
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string());
    if let Some(id) = from_link {
        return Ok(id);
    }

    if ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(DriveError::InvalidUrlOrId(url_or_id.to_string()))
}
