//! Process configuration and output location.

use std::env;
use std::path::{Path, PathBuf};

use log::{info, warn};
use uuid::Uuid;

use crate::auth::DEFAULT_SCOPE;
use crate::error::{DriveError, Result};

/// Service account JSON blob.
pub const CREDENTIALS_ENV: &str = "GOOGLE_CREDENTIALS";

/// Comma-separated OAuth scopes.
pub const SCOPES_ENV: &str = "GOOGLE_SCOPES";

/// Base directory for generated archives.
pub const DEFAULT_DOWNLOAD_PATH: &str = "./files/";

/// File name of the archive inside its unique directory.
pub const ARCHIVE_FILE_NAME: &str = "google-drive.zip";

/// Read an environment variable, falling back to `default` with a warning.
/// Empty values count as unset.
pub fn env_or_default(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            warn!("Using default value '{}' for {}", default, name);
            default.to_string()
        }
    }
}

/// Service account JSON from the environment. Defaults to `{}`, which
/// fails later with a parse error naming the missing fields.
pub fn credentials_json() -> String {
    env_or_default(CREDENTIALS_ENV, "{}")
}

/// Scopes from the environment, or the read-only Drive scope.
pub fn scopes() -> Vec<String> {
    parse_scopes(&env_or_default(SCOPES_ENV, DEFAULT_SCOPE))
}

/// Split a comma-separated scope list. An empty list falls back to the
/// read-only Drive scope.
pub fn parse_scopes(raw: &str) -> Vec<String> {
    let scopes: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if scopes.is_empty() {
        warn!("No scopes configured, using {}", DEFAULT_SCOPE);
        return vec![DEFAULT_SCOPE.to_string()];
    }
    scopes
}

/// Fresh `<base>/<uuid>` directory name. Nothing is created.
pub fn unique_output_dir(base: &Path) -> PathBuf {
    base.join(Uuid::new_v4().to_string())
}

/// Create `<base>/<uuid>/` and return the archive path inside it.
pub fn prepare_destination(base: &Path) -> Result<PathBuf> {
    if !base.exists() {
        std::fs::create_dir_all(base).map_err(|e| {
            DriveError::InvalidConfig(format!("cannot create {}: {}", base.display(), e))
        })?;
        info!("Base {} folder created", base.display());
    }

    let dir = unique_output_dir(base);
    std::fs::create_dir(&dir).map_err(|e| {
        DriveError::InvalidConfig(format!("cannot create {}: {}", dir.display(), e))
    })?;
    info!("Folder {} created", dir.display());

    Ok(dir.join(ARCHIVE_FILE_NAME))
}
