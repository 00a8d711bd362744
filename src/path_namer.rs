//! Archive entry naming.

use std::collections::HashSet;
use std::sync::Mutex;

use log::warn;

/// Separator between folder names inside the archive.
pub const SEPARATOR: &str = "/";

/// Build an archive path from the folder names above an object, its own
/// name and, for converted documents, the exported extension.
///
/// Names are used verbatim; nothing is sanitized.
///
/// ```
/// use drive_zip::path_namer::compute_path;
///
/// let ancestry = vec!["A".to_string(), "B".to_string()];
/// assert_eq!(compute_path(&ancestry, "report", None), "A/B/report");
/// assert_eq!(compute_path(&ancestry[..1], "sheet", Some(".xlsx")), "A/sheet.xlsx");
/// ```
pub fn compute_path(ancestry: &[String], name: &str, extension: Option<&str>) -> String {
    let mut path = String::new();
    for folder in ancestry {
        path.push_str(folder);
        path.push_str(SEPARATOR);
    }
    path.push_str(name);
    if let Some(ext) = extension {
        path.push_str(ext);
    }
    path
}

/// Hands out archive paths, renaming any that were already claimed.
///
/// Drive allows siblings with identical names; the first one claimed keeps
/// its path and later ones get ` (1)`, ` (2)`, ... before the extension.
/// Files and folders share one namespace, so a folder never shadows a file
/// of the same name.
#[derive(Debug, Default)]
pub struct UniquePaths {
    claimed: Mutex<HashSet<String>>,
}

impl UniquePaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `path`, or the first free variant of it.
    pub fn claim(&self, path: String) -> String {
        self.reserve(path, true)
    }

    /// Reserve a folder below `ancestry` and return the name to use for
    /// it. Folder names have no extension; the suffix goes at the end.
    pub fn claim_folder(&self, ancestry: &[String], name: &str) -> String {
        let prefix_len = compute_path(ancestry, "", None).len();
        let mut path = self.reserve(compute_path(ancestry, name, None), false);
        path.split_off(prefix_len)
    }

    fn reserve(&self, path: String, keep_extension: bool) -> String {
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        if claimed.insert(path.clone()) {
            return path;
        }

        let (stem, ext) = if keep_extension {
            split_extension(&path)
        } else {
            (path.as_str(), "")
        };
        let mut n = 1;
        loop {
            let candidate = format!("{stem} ({n}){ext}");
            if claimed.insert(candidate.clone()) {
                warn!("Duplicate archive path '{}', storing as '{}'", path, candidate);
                return candidate;
            }
            n += 1;
        }
    }
}

/// Split `dir/name.ext` into (`dir/name`, `.ext`). Dotfiles and names
/// without a dot have no extension.
fn split_extension(path: &str) -> (&str, &str) {
    let file_start = path.rfind(SEPARATOR).map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => path.split_at(file_start + dot),
        _ => (path, ""),
    }
}
