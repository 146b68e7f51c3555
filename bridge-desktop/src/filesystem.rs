//! Local photo discovery using `walkdir`

use bridge_traits::error::{BridgeError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Recursively list files under `root` whose extension is one of `extensions`.
///
/// Extension matching is case-sensitive, so `jpg` and `JPG` must both be listed
/// to accept both. The result is sorted to keep run output stable. Unreadable
/// entries are logged and skipped; a missing root is an error.
pub fn scan_local_photos(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(BridgeError::OperationFailed(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut photos: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_extension(path, extensions))
        .collect();

    photos.sort();
    debug!(root = %root.display(), count = photos.len(), "Scanned local photos");
    Ok(photos)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed == ext))
}
