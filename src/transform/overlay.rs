//! Overlay copy of deployment resources.

use crate::error::TransformError;
use std::path::Path;
use tokio::fs;

/// Recursively copies every file under `from` into `to` at the same relative path,
/// creating directories as needed and overwriting existing files.
///
/// Symlinks are followed, so linked files and directories land as real copies.
/// Returns the number of files copied.
pub async fn overlay_dir(from: &Path, to: &Path) -> Result<usize, TransformError> {
    if !fs::metadata(from).await.is_ok_and(|m| m.is_dir()) {
        return Err(TransformError::ResourcesMissing {
            path: from.to_path_buf(),
        });
    }

    let from = from.to_path_buf();
    let to = to.to_path_buf();
    tokio::task::spawn_blocking(move || copy_tree(&from, &to))
        .await
        .map_err(|e| TransformError::Io(std::io::Error::other(e)))?
}

fn copy_tree(from: &Path, to: &Path) -> Result<usize, TransformError> {
    let mut copied = 0;
    for entry in walkdir::WalkDir::new(from).min_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| TransformError::Io(e.into()))?;
        let rel_path = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| TransformError::Io(std::io::Error::other(e)))?;
        let dest_path = to.join(rel_path);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest_path)?;
        } else {
            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &dest_path)?;
            log::debug!("Overlaid {}", rel_path.display());
            copied += 1;
        }
    }

    Ok(copied)
}
