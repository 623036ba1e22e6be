//! Working directory management for release runs.
//!
//! Each run clones into its own `Target-<timestamp>` directory next to the
//! installation directory. Directories are never reused and never cleaned up here.

mod lock;

pub use lock::BranchLock;

use crate::error::WorkspaceError;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Directory name prefix for working directories
pub const WORKING_DIR_PREFIX: &str = "Target-";

/// Version control metadata kept when clearing a working tree
const GIT_DIR: &str = ".git";

/// Name of the working directory for a run started at `started_at`
pub fn working_dir_name(started_at: DateTime<Utc>) -> String {
    format!("{}{}", WORKING_DIR_PREFIX, started_at.format("%Y%m%dT%H%M%S"))
}

/// Directory that hosts working directories
pub fn hosting_dir(install_dir: &Path) -> Result<PathBuf, WorkspaceError> {
    let absolute = std::path::absolute(install_dir).map_err(|source| WorkspaceError::CreateFailed {
        path: install_dir.to_path_buf(),
        source,
    })?;
    absolute
        .parent()
        .map(Path::to_path_buf)
        .ok_or(WorkspaceError::NoParentDirectory { path: absolute.clone() })
}

/// Create a fresh, empty working directory next to `install_dir`.
///
/// Runs started in the same second get `-1`, `-2`, … suffixes; creation is atomic so
/// two runs never share a directory.
pub async fn allocate_working_dir(
    install_dir: &Path,
    started_at: DateTime<Utc>,
) -> Result<PathBuf, WorkspaceError> {
    let parent = hosting_dir(install_dir)?;
    let base = working_dir_name(started_at);

    let mut attempt = 0u32;
    loop {
        let candidate = if attempt == 0 {
            parent.join(&base)
        } else {
            parent.join(format!("{}-{}", base, attempt))
        };

        match tokio::fs::create_dir(&candidate).await {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => {
                return Err(WorkspaceError::CreateFailed {
                    path: candidate,
                    source,
                });
            }
        }
    }
}

/// Remove every entry of `work_dir` except the `.git` directory.
///
/// Returns the number of top-level entries removed.
pub async fn clear_working_tree(work_dir: &Path) -> Result<usize, WorkspaceError> {
    let clear_failed = |source: std::io::Error| WorkspaceError::ClearFailed {
        path: work_dir.to_path_buf(),
        source,
    };

    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(work_dir).await.map_err(clear_failed)?;
    while let Some(entry) = entries.next_entry().await.map_err(clear_failed)? {
        if entry.file_name() == GIT_DIR {
            continue;
        }

        let file_type = entry.file_type().await.map_err(clear_failed)?;
        let removal = if file_type.is_dir() {
            tokio::fs::remove_dir_all(entry.path()).await
        } else {
            tokio::fs::remove_file(entry.path()).await
        };
        removal.map_err(clear_failed)?;
        removed += 1;
    }

    Ok(removed)
}
