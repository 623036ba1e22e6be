//! Single-flight guard for releases targeting the same branch.
//!
//! Uses an advisory `flock` on unix. Elsewhere the lock file is created exclusively
//! and removed on drop.

use crate::error::WorkspaceError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Exclusive lock held for the duration of one release run
#[derive(Debug)]
pub struct BranchLock {
    path: PathBuf,
    #[cfg(unix)]
    _handle: nix::fcntl::Flock<fs::File>,
    #[cfg(not(unix))]
    _handle: fs::File,
}

impl BranchLock {
    /// Lock file used for `key` inside `dir`
    pub fn lock_path(dir: &Path, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' { c } else { '-' })
            .collect();
        dir.join(format!(".release-{}.lock", sanitized))
    }

    /// Acquire the lock for `key`, waiting up to `timeout` for a running release.
    ///
    /// `dir` is created if missing.
    pub async fn acquire(dir: &Path, key: &str, timeout: Duration) -> Result<Self, WorkspaceError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| WorkspaceError::LockFailed {
                path: dir.to_path_buf(),
                reason: format!("Failed to create lock directory: {}", e),
            })?;
        let path = Self::lock_path(dir, key);
        let started = Instant::now();

        loop {
            if let Some(lock) = Self::try_lock(&path)? {
                log::info!("Acquired release lock {}", path.display());
                return Ok(lock);
            }

            if started.elapsed() >= timeout {
                return Err(WorkspaceError::LockTimeout {
                    path,
                    waited_secs: started.elapsed().as_secs(),
                });
            }

            log::debug!("Release lock {} busy, waiting", path.display());
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Path of the held lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn try_lock(path: &Path) -> Result<Option<Self>, WorkspaceError> {
        use nix::errno::Errno;
        use nix::fcntl::{Flock, FlockArg};

        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| WorkspaceError::LockFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to open lock file: {}", e),
            })?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(handle) => Ok(Some(Self {
                path: path.to_path_buf(),
                _handle: handle,
            })),
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Ok(None),
            Err((_, errno)) => Err(WorkspaceError::LockFailed {
                path: path.to_path_buf(),
                reason: format!("flock error: {}", errno),
            }),
        }
    }

    #[cfg(not(unix))]
    fn try_lock(path: &Path) -> Result<Option<Self>, WorkspaceError> {
        match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => Ok(Some(Self {
                path: path.to_path_buf(),
                _handle: file,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(WorkspaceError::LockFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(not(unix))]
impl Drop for BranchLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
