//! Source control trait and types used by the release pipeline.
//!
//! This module defines the [`SourceControl`] trait covering the four operations a
//! release needs: clone, stage, commit and push. The production implementation
//! drives the system git binary (see `system_git`).

use crate::config::{Author, Credentials};
use crate::error::Result;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Git operations required to publish a release
pub trait SourceControl {
    /// Clone `remote_url` into `local_path`, checking out `branch`
    fn clone_repository(
        &self,
        remote_url: &str,
        local_path: &Path,
        branch: &str,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<WorkingRepository>>;

    /// Stage every change in the working tree, recursively
    fn stage_all(&self, repo: &WorkingRepository) -> impl Future<Output = Result<()>>;

    /// Commit the staged changes as `author`
    ///
    /// An empty commit is created when nothing is staged.
    fn commit(
        &self,
        repo: &WorkingRepository,
        message: &str,
        author: &Author,
    ) -> impl Future<Output = Result<CommitInfo>>;

    /// Push `HEAD` to the repository's remote branch, exactly once
    fn push(
        &self,
        repo: &WorkingRepository,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<PushInfo>>;
}

/// On-disk clone used for the duration of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingRepository {
    /// Working tree root
    pub local_path: PathBuf,
    /// Branch that gets pushed
    pub remote_branch: String,
    /// Remote the clone came from
    pub remote_url: String,
}

/// Information about a Git commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Commit hash (full SHA)
    pub hash: String,
    /// Short commit hash
    pub short_hash: String,
    /// Commit message summary
    pub message: String,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
    /// Commit timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Parent commit hashes
    pub parents: Vec<String>,
}

/// Information about a push operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushInfo {
    /// Remote name that was pushed to
    pub remote_name: String,
    /// Branch updated on the remote
    pub branch: String,
    /// Commit the branch now points to
    pub commit_hash: String,
}
