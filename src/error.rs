//! Error types for ghost_release operations.
//!
//! Each pipeline component owns an error enum; [`ReleaseError`] wraps them all and
//! carries actionable recovery suggestions for the command line.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ghost_release operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all ghost_release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Working directory and locking errors
    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// Git operation errors
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// Artifact download and expansion errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Repository transformation errors
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Release creation errors
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors, raised once at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    /// One or more required environment variables are unset or empty
    #[error("Missing required environment variables: {}", .names.join(", "))]
    MissingVariables {
        /// Variable names
        names: Vec<String>,
    },

    /// A variable is present but cannot be interpreted
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        /// Variable name
        name: String,
        /// Reason for the error
        reason: String,
    },
}

/// Working directory and single-flight lock errors
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// The installation directory has no parent to host working directories
    #[error("Installation directory {path} has no parent directory")]
    NoParentDirectory {
        /// Installation directory
        path: PathBuf,
    },

    /// The working directory could not be created
    #[error("Failed to create working directory {path}: {source}")]
    CreateFailed {
        /// Directory that was being created
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Removing the previous working tree content failed
    #[error("Failed to clear working tree {path}: {source}")]
    ClearFailed {
        /// Working tree root
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Another run held the branch lock for too long
    #[error("Timed out after {waited_secs}s waiting for release lock {path}")]
    LockTimeout {
        /// Lock file
        path: PathBuf,
        /// Seconds waited
        waited_secs: u64,
    },

    /// The lock file could not be opened or locked
    #[error("Failed to acquire release lock {path}: {reason}")]
    LockFailed {
        /// Lock file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },
}

/// Git operation errors
#[derive(Error, Debug)]
pub enum GitError {
    /// No git executable on PATH
    #[error("git executable not found on PATH: {reason}")]
    GitNotFound {
        /// Reason for the error
        reason: String,
    },

    /// Clone failed for a reason other than authentication
    #[error("Failed to clone {remote}: {reason}")]
    CloneFailed {
        /// Remote URL
        remote: String,
        /// Reason for the error
        reason: String,
    },

    /// Git authentication failed
    #[error("Git authentication failed during {operation}: {reason}")]
    AuthenticationFailed {
        /// Operation that failed
        operation: String,
        /// Reason for the error
        reason: String,
    },

    /// Staging failed
    #[error("Failed to stage changes: {reason}")]
    StageFailed {
        /// Reason for the error
        reason: String,
    },

    /// Commit failed
    #[error("Git commit failed: {reason}")]
    CommitFailed {
        /// Reason for the error
        reason: String,
    },

    /// Remote branch diverged from the local tip
    #[error("Push to '{branch}' rejected (non-fast-forward): {reason}")]
    PushRejected {
        /// Target branch
        branch: String,
        /// Reason for the error
        reason: String,
    },

    /// Push failed
    #[error("Git push to '{branch}' failed: {reason}")]
    PushFailed {
        /// Target branch
        branch: String,
        /// Reason for the error
        reason: String,
    },

    /// The git process could not be run at all
    #[error("Command execution failed: {command} - {reason}")]
    CommandFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },
}

/// Artifact download and expansion errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// Release URL could not be parsed
    #[error("Invalid artifact URL '{url}': {source}")]
    InvalidUrl {
        /// Offending URL
        url: String,
        /// Parse error
        #[source]
        source: url::ParseError,
    },

    /// Transport level failure
    #[error("Download of {url} failed: {source}")]
    Request {
        /// Artifact URL
        url: String,
        /// HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("Download of {url} returned HTTP {status}")]
    HttpStatus {
        /// Artifact URL
        url: String,
        /// Status code
        status: u16,
    },

    /// Fewer bytes arrived than the server announced
    #[error("Download of {url} truncated: expected {expected} bytes, received {received}")]
    Truncated {
        /// Artifact URL
        url: String,
        /// Content-Length
        expected: u64,
        /// Bytes received
        received: u64,
    },

    /// SHA-256 digest did not match the requested one
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Expected digest
        expected: String,
        /// Computed digest
        actual: String,
    },

    /// Payload is not a recognized archive
    #[error("Unrecognized archive format for {url}")]
    UnsupportedFormat {
        /// Artifact URL
        url: String,
    },

    /// Archive framing is broken
    #[error("Corrupt {format} archive: {reason}")]
    CorruptArchive {
        /// Detected format
        format: String,
        /// Reason for the error
        reason: String,
    },

    /// Archive entry would land outside the target directory
    #[error("Refusing archive entry outside target directory: {entry}")]
    UnsafeEntry {
        /// Entry path as stored in the archive
        entry: String,
    },

    /// IO errors while writing entries
    #[error("IO error while expanding archive: {0}")]
    Io(#[from] std::io::Error),
}

/// Repository transformation errors
#[derive(Error, Debug)]
pub enum TransformError {
    /// Package descriptor missing at the tree root
    #[error("Package descriptor not found at {path}")]
    DescriptorMissing {
        /// Expected location
        path: PathBuf,
    },

    /// Package descriptor is not a JSON object
    #[error("Package descriptor {path} is invalid: {reason}")]
    DescriptorInvalid {
        /// Descriptor location
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Overlay source directory missing
    #[error("Deployment resources directory not found at {path}")]
    ResourcesMissing {
        /// Expected location
        path: PathBuf,
    },

    /// IO errors while rewriting or copying
    #[error("IO error during transform: {0}")]
    Io(#[from] std::io::Error),
}

/// Release creation errors
#[derive(Error, Debug)]
pub enum PublishError {
    /// Transport level failure
    #[error("Release request to {endpoint} failed: {source}")]
    Request {
        /// Releases endpoint
        endpoint: String,
        /// HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// API answered with a non-success status
    #[error("Release request to {endpoint} returned HTTP {status}: {body}")]
    HttpStatus {
        /// Releases endpoint
        endpoint: String,
        /// Status code
        status: u16,
        /// Response body, for diagnostics only
        body: String,
    },

    /// Release descriptor could not be serialized
    #[error("Failed to serialize release descriptor: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ReleaseError {
    /// Name of the pipeline step this error belongs to
    pub fn step(&self) -> &'static str {
        match self {
            ReleaseError::Config(_) => "configuration",
            ReleaseError::Workspace(WorkspaceError::ClearFailed { .. }) => "clear",
            ReleaseError::Workspace(_) => "workspace",
            ReleaseError::Git(GitError::CloneFailed { .. }) => "clone",
            ReleaseError::Git(GitError::AuthenticationFailed { operation, .. })
                if operation == "push" =>
            {
                "push"
            }
            ReleaseError::Git(GitError::AuthenticationFailed { .. }) => "clone",
            ReleaseError::Git(GitError::StageFailed { .. }) => "stage",
            ReleaseError::Git(GitError::CommitFailed { .. }) => "commit",
            ReleaseError::Git(GitError::PushRejected { .. } | GitError::PushFailed { .. }) => {
                "push"
            }
            ReleaseError::Git(_) => "git",
            ReleaseError::Fetch(_) => "fetch",
            ReleaseError::Transform(_) => "transform",
            ReleaseError::Publish(_) => "publish",
            ReleaseError::Io(_) => "io",
        }
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Config(ConfigError::MissingVariables { names }) => vec![
                format!("Export the missing variables: {}", names.join(", ")),
            ],
            ReleaseError::Git(GitError::GitNotFound { .. }) => vec![
                "Install git and make sure it is on PATH".to_string(),
            ],
            ReleaseError::Git(GitError::AuthenticationFailed { .. }) => vec![
                "Verify GIT_USER_NAME and GIT_PASSWORD".to_string(),
                "Make sure the token has write access to the repository".to_string(),
            ],
            ReleaseError::Git(GitError::PushRejected { branch, .. }) => vec![
                format!("Another release updated '{}' concurrently; rerun the release", branch),
                "Serialize releases targeting the same branch".to_string(),
            ],
            ReleaseError::Fetch(FetchError::HttpStatus { url, .. }) => vec![
                format!("Check that the artifact exists: {}", url),
            ],
            ReleaseError::Fetch(FetchError::ChecksumMismatch { .. }) => vec![
                "Verify the sha256 supplied with the request".to_string(),
            ],
            ReleaseError::Transform(TransformError::ResourcesMissing { .. }) => vec![
                "Set RELEASE_RESOURCES_DIR to the deployment resources directory".to_string(),
            ],
            ReleaseError::Publish(PublishError::HttpStatus { status: 422, .. }) => vec![
                "A release with this tag may already exist".to_string(),
            ],
            ReleaseError::Workspace(WorkspaceError::LockTimeout { .. }) => vec![
                "Another release for the same branch is still running".to_string(),
                "Raise RELEASE_LOCK_TIMEOUT_SECS or retry later".to_string(),
            ],
            ReleaseError::Workspace(WorkspaceError::LockFailed { .. }) => vec![
                "Point RELEASE_LOCK_DIR at a writable directory".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}

/// Render an error with its full `source()` chain, one cause per line
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str("\n  caused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_variables_lists_every_name() {
        let err = ConfigError::MissingVariables {
            names: vec!["GIT_USER_NAME".to_string(), "GIT_PASSWORD".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: GIT_USER_NAME, GIT_PASSWORD"
        );
    }

    #[test]
    fn test_step_names() {
        let push: ReleaseError = GitError::PushRejected {
            branch: "main".to_string(),
            reason: "fetch first".to_string(),
        }
        .into();
        assert_eq!(push.step(), "push");

        let fetch: ReleaseError = FetchError::HttpStatus {
            url: "https://example.test/a.tar.gz".to_string(),
            status: 404,
        }
        .into();
        assert_eq!(fetch.step(), "fetch");
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let err = WorkspaceError::ClearFailed {
            path: PathBuf::from("/tmp/Target-1"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let rendered = error_chain(&err);
        assert!(rendered.starts_with("Failed to clear working tree"));
        assert!(rendered.contains("caused by: denied"));
    }

    #[test]
    fn test_fallback_suggestion() {
        let err = ReleaseError::Io(std::io::Error::other("boom"));
        assert_eq!(err.recovery_suggestions().len(), 1);
    }
}
