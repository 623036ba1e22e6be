//! System git backend for the release pipeline.
//!
//! Every operation runs the `git` binary through `tokio::process`. Credentials are
//! handed to git as an `http.extraHeader` through the `GIT_CONFIG_*` environment, so
//! they never show up in argv, remote URLs or `.git/config`.

use crate::config::{Author, Credentials};
use crate::error::{GitError, Result};
use crate::git::{CommitInfo, PushInfo, SourceControl, WorkingRepository};
use base64::Engine as _;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::OnceLock;
use tokio::process::Command;

const REMOTE_NAME: &str = "origin";

// Unit separator keeps commit subjects with spaces intact
const COMMIT_FORMAT: &str = "--format=%H%x1f%h%x1f%an%x1f%ae%x1f%at%x1f%P%x1f%s";

/// Git backend using the system git executable.
///
/// The executable is looked up on PATH at first use, so runs that never reach git
/// work without it.
#[derive(Debug, Clone, Default)]
pub struct SystemGit {
    git: OnceLock<PathBuf>,
}

impl SystemGit {
    pub fn new() -> Self {
        Self::default()
    }

    fn binary(&self) -> Result<&Path> {
        if let Some(git) = self.git.get() {
            return Ok(git.as_path());
        }
        let found = which::which("git").map_err(|e| GitError::GitNotFound {
            reason: e.to_string(),
        })?;
        Ok(self.git.get_or_init(|| found).as_path())
    }

    /// Create a git command with prompts disabled and stable output
    fn git_cmd(&self, work_dir: Option<&Path>, credentials: Option<&Credentials>) -> Result<Command> {
        let mut cmd = Command::new(self.binary()?);

        if let Some(dir) = work_dir {
            cmd.arg("-C").arg(dir);
        }

        // Override user config that would block unattended commits
        cmd.arg("-c").arg("commit.gpgsign=false");
        cmd.arg("-c").arg("advice.detachedHead=false");

        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.env("LC_ALL", "C");
        if let Some(credentials) = credentials {
            for (key, value) in credential_env(credentials) {
                cmd.env(key, value);
            }
        }

        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        Ok(cmd)
    }

    async fn run(&self, mut cmd: Command, display: &str) -> Result<Output> {
        log::debug!("Running git {}", display);
        cmd.output().await.map_err(|e| {
            GitError::CommandFailed {
                command: format!("git {}", display),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn head(&self, repo: &WorkingRepository) -> Result<CommitInfo> {
        let mut cmd = self.git_cmd(Some(&repo.local_path), None)?;
        cmd.args(["log", "-1", COMMIT_FORMAT]);
        let output = self.run(cmd, "log -1").await?;

        if !output.status.success() {
            return Err(GitError::CommitFailed {
                reason: stderr_of(&output),
            }
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_commit_record(stdout.trim_end()).ok_or_else(|| {
            GitError::CommitFailed {
                reason: format!("Unexpected git log output: {}", stdout.trim()),
            }
            .into()
        })
    }
}

impl SourceControl for SystemGit {
    async fn clone_repository(
        &self,
        remote_url: &str,
        local_path: &Path,
        branch: &str,
        credentials: &Credentials,
    ) -> Result<WorkingRepository> {
        let mut cmd = self.git_cmd(None, Some(credentials))?;
        cmd.args(["clone", "--branch", branch, "--"])
            .arg(remote_url)
            .arg(local_path);

        let output = self.run(cmd, &format!("clone --branch {} {}", branch, remote_url)).await?;

        if !output.status.success() {
            let stderr = stderr_of(&output);
            if is_auth_failure(&stderr) {
                return Err(GitError::AuthenticationFailed {
                    operation: "clone".to_string(),
                    reason: stderr,
                }
                .into());
            }
            return Err(GitError::CloneFailed {
                remote: remote_url.to_string(),
                reason: stderr,
            }
            .into());
        }

        Ok(WorkingRepository {
            local_path: local_path.to_path_buf(),
            remote_branch: branch.to_string(),
            remote_url: remote_url.to_string(),
        })
    }

    async fn stage_all(&self, repo: &WorkingRepository) -> Result<()> {
        let mut cmd = self.git_cmd(Some(&repo.local_path), None)?;
        cmd.args(["add", "--all"]);
        let output = self.run(cmd, "add --all").await?;

        if !output.status.success() {
            return Err(GitError::StageFailed {
                reason: stderr_of(&output),
            }
            .into());
        }
        Ok(())
    }

    async fn commit(
        &self,
        repo: &WorkingRepository,
        message: &str,
        author: &Author,
    ) -> Result<CommitInfo> {
        let mut cmd = self.git_cmd(Some(&repo.local_path), None)?;
        cmd.args(["commit", "--allow-empty", "--no-verify", "--quiet", "-m", message])
            .env("GIT_AUTHOR_NAME", &author.name)
            .env("GIT_AUTHOR_EMAIL", &author.email)
            .env("GIT_COMMITTER_NAME", &author.name)
            .env("GIT_COMMITTER_EMAIL", &author.email);

        let output = self.run(cmd, "commit").await?;

        if !output.status.success() {
            return Err(GitError::CommitFailed {
                reason: stderr_of(&output),
            }
            .into());
        }

        self.head(repo).await
    }

    async fn push(&self, repo: &WorkingRepository, credentials: &Credentials) -> Result<PushInfo> {
        let head = self.head(repo).await?;
        let refspec = format!("HEAD:refs/heads/{}", repo.remote_branch);

        let mut cmd = self.git_cmd(Some(&repo.local_path), Some(credentials))?;
        cmd.args(["push", REMOTE_NAME, &refspec]);
        let output = self.run(cmd, &format!("push {} {}", REMOTE_NAME, refspec)).await?;

        if !output.status.success() {
            let stderr = stderr_of(&output);
            let branch = repo.remote_branch.clone();
            let err = if is_auth_failure(&stderr) {
                GitError::AuthenticationFailed {
                    operation: "push".to_string(),
                    reason: stderr,
                }
            } else if is_non_fast_forward(&stderr) {
                GitError::PushRejected {
                    branch,
                    reason: stderr,
                }
            } else {
                GitError::PushFailed {
                    branch,
                    reason: stderr,
                }
            };
            return Err(err.into());
        }

        Ok(PushInfo {
            remote_name: REMOTE_NAME.to_string(),
            branch: repo.remote_branch.clone(),
            commit_hash: head.hash,
        })
    }
}

/// Environment that makes git send `credentials` as a basic auth header
fn credential_env(credentials: &Credentials) -> [(&'static str, String); 3] {
    let token = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", credentials.username, credentials.password));
    [
        ("GIT_CONFIG_COUNT", "1".to_string()),
        ("GIT_CONFIG_KEY_0", "http.extraHeader".to_string()),
        ("GIT_CONFIG_VALUE_0", format!("Authorization: Basic {}", token)),
    ]
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn is_auth_failure(stderr: &str) -> bool {
    const MARKERS: [&str; 7] = [
        "Authentication failed",
        "could not read Username",
        "could not read Password",
        "terminal prompts disabled",
        "Access denied",
        "returned error: 401",
        "returned error: 403",
    ];
    MARKERS.iter().any(|marker| stderr.contains(marker))
}

fn is_non_fast_forward(stderr: &str) -> bool {
    stderr.contains("non-fast-forward") || stderr.contains("[rejected]") || stderr.contains("fetch first")
}

/// Parse one record produced by [`COMMIT_FORMAT`]
fn parse_commit_record(record: &str) -> Option<CommitInfo> {
    let mut fields = record.splitn(7, '\x1f');
    let hash = fields.next()?.to_string();
    let short_hash = fields.next()?.to_string();
    let author_name = fields.next()?.to_string();
    let author_email = fields.next()?.to_string();
    let timestamp = fields
        .next()?
        .parse::<i64>()
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))?;
    let parents = fields
        .next()?
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let message = fields.next().unwrap_or_default().to_string();

    if hash.is_empty() {
        return None;
    }

    Some(CommitInfo {
        hash,
        short_hash,
        message,
        author_name,
        author_email,
        timestamp,
        parents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commit_record() {
        let record = "0123456789abcdef0123456789abcdef01234567\x1f0123456\x1fRelease Bot\x1fbot@acme.test\x1f1700000000\x1faaaa bbbb\x1fAdd v2.5.0";
        let commit = parse_commit_record(record).unwrap();
        assert_eq!(commit.short_hash, "0123456");
        assert_eq!(commit.author_name, "Release Bot");
        assert_eq!(commit.parents, vec!["aaaa".to_string(), "bbbb".to_string()]);
        assert_eq!(commit.message, "Add v2.5.0");
        assert_eq!(commit.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_parse_root_commit_has_no_parents() {
        let record = "abc\x1fabc\x1fa\x1fa@b\x1f1\x1f\x1finit";
        assert!(parse_commit_record(record).unwrap().parents.is_empty());
        assert!(parse_commit_record("garbage").is_none());
    }

    #[test]
    fn test_credential_env_encodes_basic_auth() {
        let env = credential_env(&Credentials::new("bot", "token"));
        assert_eq!(env[0], ("GIT_CONFIG_COUNT", "1".to_string()));
        assert_eq!(env[1].1, "http.extraHeader");
        // base64("bot:token")
        assert_eq!(env[2].1, "Authorization: Basic Ym90OnRva2Vu");
    }

    #[test]
    fn test_classifies_push_failures() {
        assert!(is_non_fast_forward(
            " ! [rejected]        HEAD -> main (fetch first)\nerror: failed to push some refs"
        ));
        assert!(!is_non_fast_forward(" ! [remote rejected] HEAD -> main (protected branch hook declined)"));
        assert!(is_auth_failure("fatal: Authentication failed for 'https://github.com/acme/x.git/'"));
        assert!(is_auth_failure(
            "fatal: could not read Username for 'https://github.com': terminal prompts disabled"
        ));
        assert!(!is_auth_failure("fatal: repository not found"));
    }
}
