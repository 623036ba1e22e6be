//! Command line argument parsing and validation.
//!
//! A release is described either inline (`--name`, `--url`, notes) or by a JSON
//! request file carrying `releaseName`, `releaseUrl` and `releaseNotes`.

use crate::request::ReleaseRequest;
use clap::Parser;
use std::path::PathBuf;

/// Publish a release archive into the deployment repository
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "ghost_release",
    version,
    about = "Publish a release archive into the deployment repository",
    long_about = "Download a release archive, commit it into the configured deployment \
repository, push it and create a matching GitHub release.

Repository, credentials and author are read from the environment
(GIT_USER_NAME, GIT_PASSWORD, GIT_REPO_OWNER, GIT_REPO_NAME, GIT_REPO_BRANCH,
GIT_AUTHOR_NAME, GIT_AUTHOR_EMAIL).

Usage:
  ghost_release --name 2.5.0 --url https://example.test/ghost-2.5.0.zip --notes 'fixes'
  ghost_release --request release.json"
)]
pub struct Args {
    /// Release name, e.g. 2.5.0
    #[arg(long, value_name = "NAME", conflicts_with = "request")]
    pub name: Option<String>,

    /// Location of the release archive
    #[arg(long, value_name = "URL", conflicts_with = "request")]
    pub url: Option<String>,

    /// Release notes
    #[arg(long, value_name = "TEXT", conflicts_with_all = ["notes_file", "request"])]
    pub notes: Option<String>,

    /// Read release notes from a file
    #[arg(long, value_name = "PATH", conflicts_with = "request")]
    pub notes_file: Option<PathBuf>,

    /// Expected SHA-256 of the archive (hex)
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,

    /// JSON request file
    #[arg(long, value_name = "FILE")]
    pub request: Option<PathBuf>,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.request.is_none() {
            if self.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
                return Err("--name is required unless --request is given".to_string());
            }
            if self.url.as_deref().is_none_or(|u| u.trim().is_empty()) {
                return Err("--url is required unless --request is given".to_string());
            }
        }

        if let Some(digest) = &self.sha256 {
            validate_sha256(digest)?;
        }

        Ok(())
    }

    /// Build the release request these arguments describe
    pub fn to_request(&self) -> Result<ReleaseRequest, String> {
        let mut request = match &self.request {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
                serde_json::from_str::<ReleaseRequest>(&content)
                    .map_err(|e| format!("Invalid request file {}: {}", path.display(), e))?
            }
            None => {
                let notes = match (&self.notes, &self.notes_file) {
                    (Some(notes), _) => notes.clone(),
                    (None, Some(path)) => std::fs::read_to_string(path)
                        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?,
                    (None, None) => String::new(),
                };
                ReleaseRequest::new(
                    self.name.clone().unwrap_or_default(),
                    self.url.clone().unwrap_or_default(),
                    notes,
                )
            }
        };

        if let Some(digest) = &self.sha256 {
            request = request.with_sha256(digest.clone());
        }

        if let Some(digest) = &request.sha256 {
            validate_sha256(digest)?;
        }

        Ok(request)
    }
}

fn validate_sha256(digest: &str) -> Result<(), String> {
    if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("'{}' is not a hex SHA-256 digest", digest));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("ghost_release").chain(args.iter().copied()))
    }

    #[test]
    fn test_inline_request() {
        let args = parse(&["--name", "2.5.0", "--url", "https://example.test/a.zip", "--notes", "fixes"])
            .unwrap();
        args.validate().unwrap();
        let request = args.to_request().unwrap();
        assert_eq!(request.release_name, "2.5.0");
        assert_eq!(request.release_url, "https://example.test/a.zip");
        assert_eq!(request.release_notes, "fixes");
        assert_eq!(request.sha256, None);
    }

    #[test]
    fn test_missing_url_is_invalid() {
        let args = parse(&["--name", "2.5.0"]).unwrap();
        assert!(args.validate().unwrap_err().contains("--url"));
    }

    #[test]
    fn test_request_conflicts_with_inline_fields() {
        assert!(parse(&["--request", "r.json", "--name", "2.5.0"]).is_err());
        assert!(parse(&["--name", "a", "--url", "b", "--notes", "x", "--notes-file", "n.md"]).is_err());
    }

    #[test]
    fn test_bad_digest_rejected() {
        let args = parse(&["--name", "2.5.0", "--url", "u", "--sha256", "abc"]).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_request_file_and_notes_file() {
        let dir = tempfile::tempdir().unwrap();
        let request_path = dir.path().join("release.json");
        std::fs::write(
            &request_path,
            r#"{"releaseName":"2.6.1","releaseUrl":"https://example.test/b.tar.gz","releaseNotes":"notes"}"#,
        )
        .unwrap();

        let args = parse(&["--request", request_path.to_str().unwrap()]).unwrap();
        args.validate().unwrap();
        let request = args.to_request().unwrap();
        assert_eq!(request.release_name, "2.6.1");
        assert_eq!(request.release_notes, "notes");

        let notes_path = dir.path().join("NOTES.md");
        std::fs::write(&notes_path, "- fixed uploads\n").unwrap();
        let args = parse(&[
            "--name",
            "2.6.2",
            "--url",
            "https://example.test/c.zip",
            "--notes-file",
            notes_path.to_str().unwrap(),
        ])
        .unwrap();
        assert_eq!(args.to_request().unwrap().release_notes, "- fixed uploads\n");
    }
}
