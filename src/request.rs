//! Release request delivered by the intake layer.

use serde::{Deserialize, Serialize};

/// One release to publish
///
/// Field names follow the intake payload (`releaseName`, `releaseUrl`, `releaseNotes`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRequest {
    /// Version tag, e.g. `2.5.0`
    pub release_name: String,
    /// Location of the release archive
    pub release_url: String,
    /// Notes attached to the published release
    #[serde(default)]
    pub release_notes: String,
    /// Expected SHA-256 of the archive, hex encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ReleaseRequest {
    /// Create a request without an integrity digest
    pub fn new(
        release_name: impl Into<String>,
        release_url: impl Into<String>,
        release_notes: impl Into<String>,
    ) -> Self {
        Self {
            release_name: release_name.into(),
            release_url: release_url.into(),
            release_notes: release_notes.into(),
            sha256: None,
        }
    }

    /// Require the downloaded archive to match `digest`
    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }

    /// Commit message recorded for this release
    pub fn commit_message(&self) -> String {
        format!("Add v{}", self.release_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_intake_payload() {
        let request: ReleaseRequest = serde_json::from_str(
            r#"{"releaseName":"2.5.0","releaseUrl":"https://example.test/build.tar.gz","releaseNotes":"fixes"}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            ReleaseRequest::new("2.5.0", "https://example.test/build.tar.gz", "fixes")
        );
    }

    #[test]
    fn test_notes_default_to_empty() {
        let request: ReleaseRequest =
            serde_json::from_str(r#"{"releaseName":"2.0.1","releaseUrl":"u","sha256":"ab"}"#)
                .unwrap();
        assert!(request.release_notes.is_empty());
        assert_eq!(request.sha256.as_deref(), Some("ab"));
    }

    #[test]
    fn test_commit_message() {
        let request = ReleaseRequest::new("2.5.0", "u", "");
        assert_eq!(request.commit_message(), "Add v2.5.0");
    }
}
