//! GitHub Release creation over the REST API

use crate::config::PipelineConfig;
use crate::error::{PublishError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

/// Creates release records on a hosting platform
pub trait ReleasePublisher {
    /// Create a release named `name` targeting `branch`
    fn create_release(
        &self,
        name: &str,
        branch: &str,
        notes: &str,
    ) -> impl Future<Output = Result<ReleaseRecord>>;
}

/// Release descriptor submitted to the releases endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    /// Tag created for the release
    pub tag_name: String,
    /// Branch the tag points at
    pub target_commitish: String,
    /// Display name
    pub name: String,
    /// Release notes
    pub body: String,
    /// Whether this is a draft
    pub draft: bool,
    /// Whether this is a prerelease
    pub prerelease: bool,
}

impl ReleaseRecord {
    /// Published, non-prerelease record whose tag and display name are `name`
    pub fn new(name: &str, branch: &str, notes: &str) -> Self {
        Self {
            tag_name: name.to_string(),
            target_commitish: branch.to_string(),
            name: name.to_string(),
            body: notes.to_string(),
            draft: false,
            prerelease: false,
        }
    }
}

/// GitHub release manager
#[derive(Clone)]
pub struct GitHubReleaseManager {
    client: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    token: String,
}

impl GitHubReleaseManager {
    /// Create a release manager with the crate's user agent
    pub fn new(
        api_url: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self> {
        let api_url = api_url.into();
        let client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|source| PublishError::Request {
                endpoint: api_url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            api_url,
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
        })
    }

    /// Create a release manager for the configured repository
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(
            config.api_url.clone(),
            config.repository.owner.clone(),
            config.repository.name.clone(),
            config.credentials.password.clone(),
        )
    }

    /// Use a preconfigured client
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Releases endpoint for the repository
    pub fn endpoint(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases",
            self.api_url.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }
}

impl fmt::Debug for GitHubReleaseManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubReleaseManager")
            .field("api_url", &self.api_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl ReleasePublisher for GitHubReleaseManager {
    async fn create_release(&self, name: &str, branch: &str, notes: &str) -> Result<ReleaseRecord> {
        let endpoint = self.endpoint();
        let record = ReleaseRecord::new(name, branch, notes);
        let body = serde_json::to_vec(&record).map_err(PublishError::from)?;

        log::info!("Creating release {} on {}/{}", name, self.owner, self.repo);

        // Some server stacks reject requests without a User-Agent
        let response = self
            .client
            .post(&endpoint)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::AUTHORIZATION, format!("token {}", self.token))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| PublishError::Request {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::HttpStatus {
                endpoint,
                status: status.as_u16(),
                body,
            }
            .into());
        }

        log::info!("Created release {} (HTTP {})", name, status.as_u16());
        Ok(record)
    }
}
