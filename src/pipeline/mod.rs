//! Release pipeline controller.
//!
//! Runs one release request through every step in order: acceptance check, working
//! directory allocation, branch lock, clone, clear, fetch, transform, stage, commit,
//! push and publish. The first failing step aborts the run; nothing after it executes.

use crate::config::PipelineConfig;
use crate::error::{Result, error_chain};
use crate::fetch::{ArtifactSource, ExpandedArtifact, HttpArtifactFetcher};
use crate::git::{CommitInfo, PushInfo, SourceControl, SystemGit};
use crate::github::{GitHubReleaseManager, ReleasePublisher, ReleaseRecord};
use crate::request::ReleaseRequest;
use crate::transform::{RepositoryTransformer, TransformSummary};
use crate::workspace::{self, BranchLock};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Release name is outside the accepted series; nothing was touched
    Skipped {
        /// Rejected release name
        release_name: String,
    },
    /// Commit pushed and release record created
    Published(PublishedRelease),
}

/// Everything a published run produced
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedRelease {
    /// Release name from the request
    pub release_name: String,
    /// Working directory the clone lives in
    pub working_dir: PathBuf,
    /// Expanded artifact summary
    pub artifact: ExpandedArtifact,
    /// Transformer summary
    pub transform: TransformSummary,
    /// Pushed commit
    pub commit: CommitInfo,
    /// Push result
    pub push: PushInfo,
    /// Created release
    pub release: ReleaseRecord,
}

/// Pipeline backed by the system git binary, HTTP downloads and the GitHub API
pub type DefaultPipeline = ReleasePipeline<SystemGit, HttpArtifactFetcher, GitHubReleaseManager>;

/// Sequenced release workflow over pluggable collaborators
#[derive(Debug)]
pub struct ReleasePipeline<G, F, P> {
    config: PipelineConfig,
    git: G,
    fetcher: F,
    publisher: P,
    transformer: RepositoryTransformer,
}

impl DefaultPipeline {
    /// Build the production pipeline for `config`
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let git = SystemGit::new();
        let fetcher = HttpArtifactFetcher::new()?;
        let publisher = GitHubReleaseManager::from_config(&config)?;
        Ok(Self::new(config, git, fetcher, publisher))
    }
}

impl<G, F, P> ReleasePipeline<G, F, P>
where
    G: SourceControl,
    F: ArtifactSource,
    P: ReleasePublisher,
{
    /// Create a pipeline from explicit collaborators
    pub fn new(config: PipelineConfig, git: G, fetcher: F, publisher: P) -> Self {
        let transformer = RepositoryTransformer::from_config(&config);
        Self {
            config,
            git,
            fetcher,
            publisher,
            transformer,
        }
    }

    /// Pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run `request` now
    pub async fn run(&self, request: &ReleaseRequest) -> Result<RunOutcome> {
        self.run_at(request, Utc::now()).await
    }

    /// Run `request` as if started at `started_at`.
    ///
    /// Failures are logged with their full cause chain and returned unchanged.
    pub async fn run_at(
        &self,
        request: &ReleaseRequest,
        started_at: DateTime<Utc>,
    ) -> Result<RunOutcome> {
        match self.execute(request, started_at).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                log::error!(
                    "Release {} failed during {}: {}",
                    request.release_name,
                    e.step(),
                    error_chain(&e)
                );
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        request: &ReleaseRequest,
        started_at: DateTime<Utc>,
    ) -> Result<RunOutcome> {
        let name = &request.release_name;

        if !self.config.acceptance.accepts(name) {
            log::info!(
                "Release {} is not in the '{}' series, skipping",
                name,
                self.config.acceptance.prefix()
            );
            return Ok(RunOutcome::Skipped {
                release_name: name.clone(),
            });
        }

        log::info!("Started release {} at {}", name, started_at.to_rfc3339());

        let working_dir = workspace::allocate_working_dir(&self.config.install_dir, started_at).await?;
        log::info!("Allocated working directory {}", working_dir.display());

        let _lock = if self.config.single_flight.enabled {
            Some(
                BranchLock::acquire(
                    &self.config.single_flight.lock_dir,
                    &self.config.repository.lock_key(),
                    self.config.single_flight.timeout,
                )
                .await?,
            )
        } else {
            None
        };

        let repository = &self.config.repository;
        log::info!("Started cloning {} ({})", repository.remote_url, repository.branch);
        let repo = self
            .git
            .clone_repository(
                &repository.remote_url,
                &working_dir,
                &repository.branch,
                &self.config.credentials,
            )
            .await?;
        log::info!("Finished cloning into {}", repo.local_path.display());

        log::info!("Started clearing working tree");
        let removed = workspace::clear_working_tree(&repo.local_path).await?;
        log::info!("Finished clearing working tree ({} entries removed)", removed);

        log::info!("Started downloading {}", request.release_url);
        let artifact = self
            .fetcher
            .fetch_and_expand(
                &request.release_url,
                request.sha256.as_deref(),
                &repo.local_path,
            )
            .await?;
        log::info!("Finished downloading {}", request.release_url);

        let transform = self.transformer.apply(&repo.local_path).await?;

        log::info!("Started staging changes");
        self.git.stage_all(&repo).await?;
        log::info!("Finished staging changes");

        log::info!("Started commit");
        let commit = self
            .git
            .commit(&repo, &request.commit_message(), &self.config.author)
            .await?;
        log::info!("Finished commit {}", commit.short_hash);

        log::info!("Started push to {}", repo.remote_branch);
        let push = self.git.push(&repo, &self.config.credentials).await?;
        log::info!("Finished push to {}", push.branch);

        log::info!("Started creating release {}", name);
        let release = self
            .publisher
            .create_release(name, &repo.remote_branch, &request.release_notes)
            .await?;
        log::info!("Finished creating release {}", release.tag_name);

        Ok(RunOutcome::Published(PublishedRelease {
            release_name: name.clone(),
            working_dir,
            artifact,
            transform,
            commit,
            push,
            release,
        }))
    }
}
