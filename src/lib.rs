//! # Ghost Release
//!
//! Publishes a freshly built release into a version-controlled deployment repository.
//!
//! One run takes a release request (name, archive URL, notes), clones the deployment
//! repository into a fresh working directory, replaces its content with the expanded
//! archive, enriches `package.json` with deployment dependencies, overlays deployment
//! resources, commits and pushes the result, and creates a GitHub release for it.
//!
//! ## Usage
//!
//! ```bash
//! ghost_release --name 2.5.0 --url https://example.test/ghost-2.5.0.zip --notes "fixes"
//! ghost_release --request release.json
//! ```
//!
//! Library users build a [`ReleasePipeline`] from a [`PipelineConfig`] and call
//! [`ReleasePipeline::run`]. Every collaborator sits behind a trait
//! ([`SourceControl`], [`ArtifactSource`], [`ReleasePublisher`]) so runs can be
//! exercised without network access.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod git;
pub mod github;
pub mod pipeline;
pub mod request;
pub mod transform;
pub mod workspace;

pub use config::{
    AcceptancePolicy, Author, Credentials, EnvConfig, PipelineConfig, RepositoryCoordinates,
    SingleFlightConfig,
};
pub use error::{ReleaseError, Result};
pub use fetch::{ArtifactSource, ExpandedArtifact, HttpArtifactFetcher};
pub use git::{CommitInfo, PushInfo, SourceControl, SystemGit, WorkingRepository};
pub use github::{GitHubReleaseManager, ReleasePublisher, ReleaseRecord};
pub use pipeline::{DefaultPipeline, PublishedRelease, ReleasePipeline, RunOutcome};
pub use request::ReleaseRequest;
pub use transform::{RepositoryTransformer, TransformSummary};

/// User-Agent sent with every HTTP request
pub const USER_AGENT: &str = concat!("ghost_release/", env!("CARGO_PKG_VERSION"));
