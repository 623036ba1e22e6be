//! Repository transformer: deterministic edits applied to the expanded release tree.

mod descriptor;
mod overlay;

pub use descriptor::{enrich_content, enrich_descriptor, merge_fields};
pub use overlay::overlay_dir;

use crate::config::PipelineConfig;
use crate::error::TransformError;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Outcome of [`RepositoryTransformer::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSummary {
    /// Whether the descriptor content changed
    pub descriptor_changed: bool,
    /// Number of resource files overlaid
    pub resources_copied: usize,
}

/// Enriches the package descriptor and overlays deployment resources
#[derive(Debug, Clone)]
pub struct RepositoryTransformer {
    descriptor_file: String,
    fields: Map<String, Value>,
    resources_dir: PathBuf,
}

impl RepositoryTransformer {
    /// Create a transformer
    pub fn new(
        descriptor_file: impl Into<String>,
        fields: Map<String, Value>,
        resources_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            descriptor_file: descriptor_file.into(),
            fields,
            resources_dir: resources_dir.into(),
        }
    }

    /// Create a transformer from pipeline configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.descriptor_file.clone(),
            config.descriptor_fields.clone(),
            config.resources_dir.clone(),
        )
    }

    /// Merge the deployment fields into the descriptor at the tree root
    pub async fn enrich_descriptor(&self, tree: &Path) -> Result<bool, TransformError> {
        enrich_descriptor(&tree.join(&self.descriptor_file), &self.fields).await
    }

    /// Copy the deployment resources over the tree
    pub async fn overlay_resources(&self, tree: &Path) -> Result<usize, TransformError> {
        overlay_dir(&self.resources_dir, tree).await
    }

    /// Enrich, then overlay; overlay files win over enriched content
    pub async fn apply(&self, tree: &Path) -> Result<TransformSummary, TransformError> {
        log::info!("Started enriching {}", self.descriptor_file);
        let descriptor_changed = self.enrich_descriptor(tree).await?;
        log::info!("Finished enriching {}", self.descriptor_file);

        log::info!(
            "Started copying deployment resources from {}",
            self.resources_dir.display()
        );
        let resources_copied = self.overlay_resources(tree).await?;
        log::info!("Finished copying {} deployment resources", resources_copied);

        Ok(TransformSummary {
            descriptor_changed,
            resources_copied,
        })
    }
}
