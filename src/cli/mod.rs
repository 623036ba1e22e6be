//! Command line interface for ghost_release.
//!
//! Parses the release request, resolves configuration from the environment and runs
//! the pipeline once. Exit codes: `0` published or skipped, `1` failed, `2` invalid
//! arguments or configuration.

mod args;
mod output;

pub use args::Args;
pub use output::OutputManager;

use crate::config::{EnvConfig, PipelineConfig};
use crate::error::{ReleaseError, Result};
use crate::pipeline::{DefaultPipeline, RunOutcome};

/// Run finished, published or skipped
pub const EXIT_SUCCESS: i32 = 0;
/// Run failed
pub const EXIT_FAILURE: i32 = 1;
/// Arguments or configuration rejected before any work
pub const EXIT_USAGE: i32 = 2;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute(args, EnvConfig::from_env()).await
}

/// Execute parsed arguments against an environment snapshot
pub async fn execute(args: Args, env: EnvConfig) -> Result<i32> {
    let output = OutputManager::new();

    if let Err(validation_error) = args.validate() {
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(EXIT_USAGE);
    }

    let request = match args.to_request() {
        Ok(request) => request,
        Err(reason) => {
            output.error(&format!("Invalid arguments: {}", reason));
            return Ok(EXIT_USAGE);
        }
    };

    let config = match PipelineConfig::from_env_config(&env) {
        Ok(config) => config,
        Err(e) => {
            report_failure(&output, &ReleaseError::from(e));
            return Ok(EXIT_USAGE);
        }
    };

    let pipeline = DefaultPipeline::from_config(config)?;

    match pipeline.run(&request).await {
        Ok(RunOutcome::Skipped { release_name }) => {
            let _ = output.info(&format!(
                "Skipped {}: not in the '{}' release series",
                release_name,
                pipeline.config().acceptance.prefix()
            ));
            Ok(EXIT_SUCCESS)
        }
        Ok(RunOutcome::Published(published)) => {
            let _ = output.success(&format!(
                "Published {} ({} on {})",
                published.release_name, published.commit.short_hash, published.push.branch
            ));
            let _ = output.indent(&format!("Working directory: {}", published.working_dir.display()));
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            report_failure(&output, &e);
            Ok(EXIT_FAILURE)
        }
    }
}

/// Print an error with its recovery suggestions
pub fn report_failure(output: &OutputManager, error: &ReleaseError) {
    output.error(&error.to_string());

    let suggestions = error.recovery_suggestions();
    if !suggestions.is_empty() {
        output.error_detail("");
        output.error_detail("Recovery suggestions:");
        for suggestion in suggestions {
            output.error_detail(&format!("• {}", suggestion));
        }
    }
}
