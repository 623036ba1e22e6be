//! Version control gateway for release workflows.
//!
//! Clones the deployment repository, stages and commits the prepared tree, and
//! pushes it back with injected credentials.

mod operations;
mod system_git;

pub use operations::{CommitInfo, PushInfo, SourceControl, WorkingRepository};
pub use system_git::SystemGit;
