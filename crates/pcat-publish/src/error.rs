use pcat_store::StoreError;
use pcat_types::TypeError;

use crate::commit::CommitReport;

/// Errors from publish operations.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The reference graph is deeper than the configured cap, or cyclic.
    #[error("too deep recursion while checking for missing files: level {depth} exceeds limit {limit}")]
    RecursionTooDeep { depth: usize, limit: usize },

    /// Some staged files were renamed into place and some were not.
    #[error(
        "partial commit: {} of {} staged files failed to rename",
        .0.failed.len(),
        .0.attempted()
    )]
    PartialCommit(CommitReport),

    /// The completion hook failed after the new version became visible.
    #[error("publish hook failed: {0}")]
    Hook(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid file name: {0}")]
    Type(#[from] TypeError),
}

/// Result alias for publish operations.
pub type PublishResult<T> = Result<T, PublishError>;
