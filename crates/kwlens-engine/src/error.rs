use thiserror::Error;

use crate::traits::StoreError;

/// Errors surfaced by the research pipeline.
///
/// Deliberately narrow: per-product provider failures, cache trouble, and
/// enhancement failures are all absorbed inside the pipeline (recorded on
/// the affected records or logged), so only request-level problems reach
/// the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input validation failed before any provider call was made.
    #[error(transparent)]
    Validation(#[from] kwlens_core::CoreError),

    /// The requested session does not exist (or belongs to another user).
    #[error("session not found")]
    SessionNotFound,

    /// The persistent store failed on an operation that cannot degrade
    /// (listing, deleting, renaming).
    #[error(transparent)]
    Store(#[from] StoreError),
}
