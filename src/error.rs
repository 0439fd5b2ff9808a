use thiserror::Error;

use crate::pagination::PaginationError;
use crate::reference::ReferenceError;
use crate::terminology::TerminologyError;

/// Top-level error type aggregating the engine's failure modes.
///
/// "Not found" outcomes (unresolved paths, unmatched slices, binding
/// mismatches) are values, not errors; only collaborator failures and
/// malformed upstream data surface here.
#[derive(Debug, Error)]
pub enum ConformanceError {
    #[error(transparent)]
    Terminology(#[from] TerminologyError),

    #[error(transparent)]
    Pagination(#[from] PaginationError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConformanceError>;
