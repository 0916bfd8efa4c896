//! crates/ascendant_core/src/error.rs
//!
//! Errors returned by progression store operations.

/// Why a store operation was rejected. The in-memory state is unchanged
/// whenever one of these is returned.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Operation not allowed: {0}")]
    InvalidState(String),
    #[error("No stat points available")]
    InsufficientPoints,
}

/// A convenience type alias for `Result<T, ProgressError>`.
pub type ProgressResult<T> = Result<T, ProgressError>;
