//! Internal-failure error type.
//!
//! Per §7's propagation policy, ordinary validation/verify/analyze
//! findings are plain accumulated data, never a Rust `Err`. This type
//! exists solely for the "unexpected exception, malformed input" path
//! that every public entry point catches at its own boundary and
//! folds into a single `internal_error`-equivalent result rather than
//! raising to the caller.

use thiserror::Error;

/// An internal failure caught at an entry-point boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("internal evaluation failure: {0}")]
    Internal(String),

    #[error("document could not be deserialized: {0}")]
    Malformed(String),
}

impl EngineError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
