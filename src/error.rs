//! Error taxonomy for backend collaborators
//!
//! Only collaborator-facing code returns these errors. The coordinator absorbs
//! all of them at the call site (see [`crate::backend::GuardedBackend`]), so no
//! public completion entry point ever surfaces a `BackendError`.

use std::time::Duration;

use thiserror::Error;

/// Failure of a query against the language-analysis backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// No connection or session with the backend exists
    #[error("backend is not connected")]
    Unavailable,

    /// The query did not complete within the allotted time
    #[error("backend query timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with an error
    #[error("backend query failed: {0}")]
    Query(String),

    #[error("failed to read backend index: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed backend index: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    /// Whether this error means "nothing to suggest" rather than a broken backend.
    ///
    /// Timeouts are treated the same as resolution misses.
    pub fn is_miss(&self) -> bool {
        matches!(self, BackendError::Timeout(_))
    }
}

pub type BackendResult<T> = Result<T, BackendError>;
