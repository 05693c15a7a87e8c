//! Error types for aac-board
//!
//! Every failure that leaves the board manager is a [`BoardError`]. Remote
//! store, media and cache errors are translated here, at the manager
//! boundary, so transport details never reach the caller. Backend details
//! are logged and replaced by a generic message.

use crate::db::CacheError;
use crate::services::media_host::MediaError;
use crate::services::remote_store::StoreError;
use thiserror::Error;
use tracing::error;

/// Board operation error
#[derive(Debug, Error)]
pub enum BoardError {
    /// Bad input shape, size or type; user-correctable
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Mutating operation attempted without a session
    #[error("Sign in to change the board")]
    AuthRequired,

    /// Authenticated but not the owner, or the policy forbids the write
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Target is system content
    #[error("System content cannot be changed: {0}")]
    Immutable(String),

    /// Stale id reference
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transient transport failure
    #[error("Network error, please try again")]
    Network(String),

    /// Unexpected remote failure; detail is kept for logs only
    #[error("Something went wrong, please try again later")]
    Backend(String),

    /// Cascading delete finished with some sub-deletions failing
    #[error("{target}: {deleted} card(s) deleted, {} failed", .failed.len())]
    PartialDelete {
        target: String,
        deleted: usize,
        failed: Vec<String>,
    },
}

impl BoardError {
    /// Whether a "try again" affordance makes sense
    pub fn is_retryable(&self) -> bool {
        matches!(self, BoardError::Network(_))
    }

    /// Whether the caller should be sent to sign in
    pub fn requires_login(&self) -> bool {
        matches!(self, BoardError::AuthRequired)
    }
}

impl From<StoreError> for BoardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Network(msg) => BoardError::Network(msg),
            StoreError::Unauthorized => BoardError::AuthRequired,
            StoreError::Forbidden(msg) => BoardError::Forbidden(msg),
            StoreError::NotFound(what) => BoardError::NotFound(what),
            other => {
                error!(error = %other, "Remote store failure");
                BoardError::Backend(other.to_string())
            }
        }
    }
}

impl From<MediaError> for BoardError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::UnsupportedType(_)
            | MediaError::Decode(_)
            | MediaError::InvalidSource(_)
            | MediaError::TooLarge { .. } => BoardError::Validation(err.to_string()),
            MediaError::Network(msg) => BoardError::Network(msg),
            other => {
                error!(error = %other, "Media pipeline failure");
                BoardError::Backend(other.to_string())
            }
        }
    }
}

impl From<CacheError> for BoardError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotFound(what) => BoardError::NotFound(what),
            other => {
                error!(error = %other, "Local cache failure");
                BoardError::Backend(other.to_string())
            }
        }
    }
}

/// Result type for board operations
pub type BoardResult<T> = Result<T, BoardError>;
