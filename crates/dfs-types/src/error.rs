use thiserror::Error;

/// Error taxonomy shared by every storage-facing crate. Specific crates
/// (`dfs-meta`, `dfs-entity`, `dfs-fileop`) wrap this in their own error type
/// when they need extra variants, but route back to these for the cases the
/// decorators and transfer state machine need to pattern-match on.
#[derive(Debug, Error)]
pub enum DfsError {
    #[error("file not found")]
    FileNotFound,

    /// Internal-only: never surfaced to clients directly. Triggers BackStore
    /// caching or Degrade journaling in the decorators that catch it.
    #[error("store unavailable: {0}")]
    Recoverable(String),

    #[error("invalid type: file type must not be None")]
    InvalidType,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,

    #[error("internal assertion failed: {0}")]
    Assertion(String),

    #[error("meta store error: {0}")]
    Meta(String),

    #[error("entity store error: {0}")]
    Entity(String),
}

impl DfsError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DfsError::Recoverable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DfsError::FileNotFound)
    }
}
