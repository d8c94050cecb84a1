use dfs_entity::EntityError;
use dfs_meta::MetaError;
use dfs_types::DfsError;
use thiserror::Error;

/// The error type every `FileHandler` implementation and decorator in
/// `dfs-decorators` propagates. Wraps the shared `DfsError` taxonomy plus
/// the two storage-layer error types, so callers can match on
/// `is_recoverable()` / `is_not_found()` without caring which layer raised
/// the error.
#[derive(Debug, Error)]
pub enum FileOpError {
    #[error(transparent)]
    Dfs(#[from] DfsError),
    #[error("meta store error: {0}")]
    Meta(#[from] MetaError),
    #[error("entity store error: {0}")]
    Entity(#[from] EntityError),
}

impl FileOpError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            FileOpError::Dfs(e) => e.is_recoverable(),
            FileOpError::Meta(e) => e.is_recoverable(),
            FileOpError::Entity(e) => e.is_recoverable(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            FileOpError::Dfs(e) => e.is_not_found(),
            FileOpError::Meta(e) => matches!(e, MetaError::FileNotFound),
            FileOpError::Entity(e) => e.is_not_found(),
        }
    }

    pub fn recoverable(msg: impl Into<String>) -> Self {
        FileOpError::Dfs(DfsError::Recoverable(msg.into()))
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        FileOpError::Dfs(DfsError::InvalidArgument(msg.into()))
    }

    pub fn not_found() -> Self {
        FileOpError::Dfs(DfsError::FileNotFound)
    }
}
