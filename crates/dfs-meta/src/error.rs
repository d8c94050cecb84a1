use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetaError {
    #[error("file not found")]
    FileNotFound,

    #[error("file already exists")]
    FileAlreadyExists,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl MetaError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MetaError::Unavailable(_))
    }
}

impl From<MetaError> for dfs_types::DfsError {
    fn from(e: MetaError) -> Self {
        match e {
            MetaError::FileNotFound => dfs_types::DfsError::FileNotFound,
            MetaError::FileAlreadyExists => dfs_types::DfsError::InvalidArgument("file already exists".into()),
            MetaError::Unavailable(msg) => dfs_types::DfsError::Recoverable(msg),
            MetaError::InvalidArgument(msg) => dfs_types::DfsError::InvalidArgument(msg),
        }
    }
}
