use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("entity not found")]
    NotFound,

    #[error("entity already exists")]
    AlreadyExists,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EntityError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EntityError::Unavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EntityError::NotFound)
    }
}

impl From<EntityError> for dfs_types::DfsError {
    fn from(e: EntityError) -> Self {
        match e {
            EntityError::NotFound => dfs_types::DfsError::FileNotFound,
            EntityError::AlreadyExists => dfs_types::DfsError::InvalidArgument("entity already exists".into()),
            EntityError::Unavailable(msg) => dfs_types::DfsError::Recoverable(msg),
            EntityError::InvalidArgument(msg) => dfs_types::DfsError::InvalidArgument(msg),
            EntityError::Io(e) => dfs_types::DfsError::Entity(e.to_string()),
        }
    }
}
