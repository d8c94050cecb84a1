use dfs_fileop::FileOpError;
use dfs_meta::MetaError;
use dfs_types::Domain;
use thiserror::Error;

/// Errors raised while routing a domain to a shard handler or replaying a
/// recovery event. Distinct from `FileOpError`, which covers the handler's
/// own read/write/close path once a handler has been selected.
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("no segment covers domain {0}")]
    NoPerfectSegment(Domain),

    #[error("segment names unregistered shard {0}")]
    UnknownShard(String),

    #[error("shard {0} and the degrade shard are both unreachable")]
    Unreachable(String),

    #[error("recovery event store error: {0}")]
    Meta(#[from] MetaError),

    #[error(transparent)]
    FileOp(#[from] FileOpError),
}
