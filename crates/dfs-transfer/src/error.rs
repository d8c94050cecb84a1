use dfs_fileop::FileOpError;
use dfs_selector::SelectorError;
use thiserror::Error;

/// Errors a transfer operation can return to its caller (`dfs-server`'s RPC
/// handlers, which translate these into the matching gRPC status code).
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    FileOp(#[from] FileOpError),

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,

    #[error("shield wait timed out")]
    ShieldTimeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl TransferError {
    pub fn is_not_found(&self) -> bool {
        match self {
            TransferError::FileOp(e) => e.is_not_found(),
            TransferError::Selector(SelectorError::FileOp(e)) => e.is_not_found(),
            _ => false,
        }
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, TransferError::DeadlineExceeded)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransferError::Cancelled)
    }
}
