use thiserror::Error;

#[derive(Debug, Error)]
pub enum NoticeError {
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("notice backend unavailable: {0}")]
    Unavailable(String),
}
