//! Unifies a `MetaStore` + `EntityStore` pair into the `FileHandler`
//! contract every storage back-end and decorator agrees on
//! (`SPEC_FULL.md` §4.1).

mod error;
mod handler;
mod raw;

pub use error::FileOpError;
pub use handler::{DfsFile, FileHandler, FoundFile, HealthStatus};
pub use raw::RawFileHandler;
