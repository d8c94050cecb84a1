//! The nine streaming/unary RPC business-logic functions, each a thin layer
//! over [`crate::context::TransferContext`] plus a [`dfs_fileop::FileHandler`]
//! resolved via the selector. `SPEC_FULL.md` §4.6.

mod copy;
mod duplicate;
mod get;
mod md5;
mod negotiate;
mod put;
mod remove;
mod stat;

pub use copy::{copy, CopyRequest};
pub use duplicate::duplicate;
pub use get::{get_file, GetFileFrame};
pub use md5::{exist_by_md5, get_by_md5};
pub use negotiate::negotiate_chunk_size;
pub use put::put_file;
pub use remove::remove_file;
pub use stat::{exist, find_file_for_read, find_handler_for_read, stat};
