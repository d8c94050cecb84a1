//! The `Notice` trait (`SPEC_FULL.md` §1: "ZooKeeper-style mechanics...
//! specified abstractly as a change-notification + ephemeral-registration
//! service") plus the client-side peer selection policy layered on top of
//! `GetDfsServers`'s discovered peer set.

mod error;
mod notice;
mod selector;

pub use error::NoticeError;
pub use notice::{InMemoryNotice, Notice, SHARD_CHUNK_PATH, SHARD_DFS_PATH, SHARD_SERVER_PATH};
pub use selector::{DfsServerInfo, RandomPeerSelector, SelectorError};
