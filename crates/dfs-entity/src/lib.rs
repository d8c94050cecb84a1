//! The `EntityStore` side of a shard: write/read/delete opaque byte streams
//! keyed by a storage-local fid. `dfs-fileop` pairs an `EntityStore` with a
//! `MetaStore` to build the full `FileHandler` contract. Kept intentionally
//! dumb -- no knowledge of dedup, decorators, or metadata lives here.

mod error;
mod memory;
mod path;

pub use error::EntityError;
pub use memory::InMemoryEntityStore;
pub use path::entity_path;

use async_trait::async_trait;
use dfs_types::Domain;

/// An open write handle. Bytes are appended in order; the caller is
/// responsible for computing size/md5 over what it wrote (that lives at the
/// `FileHandler` layer, since only it knows whether a Tee/BackStore
/// decorator is also fanning the same bytes out elsewhere).
#[async_trait]
pub trait EntityWriter: Send {
    async fn write(&mut self, buf: &[u8]) -> Result<(), EntityError>;
    async fn close(self: Box<Self>) -> Result<(), EntityError>;
}

/// An open read handle. `read` returns `Ok(0)` on EOF, matching the
/// `io::Read` convention the transfer state machine's chunk loop expects.
#[async_trait]
pub trait EntityReader: Send {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, EntityError>;
    async fn close(self: Box<Self>) -> Result<(), EntityError>;
}

/// Backend-specific byte storage. `fid` is always caller-assigned here (the
/// `FileHandler` layer mints the id before calling `create`); `EntityStore`
/// never generates ids itself.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn create(&self, domain: Domain, fid: &str) -> Result<Box<dyn EntityWriter>, EntityError>;
    async fn open(&self, domain: Domain, fid: &str) -> Result<Box<dyn EntityReader>, EntityError>;
    async fn remove(&self, domain: Domain, fid: &str) -> Result<(), EntityError>;
    async fn health_check(&self) -> Result<(), EntityError>;
    fn name(&self) -> &str;
}

pub mod fs;
pub use fs::FsEntityStore;
