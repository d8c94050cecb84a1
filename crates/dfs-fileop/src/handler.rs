use crate::error::FileOpError;
use async_trait::async_trait;
use dfs_types::{Domain, File};
use std::collections::HashMap;

/// Mirrors `FileHandler.HealthStatus()`'s three-value result: routing and
/// the selector's health-probe loop distinguish a dead metadata store from a
/// dead entity store so they can log/alert with the right blame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    MetaNotHealthy,
    StoreNotHealthy,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, HealthStatus::Ok)
    }
}

/// Result of `FileHandler::find`: a lookup without opening a data handle.
/// The original returns empty strings rather than an error on a miss; we
/// model that as `None` at the call site instead (`find` itself still
/// returns `Ok`).
#[derive(Debug, Clone)]
pub struct FoundFile {
    pub real_id: String,
    pub file: File,
}

/// The uniform file contract every storage back-end (`RawFileHandler` over
/// some `MetaStore`+`EntityStore` pair) and every decorator
/// (`dfs-decorators`) implements. `SPEC_FULL.md` §4.1.
#[async_trait]
pub trait FileHandler: Send + Sync {
    /// Opens a write-mode handle. Mints a new entity id if `info.id` is
    /// empty, otherwise adopts the caller-supplied id -- the latter is how
    /// `TeeHandler` keeps a minor's id in sync with its primary.
    async fn create(&self, info: File) -> Result<Box<dyn DfsFile>, FileOpError>;

    /// Opens a read-mode handle. `fid` may be an entity id or a dupl id.
    async fn open(&self, fid: &str, domain: Domain) -> Result<Box<dyn DfsFile>, FileOpError>;

    /// Resolves `fid` to its underlying entity without opening a data
    /// handle. Returns `Ok(None)` (not an error) when nothing is found.
    async fn find(&self, fid: &str, domain: Domain) -> Result<Option<FoundFile>, FileOpError>;

    /// Creates a new dupl id pointing at the same entity as `fid`.
    async fn duplicate(&self, fid: &str, domain: Domain) -> Result<String, FileOpError>;

    /// Like `duplicate`, but adopts a caller-supplied dupl id -- used by
    /// `TeeHandler` to keep a minor shard's dupl ids identical to the
    /// primary's.
    async fn duplicate_with_given_id(&self, fid: &str, domain: Domain, dup_id: &str) -> Result<String, FileOpError>;

    /// Deletes a dupl or (if no live references remain) an entity. Returns
    /// `(physically_removed, file_meta)`: `true` iff this call drove the
    /// last reference out and the entity was actually deleted.
    async fn remove(&self, fid: &str, domain: Domain) -> Result<(bool, Option<File>), FileOpError>;

    async fn find_by_md5(&self, md5: &str, domain: Domain, size: i64) -> Result<String, FileOpError>;

    fn name(&self) -> &str;

    async fn health_status(&self) -> HealthStatus;

    async fn close(&self) -> Result<(), FileOpError>;
}

/// An open file handle, exclusively owned for the lifetime of one RPC.
/// Write-mode handles accumulate bytes and finalize metadata on `close`;
/// read-mode handles just stream bytes back and release any cursor.
#[async_trait]
pub trait DfsFile: Send {
    async fn write(&mut self, buf: &[u8]) -> Result<(), FileOpError>;

    /// Returns `Ok(0)` on EOF.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, FileOpError>;

    /// On a write handle: computes the final md5/size and persists the
    /// metadata row. On a write handle whose metadata persistence fails:
    /// best-effort deletes the entity bytes to avoid an orphan. On a read
    /// handle: a no-op beyond releasing any server-side cursor.
    async fn close(self: Box<Self>) -> Result<File, FileOpError>;

    fn get_file_info(&self) -> &File;

    fn update_file_meta(&mut self, attrs: HashMap<String, String>);

    fn get_file_meta(&self) -> &HashMap<String, String>;

    /// Whether this handle actually wrote/has entity bytes (vs. e.g. a
    /// zero-length create that a backend short-circuits).
    fn has_entity(&self) -> bool;
}
