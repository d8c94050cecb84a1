//! Shared data model for the distributed file service: the `File` / `Dupl` / `Ref`
//! rows persisted by a MetaStore, the `Segment` / `Shard` routing records, the
//! `RecoveryEvent` / `CacheLog` / `Event` / `SpaceLog` audit rows, and the fid
//! encoding rules that every storage back-end and every RPC handler agrees on.

mod error;
mod fid;
mod file;
mod object_id;
mod refcnt;
mod segment;
mod shard;

pub use error::DfsError;
pub use fid::{get_dupl_id, get_real_id, is_dupl_id, DUPL_PREFIX};
pub use file::{Dupl, File, FileType};
pub use object_id::ObjectId;
pub use refcnt::Ref;
pub use segment::{find_perfect_segment, Segment};
pub use shard::{Shard, ShardKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tenant identifier. Domains route to shards via [`Segment`] boundaries.
pub type Domain = i64;

/// State of a diverted write waiting to be replayed into its real primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheLogState {
    Pending,
    Processing,
    SrcDamaged,
    Finished,
}

/// Emitted when a `Create` is diverted to the backstore cache instead of the
/// primary store. Drained by the cache recovery loop (`dfs-recovery`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheLog {
    pub fid: String,
    pub cache_id: String,
    pub domain: Domain,
    pub cache_chunk_size: i64,
    pub shard: String,
    pub cause: String,
    pub state: CacheLogState,
    pub retry_times: u32,
    pub timestamp: DateTime<Utc>,
}

/// Emitted when a write succeeds on the degrade fallback shard; replayed by
/// the selector's per-shard recovery dispatcher once the real primary is
/// healthy again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryEvent {
    pub id: ObjectId,
    pub fid: String,
    pub domain: Domain,
    pub timestamp: DateTime<Utc>,
}

/// Kind of business event recorded for audit / best-effort telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    SucCreate,
    FailCreate,
    SucRead,
    FailRead,
    SucDelete,
    FailDelete,
    SucDupl,
    FailDupl,
    SucMd5,
    FailMd5,
    CommandDelete,
}

/// Audit trail row. Saved best-effort: a save failure is logged, never
/// propagated to the RPC caller (see `SPEC_FULL.md` §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub fid: String,
    pub domain: Domain,
    pub biz: String,
    pub user_id: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Kind of space accounting row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpaceLogKind {
    Create,
    Delete,
}

/// Space accounting row, one per successful create/delete/copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceLog {
    pub kind: SpaceLogKind,
    pub size: i64,
    pub biz: String,
    pub user_id: String,
    pub domain: Domain,
    pub fid: String,
    pub timestamp: DateTime<Utc>,
}
