//! The `MetaStore` side of a shard: persists `File`/`Dupl`/`Ref` rows and
//! implements the dupl/ref dedup protocol (`SPEC_FULL.md` §4.2) generically
//! over a low-level [`RawMetaOp`] backend. Also carries the auxiliary
//! collections (`CacheLog`, `RecoveryEvent`, `Event`/`SpaceLog`) the
//! decorators and transfer state machine depend on.
//!
//! Two independent [`RawMetaOp`] backends are provided -- [`memory::InMemoryRaw`]
//! (a plain mutex-guarded table, standing in for a Mongo-style document
//! store) and [`partitioned::PartitionedRaw`] (sharded by domain, standing in
//! for a Cassandra-style partitioned store) -- so the dupl/ref protocol in
//! [`duplref::DuplRefStore`] is exercised against two genuinely different
//! storage shapes, per `SPEC_FULL.md` §1's "implemented against two
//! different metadata stores" framing.

mod aux;
mod duplref;
mod error;
mod memory;
mod partitioned;
mod raw;

pub use aux::{AuditStore, CacheLogStore, InMemoryAux, RecoveryEventStore};
pub use duplref::{DuplRefStore, MetaStore};
pub use error::MetaError;
pub use memory::InMemoryRaw;
pub use partitioned::PartitionedRaw;
pub use raw::RawMetaOp;
