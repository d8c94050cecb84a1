//! Drains writes diverted to a shard's backstore cache back to their real
//! primary once it recovers, and periodically sweeps the cache journal and
//! kicks the backstore's own compaction. `SPEC_FULL.md` §4.5.

mod cache_loop;

pub use cache_loop::{CacheRecoveryLoop, RecoveryTarget, TargetResolver};
