//! Cross-cutting `FileHandler` decorators (`SPEC_FULL.md` §4.3): `TeeHandler`
//! (dual-write to a secondary shard), `BackStoreHandler` (divert/cache onto a
//! high-throughput object store when the primary is unavailable), and
//! `DegradeHandler` (journal a write on the fallback shard so it can be
//! replayed into the real primary once it's healthy again).
//!
//! Composition is unidirectional top-down delegation (`SPEC_FULL.md` §9):
//! no handler holds a pointer back to whatever wraps it.

mod backstore;
mod degrade;
mod tee;

pub use backstore::BackStoreHandler;
pub use degrade::DegradeHandler;
pub use tee::TeeHandler;
