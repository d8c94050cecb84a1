//! Routes a domain to the shard handler that should serve it, wraps the
//! health-probe and degrade-fallback policy around that routing, and
//! replays degrade-journal rows back into a shard once it recovers.
//! `SPEC_FULL.md` §4.4.

mod compose;
mod error;
mod handler_selector;
mod notice_loop;
mod shard_handler;

pub use compose::{compose_handler, wrap_degrade, BackStoreParams};
pub use error::SelectorError;
pub use handler_selector::HandlerSelector;
pub use notice_loop::{spawn_segment_watch_loop, spawn_shard_watch_loop};
pub use shard_handler::{FileRecoveryInfo, ShardEntry};
