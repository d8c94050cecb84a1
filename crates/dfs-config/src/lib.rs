//! Dynamic per-domain feature flags and the typed server flags they're
//! layered under. Feature flags are populated disabled-by-default at init and
//! mutated live by the notice watcher (`dfs-notice`); reads happen on hot
//! paths in the decorators, so the registry is a reader-lock-friendly map.

mod feature;
mod flags;
mod registry;

pub use feature::FeatureFlag;
pub use flags::ServerFlags;
pub use registry::FeatureRegistry;

/// Well-known feature flag keys referenced by the decorators in `dfs-decorators`.
pub mod keys {
    pub const CACHE_FILE: &str = "cachefile";
    pub const BACKSTORE: &str = "backstore";
    pub const READ_FROM_BACKSTORE: &str = "read_from_backstore";
    pub const TEE_WRITE_TO_MINOR: &str = "tee_write_to_minor";
    pub const TEE_READ_FROM_MINOR: &str = "tee_read_from_minor";
    pub const SEGMENT_DELETION: &str = "segment_deletion";
    pub const ASYNC_SAVE_EVENT: &str = "async_save_event";
    pub const PRE_JUDGE_PUT: &str = "pre_judge_put";
    pub const PRE_JUDGE_GET: &str = "pre_judge_get";
    pub const SHIELD: &str = "shield";
}
