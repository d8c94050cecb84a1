use dfs_config::FeatureRegistry;
use dfs_decorators::{BackStoreHandler, DegradeHandler, TeeHandler};
use dfs_entity::EntityStore;
use dfs_fileop::FileHandler;
use dfs_meta::{CacheLogStore, MetaStore, RecoveryEventStore};
use std::sync::Arc;
use std::time::Duration;

/// The pieces `BackStoreHandler` needs beyond a raw `FileHandler`: it keeps
/// its own handle to the primary's `MetaStore` so a cache-diverted write can
/// still persist a `File` row.
pub struct BackStoreParams {
    pub meta: Arc<dyn MetaStore>,
    pub cache: Arc<dyn EntityStore>,
    pub cache_logs: Arc<dyn CacheLogStore>,
    pub cache_duration: Duration,
}

/// Builds a shard's decorator stack on top of its raw handler, in the fixed
/// order a shard's role implies: tee to a minor (if one is assigned) wraps
/// first, so the backstore decorator still sees a single primary to divert
/// around. `SPEC_FULL.md` §4.3.
pub fn compose_handler(
    raw: Arc<dyn FileHandler>,
    shard_name: &str,
    minor: Option<Arc<dyn FileHandler>>,
    backstore: Option<BackStoreParams>,
    features: Arc<FeatureRegistry>,
) -> Arc<dyn FileHandler> {
    let mut handler = raw;
    if let Some(minor) = minor {
        handler = Arc::new(TeeHandler::new(handler, minor, features.clone()));
    }
    if let Some(bs) = backstore {
        handler = Arc::new(BackStoreHandler::new(
            handler,
            bs.meta,
            bs.cache,
            bs.cache_logs,
            features,
            shard_name.to_string(),
            bs.cache_duration,
        ));
    }
    handler
}

/// Wraps the designated degrade shard's raw handler so every write that
/// lands on it journals a `RecoveryEvent` for later replay.
pub fn wrap_degrade(raw: Arc<dyn FileHandler>, events: Arc<dyn RecoveryEventStore>) -> Arc<dyn FileHandler> {
    Arc::new(DegradeHandler::new(raw, events))
}
