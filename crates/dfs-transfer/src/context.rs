use std::sync::Arc;

use dfs_config::{FeatureRegistry, ServerFlags};
use dfs_meta::AuditStore;
use dfs_selector::HandlerSelector;

use crate::error::TransferError;
use crate::rate::RateSampler;
use crate::shield::{Shield, ShieldOutcome};

/// Shared state every transfer operation reads: routing, feature flags, the
/// audit trail, and the rate samplers/shield the pre-judgment and
/// coalescing checks draw on. One instance per server process, held behind
/// an `Arc` so background tasks (`GetFile`'s streaming task, the shield's
/// coalesced leader) can outlive the call that spawned them.
pub struct TransferContext {
    pub selector: Arc<HandlerSelector>,
    pub features: Arc<FeatureRegistry>,
    pub audit: Arc<dyn AuditStore>,
    pub flags: Arc<ServerFlags>,
    pub put_rate: RateSampler,
    pub get_rate: RateSampler,
    pub shield: Shield<Result<ShieldOutcome, Arc<TransferError>>>,
}

impl TransferContext {
    pub fn new(
        selector: Arc<HandlerSelector>,
        features: Arc<FeatureRegistry>,
        audit: Arc<dyn AuditStore>,
        flags: Arc<ServerFlags>,
    ) -> Self {
        Self {
            selector,
            features,
            audit,
            flags,
            put_rate: RateSampler::new(),
            get_rate: RateSampler::new(),
            shield: Shield::new(),
        }
    }
}
