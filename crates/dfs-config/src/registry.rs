use crate::feature::FeatureFlag;
use std::collections::HashMap;
use std::sync::RwLock;

/// Process-wide keyed store of [`FeatureFlag`]s. Populated all-disabled at
/// init, then mutated live by the notice watcher. Reads are on hot decorator
/// paths, so lookups take a shared lock and never await while holding it.
pub struct FeatureRegistry {
    flags: RwLock<HashMap<String, FeatureFlag>>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self {
            flags: RwLock::new(HashMap::new()),
        }
    }

    /// Seeds every well-known key (`dfs_config::keys::*`) as disabled, so a
    /// lookup before the first notice update returns a defined answer rather
    /// than "missing flag defaults to false" scattered across call sites.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for key in [
            crate::keys::CACHE_FILE,
            crate::keys::BACKSTORE,
            crate::keys::READ_FROM_BACKSTORE,
            crate::keys::TEE_WRITE_TO_MINOR,
            crate::keys::TEE_READ_FROM_MINOR,
            crate::keys::SEGMENT_DELETION,
            crate::keys::ASYNC_SAVE_EVENT,
            crate::keys::PRE_JUDGE_PUT,
            crate::keys::PRE_JUDGE_GET,
            crate::keys::SHIELD,
        ] {
            registry.set(FeatureFlag::disabled(key));
        }
        registry
    }

    pub fn set(&self, flag: FeatureFlag) {
        self.flags.write().unwrap().insert(flag.key.clone(), flag);
    }

    pub fn get(&self, key: &str) -> Option<FeatureFlag> {
        self.flags.read().unwrap().get(key).cloned()
    }

    /// Returns `false` (rather than erroring) for an unknown key, logging a
    /// warning -- mirrors `isReadFromBackStore` et al in the original, which
    /// treat a lookup failure as "feature off".
    pub fn domain_has_access(&self, key: &str, domain: u32) -> bool {
        match self.get(key) {
            Some(flag) => flag.domain_has_access(domain),
            None => {
                tracing::warn!(key, "feature flag not found, defaulting to disabled");
                false
            }
        }
    }
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_all_disabled() {
        let registry = FeatureRegistry::with_defaults();
        assert!(!registry.domain_has_access(crate::keys::BACKSTORE, 1));
    }

    #[test]
    fn set_then_get_round_trips() {
        let registry = FeatureRegistry::new();
        let mut flag = FeatureFlag::disabled(crate::keys::CACHE_FILE);
        flag.enabled = true;
        registry.set(flag);
        assert!(registry.domain_has_access(crate::keys::CACHE_FILE, 9));
    }

    #[test]
    fn missing_key_defaults_to_false() {
        let registry = FeatureRegistry::new();
        assert!(!registry.domain_has_access("never_registered", 1));
    }
}
