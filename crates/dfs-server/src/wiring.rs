use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dfs_config::{FeatureRegistry, ServerFlags};
use dfs_entity::{EntityStore, FsEntityStore};
use dfs_fileop::{FileHandler, RawFileHandler};
use dfs_meta::{CacheLogStore, DuplRefStore, InMemoryAux, InMemoryRaw, MetaStore, PartitionedRaw, RecoveryEventStore};
use dfs_recovery::{CacheRecoveryLoop, RecoveryTarget, TargetResolver};
use dfs_selector::{compose_handler, wrap_degrade, BackStoreParams, HandlerSelector};
use dfs_types::{find_perfect_segment, validate_shard_roles, Domain, Segment, Shard, ShardKind};

use crate::topology::{MetaBackend, ShardConfig, TopologyConfig};

/// Health probes run fairly often in-process; the real operator-tunable
/// dial here is `ServerFlags::recovery_interval`, which governs the slower
/// cache-drain loop. `SPEC_FULL.md` leaves the probe cadence unspecified.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Everything `main` needs after loading the topology: the populated
/// selector, the feature registry every decorator and transfer op reads,
/// the shared auxiliary store, and the (optional) cache recovery loop.
pub struct Wiring {
    pub selector: Arc<HandlerSelector>,
    pub features: Arc<FeatureRegistry>,
    pub aux: Arc<InMemoryAux>,
    pub cache_recovery: Option<Arc<CacheRecoveryLoop>>,
}

/// Builds one shard's raw `FileHandler` plus the `MetaStore` handle
/// `BackStoreParams` needs to persist a diverted write's `File` row. Every
/// shard kind in `ShardConfig` -- primary, degrade, or minor -- goes through
/// this same path; only `BackstoreServer` shards skip it, since they are
/// cache-only `EntityStore` targets with no metadata of their own.
fn build_raw(cfg: &ShardConfig) -> (Arc<dyn FileHandler>, Arc<dyn MetaStore>) {
    let entity = Arc::new(FsEntityStore::new(cfg.name.clone(), cfg.entity_path.clone()));
    match cfg.meta_backend {
        MetaBackend::Memory => {
            let meta = Arc::new(DuplRefStore::new(InMemoryRaw::new()));
            let raw: Arc<dyn FileHandler> = Arc::new(RawFileHandler::new(cfg.name.clone(), meta.clone(), entity, cfg.file_type));
            (raw, meta as Arc<dyn MetaStore>)
        }
        MetaBackend::Partitioned => {
            let meta = Arc::new(DuplRefStore::new(PartitionedRaw::new()));
            let raw: Arc<dyn FileHandler> = Arc::new(RawFileHandler::new(cfg.name.clone(), meta.clone(), entity, cfg.file_type));
            (raw, meta as Arc<dyn MetaStore>)
        }
    }
}

/// Validates the topology, builds every shard's decorator stack, registers
/// it with the selector, backfills the segment list, and assembles the
/// cache recovery loop's target map. `SPEC_FULL.md` §4.3, §4.4, §4.5.
pub fn build(topology: &TopologyConfig, flags: &ServerFlags) -> anyhow::Result<Wiring> {
    let roles: Vec<Shard> = topology.shards.iter().map(|c| Shard::new(c.name.clone(), String::new(), c.kind)).collect();
    validate_shard_roles(&roles).map_err(anyhow::Error::msg)?;

    let aux = Arc::new(InMemoryAux::new());
    let features = Arc::new(FeatureRegistry::with_defaults());
    let selector = HandlerSelector::new(aux.clone() as Arc<dyn RecoveryEventStore>, HEALTH_CHECK_INTERVAL);

    let mut stores: HashMap<String, (Arc<dyn FileHandler>, Arc<dyn MetaStore>)> = HashMap::new();
    for cfg in &topology.shards {
        if !matches!(cfg.kind, ShardKind::BackstoreServer) {
            stores.insert(cfg.name.clone(), build_raw(cfg));
        }
    }

    let mut cache_targets: HashMap<String, Arc<dyn EntityStore>> = HashMap::new();
    for cfg in &topology.shards {
        if matches!(cfg.kind, ShardKind::BackstoreServer) {
            cache_targets.insert(cfg.name.clone(), Arc::new(FsEntityStore::new(cfg.name.clone(), cfg.entity_path.clone())));
        }
    }

    if let Some(cfg) = topology.shards.iter().find(|c| matches!(c.kind, ShardKind::DegradeServer)) {
        let (raw, _meta) = stores
            .remove(&cfg.name)
            .with_context(|| format!("degrade shard {} was not built", cfg.name))?;
        selector.set_degrade_shard(wrap_degrade(raw, aux.clone() as Arc<dyn RecoveryEventStore>));
    }

    for cfg in &topology.shards {
        if !matches!(
            cfg.kind,
            ShardKind::Gridgo | ShardKind::Glustergo | ShardKind::Gridra | ShardKind::Glustra | ShardKind::Seadra | ShardKind::MinorServer
        ) {
            continue;
        }
        let (raw, meta) = stores
            .get(&cfg.name)
            .cloned()
            .with_context(|| format!("shard {} was not built", cfg.name))?;

        let minor = cfg.tee_to.as_ref().and_then(|name| stores.get(name)).map(|(h, _)| h.clone());
        let backstore = cfg.cache_in.as_ref().and_then(|name| cache_targets.get(name)).map(|cache| BackStoreParams {
            meta: meta.clone(),
            cache: cache.clone(),
            cache_logs: aux.clone() as Arc<dyn CacheLogStore>,
            cache_duration: flags.cache_duration,
        });

        let composed = compose_handler(raw, &cfg.name, minor, backstore, features.clone());
        selector.add_shard(cfg.name.clone(), composed);
    }

    selector.backfill_segments(
        topology
            .segments
            .iter()
            .map(|s| Segment {
                domain: s.domain,
                normal_server: s.normal_server.clone(),
                migrate_server: s.migrate_server.clone(),
            })
            .collect(),
    );

    let cache_recovery = build_cache_recovery(topology, &stores, &cache_targets, &selector, aux.clone(), flags);

    Ok(Wiring { selector, features, aux, cache_recovery })
}

/// Builds the cache recovery loop's `TargetResolver`: given a domain, find
/// the shard currently serving it (the same segment lookup the selector
/// itself does) and, if that shard declared a `cache_in` target, hand back
/// its raw primary handler (bypassing whatever `BackStoreHandler` divert it
/// wraps) paired with the backstore's `EntityStore`.
fn build_cache_recovery(
    topology: &TopologyConfig,
    stores: &HashMap<String, (Arc<dyn FileHandler>, Arc<dyn MetaStore>)>,
    cache_targets: &HashMap<String, Arc<dyn EntityStore>>,
    selector: &Arc<HandlerSelector>,
    cache_logs: Arc<InMemoryAux>,
    flags: &ServerFlags,
) -> Option<Arc<CacheRecoveryLoop>> {
    let mut targets: HashMap<String, RecoveryTarget> = HashMap::new();
    for cfg in &topology.shards {
        let Some(cache_name) = cfg.cache_in.as_ref() else { continue };
        let Some((raw, _)) = stores.get(&cfg.name) else { continue };
        let Some(cache) = cache_targets.get(cache_name) else { continue };
        targets.insert(cfg.name.clone(), RecoveryTarget { primary: raw.clone(), cache: cache.clone() });
    }
    if targets.is_empty() {
        return None;
    }

    let selector = selector.clone();
    let resolver: TargetResolver = Arc::new(move |domain: Domain| {
        let segments = selector.segments_snapshot();
        let segment = find_perfect_segment(&segments, domain)?;
        let target = targets.get(&segment.normal_server)?;
        Some(RecoveryTarget { primary: target.primary.clone(), cache: target.cache.clone() })
    });

    Some(CacheRecoveryLoop::new(
        cache_logs as Arc<dyn CacheLogStore>,
        resolver,
        flags.recovery_batch_size as usize,
        flags.recovery_interval,
        flags.days_kept_in_cache as i64,
        Vec::new(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::SegmentConfig;
    use clap::Parser;

    fn test_flags() -> ServerFlags {
        ServerFlags::parse_from([
            "dfs-server",
            "--server-id",
            "node-1",
            "--registration-uri",
            "grpc://node-1:9876",
            "--db-uri",
            "mongodb://localhost/dfs",
            "--notice-uri",
            "http://localhost:8500",
            "--topology-path",
            "topology.json",
        ])
    }

    fn shard(name: &str, kind: ShardKind, dir: &tempfile::TempDir) -> ShardConfig {
        ShardConfig {
            name: name.to_string(),
            kind,
            file_type: dfs_types::FileType::GridFs,
            meta_backend: MetaBackend::Memory,
            entity_path: dir.path().join(name),
            tee_to: None,
            cache_in: None,
        }
    }

    #[tokio::test]
    async fn registers_a_single_shard_and_backfills_its_segment() {
        let dir = tempfile::tempdir().unwrap();
        let topology = TopologyConfig {
            shards: vec![shard("gridgo-a", ShardKind::Gridgo, &dir)],
            segments: vec![SegmentConfig { domain: 0, normal_server: "gridgo-a".into(), migrate_server: None }],
        };

        let wiring = build(&topology, &test_flags()).unwrap();
        assert!(wiring.selector.shard_handler("gridgo-a").is_some());
        assert_eq!(wiring.selector.segments_snapshot().len(), 1);
        assert!(wiring.cache_recovery.is_none());
    }

    #[tokio::test]
    async fn wires_a_backstore_cache_target_into_the_recovery_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut primary = shard("gridgo-a", ShardKind::Gridgo, &dir);
        primary.cache_in = Some("backstore-a".into());
        let backstore = shard("backstore-a", ShardKind::BackstoreServer, &dir);

        let topology = TopologyConfig {
            shards: vec![primary, backstore],
            segments: vec![SegmentConfig { domain: 0, normal_server: "gridgo-a".into(), migrate_server: None }],
        };

        let wiring = build(&topology, &test_flags()).unwrap();
        assert!(wiring.selector.shard_handler("gridgo-a").is_some());
        assert!(wiring.selector.shard_handler("backstore-a").is_none());
        assert!(wiring.cache_recovery.is_some());
    }

    #[tokio::test]
    async fn rejects_a_topology_with_two_degrade_shards() {
        let dir = tempfile::tempdir().unwrap();
        let topology = TopologyConfig {
            shards: vec![shard("degrade-a", ShardKind::DegradeServer, &dir), shard("degrade-b", ShardKind::DegradeServer, &dir)],
            segments: vec![],
        };

        assert!(build(&topology, &test_flags()).is_err());
    }
}
