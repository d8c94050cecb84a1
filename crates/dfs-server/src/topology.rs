use std::path::{Path, PathBuf};

use anyhow::Context;
use dfs_types::{Domain, FileType, ShardKind};
use serde::Deserialize;

/// Static shard/segment layout loaded at startup. In a real deployment this
/// is the seed pushed into the notice service (`SPEC_FULL.md` §1, §4.4);
/// once loaded it is registered through the same `HandlerSelector` add/
/// backfill calls the notice watch loops use for a live update, so a
/// topology change only ever needs a restart here, not a second code path.
#[derive(Debug, Deserialize)]
pub struct TopologyConfig {
    pub shards: Vec<ShardConfig>,
    #[serde(default)]
    pub segments: Vec<SegmentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShardConfig {
    pub name: String,
    pub kind: ShardKind,
    /// Storage engine tag stamped onto every `File` this shard creates.
    /// Irrelevant for `BackstoreServer` shards, which are entity-only cache
    /// targets and never mint `File` rows of their own.
    #[serde(default)]
    pub file_type: FileType,
    #[serde(default)]
    pub meta_backend: MetaBackend,
    pub entity_path: PathBuf,
    /// Names a `MinorServer`-kind shard this shard should tee writes to.
    #[serde(default)]
    pub tee_to: Option<String>,
    /// Names a `BackstoreServer`-kind shard this shard should divert cache
    /// writes to when unavailable.
    #[serde(default)]
    pub cache_in: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaBackend {
    #[default]
    Memory,
    Partitioned,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentConfig {
    pub domain: Domain,
    pub normal_server: String,
    #[serde(default)]
    pub migrate_server: Option<String>,
}

impl TopologyConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading topology config at {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing topology config at {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_shard_and_segment_list() {
        let json = r#"{
            "shards": [
                { "name": "gridgo-a", "kind": "Gridgo", "file_type": "GridFs", "entity_path": "/data/gridgo-a" },
                { "name": "backstore-a", "kind": "BackstoreServer", "entity_path": "/data/backstore-a" }
            ],
            "segments": [
                { "domain": 0, "normal_server": "gridgo-a" }
            ]
        }"#;
        let config: TopologyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.shards.len(), 2);
        assert_eq!(config.shards[0].kind, ShardKind::Gridgo);
        assert!(config.shards[0].tee_to.is_none());
        assert!(matches!(config.shards[0].meta_backend, MetaBackend::Memory));
        assert_eq!(config.segments[0].normal_server, "gridgo-a");
        assert!(config.segments[0].migrate_server.is_none());
    }

    #[test]
    fn defaulted_segments_list_is_empty_when_omitted() {
        let json = r#"{ "shards": [] }"#;
        let config: TopologyConfig = serde_json::from_str(json).unwrap();
        assert!(config.segments.is_empty());
    }
}
