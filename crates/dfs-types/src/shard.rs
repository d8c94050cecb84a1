use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of storage pair a shard fronts, plus the three singleton roles a
/// shard can additionally play (at most one of each across the whole shard
/// list, enforced by the selector at load time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardKind {
    /// GridFS-style metadata+entity pair.
    Gridgo,
    /// Gluster-style metadata+entity pair.
    Glustergo,
    /// GridFS pair backed by an alternate (Cassandra-like) metadata store.
    Gridra,
    /// Gluster pair backed by an alternate (Cassandra-like) metadata store.
    Glustra,
    /// Seaweed-style object store backed by an alternate metadata store.
    Seadra,
    /// The single shard the degrade decorator journals into and replays from.
    DegradeServer,
    /// The single shard the backstore decorator caches onto.
    BackstoreServer,
    /// A tee secondary for another shard (`Attr["tee_of"]` names the primary).
    MinorServer,
}

/// A (MetaStore, EntityStore) pair serving some set of domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shard {
    pub name: String,
    pub uri: String,
    pub kind: ShardKind,
    pub volume: Option<String>,
    pub path: Option<String>,
    pub attr: HashMap<String, String>,
}

impl Shard {
    pub fn new(name: impl Into<String>, uri: impl Into<String>, kind: ShardKind) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            kind,
            volume: None,
            path: None,
            attr: HashMap::new(),
        }
    }
}

/// Validates the "exactly zero or one" singleton-role invariants across a
/// full shard list.
pub fn validate_shard_roles(shards: &[Shard]) -> Result<(), String> {
    let mut degrade = 0;
    let mut backstore = 0;
    let mut minor = 0;
    for s in shards {
        match s.kind {
            ShardKind::DegradeServer => degrade += 1,
            ShardKind::BackstoreServer => backstore += 1,
            ShardKind::MinorServer => minor += 1,
            _ => {}
        }
    }
    if degrade > 1 {
        return Err(format!("expected at most one DegradeServer shard, found {degrade}"));
    }
    if backstore > 1 {
        return Err(format!("expected at most one BackstoreServer shard, found {backstore}"));
    }
    if minor > 1 {
        return Err(format!("expected at most one MinorServer shard, found {minor}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_singleton_roles() {
        let shards = vec![
            Shard::new("a", "uri-a", ShardKind::DegradeServer),
            Shard::new("b", "uri-b", ShardKind::DegradeServer),
        ];
        assert!(validate_shard_roles(&shards).is_err());
    }

    #[test]
    fn accepts_well_formed_roles() {
        let shards = vec![
            Shard::new("a", "uri-a", ShardKind::Gridgo),
            Shard::new("b", "uri-b", ShardKind::DegradeServer),
            Shard::new("c", "uri-c", ShardKind::BackstoreServer),
            Shard::new("d", "uri-d", ShardKind::MinorServer),
        ];
        assert!(validate_shard_roles(&shards).is_ok());
    }
}
