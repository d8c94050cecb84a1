//! Shared fixtures for the `ops` unit tests: a one-shard `HandlerSelector`
//! plus a ready-to-use `TransferContext`, all backed by the in-memory
//! `MetaStore`/`EntityStore` doubles. Not part of the crate's public API.
#![cfg(test)]

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dfs_config::{FeatureRegistry, ServerFlags};
use dfs_entity::InMemoryEntityStore;
use dfs_fileop::RawFileHandler;
use dfs_meta::{AuditStore, DuplRefStore, InMemoryAux, InMemoryRaw};
use dfs_selector::HandlerSelector;
use dfs_types::{FileType, Segment};

use crate::context::TransferContext;

pub fn test_flags() -> ServerFlags {
    ServerFlags::parse_from([
        "dfs-server",
        "--server-id",
        "node-1",
        "--registration-uri",
        "zk://localhost/dfs",
        "--db-uri",
        "mongodb://localhost/dfs",
        "--notice-uri",
        "http://localhost:8500",
        "--topology-path",
        "topology.json",
    ])
}

/// A selector with a single healthy shard named `shard-a` serving every
/// domain from zero up, plus the `InMemoryAux` its `RecoveryEventStore`
/// half is drawn from (handed back so tests can also use it as the
/// context's `AuditStore`).
pub fn single_shard_selector() -> (Arc<HandlerSelector>, Arc<InMemoryAux>) {
    let aux = Arc::new(InMemoryAux::new());
    let selector = HandlerSelector::new(aux.clone(), Duration::from_secs(3600));
    let handler = Arc::new(RawFileHandler::new(
        "shard-a",
        Arc::new(DuplRefStore::new(InMemoryRaw::new())),
        Arc::new(InMemoryEntityStore::new("shard-a")),
        FileType::GridFs,
    ));
    selector.add_shard("shard-a", handler);
    selector.update_segment(Segment::new(0, "shard-a"), false);
    (selector, aux)
}

pub fn context_with(selector: Arc<HandlerSelector>, audit: Arc<InMemoryAux>) -> Arc<TransferContext> {
    Arc::new(TransferContext::new(
        selector,
        Arc::new(FeatureRegistry::with_defaults()),
        audit as Arc<dyn AuditStore>,
        Arc::new(test_flags()),
    ))
}

/// The common case: a fresh one-shard context with every feature flag off.
pub fn fixture() -> Arc<TransferContext> {
    let (selector, aux) = single_shard_selector();
    context_with(selector, aux)
}

pub fn far_future_deadline() -> std::time::Instant {
    std::time::Instant::now() + Duration::from_secs(3600)
}
