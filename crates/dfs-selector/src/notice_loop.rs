use crate::HandlerSelector;
use dfs_fileop::FileHandler;
use dfs_types::{Domain, Segment};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Watches `dfs_notice::Notice::watch_children(SHARD_SERVER_PATH)`: each
/// delivery is the *current full* list of registered shard names. Diffs it
/// against the previously known set and adds/removes shards accordingly.
/// `resolve` builds a shard's composed handler from its name -- reading its
/// config row, opening its meta/entity stores and running `compose_handler`
/// is the caller's job, since it needs storage specifics `HandlerSelector`
/// doesn't carry.
pub fn spawn_shard_watch_loop(
    selector: Arc<HandlerSelector>,
    mut rx: mpsc::Receiver<Vec<String>>,
    mut resolve: impl FnMut(&str) -> Option<Arc<dyn FileHandler>> + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut known: HashSet<String> = HashSet::new();
        while let Some(current) = rx.recv().await {
            let current_set: HashSet<String> = current.into_iter().collect();

            for removed in known.difference(&current_set) {
                selector.remove_shard(removed);
            }
            for added in current_set.difference(&known) {
                match resolve(added) {
                    Some(handler) => selector.add_shard(added.clone(), handler),
                    None => tracing::warn!(shard = %added, "shard notice added a name the resolver could not build"),
                }
            }
            known = current_set;
        }
        tracing::info!("shard notice loop ended: sender dropped");
    })
}

/// Watches `dfs_notice::Notice::watch_data(SHARD_CHUNK_PATH)`: each delivery
/// is a UTF-8 domain string, `-1` meaning "the whole segment list changed,
/// re-fetch it" (handled by `backfill`); anything else names one segment to
/// resolve and upsert.
pub fn spawn_segment_watch_loop(
    selector: Arc<HandlerSelector>,
    mut rx: mpsc::Receiver<Vec<u8>>,
    mut resolve: impl FnMut(Domain) -> Option<Segment> + Send + 'static,
    mut backfill: impl FnMut() -> Vec<Segment> + Send + 'static,
    delete_on_equal: impl Fn() -> bool + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            let text = String::from_utf8_lossy(&payload);
            let Ok(domain) = text.parse::<Domain>() else {
                tracing::warn!(payload = %text, "segment notice payload is not a domain");
                continue;
            };
            if domain == -1 {
                selector.backfill_segments(backfill());
                continue;
            }
            if let Some(segment) = resolve(domain) {
                selector.update_segment(segment, delete_on_equal());
            }
        }
        tracing::info!("segment notice loop ended: sender dropped");
    })
}
