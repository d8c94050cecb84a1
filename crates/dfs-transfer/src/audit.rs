use std::sync::Arc;

use dfs_meta::AuditStore;
use dfs_types::{Event, SpaceLog};

/// Persists `event`, optionally off the calling task. A save failure is
/// logged and swallowed either way -- audit trail writes never fail a
/// user-visible RPC (`SPEC_FULL.md` §7, §9's "Event/Space-log asynchrony").
/// `async_mode` spawns a detached task holding only the owned `Event`, never
/// the caller's request-scoped handles.
pub async fn record_event(audit: &Arc<dyn AuditStore>, async_mode: bool, event: Event) {
    let audit = audit.clone();
    if async_mode {
        tokio::spawn(async move {
            if let Err(e) = audit.save_event(event).await {
                tracing::warn!(error = %e, "failed to persist audit event");
            }
        });
    } else if let Err(e) = audit.save_event(event).await {
        tracing::warn!(error = %e, "failed to persist audit event");
    }
}

pub async fn record_space_log(audit: &Arc<dyn AuditStore>, async_mode: bool, log: SpaceLog) {
    let audit = audit.clone();
    if async_mode {
        tokio::spawn(async move {
            if let Err(e) = audit.save_space_log(log).await {
                tracing::warn!(error = %e, "failed to persist space log");
            }
        });
    } else if let Err(e) = audit.save_space_log(log).await {
        tracing::warn!(error = %e, "failed to persist space log");
    }
}
