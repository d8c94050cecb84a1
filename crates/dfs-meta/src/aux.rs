use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dfs_types::{CacheLog, CacheLogState, Event, ObjectId, RecoveryEvent, SpaceLog};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::MetaError;

/// Keyed on `(fid, domain)`, upserted with a retry-count increment on every
/// call -- mirrors `CacheLogOp.SaveOrUpdate`'s `$inc retrytimes` / `$set`
/// semantics. Paged by the recovery loop, which only ever wants `Pending`
/// rows.
#[async_trait]
pub trait CacheLogStore: Send + Sync {
    async fn save_or_update(&self, log: CacheLog) -> Result<CacheLog, MetaError>;
    async fn get_pending(&self, limit: usize) -> Result<Vec<CacheLog>, MetaError>;
    async fn get_finished_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<CacheLog>, MetaError>;
    async fn remove_finished_before(&self, cutoff: DateTime<Utc>) -> Result<u64, MetaError>;
    async fn remove_by_fid(&self, fid: &str, domain: dfs_types::Domain) -> Result<(), MetaError>;
}

/// Degradation-journal rows replayed by the selector's per-shard recovery
/// dispatcher. Mirrors `RecoveryEventOp`.
#[async_trait]
pub trait RecoveryEventStore: Send + Sync {
    async fn save_event(&self, event: RecoveryEvent) -> Result<RecoveryEvent, MetaError>;
    async fn remove_event(&self, id: &ObjectId) -> Result<(), MetaError>;
    /// Pages at most `batch` events, giving up after `timeout` elapses so a
    /// slow backend can't stall the recovery loop indefinitely.
    async fn get_events_in_batch(&self, batch: usize, timeout: std::time::Duration) -> Result<Vec<RecoveryEvent>, MetaError>;
}

/// Best-effort audit trail. A save failure here is logged and swallowed by
/// the caller, never surfaced to an RPC client (see `SPEC_FULL.md` §7).
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn save_event(&self, event: Event) -> Result<(), MetaError>;
    async fn save_space_log(&self, log: SpaceLog) -> Result<(), MetaError>;
}

#[derive(Default)]
pub struct InMemoryAux {
    cache_logs: Mutex<HashMap<(String, dfs_types::Domain), CacheLog>>,
    recovery_events: Mutex<HashMap<ObjectId, RecoveryEvent>>,
    events: Mutex<Vec<Event>>,
    space_logs: Mutex<Vec<SpaceLog>>,
}

impl InMemoryAux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/inspection hook -- not part of any trait contract.
    pub fn recorded_events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn recorded_space_logs(&self) -> Vec<SpaceLog> {
        self.space_logs.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheLogStore for InMemoryAux {
    async fn save_or_update(&self, mut log: CacheLog) -> Result<CacheLog, MetaError> {
        let mut t = self.cache_logs.lock().unwrap();
        let key = (log.fid.clone(), log.domain);
        log.retry_times = t.get(&key).map(|existing| existing.retry_times + 1).unwrap_or(0);
        t.insert(key, log.clone());
        Ok(log)
    }

    async fn get_pending(&self, limit: usize) -> Result<Vec<CacheLog>, MetaError> {
        let t = self.cache_logs.lock().unwrap();
        Ok(t.values()
            .filter(|l| l.state == CacheLogState::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_finished_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<CacheLog>, MetaError> {
        let t = self.cache_logs.lock().unwrap();
        Ok(t.values()
            .filter(|l| l.state == CacheLogState::Finished && l.timestamp <= cutoff)
            .cloned()
            .collect())
    }

    async fn remove_finished_before(&self, cutoff: DateTime<Utc>) -> Result<u64, MetaError> {
        let mut t = self.cache_logs.lock().unwrap();
        let before = t.len();
        t.retain(|_, l| !(l.state == CacheLogState::Finished && l.timestamp <= cutoff));
        Ok((before - t.len()) as u64)
    }

    async fn remove_by_fid(&self, fid: &str, domain: dfs_types::Domain) -> Result<(), MetaError> {
        self.cache_logs.lock().unwrap().remove(&(fid.to_string(), domain));
        Ok(())
    }
}

#[async_trait]
impl RecoveryEventStore for InMemoryAux {
    async fn save_event(&self, mut event: RecoveryEvent) -> Result<RecoveryEvent, MetaError> {
        if event.id == ObjectId::default() {
            event.id = ObjectId::new();
        }
        self.recovery_events.lock().unwrap().insert(event.id, event.clone());
        Ok(event)
    }

    async fn remove_event(&self, id: &ObjectId) -> Result<(), MetaError> {
        self.recovery_events.lock().unwrap().remove(id);
        Ok(())
    }

    async fn get_events_in_batch(&self, batch: usize, timeout: std::time::Duration) -> Result<Vec<RecoveryEvent>, MetaError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let t = self.recovery_events.lock().unwrap();
        let mut ordered: Vec<_> = t.values().cloned().collect();
        ordered.sort_by_key(|e| e.id);

        let mut result = Vec::with_capacity(batch.min(ordered.len()));
        for event in ordered {
            if result.len() >= batch || tokio::time::Instant::now() >= deadline {
                break;
            }
            result.push(event);
        }
        Ok(result)
    }
}

#[async_trait]
impl AuditStore for InMemoryAux {
    async fn save_event(&self, event: Event) -> Result<(), MetaError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn save_space_log(&self, log: SpaceLog) -> Result<(), MetaError> {
        self.space_logs.lock().unwrap().push(log);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_types::EventKind;

    #[tokio::test]
    async fn cache_log_save_or_update_increments_retry_times() {
        let store = InMemoryAux::new();
        let log = CacheLog {
            fid: "f1".into(),
            cache_id: "c1".into(),
            domain: 1,
            cache_chunk_size: 4096,
            shard: "shard-a".into(),
            cause: "store unavailable".into(),
            state: CacheLogState::Pending,
            retry_times: 0,
            timestamp: Utc::now(),
        };
        let first = store.save_or_update(log.clone()).await.unwrap();
        assert_eq!(first.retry_times, 0);
        let second = store.save_or_update(log).await.unwrap();
        assert_eq!(second.retry_times, 1);
    }

    #[tokio::test]
    async fn get_pending_only_returns_pending_rows() {
        let store = InMemoryAux::new();
        let mut pending = make_log("p1", CacheLogState::Pending);
        let finished = make_log("f1", CacheLogState::Finished);
        store.save_or_update(pending.clone()).await.unwrap();
        store.save_or_update(finished).await.unwrap();

        let rows = store.get_pending(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fid, "p1");

        pending.state = CacheLogState::Finished;
        store.save_or_update(pending).await.unwrap();
        assert!(store.get_pending(10).await.unwrap().is_empty());
    }

    fn make_log(fid: &str, state: CacheLogState) -> CacheLog {
        CacheLog {
            fid: fid.into(),
            cache_id: format!("cache-{fid}"),
            domain: 1,
            cache_chunk_size: 4096,
            shard: "shard-a".into(),
            cause: "test".into(),
            state,
            retry_times: 0,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn audit_events_are_recorded_best_effort() {
        let store = InMemoryAux::new();
        store
            .save_event(Event {
                kind: EventKind::SucCreate,
                fid: "f1".into(),
                domain: 1,
                biz: "mail".into(),
                user_id: "u1".into(),
                description: String::new(),
                timestamp: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(store.recorded_events().len(), 1);
    }
}
