use crate::error::SelectorError;
use crate::shard_handler::{copy_file, FileRecoveryInfo, ShardEntry};
use dfs_fileop::FileHandler;
use dfs_meta::RecoveryEventStore;
use dfs_types::{find_perfect_segment, upsert_segment, Domain, Segment};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How many pending `FileRecoveryInfo` rows a shard's recovery channel will
/// buffer before `dispatch_recovery_event` starts dropping this round's
/// batch for that shard (it will be picked up again on the next tick since
/// the underlying `RecoveryEvent` row is only removed after a successful
/// copy).
const DEFAULT_RECOVERY_CHANNEL_CAPACITY: usize = 256;

/// Routes domains to shard handlers via the segment list, degrades reads
/// and writes to the fallback shard when a target is unhealthy, and
/// replays degrade-journal rows back into a shard once it recovers.
/// `SPEC_FULL.md` §4.4.
pub struct HandlerSelector {
    segments: RwLock<Vec<Segment>>,
    shards: RwLock<HashMap<String, Arc<ShardEntry>>>,
    degrade: RwLock<Option<Arc<ShardEntry>>>,
    recovery_channels: RwLock<HashMap<String, mpsc::Sender<FileRecoveryInfo>>>,
    recovery_tasks: RwLock<HashMap<String, JoinHandle<()>>>,
    health_tasks: RwLock<HashMap<String, JoinHandle<()>>>,
    events: Arc<dyn RecoveryEventStore>,
    health_check_interval: Duration,
    recovery_channel_capacity: usize,
    /// Set right after construction so background tasks can hold a strong
    /// `Arc` to the selector without requiring an unstable `&Arc<Self>`
    /// method receiver.
    self_ref: OnceLock<Weak<HandlerSelector>>,
}

impl HandlerSelector {
    pub fn new(events: Arc<dyn RecoveryEventStore>, health_check_interval: Duration) -> Arc<Self> {
        let selector = Arc::new(Self {
            segments: RwLock::new(Vec::new()),
            shards: RwLock::new(HashMap::new()),
            degrade: RwLock::new(None),
            recovery_channels: RwLock::new(HashMap::new()),
            recovery_tasks: RwLock::new(HashMap::new()),
            health_tasks: RwLock::new(HashMap::new()),
            events,
            health_check_interval,
            recovery_channel_capacity: DEFAULT_RECOVERY_CHANNEL_CAPACITY,
            self_ref: OnceLock::new(),
        });
        let _ = selector.self_ref.set(Arc::downgrade(&selector));
        selector
    }

    fn self_arc(&self) -> Arc<Self> {
        self.self_ref
            .get()
            .expect("HandlerSelector must be constructed via HandlerSelector::new")
            .upgrade()
            .expect("HandlerSelector dropped while a background task still referenced it")
    }

    // -- shard registry ---------------------------------------------------

    /// Registers a normal (possibly migrate-target) shard: starts its
    /// health probe and its recovery-replay consumer.
    pub fn add_shard(&self, name: impl Into<String>, handler: Arc<dyn FileHandler>) {
        let name = name.into();
        let entry = Arc::new(ShardEntry::new(name.clone(), handler));
        self.shards.write().unwrap().insert(name.clone(), entry.clone());
        self.spawn_health_probe(entry);
        self.start_recovery_routine(&name);
    }

    /// Unregisters a shard and stops its background tasks.
    pub fn remove_shard(&self, name: &str) {
        self.shards.write().unwrap().remove(name);
        self.stop_recovery_routine(name);
        if let Some(handle) = self.health_tasks.write().unwrap().remove(name) {
            handle.abort();
        }
    }

    /// Registers the single degrade shard. It has no recovery channel of
    /// its own -- it is the recovery source, not a recovery destination.
    pub fn set_degrade_shard(&self, handler: Arc<dyn FileHandler>) {
        let name = handler.name().to_string();
        let entry = Arc::new(ShardEntry::new(name, handler));
        self.spawn_health_probe(entry.clone());
        *self.degrade.write().unwrap() = Some(entry);
    }

    pub fn shard_handler(&self, name: &str) -> Option<Arc<ShardEntry>> {
        self.shards.read().unwrap().get(name).cloned()
    }

    pub fn degrade_handler(&self) -> Option<Arc<dyn FileHandler>> {
        self.degrade.read().unwrap().as_ref().map(|e| e.handler.clone())
    }

    fn degrade_entry(&self) -> Option<Arc<ShardEntry>> {
        self.degrade.read().unwrap().clone()
    }

    /// Flips a shard's health flag and starts/stops its recovery consumer
    /// to match: a shard only drains its recovery channel while healthy.
    pub fn update_status(&self, name: &str, healthy: bool) {
        let Some(entry) = self.shard_handler(name) else { return };
        let was_ok = entry.is_ok();
        entry.set_ok(healthy);
        dfs_metrics::record_storage_status(name, healthy);
        if was_ok && !healthy {
            self.stop_recovery_routine(name);
        } else if !was_ok && healthy {
            self.start_recovery_routine(name);
        }
    }

    fn spawn_health_probe(&self, entry: Arc<ShardEntry>) {
        let selector = self.self_arc();
        let interval = self.health_check_interval;
        let name = entry.name.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it, entries start healthy
            loop {
                ticker.tick().await;
                let status = entry.handler.health_status().await;
                let ok = status.is_ok();
                dfs_metrics::record_health_check(&entry.name, &format!("{status:?}"));
                if ok != entry.is_ok() {
                    tracing::warn!(shard = %entry.name, ?status, "shard health changed");
                }
                selector.update_status(&entry.name, ok);
            }
        });
        self.health_tasks.write().unwrap().insert(name, handle);
    }

    // -- recovery replay ---------------------------------------------------

    fn start_recovery_routine(&self, name: &str) {
        let mut channels = self.recovery_channels.write().unwrap();
        if channels.contains_key(name) {
            return;
        }
        let (tx, mut rx) = mpsc::channel::<FileRecoveryInfo>(self.recovery_channel_capacity);
        channels.insert(name.to_string(), tx);
        drop(channels);

        let selector = self.self_arc();
        let shard_name = name.to_string();
        let handle = tokio::spawn(async move {
            while let Some(info) = rx.recv().await {
                selector.replay_one(&shard_name, info).await;
            }
        });
        self.recovery_tasks.write().unwrap().insert(name.to_string(), handle);
    }

    fn stop_recovery_routine(&self, name: &str) {
        self.recovery_channels.write().unwrap().remove(name);
        if let Some(handle) = self.recovery_tasks.write().unwrap().remove(name) {
            handle.abort();
        }
    }

    async fn replay_one(&self, shard_name: &str, info: FileRecoveryInfo) {
        let Some(dst) = self.shard_handler(shard_name) else { return };
        let Some(src) = self.degrade_handler() else {
            tracing::warn!(shard = shard_name, fid = %info.fid, "no degrade handler to recover from");
            return;
        };
        match copy_file(dst.handler.as_ref(), src.as_ref(), &info).await {
            Ok(()) => {
                if let Err(e) = self.events.remove_event(&info.id).await {
                    tracing::warn!(fid = %info.fid, error = %e, "failed to remove recovery event after copy");
                }
                tracing::info!(shard = shard_name, fid = %info.fid, "recovered file from degrade shard");
            }
            Err(e) => {
                tracing::warn!(shard = shard_name, fid = %info.fid, error = %e, "recovery copy failed, will retry next dispatch");
            }
        }
    }

    /// Pages pending `RecoveryEvent` rows and routes each into the recovery
    /// channel of the shard it would normally write to.
    pub async fn dispatch_recovery_event(&self, batch_size: usize, timeout: Duration) -> Result<(), SelectorError> {
        let events = self.events.get_events_in_batch(batch_size, timeout).await?;
        for event in events {
            let handler = match self.get_handler_for_write(event.domain) {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!(domain = event.domain, error = %e, "no write handler for recovery event's domain");
                    continue;
                }
            };
            let shard_name = handler.name().to_string();
            let channels = self.recovery_channels.read().unwrap();
            let Some(tx) = channels.get(&shard_name) else {
                tracing::warn!(shard = %shard_name, fid = %event.fid, "shard has no recovery channel, dropping this round");
                continue;
            };
            let info = FileRecoveryInfo { id: event.id, fid: event.fid.clone(), domain: event.domain };
            if tx.try_send(info).is_err() {
                tracing::warn!(shard = %shard_name, fid = %event.fid, "recovery channel full or closed, dropping this round");
            }
        }
        Ok(())
    }

    // -- segment routing ---------------------------------------------------

    pub fn update_segment(&self, segment: Segment, delete_on_equal: bool) {
        upsert_segment(&mut self.segments.write().unwrap(), segment, delete_on_equal);
    }

    pub fn backfill_segments(&self, segments: Vec<Segment>) {
        *self.segments.write().unwrap() = segments;
    }

    pub fn segments_snapshot(&self) -> Vec<Segment> {
        self.segments.read().unwrap().clone()
    }

    fn route(&self, domain: Domain) -> Result<(Arc<ShardEntry>, Option<Arc<ShardEntry>>), SelectorError> {
        let normal_name;
        let migrate_name;
        {
            let segments = self.segments.read().unwrap();
            let segment = find_perfect_segment(&segments, domain).ok_or(SelectorError::NoPerfectSegment(domain))?;
            normal_name = segment.normal_server.clone();
            migrate_name = segment.migrate_server.clone();
        }
        let shards = self.shards.read().unwrap();
        let normal = shards.get(&normal_name).cloned().ok_or_else(|| SelectorError::UnknownShard(normal_name.clone()))?;
        let migrate = migrate_name.and_then(|m| shards.get(&m).cloned());
        Ok((normal, migrate))
    }

    /// Swaps an unhealthy shard for the degrade shard, if the degrade
    /// shard is itself healthy. Errors only when both are down.
    fn check_or_degrade(&self, entry: &Arc<ShardEntry>) -> Result<Arc<dyn FileHandler>, SelectorError> {
        if entry.is_ok() {
            return Ok(entry.handler.clone());
        }
        if let Some(degrade) = self.degrade_entry() {
            if degrade.is_ok() {
                tracing::warn!(shard = %entry.name, "shard unhealthy, degrading to fallback shard");
                return Ok(degrade.handler.clone());
            }
        }
        Err(SelectorError::Unreachable(entry.name.clone()))
    }

    /// Write routing: prefers a segment's migrate shard over its normal
    /// shard, then applies the degrade policy to whichever was chosen.
    pub fn get_handler_for_write(&self, domain: Domain) -> Result<Arc<dyn FileHandler>, SelectorError> {
        let (normal, migrate) = self.route(domain)?;
        let chosen = migrate.unwrap_or(normal);
        self.check_or_degrade(&chosen)
    }

    /// Read routing: returns both the normal and migrate handler (if any),
    /// each independently degraded. A handler that's unhealthy with no
    /// healthy degrade fallback is simply omitted rather than failing the
    /// whole call.
    pub fn get_handlers_for_read(
        &self,
        domain: Domain,
    ) -> Result<(Option<Arc<dyn FileHandler>>, Option<Arc<dyn FileHandler>>), SelectorError> {
        let (normal, migrate) = self.route(domain)?;
        let normal = self.check_or_degrade(&normal).ok();
        let migrate = migrate.and_then(|m| self.check_or_degrade(&m).ok());
        Ok((normal, migrate))
    }
}
