use dfs_entity::EntityStore;
use dfs_fileop::{DfsFile, FileHandler};
use dfs_meta::CacheLogStore;
use dfs_types::{CacheLog, CacheLogState, Domain};
use std::sync::Arc;
use std::time::Duration;

/// What a shard needs to drain one diverted write back to its primary: the
/// primary `FileHandler` to create on directly (bypassing whatever
/// `BackStoreHandler` diverted the write in the first place, since that
/// handler would just divert again) and the cache `EntityStore` the bytes
/// were actually written to.
///
/// The original only ran this copy for a `BackStoreHandler` wrapping a
/// Gluster-backed primary (directly, or via a `TeeHandler`'s major leg);
/// here every backend is the same generic `RawFileHandler` regardless of
/// its `FileType` tag, so that restriction doesn't carry a distinct code
/// path and is dropped (see `DESIGN.md`).
pub struct RecoveryTarget {
    pub primary: Arc<dyn FileHandler>,
    pub cache: Arc<dyn EntityStore>,
}

/// Resolves a domain to the shard it should be recovered through. Owned by
/// whoever composed the shard's decorator stack (`dfs-server`), since that's
/// the only place that knows which `BackStoreHandler` instance backs a given
/// domain -- mirrors the resolver-closure boundary `dfs-selector`'s notice
/// loops already use for the same reason.
pub type TargetResolver = Arc<dyn Fn(Domain) -> Option<RecoveryTarget> + Send + Sync>;

/// Configuration and state for the cached-file recovery loop and the
/// backstore compaction sweep. Grounded on
/// `original_source/server/handlersel.go`'s `startCachedFileRecoveryRoutine`,
/// `copyCachedFile` and `startBSCompactRoutine`.
pub struct CacheRecoveryLoop {
    cache_logs: Arc<dyn CacheLogStore>,
    resolver: TargetResolver,
    batch_size: usize,
    poll_interval: Duration,
    days_keep_in_cache: i64,
    backstore_masters: Vec<String>,
    http: reqwest::Client,
}

impl CacheRecoveryLoop {
    pub fn new(
        cache_logs: Arc<dyn CacheLogStore>,
        resolver: TargetResolver,
        batch_size: usize,
        poll_interval: Duration,
        days_keep_in_cache: i64,
        backstore_masters: Vec<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            cache_logs,
            resolver,
            batch_size,
            poll_interval,
            days_keep_in_cache,
            backstore_masters,
            http: reqwest::Client::new(),
        })
    }

    /// Spawns the loop that pages `Pending` cache logs and replays them.
    /// Each batch runs inside its own `tokio::spawn`, so a panic while
    /// copying one file can't take the whole recovery task down with it.
    pub fn spawn_pending_drain(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.poll_interval);
            loop {
                ticker.tick().await;
                let this = self.clone();
                if let Err(e) = tokio::spawn(async move { this.drain_pending_once().await }).await {
                    tracing::error!(error = %e, "cached file recovery batch panicked, continuing");
                }
            }
        })
    }

    /// Spawns the hourly sweep: kicks the backstore master's own compaction
    /// and removes `Finished` cache logs older than `days_keep_in_cache`.
    /// Gated to the 01:00-01:59 local window, matching the original's
    /// "quiet hours" restriction so compaction doesn't compete with traffic.
    pub fn spawn_compaction_sweep(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(3600));
            loop {
                ticker.tick().await;
                if !in_compaction_window(chrono::Local::now()) {
                    continue;
                }
                self.vacuum_backstore().await;
                self.sweep_finished_logs().await;
            }
        })
    }

    async fn drain_pending_once(&self) {
        let pending = match self.cache_logs.get_pending(self.batch_size).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "failed to page pending cache logs");
                return;
            }
        };
        for log in pending {
            match (self.resolver)(log.domain) {
                Some(target) => self.process_one(&target, log).await,
                None => {
                    tracing::warn!(fid = %log.fid, domain = log.domain, "no recovery target registered for domain, skipping");
                }
            }
        }
    }

    async fn process_one(&self, target: &RecoveryTarget, log: CacheLog) {
        let retry_times_before = log.retry_times;

        let found = match target.primary.find(&log.fid, log.domain).await {
            Ok(Some(f)) => f,
            Ok(None) => {
                tracing::warn!(fid = %log.fid, "no metadata row for cached write, marking src damaged");
                self.mark(log, CacheLogState::SrcDamaged).await;
                return;
            }
            Err(e) => {
                tracing::warn!(fid = %log.fid, error = %e, "metadata lookup failed, staying pending");
                self.retry_failed(log).await;
                return;
            }
        };

        let mut reader = match target.cache.open(log.domain, &log.cache_id).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(fid = %log.fid, error = %e, "cached copy unreadable, marking src damaged");
                self.mark(log, CacheLogState::SrcDamaged).await;
                return;
            }
        };

        let mut writer = match target.primary.create(found.file.clone()).await {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(fid = %log.fid, error = %e, "primary still unavailable, staying pending");
                let _ = reader.close().await;
                self.retry_failed(log).await;
                return;
            }
        };

        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if let Err(e) = writer.write(&buf[..n]).await {
                        tracing::warn!(fid = %log.fid, error = %e, "write to primary failed mid-copy, staying pending");
                        let _ = reader.close().await;
                        self.retry_failed(log).await;
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(fid = %log.fid, error = %e, "cached copy read failed mid-copy, marking src damaged");
                    self.mark(log, CacheLogState::SrcDamaged).await;
                    return;
                }
            }
        }
        let _ = reader.close().await;

        if let Err(e) = writer.close().await {
            tracing::warn!(fid = %log.fid, error = %e, "finalize at primary failed, staying pending");
            self.retry_failed(log).await;
            return;
        }

        // Retry-times gauge tracks the sum of every in-flight log's retry
        // count; a log that finally succeeds stops contributing its share,
        // hence subtracting the triangular sum 1+2+...+(n-1) it had already
        // added across its n-1 prior failed attempts.
        let n = retry_times_before as f64;
        metrics::gauge!("dfs_cached_file_recover_retry_times").decrement((n - 1.0).max(0.0) * n / 2.0);
        metrics::histogram!("dfs_cached_file_recover_retries").record((n - 1.0).max(0.0));
        metrics::counter!("dfs_cached_file_recover_suc").increment(1);

        self.mark(log, CacheLogState::Finished).await;
    }

    async fn mark(&self, mut log: CacheLog, state: CacheLogState) {
        log.state = state;
        log.timestamp = chrono::Utc::now();
        if let Err(e) = self.cache_logs.save_or_update(log).await {
            tracing::warn!(error = %e, "failed to persist cache log state change");
        }
    }

    async fn retry_failed(&self, mut log: CacheLog) {
        log.state = CacheLogState::Pending;
        log.timestamp = chrono::Utc::now();
        match self.cache_logs.save_or_update(log).await {
            Ok(updated) => {
                metrics::gauge!("dfs_cached_file_recover_retry_times").increment(updated.retry_times as f64);
            }
            Err(e) => tracing::warn!(error = %e, "failed to persist retried cache log"),
        }
        metrics::counter!("dfs_cached_file_recover_failed").increment(1);
    }

    async fn vacuum_backstore(&self) {
        for master in &self.backstore_masters {
            let url = format!("http://{master}/vol/vacuum");
            match self.http.post(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!(master, "backstore vacuum succeeded");
                    return;
                }
                Ok(resp) => tracing::warn!(master, status = %resp.status(), "backstore vacuum rejected"),
                Err(e) => tracing::warn!(master, error = %e, "backstore vacuum request failed"),
            }
        }
    }

    async fn sweep_finished_logs(&self) {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(self.days_keep_in_cache);
        match self.cache_logs.remove_finished_before(cutoff).await {
            Ok(n) if n > 0 => tracing::info!(removed = n, "swept finished cache logs"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to sweep finished cache logs"),
        }
    }
}

fn in_compaction_window(now: chrono::DateTime<chrono::Local>) -> bool {
    use chrono::Timelike;
    now.hour() == 1
}
