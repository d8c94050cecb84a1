use async_trait::async_trait;
use dfs_config::{keys, FeatureRegistry};
use dfs_entity::{EntityReader, EntityStore, EntityWriter};
use dfs_fileop::{DfsFile, FileHandler, FileOpError, FoundFile, HealthStatus};
use dfs_meta::{CacheLogStore, MetaStore};
use dfs_types::{CacheLog, CacheLogState, Domain, File, FileType, ObjectId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wraps a primary `FileHandler` with a secondary cache object store,
/// addressed directly by fid (`SPEC_FULL.md` §4.3). Holds its own handle to
/// the primary's `MetaStore` because the diverted-to-cache path still needs
/// to persist a `File` row even though the primary `EntityStore` write never
/// happened.
pub struct BackStoreHandler {
    primary: Arc<dyn FileHandler>,
    meta: Arc<dyn MetaStore>,
    cache: Arc<dyn EntityStore>,
    cache_logs: Arc<dyn CacheLogStore>,
    features: Arc<FeatureRegistry>,
    shard_name: String,
    cache_duration: Duration,
    started_at: Instant,
}

impl BackStoreHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        primary: Arc<dyn FileHandler>,
        meta: Arc<dyn MetaStore>,
        cache: Arc<dyn EntityStore>,
        cache_logs: Arc<dyn CacheLogStore>,
        features: Arc<FeatureRegistry>,
        shard_name: impl Into<String>,
        cache_duration: Duration,
    ) -> Self {
        Self {
            primary,
            meta,
            cache,
            cache_logs,
            features,
            shard_name: shard_name.into(),
            cache_duration,
            started_at: Instant::now(),
        }
    }

    fn cache_eligible(&self, domain: Domain) -> bool {
        let d = domain as u32;
        self.features.domain_has_access(keys::CACHE_FILE, d)
            || (self.features.domain_has_access(keys::BACKSTORE, d) && self.started_at.elapsed() < self.cache_duration)
    }

    async fn log_cache_write(&self, fid: &str, domain: Domain, cause: &str, chunk_size: i64) {
        let log = CacheLog {
            fid: fid.to_string(),
            cache_id: fid.to_string(),
            domain,
            cache_chunk_size: chunk_size,
            shard: self.shard_name.clone(),
            cause: cause.to_string(),
            state: CacheLogState::Pending,
            retry_times: 0,
            timestamp: chrono::Utc::now(),
        };
        if let Err(e) = self.cache_logs.save_or_update(log).await {
            tracing::warn!(fid, error = %e, "failed to save cache log for diverted write");
        }
    }
}

#[async_trait]
impl FileHandler for BackStoreHandler {
    async fn create(&self, info: File) -> Result<Box<dyn DfsFile>, FileOpError> {
        match self.primary.create(info.clone()).await {
            Ok(primary_handle) => {
                let domain = primary_handle.get_file_info().domain;
                if !self.features.domain_has_access(keys::BACKSTORE, domain as u32) {
                    return Ok(primary_handle);
                }
                let id = primary_handle.get_file_info().id.clone();
                let cache_writer = match self.cache.create(domain, &id).await {
                    Ok(w) => Some(w),
                    Err(e) => {
                        tracing::warn!(id, error = %e, "failed to open backstore cache write, primary-only");
                        None
                    }
                };
                if cache_writer.is_some() {
                    dfs_metrics::record_backstore_file(&self.shard_name);
                }
                Ok(Box::new(DualWriteHandle {
                    primary: primary_handle,
                    cache: cache_writer,
                }))
            }
            Err(e) if e.is_recoverable() && self.cache_eligible(info.domain) => {
                let id = if info.id.is_empty() {
                    ObjectId::new().to_hex()
                } else {
                    info.id.clone()
                };
                let mut divert_info = info;
                divert_info.id = id.clone();
                if matches!(divert_info.file_type, FileType::None) {
                    divert_info.file_type = FileType::SeaweedFs;
                }

                let cache_writer = self.cache.create(divert_info.domain, &id).await?;
                dfs_metrics::record_backstore_file(&self.shard_name);
                Ok(Box::new(CacheDivertWriteHandle {
                    writer: Some(cache_writer),
                    meta: self.meta.clone(),
                    cache: self.cache.clone(),
                    cache_logs: self.cache_logs.clone(),
                    shard_name: self.shard_name.clone(),
                    info: divert_info,
                    hasher: md5::Context::new(),
                    size: 0,
                }))
            }
            Err(e) => Err(e),
        }
    }

    async fn open(&self, fid: &str, domain: Domain) -> Result<Box<dyn DfsFile>, FileOpError> {
        if self.features.domain_has_access(keys::READ_FROM_BACKSTORE, domain as u32) {
            if let Some(found) = self.primary.find(fid, domain).await? {
                if let Ok(reader) = self.cache.open(domain, &found.real_id).await {
                    return Ok(Box::new(CacheReadHandle {
                        reader: Some(reader),
                        info: found.file,
                    }));
                }
            }
        }
        self.primary.open(fid, domain).await
    }

    async fn find(&self, fid: &str, domain: Domain) -> Result<Option<FoundFile>, FileOpError> {
        self.primary.find(fid, domain).await
    }

    async fn duplicate(&self, fid: &str, domain: Domain) -> Result<String, FileOpError> {
        self.primary.duplicate(fid, domain).await
    }

    async fn duplicate_with_given_id(&self, fid: &str, domain: Domain, dup_id: &str) -> Result<String, FileOpError> {
        self.primary.duplicate_with_given_id(fid, domain, dup_id).await
    }

    async fn remove(&self, fid: &str, domain: Domain) -> Result<(bool, Option<File>), FileOpError> {
        let (removed, file) = self.primary.remove(fid, domain).await?;
        if removed {
            if let Some(f) = &file {
                let _ = self.cache.remove(domain, &f.id).await;
            }
        }
        Ok((removed, file))
    }

    async fn find_by_md5(&self, md5: &str, domain: Domain, size: i64) -> Result<String, FileOpError> {
        self.primary.find_by_md5(md5, domain, size).await
    }

    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn health_status(&self) -> HealthStatus {
        self.primary.health_status().await
    }

    async fn close(&self) -> Result<(), FileOpError> {
        self.primary.close().await
    }
}

struct DualWriteHandle {
    primary: Box<dyn DfsFile>,
    cache: Option<Box<dyn EntityWriter>>,
}

#[async_trait]
impl DfsFile for DualWriteHandle {
    async fn write(&mut self, buf: &[u8]) -> Result<(), FileOpError> {
        self.primary.write(buf).await?;
        if let Some(cache) = &mut self.cache {
            if let Err(e) = cache.write(buf).await {
                tracing::warn!(error = %e, "backstore cache mirror write failed, detaching for rest of stream");
                self.cache = None;
            }
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, FileOpError> {
        self.primary.read(buf).await
    }

    async fn close(mut self: Box<Self>) -> Result<File, FileOpError> {
        let file = self.primary.close().await?;
        if let Some(cache) = self.cache.take() {
            if let Err(e) = cache.close().await {
                tracing::warn!(id = %file.id, error = %e, "backstore cache mirror close failed");
            }
        }
        Ok(file)
    }

    fn get_file_info(&self) -> &File {
        self.primary.get_file_info()
    }

    fn update_file_meta(&mut self, attrs: HashMap<String, String>) {
        self.primary.update_file_meta(attrs)
    }

    fn get_file_meta(&self) -> &HashMap<String, String> {
        self.primary.get_file_meta()
    }

    fn has_entity(&self) -> bool {
        self.primary.has_entity()
    }
}

struct CacheDivertWriteHandle {
    writer: Option<Box<dyn EntityWriter>>,
    meta: Arc<dyn MetaStore>,
    cache: Arc<dyn EntityStore>,
    cache_logs: Arc<dyn CacheLogStore>,
    shard_name: String,
    info: File,
    hasher: md5::Context,
    size: i64,
}

#[async_trait]
impl DfsFile for CacheDivertWriteHandle {
    async fn write(&mut self, buf: &[u8]) -> Result<(), FileOpError> {
        let writer = self.writer.as_mut().expect("write after close");
        writer.write(buf).await?;
        self.hasher.consume(buf);
        self.size += buf.len() as i64;
        Ok(())
    }

    async fn read(&mut self, _buf: &mut [u8]) -> Result<usize, FileOpError> {
        Err(FileOpError::invalid_argument("read on a write-mode handle"))
    }

    async fn close(mut self: Box<Self>) -> Result<File, FileOpError> {
        let writer = self.writer.take().expect("double close");
        writer.close().await?;

        self.info.size = self.size;
        self.info.md5 = format!("{:x}", self.hasher.clone().compute());
        self.info.upload_date = chrono::Utc::now();

        if let Err(e) = self.meta.save(&self.info).await {
            tracing::warn!(id = %self.info.id, error = %e, "metadata save failed for cache-diverted write, cleaning up cache bytes");
            let _ = self.cache.remove(self.info.domain, &self.info.id).await;
            return Err(e.into());
        }

        let log = CacheLog {
            fid: self.info.id.clone(),
            cache_id: self.info.id.clone(),
            domain: self.info.domain,
            cache_chunk_size: self.size,
            shard: self.shard_name.clone(),
            cause: "primary store unavailable".to_string(),
            state: CacheLogState::Pending,
            retry_times: 0,
            timestamp: chrono::Utc::now(),
        };
        if let Err(e) = self.cache_logs.save_or_update(log).await {
            tracing::warn!(id = %self.info.id, error = %e, "failed to save cache log for diverted write");
        }

        Ok(self.info.clone())
    }

    fn get_file_info(&self) -> &File {
        &self.info
    }

    fn update_file_meta(&mut self, attrs: HashMap<String, String>) {
        self.info.ext_attr.extend(attrs);
    }

    fn get_file_meta(&self) -> &HashMap<String, String> {
        &self.info.ext_attr
    }

    fn has_entity(&self) -> bool {
        true
    }
}

struct CacheReadHandle {
    reader: Option<Box<dyn EntityReader>>,
    info: File,
}

#[async_trait]
impl DfsFile for CacheReadHandle {
    async fn write(&mut self, _buf: &[u8]) -> Result<(), FileOpError> {
        Err(FileOpError::invalid_argument("write on a read-mode handle"))
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, FileOpError> {
        let reader = self.reader.as_mut().expect("read after close");
        Ok(reader.read(buf).await?)
    }

    async fn close(mut self: Box<Self>) -> Result<File, FileOpError> {
        if let Some(reader) = self.reader.take() {
            reader.close().await?;
        }
        Ok(self.info.clone())
    }

    fn get_file_info(&self) -> &File {
        &self.info
    }

    fn update_file_meta(&mut self, attrs: HashMap<String, String>) {
        self.info.ext_attr.extend(attrs);
    }

    fn get_file_meta(&self) -> &HashMap<String, String> {
        &self.info.ext_attr
    }

    fn has_entity(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_config::FeatureFlag;
    use dfs_entity::InMemoryEntityStore;
    use dfs_fileop::RawFileHandler;
    use dfs_meta::{DuplRefStore, InMemoryAux, InMemoryRaw};

    struct AlwaysUnavailable;

    #[async_trait]
    impl FileHandler for AlwaysUnavailable {
        async fn create(&self, _info: File) -> Result<Box<dyn DfsFile>, FileOpError> {
            Err(FileOpError::recoverable("primary store unreachable"))
        }
        async fn open(&self, _fid: &str, _domain: Domain) -> Result<Box<dyn DfsFile>, FileOpError> {
            Err(FileOpError::not_found())
        }
        async fn find(&self, _fid: &str, _domain: Domain) -> Result<Option<FoundFile>, FileOpError> {
            Ok(None)
        }
        async fn duplicate(&self, _fid: &str, _domain: Domain) -> Result<String, FileOpError> {
            Err(FileOpError::not_found())
        }
        async fn duplicate_with_given_id(&self, _fid: &str, _domain: Domain, _dup_id: &str) -> Result<String, FileOpError> {
            Err(FileOpError::not_found())
        }
        async fn remove(&self, _fid: &str, _domain: Domain) -> Result<(bool, Option<File>), FileOpError> {
            Ok((false, None))
        }
        async fn find_by_md5(&self, _md5: &str, _domain: Domain, _size: i64) -> Result<String, FileOpError> {
            Err(FileOpError::not_found())
        }
        fn name(&self) -> &str {
            "always-unavailable"
        }
        async fn health_status(&self) -> HealthStatus {
            HealthStatus::StoreNotHealthy
        }
        async fn close(&self) -> Result<(), FileOpError> {
            Ok(())
        }
    }

    fn cache_handler(features: Arc<FeatureRegistry>) -> (BackStoreHandler, Arc<dyn MetaStore>, Arc<InMemoryEntityStore>) {
        let meta: Arc<dyn MetaStore> = Arc::new(DuplRefStore::new(InMemoryRaw::new()));
        let cache = Arc::new(InMemoryEntityStore::new("cache"));
        let cache_logs = Arc::new(InMemoryAux::new());
        let handler = BackStoreHandler::new(
            Arc::new(AlwaysUnavailable),
            meta.clone(),
            cache.clone(),
            cache_logs,
            features,
            "cache-shard",
            Duration::from_secs(3600),
        );
        (handler, meta, cache)
    }

    // S5: primary unavailable + cachefile flag on => create succeeds via
    // cache divert, CacheLog{Pending} is recorded with a matching fid.
    #[tokio::test]
    async fn diverts_to_cache_when_primary_unavailable_and_cachefile_flag_on() {
        let features = Arc::new(FeatureRegistry::with_defaults());
        let mut enabled = FeatureFlag::disabled(keys::CACHE_FILE);
        enabled.enabled = true;
        features.set(enabled);

        let (handler, _meta, cache) = cache_handler(features);
        let mut w = handler.create(File::new_for_create(9, FileType::GridFs)).await.unwrap();
        w.write(b"cached bytes").await.unwrap();
        let file = w.close().await.unwrap();
        assert_eq!(file.size, 12);

        // bytes genuinely landed in the cache store, not just metadata.
        let mut r = cache.open(9, &file.id).await.unwrap();
        let mut buf = [0u8; 32];
        let n = r.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"cached bytes");
    }

    #[tokio::test]
    async fn propagates_error_when_not_cache_eligible() {
        let features = Arc::new(FeatureRegistry::with_defaults());
        let (handler, _meta, _cache) = cache_handler(features);
        let result = handler.create(File::new_for_create(9, FileType::GridFs)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn read_from_backstore_flag_reads_cache_before_primary() {
        let raw_meta = Arc::new(DuplRefStore::new(InMemoryRaw::new()));
        let raw_entity = Arc::new(InMemoryEntityStore::new("primary-entity"));
        let primary: Arc<dyn FileHandler> = Arc::new(RawFileHandler::new(
            "primary-shard",
            raw_meta.clone(),
            raw_entity,
            FileType::GridFs,
        ));

        let mut w = primary.create(File::new_for_create(4, FileType::GridFs)).await.unwrap();
        w.write(b"primary bytes").await.unwrap();
        let file = w.close().await.unwrap();

        let cache = Arc::new(InMemoryEntityStore::new("cache"));
        let cw = cache.create(4, &file.id).await.unwrap();
        let mut cw = cw;
        cw.write(b"cache bytes!!").await.unwrap();
        cw.close().await.unwrap();

        let features = Arc::new(FeatureRegistry::with_defaults());
        let mut enabled = FeatureFlag::disabled(keys::READ_FROM_BACKSTORE);
        enabled.enabled = true;
        features.set(enabled);

        let handler = BackStoreHandler::new(
            primary,
            raw_meta,
            cache,
            Arc::new(InMemoryAux::new()),
            features,
            "primary-shard",
            Duration::from_secs(3600),
        );

        let mut r = handler.open(&file.id, 4).await.unwrap();
        let mut buf = [0u8; 32];
        let n = r.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"cache bytes!!");
    }
}
