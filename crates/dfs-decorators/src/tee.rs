use async_trait::async_trait;
use dfs_config::{keys, FeatureRegistry};
use dfs_fileop::{DfsFile, FileHandler, FileOpError, FoundFile, HealthStatus};
use dfs_types::{Domain, File};
use std::collections::HashMap;
use std::sync::Arc;

/// Dual-writes every create to a `primary` and a `minor` shard so the minor
/// stays warm as a failover target. The primary is authoritative: its result
/// (success or error) is what the caller sees. The minor is best-effort --
/// any failure on it is logged and the minor leg is simply dropped for the
/// rest of that write (`SPEC_FULL.md` §4.3).
pub struct TeeHandler {
    primary: Arc<dyn FileHandler>,
    minor: Arc<dyn FileHandler>,
    features: Arc<FeatureRegistry>,
}

impl TeeHandler {
    pub fn new(primary: Arc<dyn FileHandler>, minor: Arc<dyn FileHandler>, features: Arc<FeatureRegistry>) -> Self {
        Self { primary, minor, features }
    }

    fn tee_writes_enabled(&self, domain: Domain) -> bool {
        self.features.domain_has_access(keys::TEE_WRITE_TO_MINOR, domain as u32)
    }

    fn tee_reads_enabled(&self, domain: Domain) -> bool {
        self.features.domain_has_access(keys::TEE_READ_FROM_MINOR, domain as u32)
    }
}

#[async_trait]
impl FileHandler for TeeHandler {
    async fn create(&self, info: File) -> Result<Box<dyn DfsFile>, FileOpError> {
        let domain = info.domain;
        let primary_handle = self.primary.create(info.clone()).await?;

        if !self.tee_writes_enabled(domain) {
            return Ok(primary_handle);
        }

        let mut minor_info = info;
        minor_info.id = primary_handle.get_file_info().id.clone();
        minor_info.file_type = primary_handle.get_file_info().file_type;

        let minor_handle = match self.minor.create(minor_info).await {
            Ok(h) => {
                dfs_metrics::record_minor_file(self.minor.name());
                Some(h)
            }
            Err(e) => {
                tracing::warn!(id = %primary_handle.get_file_info().id, error = %e, "minor tee create failed, primary-only for this write");
                None
            }
        };

        Ok(Box::new(TeeWriteHandle {
            primary: primary_handle,
            minor: minor_handle,
        }))
    }

    async fn open(&self, fid: &str, domain: Domain) -> Result<Box<dyn DfsFile>, FileOpError> {
        if self.tee_reads_enabled(domain) {
            match self.minor.open(fid, domain).await {
                Ok(h) => return Ok(h),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::warn!(fid, error = %e, "minor tee read failed, falling back to primary");
                }
            }
        }
        self.primary.open(fid, domain).await
    }

    async fn find(&self, fid: &str, domain: Domain) -> Result<Option<FoundFile>, FileOpError> {
        self.primary.find(fid, domain).await
    }

    async fn duplicate(&self, fid: &str, domain: Domain) -> Result<String, FileOpError> {
        let dup_id = self.primary.duplicate(fid, domain).await?;
        if self.tee_writes_enabled(domain) {
            if let Err(e) = self.minor.duplicate_with_given_id(fid, domain, &dup_id).await {
                tracing::warn!(fid, %dup_id, error = %e, "minor tee duplicate failed, primary already committed");
            }
        }
        Ok(dup_id)
    }

    async fn duplicate_with_given_id(&self, fid: &str, domain: Domain, dup_id: &str) -> Result<String, FileOpError> {
        let real_dup_id = self.primary.duplicate_with_given_id(fid, domain, dup_id).await?;
        if self.tee_writes_enabled(domain) {
            if let Err(e) = self.minor.duplicate_with_given_id(fid, domain, dup_id).await {
                tracing::warn!(fid, dup_id, error = %e, "minor tee duplicate failed, primary already committed");
            }
        }
        Ok(real_dup_id)
    }

    async fn remove(&self, fid: &str, domain: Domain) -> Result<(bool, Option<File>), FileOpError> {
        let result = self.primary.remove(fid, domain).await?;
        if self.tee_writes_enabled(domain) {
            if let Err(e) = self.minor.remove(fid, domain).await {
                if !e.is_not_found() {
                    tracing::warn!(fid, error = %e, "minor tee remove failed, primary already committed");
                }
            }
        }
        Ok(result)
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
        self.primary.close().await?;
        let _ = self.minor.close().await;
        Ok(())
    }
}

struct TeeWriteHandle {
    primary: Box<dyn DfsFile>,
    minor: Option<Box<dyn DfsFile>>,
}

#[async_trait]
impl DfsFile for TeeWriteHandle {
    async fn write(&mut self, buf: &[u8]) -> Result<(), FileOpError> {
        self.primary.write(buf).await?;
        if let Some(minor) = &mut self.minor {
            if let Err(e) = minor.write(buf).await {
                tracing::warn!(error = %e, "minor tee write failed, detaching for rest of stream");
                self.minor = None;
            }
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, FileOpError> {
        self.primary.read(buf).await
    }

    async fn close(mut self: Box<Self>) -> Result<File, FileOpError> {
        let file = self.primary.close().await?;
        if let Some(minor) = self.minor.take() {
            if let Err(e) = minor.close().await {
                tracing::warn!(id = %file.id, error = %e, "minor tee close failed");
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

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_config::FeatureFlag;
    use dfs_entity::InMemoryEntityStore;
    use dfs_fileop::RawFileHandler;
    use dfs_meta::{DuplRefStore, InMemoryRaw};
    use dfs_types::FileType;

    fn raw_handler(name: &str) -> Arc<dyn FileHandler> {
        Arc::new(RawFileHandler::new(
            name,
            Arc::new(DuplRefStore::new(InMemoryRaw::new())),
            Arc::new(InMemoryEntityStore::new(name)),
            FileType::GridFs,
        ))
    }

    fn registry_with_tee_writes_on() -> Arc<FeatureRegistry> {
        let registry = FeatureRegistry::with_defaults();
        let mut flag = FeatureFlag::disabled(keys::TEE_WRITE_TO_MINOR);
        flag.enabled = true;
        registry.set(flag);
        Arc::new(registry)
    }

    #[tokio::test]
    async fn dual_writes_land_identical_bytes_on_both_shards() {
        let primary = raw_handler("primary");
        let minor = raw_handler("minor");
        let tee = TeeHandler::new(primary.clone(), minor.clone(), registry_with_tee_writes_on());

        let mut w = tee.create(File::new_for_create(5, FileType::GridFs)).await.unwrap();
        w.write(b"tee me").await.unwrap();
        let file = w.close().await.unwrap();

        let mut r = minor.open(&file.id, 5).await.unwrap();
        let mut buf = [0u8; 16];
        let n = r.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"tee me");
    }

    #[tokio::test]
    async fn tee_disabled_writes_primary_only() {
        let primary = raw_handler("primary");
        let minor = raw_handler("minor");
        let tee = TeeHandler::new(primary, minor.clone(), Arc::new(FeatureRegistry::with_defaults()));

        let mut w = tee.create(File::new_for_create(5, FileType::GridFs)).await.unwrap();
        w.write(b"primary only").await.unwrap();
        let file = w.close().await.unwrap();

        assert!(minor.open(&file.id, 5).await.is_err());
    }

    #[tokio::test]
    async fn minor_create_failure_does_not_fail_the_tee_create() {
        struct AlwaysFailsCreate;
        #[async_trait]
        impl FileHandler for AlwaysFailsCreate {
            async fn create(&self, _info: File) -> Result<Box<dyn DfsFile>, FileOpError> {
                Err(FileOpError::recoverable("minor shard down"))
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
                "always-fails"
            }
            async fn health_status(&self) -> HealthStatus {
                HealthStatus::StoreNotHealthy
            }
            async fn close(&self) -> Result<(), FileOpError> {
                Ok(())
            }
        }

        let primary = raw_handler("primary");
        let minor: Arc<dyn FileHandler> = Arc::new(AlwaysFailsCreate);
        let tee = TeeHandler::new(primary, minor, registry_with_tee_writes_on());

        let mut w = tee.create(File::new_for_create(5, FileType::GridFs)).await.unwrap();
        w.write(b"still works").await.unwrap();
        let file = w.close().await.unwrap();
        assert_eq!(file.size, 11);
    }

    #[tokio::test]
    async fn read_from_minor_flag_prefers_minor_then_falls_back() {
        let primary = raw_handler("primary");
        let minor = raw_handler("minor");

        let mut w = primary.create(File::new_for_create(2, FileType::GridFs)).await.unwrap();
        w.write(b"only on primary").await.unwrap();
        let file = w.close().await.unwrap();

        let registry = FeatureRegistry::with_defaults();
        let mut flag = FeatureFlag::disabled(keys::TEE_READ_FROM_MINOR);
        flag.enabled = true;
        registry.set(flag);

        let tee = TeeHandler::new(primary, minor, Arc::new(registry));
        let mut r = tee.open(&file.id, 2).await.unwrap();
        let mut buf = [0u8; 32];
        let n = r.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"only on primary");
    }
}
