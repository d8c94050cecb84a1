use async_trait::async_trait;
use dfs_fileop::{DfsFile, FileHandler, FileOpError, FoundFile, HealthStatus};
use dfs_meta::RecoveryEventStore;
use dfs_types::{Domain, File, ObjectId, RecoveryEvent};
use std::collections::HashMap;
use std::sync::Arc;

/// Wraps the single designated fallback shard's `FileHandler`. After a
/// `Create` succeeds here (which only happens when the selector has already
/// decided the real primary is unhealthy and rerouted to this shard), a
/// `RecoveryEvent` is journaled so the selector's per-shard recovery
/// dispatcher can later replay the write into the real primary once it
/// reports healthy again (`SPEC_FULL.md` §4.3, §4.4).
pub struct DegradeHandler {
    primary: Arc<dyn FileHandler>,
    events: Arc<dyn RecoveryEventStore>,
}

impl DegradeHandler {
    pub fn new(primary: Arc<dyn FileHandler>, events: Arc<dyn RecoveryEventStore>) -> Self {
        Self { primary, events }
    }
}

#[async_trait]
impl FileHandler for DegradeHandler {
    async fn create(&self, info: File) -> Result<Box<dyn DfsFile>, FileOpError> {
        let inner = self.primary.create(info).await?;
        Ok(Box::new(DegradeWriteHandle {
            inner,
            events: self.events.clone(),
        }))
    }

    async fn open(&self, fid: &str, domain: Domain) -> Result<Box<dyn DfsFile>, FileOpError> {
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
        self.primary.remove(fid, domain).await
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

struct DegradeWriteHandle {
    inner: Box<dyn DfsFile>,
    events: Arc<dyn RecoveryEventStore>,
}

#[async_trait]
impl DfsFile for DegradeWriteHandle {
    async fn write(&mut self, buf: &[u8]) -> Result<(), FileOpError> {
        self.inner.write(buf).await
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, FileOpError> {
        self.inner.read(buf).await
    }

    async fn close(self: Box<Self>) -> Result<File, FileOpError> {
        let file = self.inner.close().await?;

        let event = RecoveryEvent {
            id: ObjectId::new(),
            fid: file.id.clone(),
            domain: file.domain,
            timestamp: chrono::Utc::now(),
        };
        if let Err(e) = self.events.save_event(event).await {
            // Log-only: the file itself is durably written on the fallback
            // shard, recovery would just have to be triggered manually.
            tracing::warn!(id = %file.id, error = %e, "failed to journal degrade recovery event");
        }

        Ok(file)
    }

    fn get_file_info(&self) -> &File {
        self.inner.get_file_info()
    }

    fn update_file_meta(&mut self, attrs: HashMap<String, String>) {
        self.inner.update_file_meta(attrs)
    }

    fn get_file_meta(&self) -> &HashMap<String, String> {
        self.inner.get_file_meta()
    }

    fn has_entity(&self) -> bool {
        self.inner.has_entity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_entity::InMemoryEntityStore;
    use dfs_fileop::RawFileHandler;
    use dfs_meta::{DuplRefStore, InMemoryAux, InMemoryRaw};
    use dfs_types::FileType;

    fn handler() -> (DegradeHandler, Arc<InMemoryAux>) {
        let aux = Arc::new(InMemoryAux::new());
        let raw = Arc::new(RawFileHandler::new(
            "degrade-shard",
            Arc::new(DuplRefStore::new(InMemoryRaw::new())),
            Arc::new(InMemoryEntityStore::new("degrade-entity")),
            FileType::GridFs,
        ));
        (DegradeHandler::new(raw, aux.clone()), aux)
    }

    #[tokio::test]
    async fn successful_create_journals_a_recovery_event() {
        let (handler, aux) = handler();
        let mut w = handler.create(File::new_for_create(1, FileType::GridFs)).await.unwrap();
        w.write(b"payload").await.unwrap();
        let file = w.close().await.unwrap();

        let events = aux.recorded_events();
        // InMemoryAux only tracks Event/SpaceLog for AuditStore; recovery
        // events live in the RecoveryEventStore side of the same struct, so
        // we drain via get_events_in_batch instead to check one landed.
        let _ = events;
        let batch = aux.get_events_in_batch(10, std::time::Duration::from_millis(50)).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].fid, file.id);
        assert_eq!(batch[0].domain, 1);
    }

    #[tokio::test]
    async fn delegates_read_path_straight_through() {
        let (handler, _aux) = handler();
        let mut w = handler.create(File::new_for_create(3, FileType::GridFs)).await.unwrap();
        w.write(b"abc").await.unwrap();
        let file = w.close().await.unwrap();

        let mut r = handler.open(&file.id, 3).await.unwrap();
        let mut buf = [0u8; 8];
        let n = r.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"abc");
    }
}
