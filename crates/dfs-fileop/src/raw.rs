use crate::error::FileOpError;
use crate::handler::{DfsFile, FileHandler, FoundFile, HealthStatus};
use async_trait::async_trait;
use dfs_entity::{EntityReader, EntityStore, EntityWriter};
use dfs_meta::{MetaError, MetaStore};
use dfs_types::{get_real_id, Domain, File, FileType, ObjectId};
use std::collections::HashMap;
use std::sync::Arc;

/// The bottom of the decorator stack: a `FileHandler` backed directly by one
/// `MetaStore` + one `EntityStore`. Every concrete back-end kind named in
/// `SPEC_FULL.md` §9 (GridFS-like, Gluster-like, Seaweed-like) is just this
/// struct instantiated with a different `EntityStore` and a different
/// `FileType` tag -- there is no behavioral difference at this layer, only
/// storage-engine identity.
pub struct RawFileHandler<M, E> {
    name: String,
    meta: Arc<M>,
    entity: Arc<E>,
    file_type: FileType,
}

impl<M, E> RawFileHandler<M, E>
where
    M: MetaStore + 'static,
    E: EntityStore + 'static,
{
    pub fn new(name: impl Into<String>, meta: Arc<M>, entity: Arc<E>, file_type: FileType) -> Self {
        Self {
            name: name.into(),
            meta,
            entity,
            file_type,
        }
    }
}

#[async_trait]
impl<M, E> FileHandler for RawFileHandler<M, E>
where
    M: MetaStore + 'static,
    E: EntityStore + 'static,
{
    async fn create(&self, mut info: File) -> Result<Box<dyn DfsFile>, FileOpError> {
        if matches!(info.file_type, FileType::None) {
            return Err(FileOpError::Dfs(dfs_types::DfsError::InvalidType));
        }
        let id = if info.id.is_empty() {
            ObjectId::new().to_hex()
        } else {
            info.id.clone()
        };
        if !ObjectId::is_valid_hex(&id) {
            return Err(FileOpError::invalid_argument(format!("not a valid id: {id}")));
        }
        info.id = id.clone();
        info.file_type = self.file_type;

        let writer = self.entity.create(info.domain, &id).await?;
        Ok(Box::new(WriteHandle {
            writer: Some(writer),
            meta: self.meta.clone(),
            entity: self.entity.clone(),
            info,
            hasher: md5::Context::new(),
            size: 0,
        }))
    }

    async fn open(&self, fid: &str, domain: Domain) -> Result<Box<dyn DfsFile>, FileOpError> {
        let file = self.meta.find(fid).await.map_err(|e| match e {
            MetaError::FileNotFound => FileOpError::not_found(),
            other => other.into(),
        })?;
        if file.domain != domain {
            return Err(FileOpError::not_found());
        }
        let reader = self.entity.open(domain, &file.id).await?;
        Ok(Box::new(ReadHandle { reader: Some(reader), info: file }))
    }

    async fn find(&self, fid: &str, domain: Domain) -> Result<Option<FoundFile>, FileOpError> {
        match self.meta.find(fid).await {
            Ok(file) if file.domain == domain => Ok(Some(FoundFile {
                real_id: file.id.clone(),
                file,
            })),
            Ok(_) => Ok(None),
            Err(MetaError::FileNotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn duplicate(&self, fid: &str, _domain: Domain) -> Result<String, FileOpError> {
        Ok(self.meta.duplicate(fid).await?)
    }

    async fn duplicate_with_given_id(&self, fid: &str, _domain: Domain, dup_id: &str) -> Result<String, FileOpError> {
        let parsed = ObjectId::from_hex(get_real_id(dup_id))
            .ok_or_else(|| FileOpError::invalid_argument(format!("not a valid dupl id: {dup_id}")))?;
        Ok(self.meta.duplicate_with_id(fid, Some(parsed), None).await?)
    }

    async fn remove(&self, fid: &str, domain: Domain) -> Result<(bool, Option<File>), FileOpError> {
        let snapshot = self.meta.find(fid).await.ok();
        let (physically_removed, entity_id) = self.meta.delete(fid).await?;
        if !physically_removed {
            return Ok((false, None));
        }
        let entity_id = entity_id.expect("delete signaled physical removal without an entity id");
        if let Err(e) = self.entity.remove(domain, &entity_id.to_hex()).await {
            tracing::warn!(fid, error = %e, "best-effort entity delete failed after ref count hit zero");
        }
        Ok((true, snapshot))
    }

    async fn find_by_md5(&self, md5: &str, domain: Domain, size: i64) -> Result<String, FileOpError> {
        let file = self.meta.find_by_md5(md5, domain).await.map_err(|e| match e {
            MetaError::FileNotFound => FileOpError::not_found(),
            other => other.into(),
        })?;
        if file.size != size {
            return Err(FileOpError::not_found());
        }
        Ok(file.id)
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn health_status(&self) -> HealthStatus {
        // This reference raw handler has no separate ping path; a real
        // adapter would probe its MetaStore/EntityStore connections here
        // and return `MetaNotHealthy`/`StoreNotHealthy` accordingly. The
        // selector's health-probe loop (`dfs-selector`) is what actually
        // drives shard status in this crate, via `ShardHandler::probe`.
        HealthStatus::Ok
    }

    async fn close(&self) -> Result<(), FileOpError> {
        Ok(())
    }
}

struct WriteHandle<M, E> {
    writer: Option<Box<dyn EntityWriter>>,
    meta: Arc<M>,
    entity: Arc<E>,
    info: File,
    hasher: md5::Context,
    size: i64,
}

#[async_trait]
impl<M, E> DfsFile for WriteHandle<M, E>
where
    M: MetaStore + 'static,
    E: EntityStore + 'static,
{
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
            tracing::warn!(id = %self.info.id, error = %e, "metadata save failed, cleaning up orphaned entity bytes");
            let _ = self.entity.remove(self.info.domain, &self.info.id).await;
            return Err(e.into());
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

struct ReadHandle {
    reader: Option<Box<dyn EntityReader>>,
    info: File,
}

#[async_trait]
impl DfsFile for ReadHandle {
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
    use dfs_entity::InMemoryEntityStore;
    use dfs_meta::{DuplRefStore, InMemoryRaw};

    fn handler() -> RawFileHandler<DuplRefStore<InMemoryRaw>, InMemoryEntityStore> {
        RawFileHandler::new(
            "test-shard",
            Arc::new(DuplRefStore::new(InMemoryRaw::new())),
            Arc::new(InMemoryEntityStore::new("test-entity")),
            FileType::GridFs,
        )
    }

    // Testable property #1: close().info.size == sum of write lengths and
    // close().info.md5 == md5(concat(payloads)).
    #[tokio::test]
    async fn close_reports_accurate_size_and_md5() {
        let h = handler();
        let info = File::new_for_create(7, FileType::GridFs);
        let mut file = h.create(info).await.unwrap();
        file.write(b"hello ").await.unwrap();
        file.write(b"world").await.unwrap();
        let closed = file.close().await.unwrap();

        assert_eq!(closed.size, 11);
        assert_eq!(closed.md5, format!("{:x}", md5::compute(b"hello world")));
    }

    #[tokio::test]
    async fn create_rejects_none_file_type() {
        let h = handler();
        let info = File::new_for_create(1, FileType::None);
        assert!(matches!(h.create(info).await, Err(FileOpError::Dfs(dfs_types::DfsError::InvalidType))));
    }

    // S1: put then get round-trips the exact bytes and metadata.
    #[tokio::test]
    async fn put_then_get_round_trip() {
        let h = handler();
        let mut info = File::new_for_create(2, FileType::GridFs);
        info.biz = "x".into();
        info.user_id = "101".into();
        info.name = "t".into();

        let buf = vec![7u8; 2049];
        let mut w = h.create(info).await.unwrap();
        w.write(&buf).await.unwrap();
        let meta = w.close().await.unwrap();
        assert_eq!(meta.size, 2049);

        let mut r = h.open(&meta.id, 2).await.unwrap();
        let mut out = Vec::new();
        let mut chunk = [0u8; 512];
        loop {
            let n = r.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, buf);
    }

    #[tokio::test]
    async fn find_by_md5_then_delete_dupl_then_delete_original() {
        let h = handler();
        let mut info = File::new_for_create(2, FileType::GridFs);
        info.biz = "x".into();
        let buf = vec![9u8; 16];
        let mut w = h.create(info).await.unwrap();
        w.write(&buf).await.unwrap();
        let meta = w.close().await.unwrap();

        let found_id = h.find_by_md5(&meta.md5, 2, 16).await.unwrap();
        assert_eq!(found_id, meta.id);

        let dup = h.duplicate(&meta.id, 2).await.unwrap();
        let (removed, _) = h.remove(&dup, 2).await.unwrap();
        assert!(!removed);

        let (removed, file) = h.remove(&meta.id, 2).await.unwrap();
        assert!(removed);
        assert_eq!(file.unwrap().id, meta.id);
    }

    #[tokio::test]
    async fn open_rejects_cross_domain_access() {
        let h = handler();
        let info = File::new_for_create(1, FileType::GridFs);
        let mut w = h.create(info).await.unwrap();
        w.write(b"abc").await.unwrap();
        let meta = w.close().await.unwrap();

        assert!(matches!(h.open(&meta.id, 2).await, Err(FileOpError::Dfs(dfs_types::DfsError::FileNotFound))));
    }
}
