use crate::path::entity_path;
use crate::{EntityError, EntityReader, EntityStore, EntityWriter};
use async_trait::async_trait;
use dfs_types::Domain;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// A disk-backed `EntityStore`, standing in for the Gluster/SeaweedFS-style
/// backends the original talks to over their own client libraries. Files
/// are sharded under `base` per `entity_path`; `create` fails with
/// `Unavailable` (the recoverable kind BackStore/Degrade catch) if the
/// sharded parent directory can't be created, since that's the failure mode
/// a real network filesystem mount would surface as "store unavailable".
pub struct FsEntityStore {
    name: String,
    base: PathBuf,
    shard_depth: u32,
    shard_digits: u32,
}

impl FsEntityStore {
    pub fn new(name: impl Into<String>, base: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            base: base.into(),
            shard_depth: 3,
            shard_digits: 2,
        }
    }

    pub fn with_shard_layout(mut self, depth: u32, digits: u32) -> Self {
        self.shard_depth = depth;
        self.shard_digits = digits;
        self
    }

    fn path_for(&self, domain: Domain, fid: &str) -> PathBuf {
        entity_path(&self.base, domain, fid, self.shard_depth, self.shard_digits)
    }
}

#[async_trait]
impl EntityStore for FsEntityStore {
    async fn create(&self, domain: Domain, fid: &str) -> Result<Box<dyn EntityWriter>, EntityError> {
        let path = self.path_for(domain, fid);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| EntityError::Unavailable(e.to_string()))?;
        }
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => EntityError::AlreadyExists,
                _ => EntityError::Unavailable(e.to_string()),
            })?;
        Ok(Box::new(FsWriter { file, path }))
    }

    async fn open(&self, domain: Domain, fid: &str) -> Result<Box<dyn EntityReader>, EntityError> {
        let path = self.path_for(domain, fid);
        let file = fs::File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EntityError::NotFound,
            _ => EntityError::Unavailable(e.to_string()),
        })?;
        Ok(Box::new(FsReader { file }))
    }

    async fn remove(&self, domain: Domain, fid: &str) -> Result<(), EntityError> {
        let path = self.path_for(domain, fid);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EntityError::Io(e)),
        }
    }

    async fn health_check(&self) -> Result<(), EntityError> {
        fs::metadata(&self.base)
            .await
            .map(|_| ())
            .map_err(|e| EntityError::Unavailable(e.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct FsWriter {
    file: fs::File,
    path: PathBuf,
}

#[async_trait]
impl EntityWriter for FsWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<(), EntityError> {
        self.file.write_all(buf).await?;
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<(), EntityError> {
        self.file.flush().await?;
        let _ = &self.path; // kept for future fsync-parent-dir durability work
        Ok(())
    }
}

struct FsReader {
    file: fs::File,
}

#[async_trait]
impl EntityReader for FsReader {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, EntityError> {
        Ok(self.file.read(buf).await?)
    }

    async fn close(self: Box<Self>) -> Result<(), EntityError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEntityStore::new("gluster-like", dir.path());

        let mut w = store.create(42, "507f1f77bcf86cd799439011").await.unwrap();
        w.write(b"chunk one ").await.unwrap();
        w.write(b"chunk two").await.unwrap();
        w.close().await.unwrap();

        let mut r = store.open(42, "507f1f77bcf86cd799439011").await.unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 8];
        loop {
            let n = r.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"chunk one chunk two");
    }

    #[tokio::test]
    async fn open_of_missing_fid_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEntityStore::new("gluster-like", dir.path());
        assert!(matches!(store.open(1, "nope").await, Err(EntityError::NotFound)));
    }

    #[tokio::test]
    async fn create_twice_with_same_fid_fails_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEntityStore::new("gluster-like", dir.path());
        let w = store.create(1, "abc123").await.unwrap();
        w.close().await.unwrap();
        assert!(matches!(store.create(1, "abc123").await, Err(EntityError::AlreadyExists)));
    }

    #[tokio::test]
    async fn remove_then_open_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEntityStore::new("gluster-like", dir.path());
        let w = store.create(1, "abc123").await.unwrap();
        w.close().await.unwrap();
        store.remove(1, "abc123").await.unwrap();
        assert!(matches!(store.open(1, "abc123").await, Err(EntityError::NotFound)));
    }
}
