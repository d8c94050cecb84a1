use crate::{EntityError, EntityReader, EntityStore, EntityWriter};
use async_trait::async_trait;
use dfs_types::Domain;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Blobs = Arc<Mutex<HashMap<(Domain, String), Vec<u8>>>>;

/// An in-process `EntityStore` used by unit tests and as the cache-side
/// backend in examples -- never meant to survive a process restart. The
/// blob table is reference-counted internally so a write handle can commit
/// its bytes on `close` without borrowing back into the store.
pub struct InMemoryEntityStore {
    name: String,
    blobs: Blobs,
}

impl InMemoryEntityStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

struct MemWriter {
    key: (Domain, String),
    buf: Vec<u8>,
    blobs: Blobs,
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn create(&self, domain: Domain, fid: &str) -> Result<Box<dyn EntityWriter>, EntityError> {
        if self.blobs.lock().unwrap().contains_key(&(domain, fid.to_string())) {
            return Err(EntityError::AlreadyExists);
        }
        Ok(Box::new(MemWriter {
            key: (domain, fid.to_string()),
            buf: Vec::new(),
            blobs: self.blobs.clone(),
        }))
    }

    async fn open(&self, domain: Domain, fid: &str) -> Result<Box<dyn EntityReader>, EntityError> {
        let blobs = self.blobs.lock().unwrap();
        let bytes = blobs
            .get(&(domain, fid.to_string()))
            .cloned()
            .ok_or(EntityError::NotFound)?;
        Ok(Box::new(MemReader { bytes, pos: 0 }))
    }

    async fn remove(&self, domain: Domain, fid: &str) -> Result<(), EntityError> {
        self.blobs.lock().unwrap().remove(&(domain, fid.to_string()));
        Ok(())
    }

    async fn health_check(&self) -> Result<(), EntityError> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl EntityWriter for MemWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<(), EntityError> {
        self.buf.extend_from_slice(buf);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), EntityError> {
        self.blobs.lock().unwrap().insert(self.key, self.buf);
        Ok(())
    }
}

struct MemReader {
    bytes: Vec<u8>,
    pos: usize,
}

#[async_trait]
impl EntityReader for MemReader {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, EntityError> {
        let remaining = &self.bytes[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }

    async fn close(self: Box<Self>) -> Result<(), EntityError> {
        Ok(())
    }
}
