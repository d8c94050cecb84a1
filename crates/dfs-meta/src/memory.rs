use crate::error::MetaError;
use crate::raw::RawMetaOp;
use async_trait::async_trait;
use dfs_types::{Domain, Dupl, File, ObjectId, Ref};
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-process, test-and-single-node-friendly `RawMetaOp` backend. Mirrors
/// the row shapes a Mongo- or Cassandra-style adapter would persist, kept
/// behind a single mutex the way a small embedded store would be -- there is
/// no production ambition here, only a reference implementation the dupl/ref
/// logic and the decorator stack can be exercised and tested against.
#[derive(Default)]
pub struct InMemoryRaw {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    files: HashMap<String, File>,
    files_by_md5: HashMap<(String, Domain), String>,
    dupls: HashMap<ObjectId, Dupl>,
    refs: HashMap<ObjectId, Ref>,
}

impl InMemoryRaw {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RawMetaOp for InMemoryRaw {
    async fn lookup_file_by_id(&self, id: &ObjectId) -> Result<Option<File>, MetaError> {
        let t = self.inner.lock().unwrap();
        Ok(t.files.get(&id.to_hex()).cloned())
    }

    async fn lookup_file_by_md5(&self, md5: &str, domain: Domain) -> Result<Option<File>, MetaError> {
        let t = self.inner.lock().unwrap();
        let id = t.files_by_md5.get(&(md5.to_string(), domain));
        Ok(id.and_then(|id| t.files.get(id)).cloned())
    }

    async fn save_file(&self, file: &File) -> Result<(), MetaError> {
        if file.id.is_empty() {
            return Err(MetaError::InvalidArgument("file id must be set before save".into()));
        }
        let mut t = self.inner.lock().unwrap();
        t.files_by_md5
            .insert((file.md5.clone(), file.domain), file.id.clone());
        t.files.insert(file.id.clone(), file.clone());
        Ok(())
    }

    async fn remove_file(&self, id: &ObjectId) -> Result<(), MetaError> {
        let mut t = self.inner.lock().unwrap();
        if let Some(f) = t.files.remove(&id.to_hex()) {
            t.files_by_md5.remove(&(f.md5, f.domain));
        }
        Ok(())
    }

    async fn save_dupl(&self, dupl: &Dupl) -> Result<(), MetaError> {
        self.inner.lock().unwrap().dupls.insert(dupl.id, dupl.clone());
        Ok(())
    }

    async fn lookup_dupl_by_id(&self, id: &ObjectId) -> Result<Option<Dupl>, MetaError> {
        Ok(self.inner.lock().unwrap().dupls.get(id).cloned())
    }

    async fn lookup_dupl_by_refid(&self, rid: &ObjectId) -> Result<Vec<Dupl>, MetaError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .dupls
            .values()
            .filter(|d| &d.reference == rid)
            .cloned()
            .collect())
    }

    async fn remove_dupl(&self, id: &ObjectId) -> Result<(), MetaError> {
        self.inner.lock().unwrap().dupls.remove(id);
        Ok(())
    }

    async fn save_ref(&self, r: &Ref) -> Result<(), MetaError> {
        self.inner.lock().unwrap().refs.insert(r.id, r.clone());
        Ok(())
    }

    async fn lookup_ref_by_id(&self, id: &ObjectId) -> Result<Option<Ref>, MetaError> {
        Ok(self.inner.lock().unwrap().refs.get(id).cloned())
    }

    async fn remove_ref(&self, id: &ObjectId) -> Result<(), MetaError> {
        self.inner.lock().unwrap().refs.remove(id);
        Ok(())
    }

    async fn inc_ref_cnt(&self, id: &ObjectId) -> Result<Option<Ref>, MetaError> {
        let mut t = self.inner.lock().unwrap();
        match t.refs.get_mut(id) {
            Some(r) => {
                r.ref_cnt += 1;
                Ok(Some(r.clone()))
            }
            None => Ok(None),
        }
    }

    async fn dec_ref_cnt(&self, id: &ObjectId) -> Result<Option<Ref>, MetaError> {
        let mut t = self.inner.lock().unwrap();
        match t.refs.get_mut(id) {
            Some(r) => {
                r.ref_cnt -= 1;
                Ok(Some(r.clone()))
            }
            None => Ok(None),
        }
    }

    async fn health_check(&self) -> Result<(), MetaError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_types::FileType;

    #[tokio::test]
    async fn save_and_lookup_file_round_trips() {
        let raw = InMemoryRaw::new();
        let mut f = File::new_for_create(1, FileType::GridFs);
        f.id = ObjectId::new().to_hex();
        f.md5 = "deadbeef".into();
        raw.save_file(&f).await.unwrap();

        let id = ObjectId::from_hex(&f.id).unwrap();
        let found = raw.lookup_file_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.md5, "deadbeef");

        let by_md5 = raw.lookup_file_by_md5("deadbeef", 1).await.unwrap().unwrap();
        assert_eq!(by_md5.id, f.id);
    }

    #[tokio::test]
    async fn ref_counting_tracks_increments_and_decrements() {
        let raw = InMemoryRaw::new();
        let id = ObjectId::new();
        raw.save_ref(&Ref::new(id, 10)).await.unwrap();

        raw.inc_ref_cnt(&id).await.unwrap();
        let r = raw.inc_ref_cnt(&id).await.unwrap().unwrap();
        assert_eq!(r.ref_cnt, 2);

        let r = raw.dec_ref_cnt(&id).await.unwrap().unwrap();
        assert_eq!(r.ref_cnt, 1);
    }
}
