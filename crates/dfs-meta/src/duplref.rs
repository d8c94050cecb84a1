use crate::error::MetaError;
use crate::raw::RawMetaOp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dfs_types::{get_dupl_id, get_real_id, is_dupl_id, Domain, Dupl, File, ObjectId, Ref};

/// The fid-level metadata contract the rest of the system (FileHandlers,
/// decorators) depends on. Implemented generically by [`DuplRefStore`] over
/// any [`RawMetaOp`] backend, so every backend gets the same dedup semantics.
#[async_trait]
pub trait MetaStore: Send + Sync {
    async fn find(&self, fid: &str) -> Result<File, MetaError>;
    async fn save(&self, file: &File) -> Result<(), MetaError>;
    async fn find_by_md5(&self, md5: &str, domain: Domain) -> Result<File, MetaError>;

    /// Duplicates an entry for a file (not its content). Returns the new
    /// `did`-prefixed fid.
    async fn duplicate(&self, fid: &str) -> Result<String, MetaError> {
        self.duplicate_with_id(fid, None, None).await
    }

    async fn duplicate_with_id(
        &self,
        fid: &str,
        dup_id: Option<ObjectId>,
        create_date: Option<DateTime<Utc>>,
    ) -> Result<String, MetaError>;

    /// Deletes a duplication or a real file. Returns `(to_be_deleted,
    /// entity_id_to_be_deleted)`: when the fid referred to the last
    /// reference to an entity, the caller must also delete its content.
    async fn delete(&self, fid: &str) -> Result<(bool, Option<ObjectId>), MetaError>;
}

/// Generic dupl/ref lifecycle built over any [`RawMetaOp`] backend. Mirrors
/// the upstream `DuplDra` logic verbatim: a `File` row is the entity anchor;
/// every entity (real or duplicated) gets a self-referential `Dupl` row the
/// first time it is duplicated, plus a `Ref` row tracking the live count of
/// duplicates pointing at it.
pub struct DuplRefStore<T: RawMetaOp> {
    raw: T,
}

impl<T: RawMetaOp> DuplRefStore<T> {
    pub fn new(raw: T) -> Self {
        Self { raw }
    }

    async fn search(&self, given_id: &str) -> Result<File, MetaError> {
        if !is_dupl_id(given_id) {
            return self
                .raw
                .lookup_file_by_id(&parse_id(given_id)?)
                .await?
                .ok_or(MetaError::FileNotFound);
        }

        let real_id = parse_id(get_real_id(given_id))?;
        let dupl = self
            .raw
            .lookup_dupl_by_id(&real_id)
            .await?
            .ok_or(MetaError::FileNotFound)?;

        self.raw
            .lookup_file_by_id(&dupl.reference)
            .await?
            .ok_or(MetaError::FileNotFound)
    }

    async fn save_ref_and_dupl_if_absent(
        &self,
        primary_id: ObjectId,
        size: i64,
        domain: Domain,
    ) -> Result<Ref, MetaError> {
        if let Some(existing) = self.raw.lookup_ref_by_id(&primary_id).await? {
            return Ok(existing);
        }

        let new_ref = Ref::new(primary_id, size);
        self.raw.save_ref(&new_ref).await?;

        let anchor = Dupl {
            id: primary_id,
            reference: primary_id,
            length: size,
            create_date: Utc::now(),
            domain,
        };
        self.raw.save_dupl(&anchor).await?;

        Ok(new_ref)
    }

    /// Decrements a ref's count; removes the `Ref` row once it drops below
    /// zero occupancy (no duplicates and no anchor left referencing it).
    /// Returns the post-decrement count, or `-1` if the row no longer exists.
    async fn dec_and_remove(&self, id: &ObjectId) -> Result<i64, MetaError> {
        match self.raw.dec_ref_cnt(id).await? {
            None => {
                let _ = self.raw.remove_ref(id).await;
                Ok(-1)
            }
            Some(r) => {
                if r.ref_cnt < 0 {
                    let _ = self.raw.remove_ref(id).await;
                }
                Ok(r.ref_cnt)
            }
        }
    }

    async fn del_file(&self, did: &str, entity_id: &ObjectId) -> Result<(bool, Option<ObjectId>), MetaError> {
        if is_dupl_id(did) {
            tracing::debug!(did, "delete of dupl-shaped id with no dupl row, ignored");
            return Ok((false, None));
        }

        match self.raw.lookup_ref_by_id(entity_id).await? {
            Some(_) => {
                tracing::debug!(did, "entity still has live references, ignored");
                Ok((false, None))
            }
            None => {
                self.raw.remove_file(entity_id).await?;
                Ok((true, Some(*entity_id)))
            }
        }
    }

    async fn del_file_and_dupl(&self, dupl: &Dupl) -> Result<(bool, Option<ObjectId>), MetaError> {
        self.raw.remove_dupl(&dupl.id).await?;

        let status = self.dec_and_remove(&dupl.reference).await?;
        if status < 0 {
            // The ref row is gone -- per the open question on reference
            // resurrection (SPEC_FULL.md §9), a concurrent Duplicate may
            // race to recreate it between our decrement and here. Removing
            // the file row is still safe: FileHandler's entity-delete is a
            // no-op if the ref row reappears, so at worst this leaves an
            // orphaned entity blob for the recovery path to eventually
            // reclaim, never a dangling reference to a missing file row.
            self.raw.remove_file(&dupl.reference).await?;
            return Ok((true, Some(dupl.reference)));
        }

        Ok((false, None))
    }
}

#[async_trait]
impl<T: RawMetaOp> MetaStore for DuplRefStore<T> {
    async fn find(&self, fid: &str) -> Result<File, MetaError> {
        self.search(fid).await
    }

    async fn save(&self, file: &File) -> Result<(), MetaError> {
        self.raw.save_file(file).await
    }

    async fn find_by_md5(&self, md5: &str, domain: Domain) -> Result<File, MetaError> {
        self.raw
            .lookup_file_by_md5(md5, domain)
            .await?
            .ok_or(MetaError::FileNotFound)
    }

    async fn duplicate_with_id(
        &self,
        fid: &str,
        dup_id: Option<ObjectId>,
        create_date: Option<DateTime<Utc>>,
    ) -> Result<String, MetaError> {
        let primary = self.search(fid).await?;
        let primary_id = parse_id(&primary.id)?;

        let r = self
            .save_ref_and_dupl_if_absent(primary_id, primary.size, primary.domain)
            .await?;
        self.raw.inc_ref_cnt(&r.id).await?;

        let new_dupl_id = dup_id.unwrap_or_else(ObjectId::new);
        let dupl = Dupl {
            id: new_dupl_id,
            reference: r.id,
            length: primary.size,
            create_date: create_date.unwrap_or_else(Utc::now),
            domain: primary.domain,
        };
        self.raw.save_dupl(&dupl).await?;

        Ok(get_dupl_id(&dupl.id.to_hex()))
    }

    async fn delete(&self, fid: &str) -> Result<(bool, Option<ObjectId>), MetaError> {
        let real_id = parse_id(get_real_id(fid))?;

        match self.raw.lookup_dupl_by_id(&real_id).await? {
            None => self.del_file(fid, &real_id).await,
            Some(dupl) => self.del_file_and_dupl(&dupl).await,
        }
    }
}

fn parse_id(s: &str) -> Result<ObjectId, MetaError> {
    ObjectId::from_hex(s).ok_or_else(|| MetaError::InvalidArgument(format!("not a valid id: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRaw;
    use dfs_types::FileType;

    fn new_store() -> DuplRefStore<InMemoryRaw> {
        DuplRefStore::new(InMemoryRaw::new())
    }

    async fn put_file(store: &DuplRefStore<InMemoryRaw>, md5: &str, domain: Domain, size: i64) -> File {
        let mut f = File::new_for_create(domain, FileType::GridFs);
        f.id = ObjectId::new().to_hex();
        f.md5 = md5.to_string();
        f.size = size;
        store.save(&f).await.unwrap();
        f
    }

    // Testable property #4/#5: duplicating N times then deleting N dupls
    // preserves the entity; the (N+1)th deletion (of the real file) removes
    // it for good.
    #[tokio::test]
    async fn dupl_ref_lifecycle_preserves_entity_until_last_reference_drops() {
        let store = new_store();
        let f = put_file(&store, "abc123", 7, 99).await;

        let d1 = store.duplicate(&f.id).await.unwrap();
        let d2 = store.duplicate(&f.id).await.unwrap();
        assert!(dfs_types::is_dupl_id(&d1));
        assert!(dfs_types::is_dupl_id(&d2));

        let (deleted1, entity1) = store.delete(&d1).await.unwrap();
        assert!(!deleted1);
        assert!(entity1.is_none());

        let (deleted2, entity2) = store.delete(&d2).await.unwrap();
        assert!(!deleted2);
        assert!(entity2.is_none());

        // entity itself is untouched by duplicate/delete of its dupls
        assert!(store.find(&f.id).await.is_ok());

        let (deleted3, entity3) = store.delete(&f.id).await.unwrap();
        assert!(deleted3);
        assert_eq!(entity3.unwrap().to_hex(), f.id);
    }

    #[tokio::test]
    async fn find_through_a_dupl_resolves_to_the_primary_file() {
        let store = new_store();
        let f = put_file(&store, "md5x", 3, 10).await;
        let d = store.duplicate(&f.id).await.unwrap();

        let resolved = store.find(&d).await.unwrap();
        assert_eq!(resolved.id, f.id);
    }

    #[tokio::test]
    async fn find_by_md5_round_trips() {
        let store = new_store();
        let f = put_file(&store, "hello-md5", 1, 42).await;
        let found = store.find_by_md5("hello-md5", 1).await.unwrap();
        assert_eq!(found.id, f.id);
    }
}
