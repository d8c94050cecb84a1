use crate::error::MetaError;
use async_trait::async_trait;
use dfs_types::{Domain, Dupl, File, ObjectId, Ref};

/// Low-level, backend-specific row operations. A backend (in-memory, or a
/// future Mongo-/Cassandra-style adapter) implements only this trait; the
/// dupl/ref lifecycle logic in [`crate::duplref::DuplRefStore`] is generic
/// over it and never touches storage directly.
#[async_trait]
pub trait RawMetaOp: Send + Sync {
    async fn lookup_file_by_id(&self, id: &ObjectId) -> Result<Option<File>, MetaError>;
    async fn lookup_file_by_md5(&self, md5: &str, domain: Domain) -> Result<Option<File>, MetaError>;
    async fn save_file(&self, file: &File) -> Result<(), MetaError>;
    async fn remove_file(&self, id: &ObjectId) -> Result<(), MetaError>;

    async fn save_dupl(&self, dupl: &Dupl) -> Result<(), MetaError>;
    async fn lookup_dupl_by_id(&self, id: &ObjectId) -> Result<Option<Dupl>, MetaError>;
    /// No use right now -- kept for parity and for Open Question resolution
    /// around symmetric file/ref lookup; see DESIGN.md.
    async fn lookup_dupl_by_refid(&self, rid: &ObjectId) -> Result<Vec<Dupl>, MetaError>;
    async fn remove_dupl(&self, id: &ObjectId) -> Result<(), MetaError>;

    async fn save_ref(&self, r: &Ref) -> Result<(), MetaError>;
    async fn lookup_ref_by_id(&self, id: &ObjectId) -> Result<Option<Ref>, MetaError>;
    async fn remove_ref(&self, id: &ObjectId) -> Result<(), MetaError>;
    async fn inc_ref_cnt(&self, id: &ObjectId) -> Result<Option<Ref>, MetaError>;
    async fn dec_ref_cnt(&self, id: &ObjectId) -> Result<Option<Ref>, MetaError>;

    async fn health_check(&self) -> Result<(), MetaError>;
}
