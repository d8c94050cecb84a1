use crate::{Domain, ObjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which storage backend a `File`'s bytes live on. `None` is never a valid
/// value to persist; `FileHandler::create` rejects it with `InvalidType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    None,
    GlusterFs,
    GridFs,
    SeaweedFs,
}

impl Default for FileType {
    fn default() -> Self {
        FileType::None
    }
}

/// Entity metadata row. `id` is the primary key; `(md5, domain)` is an index
/// used for dedup lookup, ordered by `upload_date desc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    pub biz: String,
    pub name: String,
    pub md5: String,
    pub user_id: String,
    pub domain: Domain,
    pub size: i64,
    pub chunk_size: i32,
    pub upload_date: DateTime<Utc>,
    pub file_type: FileType,
    pub ext_attr: HashMap<String, String>,
}

impl File {
    /// A filled-in-as-we-go metadata record for a file about to be created.
    /// `id` is left empty when the caller wants the store to mint one.
    pub fn new_for_create(domain: Domain, file_type: FileType) -> Self {
        Self {
            id: String::new(),
            biz: String::new(),
            name: String::new(),
            md5: String::new(),
            user_id: String::new(),
            domain,
            size: 0,
            chunk_size: 0,
            upload_date: Utc::now(),
            file_type,
            ext_attr: HashMap::new(),
        }
    }
}

/// A lightweight reference record pointing at a primary File's entity id.
/// `id == ref_id` marks the self-referential Dupl created alongside a Ref
/// row's first insertion (see `SPEC_FULL.md` §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dupl {
    pub id: ObjectId,
    pub reference: ObjectId,
    pub length: i64,
    pub create_date: DateTime<Utc>,
    pub domain: Domain,
}

impl Dupl {
    pub fn is_self_referential(&self) -> bool {
        self.id == self.reference
    }
}
