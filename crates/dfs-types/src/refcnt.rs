use crate::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The per-entity reference counter row. A Ref exists iff at least one Dupl
/// targets it, or the underlying File has been referenced at least once.
/// `ref_cnt` may go transiently negative: negative means "physically delete
/// on next sweep" (see `SPEC_FULL.md` §4.2's tie-break rule).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ref {
    pub id: ObjectId,
    pub ref_cnt: i64,
    pub length: Option<i64>,
    pub upload_date: Option<DateTime<Utc>>,
}

impl Ref {
    pub fn new(id: ObjectId, length: i64) -> Self {
        Self {
            id,
            ref_cnt: 0,
            length: Some(length),
            upload_date: Some(Utc::now()),
        }
    }
}
