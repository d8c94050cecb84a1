//! The streamed file transfer state machine: the nine RPC business
//! functions (`PutFile`/`GetFile`/`Copy`/`Duplicate`/`RemoveFile`/`Exist`/
//! `Stat`/`GetByMd5`/`ExistByMd5`/`NegotiateChunkSize`) plus the
//! deadline/pre-judgment/shield concurrency primitives they share.
//! `SPEC_FULL.md` §4.6, §5.

mod audit;
pub mod context;
pub mod deadline;
mod error;
mod ops;
mod prejudge;
mod rate;
mod shield;
#[cfg(test)]
mod test_support;

pub use context::TransferContext;
pub use deadline::{instrumented, with_deadline};
pub use error::TransferError;
pub use ops::{
    copy, duplicate, exist, exist_by_md5, find_file_for_read, find_handler_for_read, get_by_md5, get_file, negotiate_chunk_size,
    put_file, remove_file, stat, CopyRequest, GetFileFrame,
};
pub use rate::RateSampler;
pub use shield::{unwrap_shielded, Shield, ShieldOutcome};
