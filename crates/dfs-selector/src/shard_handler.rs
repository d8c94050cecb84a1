use dfs_fileop::FileHandler;
use dfs_types::{Domain, ObjectId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A registered shard: its composed handler plus the health flag the
/// probe loop flips and the routing/degrade logic reads.
pub struct ShardEntry {
    pub name: String,
    pub handler: Arc<dyn FileHandler>,
    healthy: AtomicBool,
}

impl ShardEntry {
    pub fn new(name: impl Into<String>, handler: Arc<dyn FileHandler>) -> Self {
        Self { name: name.into(), handler, healthy: AtomicBool::new(true) }
    }

    pub fn is_ok(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn set_ok(&self, ok: bool) {
        self.healthy.store(ok, Ordering::Release);
    }
}

/// A degrade-journal row replayed into a shard's recovery channel once its
/// primary is healthy again: enough to re-open the file on the degrade
/// shard and re-create it on the real one.
#[derive(Debug, Clone)]
pub struct FileRecoveryInfo {
    pub id: ObjectId,
    pub fid: String,
    pub domain: Domain,
}

/// Streams `info`'s bytes from `src` (the degrade shard) to `dst` (the
/// shard that just came back healthy), verifying the copy landed at the
/// expected size before the caller removes the journal row.
pub(crate) async fn copy_file(
    dst: &dyn FileHandler,
    src: &dyn FileHandler,
    info: &FileRecoveryInfo,
) -> Result<(), dfs_fileop::FileOpError> {
    let mut reader = src.open(&info.fid, info.domain).await?;
    let source_info = reader.get_file_info().clone();

    let mut writer = dst.create(source_info.clone()).await?;
    let mut buf = [0u8; 4096];
    let mut copied: i64 = 0;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write(&buf[..n]).await?;
        copied += n as i64;
    }
    reader.close().await?;
    let written = writer.close().await?;

    if copied != source_info.size || written.size != source_info.size {
        return Err(dfs_fileop::FileOpError::invalid_argument(format!(
            "recovery copy size mismatch for {}: expected {}, wrote {}",
            info.fid, source_info.size, written.size
        )));
    }
    Ok(())
}
