use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use dfs_fileop::{DfsFile, FileHandler};
use dfs_types::{Event, EventKind, File, SpaceLog, SpaceLogKind};
use futures::{Stream, StreamExt};

use crate::audit;
use crate::context::TransferContext;
use crate::deadline::remaining;
use crate::error::TransferError;
use crate::prejudge::prejudge;

/// `PutFile` (`SPEC_FULL.md` §4.6). The caller has already demarshaled the
/// client stream's first frame into `info` -- failing the stream when that
/// frame is missing or doesn't carry a `FileInfo` is the wire layer's job,
/// in `dfs-server`, not this function's.
pub async fn put_file<S>(
    ctx: &Arc<TransferContext>,
    info: File,
    mut chunks: S,
    deadline: Instant,
) -> Result<File, TransferError>
where
    S: Stream<Item = Result<Bytes, TransferError>> + Unpin,
{
    if info.domain <= 0 {
        return Err(TransferError::InvalidArgument("domain must be positive".into()));
    }

    let handler = ctx.selector.get_handler_for_write(info.domain)?;

    if info.size > 0 && ctx.features.domain_has_access(dfs_config::keys::PRE_JUDGE_PUT, info.domain as u32) {
        if let Err(e) = prejudge(info.size, ctx.put_rate.current_bps(), remaining(deadline)) {
            dfs_metrics::record_prejudge_exceed("PutFile");
            return Err(e);
        }
    }

    let domain = info.domain;
    let biz = info.biz.clone();
    let user_id = info.user_id.clone();

    let mut file = handler.create(info).await?;

    let started = Instant::now();
    let write_result: Result<(), TransferError> = async {
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            file.write(&chunk).await?;
        }
        Ok(())
    }
    .await;

    if let Err(e) = write_result {
        // deferred close: best-effort, mirrors "on any write error: return,
        // the deferred close will try to delete the entity".
        let _ = file.close().await;
        return Err(e);
    }

    let closed = file.close().await?;
    let instantaneous_bps = ctx.put_rate.record(closed.size.max(0) as u64, started.elapsed());
    dfs_metrics::record_transfer_rate("PutFile", instantaneous_bps / 1024.0);
    dfs_metrics::record_file_size("PutFile", &closed.biz, closed.size.max(0) as f64);

    let async_mode = ctx.features.domain_has_access(dfs_config::keys::ASYNC_SAVE_EVENT, domain as u32);
    audit::record_event(
        &ctx.audit,
        async_mode,
        Event {
            kind: EventKind::SucCreate,
            fid: closed.id.clone(),
            domain,
            biz: biz.clone(),
            user_id: user_id.clone(),
            description: String::new(),
            timestamp: chrono::Utc::now(),
        },
    )
    .await;
    audit::record_space_log(
        &ctx.audit,
        async_mode,
        SpaceLog {
            kind: SpaceLogKind::Create,
            size: closed.size,
            biz,
            user_id,
            domain,
            fid: closed.id.clone(),
            timestamp: chrono::Utc::now(),
        },
    )
    .await;

    Ok(closed)
}
