use std::sync::Arc;
use std::time::Instant;

use dfs_fileop::{DfsFile, FileHandler};
use dfs_types::{Domain, Event, EventKind, File, SpaceLog, SpaceLogKind};

use crate::audit;
use crate::context::TransferContext;
use crate::error::TransferError;
use crate::ops::duplicate::duplicate;
use crate::ops::get::open_for_read;

const COPY_CHUNK_BYTES: usize = 64 * 1024;

/// `CopyReq{SrcFid,SrcDomain,DstDomain,DstUid,DstBiz}` (`SPEC_FULL.md` §6).
pub struct CopyRequest {
    pub src_fid: String,
    pub src_domain: Domain,
    pub dst_domain: Domain,
    pub dst_uid: String,
    pub dst_biz: String,
}

/// `Copy`: a same-domain copy is just `Duplicate` under a different name --
/// no bytes move, only a new reference is minted. A cross-domain copy reads
/// the source end to end and writes a brand-new entity on the destination
/// domain's shard, persisting the same `SpaceLog`/`Event` pair `PutFile`
/// does (`SPEC_FULL.md` §4.6).
pub async fn copy(ctx: &Arc<TransferContext>, req: CopyRequest) -> Result<String, TransferError> {
    if req.src_fid.is_empty() {
        return Err(TransferError::InvalidArgument("src_fid must not be empty".into()));
    }
    if req.dst_domain <= 0 {
        return Err(TransferError::InvalidArgument("dst_domain must be positive".into()));
    }

    if req.src_domain == req.dst_domain {
        return duplicate(ctx, &req.src_fid, req.src_domain).await;
    }

    let mut src = open_for_read(&ctx.selector, &req.src_fid, req.src_domain).await?;
    let src_info = src.get_file_info().clone();

    let mut dst_info = File::new_for_create(req.dst_domain, src_info.file_type);
    dst_info.name = src_info.name.clone();
    dst_info.biz = req.dst_biz.clone();
    dst_info.user_id = req.dst_uid.clone();

    let handler = ctx.selector.get_handler_for_write(req.dst_domain)?;
    let mut dst = handler.create(dst_info).await?;

    let started = Instant::now();
    let mut buf = vec![0u8; COPY_CHUNK_BYTES];
    let stream_result: Result<(), TransferError> = async {
        loop {
            let n = src.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            dst.write(&buf[..n]).await?;
        }
        Ok(())
    }
    .await;

    let _ = src.close().await;

    if let Err(e) = stream_result {
        let _ = dst.close().await;
        return Err(e);
    }

    let closed = dst.close().await?;
    ctx.put_rate.record(closed.size.max(0) as u64, started.elapsed());

    let async_mode = ctx.features.domain_has_access(dfs_config::keys::ASYNC_SAVE_EVENT, req.dst_domain as u32);
    audit::record_event(
        &ctx.audit,
        async_mode,
        Event {
            kind: EventKind::SucCreate,
            fid: closed.id.clone(),
            domain: req.dst_domain,
            biz: req.dst_biz.clone(),
            user_id: req.dst_uid.clone(),
            description: format!("copied from {}", req.src_fid),
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
            biz: req.dst_biz,
            user_id: req.dst_uid,
            domain: req.dst_domain,
            fid: closed.id.clone(),
            timestamp: chrono::Utc::now(),
        },
    )
    .await;

    Ok(closed.id)
}
