use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use dfs_fileop::{DfsFile, FileHandler, FileOpError};
use dfs_selector::HandlerSelector;
use dfs_types::{Domain, Event, EventKind, File};
use tokio::sync::mpsc;

use crate::audit;
use crate::context::TransferContext;
use crate::deadline::remaining;
use crate::error::TransferError;
use crate::prejudge::prejudge;

/// One frame of a `GetFile` server-stream response: a leading `FileInfo`
/// frame, followed by zero or more `Chunk` frames. `SPEC_FULL.md` §6.
#[derive(Debug, Clone)]
pub enum GetFileFrame {
    Info(File),
    Chunk { pos: i64, length: i32, payload: Bytes },
}

/// `openFileForRead` (`SPEC_FULL.md` §4.4, §4.6): tries the migrate handler
/// first, then falls back to normal transparently on a not-found. Shared by
/// `GetFile` and `Copy`, both of which need an actual data handle rather than
/// just `findFileForRead`'s metadata-only lookup.
pub(crate) async fn open_for_read(
    selector: &HandlerSelector,
    fid: &str,
    domain: Domain,
) -> Result<Box<dyn DfsFile>, TransferError> {
    let (normal, migrate) = selector.get_handlers_for_read(domain)?;
    for handler in [migrate, normal].into_iter().flatten() {
        match handler.open(fid, domain).await {
            Ok(file) => return Ok(file),
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(FileOpError::not_found().into())
}

/// `GetFile`: opens `fid` for read, optionally pre-judges against the
/// current observed get-rate, then streams `FileInfo` followed by chunked
/// payload frames on a background task. The returned channel is what the
/// wire layer (`dfs-server`) forwards onto the client's server-stream; a
/// zero-length read with no error ends the loop, matching the original's
/// "zero-length-and-nil-error terminates as EOF".
pub async fn get_file(
    ctx: &Arc<TransferContext>,
    fid: &str,
    domain: Domain,
    deadline: Instant,
    chunk_size: usize,
) -> Result<mpsc::Receiver<Result<GetFileFrame, TransferError>>, TransferError> {
    if fid.is_empty() {
        return Err(TransferError::InvalidArgument("id must not be empty".into()));
    }
    if chunk_size == 0 {
        return Err(TransferError::InvalidArgument("chunk size must be positive".into()));
    }

    let async_mode = ctx.features.domain_has_access(dfs_config::keys::ASYNC_SAVE_EVENT, domain as u32);

    let mut file = match open_for_read(&ctx.selector, fid, domain).await {
        Ok(file) => file,
        Err(e) if e.is_not_found() => {
            audit::record_event(
                &ctx.audit,
                async_mode,
                Event {
                    kind: EventKind::FailRead,
                    fid: fid.to_string(),
                    domain,
                    biz: String::new(),
                    user_id: String::new(),
                    description: "file not found".into(),
                    timestamp: chrono::Utc::now(),
                },
            )
            .await;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    if ctx.features.domain_has_access(dfs_config::keys::PRE_JUDGE_GET, domain as u32) {
        let size = file.get_file_info().size;
        if size > 0 {
            if let Err(e) = prejudge(size, ctx.get_rate.current_bps(), remaining(deadline)) {
                dfs_metrics::record_prejudge_exceed("GetFile");
                let _ = file.close().await;
                return Err(e);
            }
        }
    }

    let info = file.get_file_info().clone();
    let biz = info.biz.clone();
    let (tx, rx) = mpsc::channel(4);
    let rate_sampler_handle = Arc::clone(ctx);

    tokio::spawn(async move {
        if tx.send(Ok(GetFileFrame::Info(info))).await.is_err() {
            let _ = file.close().await;
            return;
        }

        let mut buf = vec![0u8; chunk_size];
        let mut pos: i64 = 0;
        let mut total: u64 = 0;
        let started = Instant::now();

        loop {
            match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    total += n as u64;
                    let frame = GetFileFrame::Chunk {
                        pos,
                        length: n as i32,
                        payload: Bytes::copy_from_slice(&buf[..n]),
                    };
                    pos += n as i64;
                    if tx.send(Ok(frame)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    break;
                }
            }
        }

        let _ = file.close().await;
        let instantaneous_bps = rate_sampler_handle.get_rate.record(total, started.elapsed());
        dfs_metrics::record_transfer_rate("GetFile", instantaneous_bps / 1024.0);
        dfs_metrics::record_file_size("GetFile", &biz, total as f64);
    });

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{far_future_deadline, fixture};
    use crate::ops::put::put_file;
    use bytes::Bytes as ByteBuf;
    use dfs_types::FileType;
    use futures::stream;

    async fn put(ctx: &Arc<crate::context::TransferContext>, domain: Domain, buf: &[u8]) -> File {
        let info = File::new_for_create(domain, FileType::GridFs);
        let chunks = stream::iter(vec![Ok::<_, TransferError>(ByteBuf::copy_from_slice(buf))]);
        put_file(ctx, info, chunks, far_future_deadline()).await.unwrap()
    }

    // S1: Get streams back the FileInfo frame then the exact payload bytes.
    #[tokio::test]
    async fn get_streams_info_then_exact_bytes() {
        let ctx = fixture();
        let buf = vec![9u8; 2049];
        let meta = put(&ctx, 2, &buf).await;

        let mut rx = get_file(&ctx, &meta.id, 2, far_future_deadline(), 512).await.unwrap();
        let first = rx.recv().await.unwrap().unwrap();
        let info = match first {
            GetFileFrame::Info(info) => info,
            other => panic!("expected an Info frame first, got {other:?}"),
        };
        assert_eq!(info.size, 2049);

        let mut out = Vec::new();
        while let Some(frame) = rx.recv().await {
            match frame.unwrap() {
                GetFileFrame::Chunk { payload, .. } => out.extend_from_slice(&payload),
                GetFileFrame::Info(_) => panic!("unexpected second Info frame"),
            }
        }
        assert_eq!(out, buf);
    }

    #[tokio::test]
    async fn not_found_fid_records_a_fail_read_event() {
        let ctx = fixture();
        let err = get_file(&ctx, "000000000000000000000000", 2, far_future_deadline(), 1024)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn rejects_empty_fid_and_zero_chunk_size() {
        let ctx = fixture();
        assert!(matches!(
            get_file(&ctx, "", 2, far_future_deadline(), 1024).await.unwrap_err(),
            TransferError::InvalidArgument(_)
        ));
        let meta = put(&ctx, 2, b"x").await;
        assert!(matches!(
            get_file(&ctx, &meta.id, 2, far_future_deadline(), 0).await.unwrap_err(),
            TransferError::InvalidArgument(_)
        ));
    }
}
