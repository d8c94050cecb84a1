use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

use dfs_notice::Notice;
use dfs_transfer::{instrumented, CopyRequest, GetFileFrame, TransferContext, TransferError};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};

use dfs_proto::dfs_server::Dfs;
use dfs_proto::{
    get_dfs_servers_rep, get_file_rep, put_file_req, Chunk, CopyReq, CopyRep, DfsServerInfo, DfsServerList, DuplicateReq, DuplicateRep,
    ExistReq, ExistRep, GetByMd5Req, GetByMd5Rep, GetDfsServersReq, GetDfsServersRep, GetFileRep, GetFileReq, Heartbeat,
    NegotiateChunkSizeReq, NegotiateChunkSizeRep, PutFileRep, PutFileReq, RemoveFileRep, RemoveFileReq,
};

/// Payload stored at each child node under `dfs_notice::SHARD_DFS_PATH`:
/// the JSON this server registers itself with at boot, and what
/// `GetDfsServers` reads back out for every live peer.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisteredServer {
    pub id: String,
    pub uri: String,
}

/// The gRPC surface (`SPEC_FULL.md` §6): one method per RPC in `dfs.proto`,
/// each a thin wire-adaptation layer over `dfs_transfer::ops`. Business
/// logic, metrics, and deadline handling all live in `dfs-transfer` --
/// this layer's job is demarshaling, dispatch through `instrumented`, and
/// mapping `TransferError` onto a `tonic::Status`.
pub struct DfsService {
    ctx: Arc<TransferContext>,
    notice: Arc<dyn Notice>,
}

impl DfsService {
    pub fn new(ctx: Arc<TransferContext>, notice: Arc<dyn Notice>) -> Self {
        Self { ctx, notice }
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.ctx.flags.request_deadline
    }
}

fn to_status(err: TransferError) -> Status {
    if err.is_not_found() {
        return Status::not_found(err.to_string());
    }
    match err {
        TransferError::InvalidArgument(msg) => Status::invalid_argument(msg),
        TransferError::DeadlineExceeded => Status::deadline_exceeded(err.to_string()),
        TransferError::Cancelled => Status::cancelled(err.to_string()),
        TransferError::ShieldTimeout => Status::resource_exhausted(err.to_string()),
        other => Status::internal(other.to_string()),
    }
}

fn to_convert_status(err: dfs_proto::ConvertError) -> Status {
    Status::invalid_argument(err.to_string())
}

/// Adapts a `PutFile` client stream into the `Stream<Item = Result<Bytes,
/// TransferError>> + Unpin` shape `dfs_transfer::put_file` expects. The
/// caller has already peeled the leading `FileInfo` frame off before
/// constructing this, so every remaining item must be a `Chunk`.
struct PutFileChunks {
    inner: Streaming<PutFileReq>,
}

impl Stream for PutFileChunks {
    type Item = Result<bytes::Bytes, TransferError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(req))) => match req.data {
                Some(put_file_req::Data::Chunk(chunk)) => Poll::Ready(Some(Ok(chunk.payload))),
                Some(put_file_req::Data::Info(_)) => {
                    Poll::Ready(Some(Err(TransferError::InvalidArgument("unexpected FileInfo frame after the first".into()))))
                }
                None => Poll::Ready(Some(Err(TransferError::InvalidArgument("frame carried no data".into())))),
            },
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(TransferError::Internal(e.to_string())))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[tonic::async_trait]
impl Dfs for DfsService {
    async fn put_file(&self, request: Request<Streaming<PutFileReq>>) -> Result<Response<PutFileRep>, Status> {
        let mut stream = request.into_inner();
        let first = stream
            .message()
            .await?
            .ok_or_else(|| Status::invalid_argument("PutFile stream ended before a FileInfo frame"))?;
        let info = match first.data {
            Some(put_file_req::Data::Info(info)) => info,
            _ => return Err(Status::invalid_argument("first PutFile frame must carry FileInfo")),
        };
        let file: dfs_types::File = info.try_into().map_err(to_convert_status)?;

        let ctx = self.ctx.clone();
        let deadline = self.deadline();
        let chunks = PutFileChunks { inner: stream };
        let closed = instrumented("PutFile", deadline, async move { dfs_transfer::put_file(&ctx, file, chunks, deadline).await })
            .await
            .map_err(to_status)?;

        Ok(Response::new(PutFileRep { file: Some((&closed).into()) }))
    }

    type GetFileStream = Pin<Box<dyn Stream<Item = Result<GetFileRep, Status>> + Send>>;

    async fn get_file(&self, request: Request<GetFileReq>) -> Result<Response<Self::GetFileStream>, Status> {
        let req = request.into_inner();
        let ctx = self.ctx.clone();
        let deadline = self.deadline();
        // `GetFileReq` carries no per-call chunk size; the server streams at
        // its own configured upper bound, which `NegotiateChunkSize` exists
        // to let a client discover ahead of time.
        let chunk_size = ctx.flags.max_chunk_size as usize;
        let fid = req.id.clone();
        let domain = req.domain;

        let rx = instrumented("GetFile", deadline, async move { dfs_transfer::get_file(&ctx, &fid, domain, deadline, chunk_size).await })
            .await
            .map_err(to_status)?;

        let stream = ReceiverStream::new(rx).map(|frame| {
            frame.map(|f| match f {
                GetFileFrame::Info(info) => GetFileRep { data: Some(get_file_rep::Data::Info((&info).into())) },
                GetFileFrame::Chunk { pos, length, payload } => {
                    GetFileRep { data: Some(get_file_rep::Data::Chunk(Chunk { pos, length, payload })) }
                }
            })
            .map_err(to_status)
        });
        Ok(Response::new(Box::pin(stream)))
    }

    async fn copy(&self, request: Request<CopyReq>) -> Result<Response<CopyRep>, Status> {
        let req = request.into_inner();
        let ctx = self.ctx.clone();
        let deadline = self.deadline();
        let copy_req = CopyRequest {
            src_fid: req.src_fid,
            src_domain: req.src_domain,
            dst_domain: req.dst_domain,
            dst_uid: req.dst_uid,
            dst_biz: req.dst_biz,
        };
        let fid = instrumented("Copy", deadline, async move { dfs_transfer::copy(&ctx, copy_req).await })
            .await
            .map_err(to_status)?;
        Ok(Response::new(CopyRep { fid }))
    }

    async fn duplicate(&self, request: Request<DuplicateReq>) -> Result<Response<DuplicateRep>, Status> {
        let req = request.into_inner();
        let ctx = self.ctx.clone();
        let deadline = self.deadline();
        let id = instrumented("Duplicate", deadline, async move { dfs_transfer::duplicate(&ctx, &req.id, req.domain).await })
            .await
            .map_err(to_status)?;
        Ok(Response::new(DuplicateRep { id }))
    }

    async fn remove_file(&self, request: Request<RemoveFileReq>) -> Result<Response<RemoveFileRep>, Status> {
        let req = request.into_inner();
        let ctx = self.ctx.clone();
        let deadline = self.deadline();
        let desc = if req.desc.is_empty() { None } else { Some(req.desc) };
        let result = instrumented("RemoveFile", deadline, async move {
            dfs_transfer::remove_file(&ctx, &req.id, req.domain, desc.as_deref()).await
        })
        .await
        .map_err(to_status)?;
        Ok(Response::new(RemoveFileRep { result }))
    }

    async fn exist(&self, request: Request<ExistReq>) -> Result<Response<ExistRep>, Status> {
        let req = request.into_inner();
        let ctx = self.ctx.clone();
        let deadline = self.deadline();
        let shield_timeout = ctx.flags.request_deadline;
        let result = instrumented("Exist", deadline, async move { dfs_transfer::exist(&ctx, &req.id, req.domain, shield_timeout).await })
            .await
            .map_err(to_status)?;
        Ok(Response::new(ExistRep { result }))
    }

    async fn stat(&self, request: Request<GetFileReq>) -> Result<Response<PutFileRep>, Status> {
        let req = request.into_inner();
        let ctx = self.ctx.clone();
        let deadline = self.deadline();
        let shield_timeout = ctx.flags.request_deadline;
        let found = instrumented("Stat", deadline, async move { dfs_transfer::stat(&ctx, &req.id, req.domain, shield_timeout).await })
            .await
            .map_err(to_status)?;
        let found = found.ok_or_else(|| Status::not_found("file not found"))?;
        Ok(Response::new(PutFileRep { file: Some((&found.file).into()) }))
    }

    async fn get_by_md5(&self, request: Request<GetByMd5Req>) -> Result<Response<GetByMd5Rep>, Status> {
        let req = request.into_inner();
        let ctx = self.ctx.clone();
        let deadline = self.deadline();
        let fid = instrumented("GetByMd5", deadline, async move { dfs_transfer::get_by_md5(&ctx, &req.md5, req.domain, req.size).await })
            .await
            .map_err(to_status)?;
        Ok(Response::new(GetByMd5Rep { fid }))
    }

    async fn exist_by_md5(&self, request: Request<GetByMd5Req>) -> Result<Response<ExistRep>, Status> {
        let req = request.into_inner();
        let ctx = self.ctx.clone();
        let deadline = self.deadline();
        let result =
            instrumented("ExistByMd5", deadline, async move { dfs_transfer::exist_by_md5(&ctx, &req.md5, req.domain, req.size).await })
                .await
                .map_err(to_status)?;
        Ok(Response::new(ExistRep { result }))
    }

    async fn negotiate_chunk_size(&self, request: Request<NegotiateChunkSizeReq>) -> Result<Response<NegotiateChunkSizeRep>, Status> {
        let req = request.into_inner();
        let size = dfs_transfer::negotiate_chunk_size(&self.ctx.flags, req.size.max(0) as u32);
        Ok(Response::new(NegotiateChunkSizeRep { size: size as i32 }))
    }

    type GetDfsServersStream = Pin<Box<dyn Stream<Item = Result<GetDfsServersRep, Status>> + Send>>;

    async fn get_dfs_servers(&self, _request: Request<GetDfsServersReq>) -> Result<Response<Self::GetDfsServersStream>, Status> {
        let notice = self.notice.clone();
        let mut children = notice.watch_children(dfs_notice::SHARD_DFS_PATH);
        let heartbeat_interval = self.ctx.flags.heartbeat_interval;
        let (tx, rx) = mpsc::channel(4);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat_interval);
            ticker.tick().await; // first tick fires immediately; don't heartbeat before the initial push
            loop {
                tokio::select! {
                    paths = children.recv() => {
                        let Some(paths) = paths else { break };
                        let mut servers = Vec::with_capacity(paths.len());
                        for path in &paths {
                            let Ok(data) = notice.get_data(path).await else { continue };
                            let Ok(info) = serde_json::from_slice::<RegisteredServer>(&data) else { continue };
                            servers.push(DfsServerInfo { id: info.id, uri: info.uri });
                        }
                        let rep = GetDfsServersRep { data: Some(get_dfs_servers_rep::Data::Sl(DfsServerList { servers })) };
                        if tx.send(Ok(rep)).await.is_err() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let hb = Heartbeat { timestamp_unix_millis: chrono::Utc::now().timestamp_millis() };
                        let rep = GetDfsServersRep { data: Some(get_dfs_servers_rep::Data::Hb(hb)) };
                        if tx.send(Ok(rep)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}
