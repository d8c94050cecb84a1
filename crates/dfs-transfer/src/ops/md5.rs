use std::sync::Arc;

use dfs_fileop::FileHandler;
use dfs_types::{Domain, Event, EventKind};

use crate::audit;
use crate::context::TransferContext;
use crate::error::TransferError;

/// Resolves `md5` to a primary entity id by trying the normal read handler
/// first, then the migrate handler -- the same preference order
/// `findFileForRead` uses for fid lookups (`SPEC_FULL.md` §4.1, §4.6).
async fn resolve_by_md5(
    ctx: &Arc<TransferContext>,
    md5: &str,
    domain: Domain,
    size: i64,
) -> Result<Option<(Arc<dyn FileHandler>, String)>, TransferError> {
    let (normal, migrate) = ctx.selector.get_handlers_for_read(domain)?;
    for handler in [normal, migrate].into_iter().flatten() {
        match handler.find_by_md5(md5, domain, size).await {
            Ok(real_id) => return Ok(Some((handler, real_id))),
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}

/// `GetByMd5`: resolves `md5` to its entity, then mints a new dupl id
/// pointing at it -- the same "locate, then `Duplicate` on that exact
/// handler" protocol as the `Duplicate` RPC (`SPEC_FULL.md` §4.6).
pub async fn get_by_md5(ctx: &Arc<TransferContext>, md5: &str, domain: Domain, size: i64) -> Result<String, TransferError> {
    if md5.is_empty() {
        return Err(TransferError::InvalidArgument("md5 must not be empty".into()));
    }
    let async_mode = ctx.features.domain_has_access(dfs_config::keys::ASYNC_SAVE_EVENT, domain as u32);

    let Some((handler, real_id)) = resolve_by_md5(ctx, md5, domain, size).await? else {
        audit::record_event(
            &ctx.audit,
            async_mode,
            Event {
                kind: EventKind::FailMd5,
                fid: String::new(),
                domain,
                biz: String::new(),
                user_id: String::new(),
                description: format!("no file for md5 {md5}"),
                timestamp: chrono::Utc::now(),
            },
        )
        .await;
        return Err(dfs_fileop::FileOpError::not_found().into());
    };

    match handler.duplicate(&real_id, domain).await {
        Ok(new_id) => {
            audit::record_event(
                &ctx.audit,
                async_mode,
                Event {
                    kind: EventKind::SucMd5,
                    fid: new_id.clone(),
                    domain,
                    biz: String::new(),
                    user_id: String::new(),
                    description: String::new(),
                    timestamp: chrono::Utc::now(),
                },
            )
            .await;
            Ok(new_id)
        }
        Err(e) => {
            audit::record_event(
                &ctx.audit,
                async_mode,
                Event {
                    kind: EventKind::FailMd5,
                    fid: real_id,
                    domain,
                    biz: String::new(),
                    user_id: String::new(),
                    description: e.to_string(),
                    timestamp: chrono::Utc::now(),
                },
            )
            .await;
            Err(e.into())
        }
    }
}

/// `ExistByMd5`: a lookup-only probe, unlike `GetByMd5` it never mints a new
/// dupl id -- matching `Exist`'s relationship to `Stat` (a side-effect-free
/// existence check, `FileNotFound` translated to `result=false, no-error`
/// rather than an error).
pub async fn exist_by_md5(ctx: &Arc<TransferContext>, md5: &str, domain: Domain, size: i64) -> Result<bool, TransferError> {
    if md5.is_empty() {
        return Err(TransferError::InvalidArgument("md5 must not be empty".into()));
    }
    Ok(resolve_by_md5(ctx, md5, domain, size).await?.is_some())
}
