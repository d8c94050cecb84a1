use std::sync::Arc;

use dfs_fileop::FileHandler;
use dfs_types::{Domain, Event, EventKind};

use crate::audit;
use crate::context::TransferContext;
use crate::error::TransferError;
use crate::ops::stat::find_handler_for_read;

/// `Duplicate`: locates the entity via `findFileForRead`, then calls
/// `duplicate` on that exact handler so the new dupl id is minted by the
/// same backend (and, on a tee'd shard, mirrored to the minor).
pub async fn duplicate(ctx: &Arc<TransferContext>, fid: &str, domain: Domain) -> Result<String, TransferError> {
    if fid.is_empty() {
        return Err(TransferError::InvalidArgument("id must not be empty".into()));
    }
    let async_mode = ctx.features.domain_has_access(dfs_config::keys::ASYNC_SAVE_EVENT, domain as u32);

    let Some((handler, _found)) = find_handler_for_read(&ctx.selector, fid, domain).await? else {
        audit::record_event(
            &ctx.audit,
            async_mode,
            Event {
                kind: EventKind::FailDupl,
                fid: fid.to_string(),
                domain,
                biz: String::new(),
                user_id: String::new(),
                description: "file not found".into(),
                timestamp: chrono::Utc::now(),
            },
        )
        .await;
        return Err(dfs_fileop::FileOpError::not_found().into());
    };

    match handler.duplicate(fid, domain).await {
        Ok(new_id) => {
            audit::record_event(
                &ctx.audit,
                async_mode,
                Event {
                    kind: EventKind::SucDupl,
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
                    kind: EventKind::FailDupl,
                    fid: fid.to_string(),
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
