use std::sync::Arc;

use dfs_fileop::FileHandler;
use dfs_types::{Domain, Event, EventKind, SpaceLog, SpaceLogKind};

use crate::audit;
use crate::context::TransferContext;
use crate::error::TransferError;
use crate::ops::stat::find_handler_for_read;

/// `RemoveFile`: resolves the owning handler via `findFileForRead`, then
/// calls `remove` on it. On success, persists a `SpaceLog{Delete}` only if
/// the call actually drove out the last reference (`physically_removed`).
/// `desc`, if given, is additionally persisted as a `CommandDelete` audit
/// event -- the caller's "why was this deleted" annotation.
pub async fn remove_file(
    ctx: &Arc<TransferContext>,
    id: &str,
    domain: Domain,
    desc: Option<&str>,
) -> Result<bool, TransferError> {
    if id.is_empty() {
        return Err(TransferError::InvalidArgument("id must not be empty".into()));
    }
    let Some((handler, found)) = find_handler_for_read(&ctx.selector, id, domain).await? else {
        return Ok(false);
    };

    let async_mode = ctx.features.domain_has_access(dfs_config::keys::ASYNC_SAVE_EVENT, domain as u32);

    if let Some(desc) = desc {
        audit::record_event(
            &ctx.audit,
            async_mode,
            Event {
                kind: EventKind::CommandDelete,
                fid: id.to_string(),
                domain,
                biz: found.file.biz.clone(),
                user_id: found.file.user_id.clone(),
                description: desc.to_string(),
                timestamp: chrono::Utc::now(),
            },
        )
        .await;
    }

    match handler.remove(id, domain).await {
        Ok((physically_removed, meta)) => {
            audit::record_event(
                &ctx.audit,
                async_mode,
                Event {
                    kind: EventKind::SucDelete,
                    fid: id.to_string(),
                    domain,
                    biz: found.file.biz.clone(),
                    user_id: found.file.user_id.clone(),
                    description: String::new(),
                    timestamp: chrono::Utc::now(),
                },
            )
            .await;
            if physically_removed {
                if let Some(meta) = meta {
                    audit::record_space_log(
                        &ctx.audit,
                        async_mode,
                        SpaceLog {
                            kind: SpaceLogKind::Delete,
                            size: meta.size,
                            biz: meta.biz,
                            user_id: meta.user_id,
                            domain,
                            fid: id.to_string(),
                            timestamp: chrono::Utc::now(),
                        },
                    )
                    .await;
                }
            }
            Ok(physically_removed)
        }
        Err(e) => {
            audit::record_event(
                &ctx.audit,
                async_mode,
                Event {
                    kind: EventKind::FailDelete,
                    fid: id.to_string(),
                    domain,
                    biz: found.file.biz.clone(),
                    user_id: found.file.user_id.clone(),
                    description: e.to_string(),
                    timestamp: chrono::Utc::now(),
                },
            )
            .await;
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::duplicate::duplicate;
    use crate::ops::put::put_file;
    use crate::test_support::{context_with, far_future_deadline, fixture, single_shard_selector};
    use bytes::Bytes;
    use dfs_types::{EventKind, File, FileType};
    use futures::stream;

    async fn put(ctx: &Arc<TransferContext>, domain: Domain, buf: &[u8]) -> File {
        let info = File::new_for_create(domain, FileType::GridFs);
        let chunks = stream::iter(vec![Ok::<_, TransferError>(Bytes::copy_from_slice(buf))]);
        put_file(ctx, info, chunks, far_future_deadline()).await.unwrap()
    }

    // Testable property #5: N duplicates then N+1 deletes (the extra against
    // the entity id) leaves nothing behind.
    #[tokio::test]
    async fn deleting_every_reference_physically_removes_the_entity() {
        let ctx = fixture();
        let original = put(&ctx, 2, b"payload").await;

        let dup_a = duplicate(&ctx, &original.id, 2).await.unwrap();
        let dup_b = duplicate(&ctx, &original.id, 2).await.unwrap();

        assert!(!remove_file(&ctx, &dup_a, 2, None).await.unwrap());
        assert!(!remove_file(&ctx, &dup_b, 2, None).await.unwrap());
        assert!(remove_file(&ctx, &original.id, 2, None).await.unwrap());
    }

    #[tokio::test]
    async fn removing_an_unknown_fid_returns_false_without_erroring() {
        let ctx = fixture();
        assert!(!remove_file(&ctx, "000000000000000000000000", 2, None).await.unwrap());
    }

    #[tokio::test]
    async fn records_a_command_delete_event_when_desc_is_given() {
        let (selector, aux) = single_shard_selector();
        let ctx = context_with(selector, aux.clone());
        let original = put(&ctx, 2, b"payload").await;

        remove_file(&ctx, &original.id, 2, Some("operator cleanup")).await.unwrap();

        let events = aux.recorded_events();
        assert!(events.iter().any(|e| e.kind == EventKind::CommandDelete && e.description == "operator cleanup"));
        assert!(events.iter().any(|e| e.kind == EventKind::SucDelete));
    }

    #[tokio::test]
    async fn rejects_empty_id() {
        let ctx = fixture();
        assert!(matches!(
            remove_file(&ctx, "", 2, None).await.unwrap_err(),
            TransferError::InvalidArgument(_)
        ));
    }
}
