use std::sync::Arc;
use std::time::Duration;

use dfs_fileop::{FileHandler, FoundFile};
use dfs_selector::HandlerSelector;
use dfs_types::Domain;

use crate::context::TransferContext;
use crate::error::TransferError;
use crate::shield::{unwrap_shielded, ShieldOutcome};

/// `findFileForRead`: tries the normal read handler, then the migrate
/// handler, returning the first hit along with the handler that produced it
/// -- `Duplicate`/`RemoveFile` act on that exact handler, not just the found
/// metadata.
pub async fn find_handler_for_read(
    selector: &HandlerSelector,
    fid: &str,
    domain: Domain,
) -> Result<Option<(Arc<dyn FileHandler>, FoundFile)>, TransferError> {
    let (normal, migrate) = selector.get_handlers_for_read(domain)?;
    for handler in [normal, migrate].into_iter().flatten() {
        if let Some(found) = handler.find(fid, domain).await? {
            return Ok(Some((handler, found)));
        }
    }
    Ok(None)
}

pub async fn find_file_for_read(
    selector: &HandlerSelector,
    fid: &str,
    domain: Domain,
) -> Result<Option<FoundFile>, TransferError> {
    Ok(find_handler_for_read(selector, fid, domain).await?.map(|(_, found)| found))
}

/// `Stat`: resolves `fid` without opening a data stream. Coalesced through
/// the shield when the `shield` feature is on for `domain`, so a burst of
/// identical calls for a hot fid costs one MetaStore round trip instead of
/// one per caller.
pub async fn stat(
    ctx: &Arc<TransferContext>,
    fid: &str,
    domain: Domain,
    shield_timeout: Duration,
) -> Result<Option<FoundFile>, TransferError> {
    if fid.is_empty() {
        return Err(TransferError::InvalidArgument("id must not be empty".into()));
    }
    if !ctx.features.domain_has_access(dfs_config::keys::SHIELD, domain as u32) {
        return find_file_for_read(&ctx.selector, fid, domain).await;
    }

    let key = format!("stat:{domain}:{fid}");
    let selector = ctx.selector.clone();
    let fid_owned = fid.to_string();
    let outcome = ctx
        .shield
        .coalesce(key, shield_timeout, async move {
            match find_file_for_read(&selector, &fid_owned, domain).await {
                Ok(found) => Ok(ShieldOutcome::Found(found)),
                Err(e) => Err(Arc::new(e)),
            }
        })
        .await?;

    match outcome {
        Ok(ShieldOutcome::Found(found)) => Ok(found),
        Ok(_) => Err(TransferError::Internal("shield returned the wrong outcome kind for stat".into())),
        Err(e) => Err(unwrap_shielded(e)),
    }
}

/// `Exist`: `Stat` collapsed to a boolean. `FileNotFound` never surfaces as
/// an error here, matching the original's `result=false, no-error`
/// translation (`SPEC_FULL.md` §7).
pub async fn exist(
    ctx: &Arc<TransferContext>,
    fid: &str,
    domain: Domain,
    shield_timeout: Duration,
) -> Result<bool, TransferError> {
    match stat(ctx, fid, domain, shield_timeout).await {
        Ok(found) => Ok(found.is_some()),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}
