//! Ordering commands - reorder, reorder-many and delete.

use sorteia::{OrderingError, Placement, ReorderOneOutcome, ResourceId};

use crate::backend::Store;
use crate::cli::{BackendConfig, DeleteArgs, ReorderArgs, ReorderManyArgs};
use crate::commands::scope_for;
use crate::output::{OutputFormat, print_json};

/// Run the `reorder` command
pub async fn reorder(
    config: &BackendConfig,
    owner: Option<&str>,
    args: &ReorderArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let scope = scope_for(owner, &args.resource_type)?;
    let placement = Placement::from_signed(args.position).ok_or_else(|| {
        sorteia::Error::from(OrderingError::PositionOutOfBounds {
            reason: format!("position must be -1 or at least 0, got {}", args.position),
        })
    })?;
    let resource_id = ResourceId::from(args.resource_id.as_str());

    let store = Store::open(config).await?;
    let outcome = store
        .engine
        .reorder_one(&scope, &resource_id, placement)
        .await?;
    store.finish().await?;

    match format {
        OutputFormat::Human => match &outcome {
            ReorderOneOutcome::Created { id, .. } => {
                println!("Ordered {resource_id} for {} (record {id})", scope.owner)
            }
            ReorderOneOutcome::Updated { id, .. } => {
                println!("Moved {resource_id} for {} (record {id})", scope.owner)
            }
        },
        OutputFormat::Json => print_json(&outcome)?,
    }
    Ok(())
}

/// Run the `reorder-many` command
pub async fn reorder_many(
    config: &BackendConfig,
    owner: Option<&str>,
    args: &ReorderManyArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let scope = scope_for(owner, &args.resource_type)?;
    let items = args
        .items
        .iter()
        .map(|raw| parse_item(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let store = Store::open(config).await?;
    let summary = store.engine.reorder_many(&scope, &items).await?;
    store.finish().await?;

    match format {
        OutputFormat::Human => println!(
            "matched {}, modified {}, upserted {}",
            summary.matched, summary.modified, summary.upserted
        ),
        OutputFormat::Json => print_json(&summary)?,
    }
    Ok(())
}

/// Run the `delete` command
pub async fn delete(
    config: &BackendConfig,
    owner: Option<&str>,
    args: &DeleteArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let scope = scope_for(owner, &args.resource_type)?;
    let resource_id = ResourceId::from(args.resource_id.as_str());

    let store = Store::open(config).await?;
    let removed = store.engine.delete_one(&scope, &resource_id).await?;
    store.finish().await?;

    match format {
        OutputFormat::Human => println!(
            "Deleted {} from {} (was at position {})",
            removed.resource_id, scope, removed.position
        ),
        OutputFormat::Json => print_json(&removed)?,
    }
    Ok(())
}

/// Parse a `resource_id=position` placement.
///
/// The split is on the last `=` so resource ids may contain one.
fn parse_item(raw: &str) -> Result<(ResourceId, usize), String> {
    let (id, position) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected resource_id=position, got {raw:?}"))?;
    if id.is_empty() {
        return Err(format!("missing resource id in {raw:?}"));
    }
    let position = position
        .parse::<usize>()
        .map_err(|e| format!("invalid position in {raw:?}: {e}"))?;
    Ok((ResourceId::from(id), position))
}
