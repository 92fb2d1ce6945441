//! Resource commands - maintain the collections that owners order.

use chrono::{DateTime, Utc};
use sorteia::{Clock, Resource, ResourceId, ResourceType, SystemClock};

use crate::backend::Store;
use crate::cli::{BackendConfig, ResourceAddArgs, ResourceRemoveArgs};
use crate::output::{OutputFormat, print_json};

/// Run the `resource add` command
pub async fn add(
    config: &BackendConfig,
    args: &ResourceAddArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload = match &args.payload {
        Some(raw) => serde_json::from_str(raw).map_err(|e| format!("invalid --payload: {e}"))?,
        None => serde_json::Value::Null,
    };
    let created_at = match &args.created_at {
        Some(raw) => parse_timestamp(raw)?,
        None => SystemClock.now(),
    };
    let resource_type = ResourceType::from(args.resource_type.as_str());
    let resource = Resource::new(args.resource_id.as_str(), created_at, payload);

    let store = Store::open(config).await?;
    store
        .engine
        .backend()
        .put_resource(&resource_type, resource.clone())
        .await?;
    store.finish().await?;

    match format {
        OutputFormat::Human => println!("Added {}/{}", resource_type, resource.id),
        OutputFormat::Json => print_json(&resource)?,
    }
    Ok(())
}

/// Run the `resource remove` command
///
/// Ordering records that point at the resource are left in place; the joined
/// reads skip them.
pub async fn remove(
    config: &BackendConfig,
    args: &ResourceRemoveArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let resource_type = ResourceType::from(args.resource_type.as_str());
    let resource_id = ResourceId::from(args.resource_id.as_str());

    let store = Store::open(config).await?;
    let removed = store
        .engine
        .backend()
        .remove_resource(&resource_type, &resource_id)
        .await?;
    store.finish().await?;

    match format {
        OutputFormat::Human if removed => println!("Removed {resource_type}/{resource_id}"),
        OutputFormat::Human => println!("No resource {resource_type}/{resource_id}"),
        OutputFormat::Json => print_json(&serde_json::json!({ "removed": removed }))?,
    }
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid --created-at {raw:?}: {e}"))
}
