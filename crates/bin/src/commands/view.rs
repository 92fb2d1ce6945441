//! Read commands - the owner's ordering and the merged collection view.

use sorteia::{MergeQuery, ResourceFilter};

use crate::backend::Store;
use crate::cli::{BackendConfig, ListArgs, ViewArgs};
use crate::commands::scope_for;
use crate::output::{OutputFormat, payload_cell, print_json, print_table};

/// Run the `list` command
pub async fn list(
    config: &BackendConfig,
    owner: Option<&str>,
    args: &ListArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let scope = scope_for(owner, &args.resource_type)?;
    let store = Store::open(config).await?;

    if args.whole {
        let items = store.engine.read_many_whole_object(&scope).await?;
        store.finish().await?;
        match format {
            OutputFormat::Human => {
                if items.is_empty() {
                    println!("No ordered items for {scope}.");
                    return Ok(());
                }
                let rows: Vec<Vec<String>> = items
                    .iter()
                    .map(|item| {
                        vec![
                            item.ordering.position.to_string(),
                            item.resource.id.to_string(),
                            payload_cell(&item.resource.payload),
                        ]
                    })
                    .collect();
                print_table(&["POS", "RESOURCE", "PAYLOAD"], &rows);
            }
            OutputFormat::Json => print_json(&items)?,
        }
    } else {
        let records = store.engine.read_many(&scope).await?;
        store.finish().await?;
        match format {
            OutputFormat::Human => {
                if records.is_empty() {
                    println!("No ordered items for {scope}.");
                    return Ok(());
                }
                let rows: Vec<Vec<String>> = records
                    .iter()
                    .map(|r| {
                        vec![
                            r.position.to_string(),
                            r.resource_id.to_string(),
                            r.updated_at.to_rfc3339(),
                        ]
                    })
                    .collect();
                print_table(&["POS", "RESOURCE", "UPDATED"], &rows);
            }
            OutputFormat::Json => print_json(&records)?,
        }
    }
    Ok(())
}

/// Run the `view` command
pub async fn view(
    config: &BackendConfig,
    owner: Option<&str>,
    args: &ViewArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let scope = scope_for(owner, &args.resource_type)?;
    let query = build_query(args)?;

    let store = Store::open(config).await?;
    let items = store
        .engine
        .read_many_entire_collection(&scope, &query)
        .await?;
    store.finish().await?;

    match format {
        OutputFormat::Human => {
            if items.is_empty() {
                println!("No resources in {}.", scope.resource_type);
                return Ok(());
            }
            let rows: Vec<Vec<String>> = items
                .iter()
                .map(|item| {
                    vec![
                        item.position().map(|p| p.to_string()).unwrap_or_default(),
                        item.resource.id.to_string(),
                        item.resource.created_at.to_rfc3339(),
                        payload_cell(&item.resource.payload),
                    ]
                })
                .collect();
            print_table(&["POS", "RESOURCE", "CREATED", "PAYLOAD"], &rows);
        }
        OutputFormat::Json => print_json(&items)?,
    }
    Ok(())
}

fn build_query(args: &ViewArgs) -> Result<MergeQuery, String> {
    let mut filter = ResourceFilter::new();
    for raw in &args.filters {
        let (field, value) = parse_filter(raw)?;
        filter = filter.field(field, value);
    }
    let mut query = MergeQuery::new(filter).offset(args.offset);
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }
    Ok(query)
}

/// Parse `field=value`. Values that read as JSON (`3`, `true`, `"x"`) keep
/// their type; anything else is matched as a plain string.
fn parse_filter(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got {raw:?}"))?;
    if field.is_empty() {
        return Err(format!("missing field name in {raw:?}"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((field.to_string(), value))
}
