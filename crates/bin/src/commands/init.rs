//! Init command - creates the storage and its indexes.

use crate::backend::{Store, backend_label};
use crate::cli::BackendConfig;
use crate::output::{OutputFormat, print_json};

/// Run the init command
pub async fn run(
    config: &BackendConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(config).await?;
    store.engine.create_indexes().await?;
    store.finish().await?;

    let label = backend_label(config);
    match format {
        OutputFormat::Human => println!("Initialized {label}"),
        OutputFormat::Json => print_json(&serde_json::json!({ "backend": label }))?,
    }
    Ok(())
}
