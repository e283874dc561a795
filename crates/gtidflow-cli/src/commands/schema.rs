use std::path::Path;

use anyhow::{Context, Result};
use gtidflow_config::Config;

use super::registry_from_catalog;

/// Export the catalog's view of the configured tables as a snapshot.
pub async fn cmd_schema(config: Config, output: Option<&Path>) -> Result<()> {
    let registry = registry_from_catalog(&config).await?;

    match output {
        Some(path) => {
            registry
                .save(path)
                .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
            println!(
                "Wrote {} table(s) to {}",
                registry.table_count(),
                path.display()
            );
        }
        None => {
            let json = registry.to_json().context("Failed to serialize schema")?;
            println!("{}", json);
        }
    }

    Ok(())
}
