mod init;
mod run;
mod schema;
mod status;

pub use init::cmd_init;
pub use run::cmd_run;
pub use schema::cmd_schema;
pub use status::cmd_status;

use anyhow::{Context, Result};
use gtidflow_config::Config;
use gtidflow_core::SchemaRegistry;
use gtidflow_mysql::{ConnectionSettings, MysqlCatalog};
use tracing::{info, warn};

fn mysql_settings(config: &Config) -> ConnectionSettings {
    ConnectionSettings {
        host: config.mysql.host.clone(),
        port: config.mysql.port,
        user: config.mysql.user.clone(),
        password: config.mysql.resolved_password(),
    }
}

async fn connect_catalog(config: &Config) -> Result<MysqlCatalog> {
    let pool = gtidflow_mysql::connect(&mysql_settings(config))
        .await
        .context("Failed to connect to MySQL")?;
    Ok(MysqlCatalog::new(pool))
}

/// Build the table registry from the catalog.
async fn registry_from_catalog(config: &Config) -> Result<SchemaRegistry> {
    let catalog = connect_catalog(config).await?;
    let registry = SchemaRegistry::build(&catalog, &config.selections())
        .await
        .context("Failed to load table metadata")?;

    if let Err(e) = catalog.disconnect().await {
        warn!(error = %e, "Failed to close catalog connection");
    }
    Ok(registry)
}

/// Load the registry from the configured snapshot, falling back to the
/// catalog when none is configured.
async fn load_registry(config: &Config) -> Result<SchemaRegistry> {
    let registry = match &config.metadata.snapshot {
        Some(path) => SchemaRegistry::load(path)
            .with_context(|| format!("Failed to load schema snapshot {}", path.display()))?,
        None => registry_from_catalog(config).await?,
    };

    info!(
        databases = registry.databases().count(),
        tables = registry.table_count(),
        "Schema registry ready"
    );
    Ok(registry)
}
