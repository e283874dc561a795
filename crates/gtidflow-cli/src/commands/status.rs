use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use gtidflow_config::Config;
use gtidflow_core::GtidSet;
use gtidflow_state::FileCheckpointStore;
use tracing::warn;

use super::connect_catalog;

const SERVER_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn cmd_status(config: Config) -> Result<()> {
    let path = &config.storage.file_path;
    let stored = FileCheckpointStore::peek(path)
        .with_context(|| format!("Failed to read checkpoint file {}", path.display()))?;

    let Some(stored) = stored else {
        println!(
            "No checkpoint at {}. Run 'gtidflow run' to start streaming.",
            path.display()
        );
        return Ok(());
    };

    let server = match tokio::time::timeout(SERVER_LOOKUP_TIMEOUT, server_gtid_executed(&config))
        .await
    {
        Ok(Ok(set)) => Some(set),
        Ok(Err(e)) => {
            warn!(error = %e, "Could not read gtid_executed from MySQL");
            None
        }
        Err(_) => {
            warn!("Timed out reading gtid_executed from MySQL");
            None
        }
    };

    println!("\n{}", "Checkpoint Status:".bold());
    println!("{:<12} {}", "File", path.display());
    println!("{:<12} {}", "Stored", stored);

    match server {
        Some(server) => {
            println!("{:<12} {}", "Server", server);
            let state = describe(&stored, &server);
            if stored.contains_set(&server) {
                println!("{:<12} {}", "State", state.green());
            } else {
                println!("{:<12} {}", "State", state.yellow());
            }
        }
        None => println!("{:<12} {}", "Server", "unavailable".dimmed()),
    }

    println!();
    Ok(())
}

async fn server_gtid_executed(config: &Config) -> Result<GtidSet> {
    let catalog = connect_catalog(config).await?;
    let executed = catalog
        .gtid_executed()
        .await
        .context("Failed to query gtid_executed")?;

    if let Err(e) = catalog.disconnect().await {
        warn!(error = %e, "Failed to close catalog connection");
    }
    Ok(executed)
}

fn describe(stored: &GtidSet, server: &GtidSet) -> &'static str {
    if stored.contains_set(server) {
        "up to date"
    } else {
        "behind"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SID: &str = "36c0fcec-5447-11ea-8dc1-0242ac110002";

    fn set(ranges: &str) -> GtidSet {
        GtidSet::parse(&format!("{}:{}", SID, ranges)).unwrap()
    }

    #[test]
    fn test_describe_position() {
        assert_eq!(describe(&set("1-10"), &set("1-10")), "up to date");
        assert_eq!(describe(&set("1-10"), &set("1-12")), "behind");
        assert_eq!(describe(&set("1-3:5-10"), &set("1-10")), "behind");
    }
}
