use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

const SAMPLE_CONFIG: &str = r#"# gtidflow configuration
# Secrets are loaded from .env file

[log]
output = "stdout"          # or a file path such as "log/gtidflow.log"
level = "info"
rotation = "daily"         # minutely | hourly | daily | never
max_files = 7

[mysql]
host = "127.0.0.1"
port = 3306
user = "root"
password = "${MYSQL_PASSWORD}"
server_id = 1001           # replica id used when streaming the binlog

[nsq]
nsqd_http_address = "http://127.0.0.1:4151"
max_retries = 3
request_timeout_ms = 5000

# One entry per database; each database is published to the topic of the same name.
[[schema]]
name = "db1"
tables = ["user"]          # empty or omitted = every table

[storage]
file_path = "./gtidset.db"
# Used only when the checkpoint file does not exist yet.
init_gtidset = ""

[stream]
source = "binlog"          # binlog = replicate from [mysql]; events = replay a file
poll_timeout_ms = 2000
events = "-"               # with source = "events": "-" = stdin, or a JSON-lines file

# Optional: load table metadata from a snapshot written by `gtidflow schema -o`
# [metadata]
# snapshot = "./schema.json"
"#;

const SAMPLE_ENV: &str = r#"# gtidflow environment variables
# Copy this file to .env and fill in your values

MYSQL_PASSWORD=
"#;

pub fn cmd_init(path: &Path) -> Result<()> {
    info!(path = %path.display(), "Initializing gtidflow");

    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let config_path = path.join("gtidflow.toml");
    if write_if_absent(&config_path, SAMPLE_CONFIG)? {
        println!("Created {}", config_path.display());
    } else {
        println!("{} already exists, skipping", config_path.display());
    }

    let env_path = path.join(".env.example");
    if write_if_absent(&env_path, SAMPLE_ENV)? {
        println!("Created {}", env_path.display());
    }

    println!("\n{}\n", "gtidflow initialized!".green().bold());
    println!("Next steps:");
    println!("  1. Copy .env.example to .env and set MYSQL_PASSWORD");
    println!("  2. Edit gtidflow.toml: set [[schema]] entries and init_gtidset");
    println!("  3. Run: gtidflow status");
    println!("  4. Run: gtidflow run\n");

    Ok(())
}

fn write_if_absent(path: &Path, content: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtidflow_config::Config;

    #[test]
    fn test_sample_config_parses() {
        let config = Config::parse(SAMPLE_CONFIG).unwrap();
        gtidflow_config::validate(&config).unwrap();
        assert_eq!(config.schemas.len(), 1);
        assert_eq!(config.schemas[0].name, "db1");
        assert!(config.log.is_stdout());
        assert_eq!(config.stream.source, gtidflow_config::StreamSource::Binlog);
        assert_eq!(config.mysql.server_id, 1001);
        assert!(config.metadata.snapshot.is_none());
    }

    #[test]
    fn test_init_writes_files_once() {
        let dir = tempfile::tempdir().unwrap();

        cmd_init(dir.path()).unwrap();
        let config_path = dir.path().join("gtidflow.toml");
        assert_eq!(fs::read_to_string(&config_path).unwrap(), SAMPLE_CONFIG);
        assert!(dir.path().join(".env.example").exists());

        fs::write(&config_path, "# edited").unwrap();
        cmd_init(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(&config_path).unwrap(), "# edited");
    }
}
