use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gtidflow_core::SchemaSelection;
use serde::Deserialize;
use tracing::debug;

use crate::env::resolve_env;
use crate::error::{ConfigError, ConfigResult};
use crate::validation::validate;

/// Agent configuration from gtidflow.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub mysql: MysqlConfig,
    pub nsq: NsqConfig,
    /// Monitored databases.
    #[serde(rename = "schema", default)]
    pub schemas: Vec<SchemaConfig>,
    pub storage: StorageConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

impl Config {
    /// Parse a config from a TOML string without validating it.
    pub fn parse(toml_str: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(toml_str)?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config = Config::parse(&content)?;
        validate(&config)?;

        debug!(
            path = %path.display(),
            schemas = config.schemas.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Table selections for building the schema registry.
    pub fn selections(&self) -> Vec<SchemaSelection> {
        self.schemas
            .iter()
            .map(|s| SchemaSelection::new(&s.name, s.tables.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `stdout` or a log file path.
    #[serde(default = "default_log_output")]
    pub output: String,
    /// Default filter directive; `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub rotation: Rotation,
    /// Rotated files to keep.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl LogConfig {
    pub fn is_stdout(&self) -> bool {
        self.output.is_empty() || self.output == "stdout"
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: default_log_output(),
            level: default_log_level(),
            rotation: Rotation::default(),
            max_files: default_max_files(),
        }
    }
}

/// How often the log file rolls over.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

fn default_log_output() -> String {
    "stdout".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_files() -> usize {
    7
}

#[derive(Debug, Clone, Deserialize)]
pub struct MysqlConfig {
    #[serde(default = "default_mysql_host")]
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    #[serde(default = "default_mysql_user")]
    pub user: String,
    /// May reference environment variables as `${VAR}`.
    #[serde(default)]
    pub password: String,
    /// Replica id announced when streaming the binlog. Must be unique among
    /// the server's replicas.
    #[serde(default = "default_server_id")]
    pub server_id: u32,
}

impl MysqlConfig {
    pub fn resolved_password(&self) -> String {
        resolve_env(&self.password)
    }
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            host: default_mysql_host(),
            port: default_mysql_port(),
            user: default_mysql_user(),
            password: String::new(),
            server_id: default_server_id(),
        }
    }
}

fn default_mysql_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_mysql_user() -> String {
    "root".to_string()
}

fn default_server_id() -> u32 {
    1001
}

#[derive(Debug, Clone, Deserialize)]
pub struct NsqConfig {
    /// Base URL of nsqd's HTTP interface, e.g. `http://127.0.0.1:4151`.
    pub nsqd_http_address: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl NsqConfig {
    pub fn resolved_address(&self) -> String {
        resolve_env(&self.nsqd_http_address)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    pub name: String,
    /// Empty means every table in the database.
    #[serde(default)]
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub file_path: PathBuf,
    /// Position to start from when no checkpoint file exists yet.
    #[serde(default)]
    pub init_gtidset: String,
}

/// Where replication events come from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSource {
    /// Replicate directly from the `[mysql]` server.
    #[default]
    Binlog,
    /// Replay decoded events from `events`.
    Events,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub source: StreamSource,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,
    /// `-` for stdin, or a path to a JSON-lines event file. Only read when
    /// `source = "events"`.
    #[serde(default = "default_events")]
    pub events: String,
}

impl StreamConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            source: StreamSource::default(),
            poll_timeout_ms: default_poll_timeout(),
            events: default_events(),
        }
    }
}

fn default_poll_timeout() -> u64 {
    2000
}

fn default_events() -> String {
    "-".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataConfig {
    /// Load the schema registry from this snapshot instead of the catalog.
    pub snapshot: Option<PathBuf>,
}
