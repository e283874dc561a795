use std::collections::HashSet;

use gtidflow_core::GtidSet;

use crate::config::{Config, StreamSource};
use crate::error::{ConfigError, ConfigResult};

/// Validate a parsed configuration.
///
/// A blank `init_gtidset` is allowed here; whether it is needed depends on
/// whether a checkpoint file already exists, which the store decides.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_schemas(config)?;
    validate_storage(config)?;
    validate_nsq(config)?;
    validate_stream(config)?;
    Ok(())
}

fn validate_schemas(config: &Config) -> ConfigResult<()> {
    if config.schemas.is_empty() {
        return Err(ConfigError::NoSchemas);
    }

    let mut seen = HashSet::new();
    for schema in &config.schemas {
        // Records are published to a topic named after the database.
        gtidflow_nsq::validate_topic(&schema.name).map_err(|e| ConfigError::InvalidTopic {
            name: schema.name.clone(),
            reason: e.to_string(),
        })?;

        if !seen.insert(schema.name.as_str()) {
            return Err(ConfigError::DuplicateSchema(schema.name.clone()));
        }

        if let Some(table) = schema.tables.iter().find(|t| t.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: format!("schema.{}.tables", schema.name),
                message: format!("blank table name '{}'", table),
            });
        }
    }
    Ok(())
}

fn validate_storage(config: &Config) -> ConfigResult<()> {
    if config.storage.file_path.as_os_str().is_empty() {
        return Err(ConfigError::MissingField {
            field: "storage.file_path".into(),
        });
    }

    if !config.storage.init_gtidset.trim().is_empty() {
        GtidSet::parse(&config.storage.init_gtidset)?;
    }
    Ok(())
}

fn validate_nsq(config: &Config) -> ConfigResult<()> {
    let address = config.nsq.resolved_address();
    if address.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "nsq.nsqd_http_address".into(),
        });
    }
    if !address.starts_with("http://") && !address.starts_with("https://") {
        return Err(ConfigError::InvalidValue {
            field: "nsq.nsqd_http_address".into(),
            message: format!("'{}' is not an http(s) URL", address),
        });
    }
    Ok(())
}

fn validate_stream(config: &Config) -> ConfigResult<()> {
    if config.stream.poll_timeout_ms == 0 {
        return Err(ConfigError::InvalidValue {
            field: "stream.poll_timeout_ms".into(),
            message: "must be greater than zero".into(),
        });
    }
    if config.stream.source == StreamSource::Binlog && config.mysql.server_id == 0 {
        return Err(ConfigError::InvalidValue {
            field: "mysql.server_id".into(),
            message: "must be non-zero to stream the binlog".into(),
        });
    }
    if config.stream.source == StreamSource::Events && config.stream.events.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "stream.events".into(),
        });
    }
    Ok(())
}
