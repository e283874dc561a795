use thiserror::Error;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("at least one [[schema]] entry is required")]
    NoSchemas,

    #[error("schema '{0}' is listed more than once")]
    DuplicateSchema(String),

    #[error("schema '{name}' cannot be used as a topic: {reason}")]
    InvalidTopic { name: String, reason: String },

    #[error("invalid init_gtidset: {0}")]
    InvalidGtidSet(#[from] gtidflow_core::Error),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
