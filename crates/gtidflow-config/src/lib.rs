mod config;
mod env;
mod error;
mod validation;

pub use config::{
    Config, LogConfig, MetadataConfig, MysqlConfig, NsqConfig, Rotation, SchemaConfig,
    StorageConfig, StreamConfig, StreamSource,
};
pub use env::resolve_env;
pub use error::{ConfigError, ConfigResult};
pub use validation::validate;
