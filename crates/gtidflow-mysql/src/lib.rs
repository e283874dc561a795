mod binlog;
mod catalog;
mod connect;
mod error;
mod events;

pub use binlog::BinlogEventStream;
pub use catalog::MysqlCatalog;
pub use connect::{connect, ConnectionSettings};
pub use error::{MysqlError, MysqlResult};
pub use events::JsonLinesStream;
