use mysql_async::prelude::Queryable;
use mysql_async::{OptsBuilder, Pool};
use tracing::info;

use crate::error::{MysqlError, MysqlResult};

/// Where and how to reach the source server.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

pub(crate) fn base_opts(settings: &ConnectionSettings) -> OptsBuilder {
    OptsBuilder::default()
        .ip_or_hostname(settings.host.clone())
        .tcp_port(settings.port)
        .user(Some(settings.user.clone()))
        .pass(Some(settings.password.clone()))
}

/// Open a pool against `information_schema` and check it answers.
pub async fn connect(settings: &ConnectionSettings) -> MysqlResult<Pool> {
    let opts = base_opts(settings).db_name(Some("information_schema"));
    let pool = Pool::new(opts);

    let mut conn = pool.get_conn().await.map_err(|e| {
        MysqlError::Connection(format!(
            "failed to connect to {}:{}: {}",
            settings.host, settings.port, e
        ))
    })?;
    conn.ping()
        .await
        .map_err(|e| MysqlError::Connection(e.to_string()))?;

    info!(host = %settings.host, port = settings.port, "Connected to MySQL");
    Ok(pool)
}
