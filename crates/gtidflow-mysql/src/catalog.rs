use gtidflow_core::{Catalog, ColumnDef, GtidSet};
use mysql_async::prelude::Queryable;
use mysql_async::Pool;
use tracing::debug;

use crate::error::{MysqlError, MysqlResult};

const TABLES_QUERY: &str =
    "SELECT TABLE_NAME FROM TABLES WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME";

const COLUMNS_QUERY: &str = "SELECT COLUMN_NAME, ORDINAL_POSITION, IS_NULLABLE, DATA_TYPE \
     FROM COLUMNS WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION";

/// Table metadata read from `information_schema`.
#[derive(Clone)]
pub struct MysqlCatalog {
    pool: Pool,
}

impl MysqlCatalog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// The server's executed GTID set.
    pub async fn gtid_executed(&self) -> MysqlResult<GtidSet> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| MysqlError::Connection(e.to_string()))?;

        let executed: Option<String> = conn
            .query_first("SELECT @@GLOBAL.gtid_executed")
            .await
            .map_err(|e| MysqlError::Query(e.to_string()))?;

        Ok(GtidSet::parse(&executed.unwrap_or_default())?)
    }

    pub async fn disconnect(self) -> MysqlResult<()> {
        self.pool
            .disconnect()
            .await
            .map_err(|e| MysqlError::Connection(e.to_string()))
    }

    async fn conn(&self) -> gtidflow_core::Result<mysql_async::Conn> {
        self.pool
            .get_conn()
            .await
            .map_err(|e| gtidflow_core::Error::Catalog(e.to_string()))
    }
}

impl Catalog for MysqlCatalog {
    async fn table_names(&self, database: &str) -> gtidflow_core::Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let names: Vec<String> = conn
            .exec(TABLES_QUERY, (database.to_owned(),))
            .await
            .map_err(|e| gtidflow_core::Error::Catalog(e.to_string()))?;

        debug!(database, tables = names.len(), "Listed tables");
        Ok(names)
    }

    async fn columns(&self, database: &str, table: &str) -> gtidflow_core::Result<Vec<ColumnDef>> {
        let mut conn = self.conn().await?;
        let rows: Vec<(String, u32, String, String)> = conn
            .exec(COLUMNS_QUERY, (database.to_owned(), table.to_owned()))
            .await
            .map_err(|e| gtidflow_core::Error::Catalog(e.to_string()))?;

        debug!(database, table, columns = rows.len(), "Loaded columns");
        Ok(rows
            .into_iter()
            .map(|(name, position, nullable, data_type)| {
                ColumnDef::new(name, position, nullable == "YES", data_type)
            })
            .collect())
    }
}
