//! Table metadata for interpreting positional row data.
//!
//! Binlog rows events carry values by position only. The registry maps each
//! monitored `(database, table)` to its ordered column definitions, built once
//! at startup from the source's catalog or from an exported snapshot.

use std::fs;
use std::future::Future;
use std::path::Path;

use chrono::{NaiveDateTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::{RawValue, Value};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_FRACTION_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const ZERO_DATETIME: &str = "0000-00-00 00:00:00";
const ZERO_DATE: &str = "0000-00-00";

/// Source data type families that need distinct value handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    DateTime,
    Date,
    Integer,
    Float,
    Text,
    Binary,
    Other,
}

impl ColumnType {
    /// Classify a catalog `DATA_TYPE` such as `datetime` or `bigint`.
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type.trim().to_ascii_lowercase().as_str() {
            "datetime" | "timestamp" => ColumnType::DateTime,
            "date" => ColumnType::Date,
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" => {
                ColumnType::Integer
            }
            "float" | "double" | "real" => ColumnType::Float,
            "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "json"
            | "enum" | "set" => ColumnType::Text,
            "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
                ColumnType::Binary
            }
            _ => ColumnType::Other,
        }
    }
}

/// A column definition from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// 1-based position in the table, matching row tuple order.
    pub ordinal_position: u32,
    pub nullable: bool,
    /// Catalog `DATA_TYPE`, e.g. `datetime`.
    pub data_type: String,
}

impl ColumnDef {
    pub fn new(
        name: impl Into<String>,
        ordinal_position: u32,
        nullable: bool,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ordinal_position,
            nullable,
            data_type: data_type.into(),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        ColumnType::from_data_type(&self.data_type)
    }

    /// Reshape a raw stream value according to this column's type.
    ///
    /// Never fails: a value that cannot be interpreted is passed through
    /// and a warning is logged.
    pub fn format(&self, raw: RawValue) -> Value {
        match (self.column_type(), raw) {
            (_, RawValue::Null) => Value::Null,
            (ColumnType::DateTime, RawValue::Text(s)) => self.format_datetime(s),
            (ColumnType::Date, RawValue::Text(s)) if s.is_empty() || s == ZERO_DATE => {
                Value::Null
            }
            (ColumnType::Integer, RawValue::Text(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Integer(i),
                Err(_) => {
                    warn!(column = %self.name, value = %s, "Non-numeric value in integer column");
                    Value::Text(s)
                }
            },
            (ColumnType::Float, RawValue::Int(i)) => Value::Float(i as f64),
            (ColumnType::Float, RawValue::UInt(u)) => Value::Float(u as f64),
            (ColumnType::Text, RawValue::Bytes(b)) => match String::from_utf8(b) {
                Ok(s) => Value::Text(s),
                Err(e) => {
                    warn!(column = %self.name, "Invalid UTF-8 in text column");
                    Value::Raw(e.into_bytes())
                }
            },
            (_, raw) => Value::from(raw),
        }
    }

    fn format_datetime(&self, s: String) -> Value {
        if s.is_empty() || s == ZERO_DATETIME {
            return Value::Null;
        }

        let parsed = NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(&s, DATETIME_FRACTION_FORMAT));

        match parsed {
            Ok(naive) => Value::Timestamp(Utc.from_utc_datetime(&naive)),
            Err(e) => {
                warn!(column = %self.name, value = %s, error = %e, "Failed to parse datetime column");
                Value::Text(s)
            }
        }
    }
}

/// Columns of one table, ordered by ordinal position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub database: String,
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Build a table schema, sorting columns and checking positions are 1..=n.
    pub fn new(
        database: impl Into<String>,
        name: impl Into<String>,
        mut columns: Vec<ColumnDef>,
    ) -> Result<Self> {
        let database = database.into();
        let name = name.into();

        if columns.is_empty() {
            return Err(Error::EmptyTable { database, table: name });
        }

        columns.sort_by_key(|c| c.ordinal_position);
        for (i, column) in columns.iter().enumerate() {
            let expected = i as u32 + 1;
            if column.ordinal_position != expected {
                return Err(Error::InvalidSchema {
                    database,
                    table: name,
                    reason: format!(
                        "column '{}' has position {}, expected {}",
                        column.name, column.ordinal_position, expected
                    ),
                });
            }
        }

        Ok(Self {
            database,
            name,
            columns,
        })
    }

    /// Column for the `index`-th (0-based) value of a row tuple.
    pub fn column_at(&self, index: usize) -> Result<&ColumnDef> {
        self.columns.get(index).ok_or_else(|| Error::ColumnLookup {
            database: self.database.clone(),
            table: self.name.clone(),
            index,
        })
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Which tables of a database to monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSelection {
    pub database: String,
    /// Explicit table names; empty means every table in the database.
    pub tables: Vec<String>,
}

impl SchemaSelection {
    pub fn new(database: impl Into<String>, tables: Vec<String>) -> Self {
        Self {
            database: database.into(),
            tables,
        }
    }

    pub fn all_tables(database: impl Into<String>) -> Self {
        Self::new(database, vec![])
    }
}

/// Source of table and column definitions.
pub trait Catalog: Send + Sync {
    /// All table names owned by a database.
    fn table_names(&self, database: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Column definitions of a table, ordered by ordinal position.
    fn columns(
        &self,
        database: &str,
        table: &str,
    ) -> impl Future<Output = Result<Vec<ColumnDef>>> + Send;
}

/// Read-only lookup from `(database, table)` to [`TableSchema`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaRegistry {
    databases: IndexMap<String, IndexMap<String, TableSchema>>,
}

impl SchemaRegistry {
    /// Query the catalog for every selected table.
    pub async fn build<C: Catalog>(catalog: &C, selections: &[SchemaSelection]) -> Result<Self> {
        let mut registry = SchemaRegistry::default();

        for selection in selections {
            let tables = if selection.tables.is_empty() {
                let names = catalog.table_names(&selection.database).await?;
                info!(
                    database = %selection.database,
                    tables = names.len(),
                    "Resolved all tables in database"
                );
                names
            } else {
                selection.tables.clone()
            };

            for table in &tables {
                let columns = catalog.columns(&selection.database, table).await?;
                registry.insert(TableSchema::new(&selection.database, table, columns)?);
            }

            // A database with no tables still counts as monitored.
            registry
                .databases
                .entry(selection.database.clone())
                .or_default();
        }

        Ok(registry)
    }

    pub fn insert(&mut self, table: TableSchema) {
        self.databases
            .entry(table.database.clone())
            .or_default()
            .insert(table.name.clone(), table);
    }

    pub fn query(&self, database: &str, table: &str) -> Result<&TableSchema> {
        self.databases
            .get(database)
            .and_then(|tables| tables.get(table))
            .ok_or_else(|| Error::TableNotFound {
                database: database.to_string(),
                table: table.to_string(),
            })
    }

    pub fn databases(&self) -> impl Iterator<Item = &str> {
        self.databases.keys().map(String::as_str)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.databases.values().flat_map(|tables| tables.values())
    }

    pub fn table_count(&self) -> usize {
        self.databases.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.table_count() == 0
    }

    /// Load a registry from a JSON snapshot written by [`SchemaRegistry::save`].
    ///
    /// Every table is re-validated, so a hand-edited snapshot cannot smuggle in
    /// gaps in column positions.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let raw: SchemaRegistry = serde_json::from_str(&content)?;

        let mut registry = SchemaRegistry::default();
        for (database, tables) in raw.databases {
            registry.databases.entry(database.clone()).or_default();
            for (name, table) in tables {
                registry.insert(TableSchema::new(&database, name, table.columns)?);
            }
        }
        Ok(registry)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
