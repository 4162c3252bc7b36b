use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tablefill_core::Result;

/// A base table and the raw names of the tables its foreign keys reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    pub name: String,
    pub referenced_tables: Vec<String>,
}

/// Column metadata as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawColumn {
    pub name: String,
    /// Bare type name, e.g. `varchar`.
    pub data_type: String,
    pub nullable: bool,
    pub max_length: Option<u64>,
    pub numeric_precision: Option<u64>,
    pub numeric_scale: Option<u64>,
    /// Full type, e.g. `int(10) unsigned` or `enum('a','b')`.
    pub column_type: String,
    /// Extra attributes such as `auto_increment`.
    pub extra: String,
}

impl RawColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let data_type = data_type.into();
        Self {
            name: name.into(),
            column_type: data_type.clone(),
            data_type,
            nullable: false,
            max_length: None,
            numeric_precision: None,
            numeric_scale: None,
            extra: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawForeignKey {
    pub column_name: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// Read-only access to a database catalog.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Engine identifier (e.g. `mysql`).
    fn engine(&self) -> &'static str;

    /// Base tables of `schema`, leaving out the names in `excluding`.
    async fn list_tables(&self, schema: &str, excluding: &[String]) -> Result<Vec<RawTable>>;

    async fn count_rows(&self, table: &str) -> Result<u64>;

    /// Columns of `table` in ordinal order.
    async fn list_columns(&self, table: &str) -> Result<Vec<RawColumn>>;

    async fn list_foreign_keys(&self, table: &str) -> Result<Vec<RawForeignKey>>;
}
