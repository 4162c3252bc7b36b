use async_trait::async_trait;
use sqlx::MySqlPool;

use tablefill_core::{Error, Result};

use crate::source::{MetadataSource, RawColumn, RawForeignKey, RawTable};

mod queries;

pub use queries::current_database;

/// Metadata source reading MySQL `information_schema`.
#[derive(Debug, Clone)]
pub struct MySqlMetadataSource {
    pool: MySqlPool,
    database: String,
}

impl MySqlMetadataSource {
    /// Create a source for `database` using a pre-configured pool.
    pub fn new(pool: MySqlPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }

    /// Create a source for the pool's default database.
    pub async fn for_current_database(pool: MySqlPool) -> Result<Self> {
        let database = current_database(&pool).await?.ok_or_else(|| {
            Error::Other("connection string does not select a database".to_string())
        })?;
        Ok(Self::new(pool, database))
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

#[async_trait]
impl MetadataSource for MySqlMetadataSource {
    fn engine(&self) -> &'static str {
        "mysql"
    }

    async fn list_tables(&self, schema: &str, excluding: &[String]) -> Result<Vec<RawTable>> {
        let tables = queries::list_tables(&self.pool, schema).await?;
        Ok(tables
            .into_iter()
            .filter(|table| {
                !excluding
                    .iter()
                    .any(|excluded| excluded.eq_ignore_ascii_case(&table.name))
            })
            .collect())
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        queries::count_rows(&self.pool, table).await
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<RawColumn>> {
        queries::list_columns(&self.pool, &self.database, table).await
    }

    async fn list_foreign_keys(&self, table: &str) -> Result<Vec<RawForeignKey>> {
        queries::list_foreign_keys(&self.pool, &self.database, table).await
    }
}

/// Quote a MySQL identifier with backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
