use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::query_builder::Separated;
use sqlx::{Column, MySql, QueryBuilder, Row, TypeInfo};

use tablefill_core::{Error, Result};
use tablefill_generate::{GeneratedValue, PersistenceSink};
use tablefill_introspect::mysql::quote_ident;

/// Writes generated rows to MySQL.
#[derive(Debug, Clone)]
pub struct MySqlSink {
    pool: MySqlPool,
}

impl MySqlSink {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// Most bind parameters MySQL accepts in one prepared statement.
const MAX_PLACEHOLDERS: usize = 65_535;

fn db_error(err: sqlx::Error) -> Error {
    Error::Db(err.to_string())
}

fn insert_prefix(table: &str, columns: &[String]) -> String {
    let columns = columns
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({columns}) ", quote_ident(table))
}

/// Rows per INSERT statement so that `columns` placeholders per row stay
/// under the bind limit.
fn rows_per_statement(columns: usize) -> usize {
    (MAX_PLACEHOLDERS / columns.max(1)).max(1)
}

/// Distinct non-null values, with a text rendering next to the raw column.
fn select_values_sql(table: &str, column: &str, filter: Option<&str>) -> String {
    let column = quote_ident(column);
    let mut sql = format!(
        "SELECT DISTINCT {column}, CAST({column} AS CHAR) FROM {} WHERE {column} IS NOT NULL",
        quote_ident(table)
    );
    if let Some(filter) = filter.map(str::trim).filter(|filter| !filter.is_empty()) {
        sql.push_str(&format!(" AND ({filter})"));
    }
    sql.push_str(&format!(" ORDER BY {column}"));
    sql
}

fn push_value(builder: &mut Separated<'_, '_, MySql, &'static str>, value: &GeneratedValue) {
    match value {
        GeneratedValue::Null => builder.push_bind(None::<String>),
        GeneratedValue::Bool(value) => builder.push_bind(*value),
        GeneratedValue::Int(value) => builder.push_bind(*value),
        GeneratedValue::UInt(value) => builder.push_bind(*value),
        GeneratedValue::Float(value) => builder.push_bind(*value),
        GeneratedValue::Text(value) => builder.push_bind(value.clone()),
        GeneratedValue::Date(value) => builder.push_bind(*value),
        GeneratedValue::Time(value) => builder.push_bind(*value),
        GeneratedValue::Timestamp(value) => builder.push_bind(*value),
    };
}

/// Integers keep their type so candidates bind as numbers; everything else
/// is read back through its text rendering.
fn decode_value(row: &MySqlRow) -> Result<GeneratedValue> {
    let type_name = row.column(0).type_info().name().to_ascii_uppercase();
    let base = type_name.split_whitespace().next().unwrap_or_default();
    let integer = matches!(
        base,
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT"
    );

    let value = if integer && type_name.ends_with("UNSIGNED") {
        GeneratedValue::UInt(row.try_get::<u64, _>(0).map_err(db_error)?)
    } else if integer {
        GeneratedValue::Int(row.try_get::<i64, _>(0).map_err(db_error)?)
    } else {
        match row.try_get::<Option<String>, _>(1).map_err(db_error)? {
            Some(text) => GeneratedValue::Text(text),
            None => GeneratedValue::Null,
        }
    };
    Ok(value)
}

#[async_trait]
impl PersistenceSink for MySqlSink {
    async fn insert_batch(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<GeneratedValue>],
    ) -> Result<u64> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(0);
        }
        let prefix = insert_prefix(table, columns);
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for chunk in rows.chunks(rows_per_statement(columns.len())) {
            let mut builder: QueryBuilder<'_, MySql> = QueryBuilder::new(prefix.as_str());
            builder.push_values(chunk, |mut separated, row| {
                for value in row {
                    push_value(&mut separated, value);
                }
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;
        Ok(rows.len() as u64)
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count.max(0) as u64)
    }

    async fn reset_table(&self, table: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        sqlx::query("SET FOREIGN_KEY_CHECKS = 0")
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        let sql = format!("DELETE FROM {}", quote_ident(table));
        let deleted = sqlx::query(&sql).execute(&mut *conn).await;
        sqlx::query("SET FOREIGN_KEY_CHECKS = 1")
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        deleted.map_err(db_error)?;
        Ok(())
    }

    async fn fetch_values(
        &self,
        table: &str,
        column: &str,
        filter: Option<&str>,
    ) -> Result<Vec<GeneratedValue>> {
        let sql = select_values_sql(table, column, filter);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.iter()
            .map(decode_value)
            .filter(|value| !matches!(value, Ok(GeneratedValue::Null)))
            .collect()
    }

    async fn max_integer(&self, table: &str, column: &str) -> Result<Option<i64>> {
        let column = quote_ident(column);
        let sql = format!(
            "SELECT CAST(MAX({column}) AS SIGNED) FROM {}",
            quote_ident(table)
        );
        sqlx::query_scalar::<_, Option<i64>>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)
    }
}
