use sqlx::MySqlPool;

use tablefill_core::{Error, Result};

use crate::source::{RawColumn, RawForeignKey, RawTable};

use super::quote_ident;

fn db_error(err: sqlx::Error) -> Error {
    Error::Db(err.to_string())
}

pub async fn current_database(pool: &MySqlPool) -> Result<Option<String>> {
    sqlx::query_scalar::<_, Option<String>>("SELECT CAST(DATABASE() AS CHAR)")
        .fetch_one(pool)
        .await
        .map_err(db_error)
}

pub async fn list_tables(pool: &MySqlPool, schema: &str) -> Result<Vec<RawTable>> {
    let rows = sqlx::query_as::<_, (String, Option<String>)>(
        r#"
        SELECT
          CAST(t.TABLE_NAME AS CHAR) AS name,
          CAST(GROUP_CONCAT(DISTINCT k.REFERENCED_TABLE_NAME SEPARATOR ',') AS CHAR) AS referenced
        FROM information_schema.TABLES t
        LEFT JOIN information_schema.KEY_COLUMN_USAGE k
          ON k.CONSTRAINT_SCHEMA = t.TABLE_SCHEMA
         AND k.TABLE_NAME = t.TABLE_NAME
         AND k.REFERENCED_TABLE_NAME IS NOT NULL
        WHERE t.TABLE_SCHEMA = ?
          AND t.TABLE_TYPE = 'BASE TABLE'
        GROUP BY t.TABLE_SCHEMA, t.TABLE_NAME
        ORDER BY 2, 1
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(|(name, referenced)| RawTable {
            name,
            referenced_tables: referenced
                .map(|list| {
                    list.split(',')
                        .filter(|item| !item.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect())
}

pub async fn count_rows(pool: &MySqlPool, table: &str) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
    let count = sqlx::query_scalar::<_, i64>(&sql)
        .fetch_one(pool)
        .await
        .map_err(db_error)?;
    Ok(count.max(0) as u64)
}

type ColumnRow = (
    String,
    String,
    String,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    String,
    String,
);

pub async fn list_columns(pool: &MySqlPool, schema: &str, table: &str) -> Result<Vec<RawColumn>> {
    let rows = sqlx::query_as::<_, ColumnRow>(
        r#"
        SELECT
          CAST(COLUMN_NAME AS CHAR),
          CAST(DATA_TYPE AS CHAR),
          CAST(IS_NULLABLE AS CHAR),
          CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED),
          CAST(NUMERIC_PRECISION AS SIGNED),
          CAST(NUMERIC_SCALE AS SIGNED),
          CAST(COLUMN_TYPE AS CHAR),
          CAST(EXTRA AS CHAR)
        FROM information_schema.COLUMNS
        WHERE TABLE_SCHEMA = ?
          AND TABLE_NAME = ?
          AND EXTRA NOT LIKE '%VIRTUAL GENERATED%'
          AND EXTRA NOT LIKE '%STORED GENERATED%'
        ORDER BY ORDINAL_POSITION
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    let to_u64 = |value: Option<i64>| value.and_then(|value| u64::try_from(value).ok());
    Ok(rows
        .into_iter()
        .map(
            |(name, data_type, is_nullable, max_length, precision, scale, column_type, extra)| {
                RawColumn {
                    name,
                    data_type,
                    nullable: is_nullable.eq_ignore_ascii_case("YES"),
                    max_length: to_u64(max_length),
                    numeric_precision: to_u64(precision),
                    numeric_scale: to_u64(scale),
                    column_type,
                    extra,
                }
            },
        )
        .collect())
}

pub async fn list_foreign_keys(
    pool: &MySqlPool,
    schema: &str,
    table: &str,
) -> Result<Vec<RawForeignKey>> {
    let rows = sqlx::query_as::<_, (String, String, String)>(
        r#"
        SELECT
          CAST(COLUMN_NAME AS CHAR),
          CAST(REFERENCED_TABLE_NAME AS CHAR),
          CAST(REFERENCED_COLUMN_NAME AS CHAR)
        FROM information_schema.KEY_COLUMN_USAGE
        WHERE TABLE_SCHEMA = ?
          AND TABLE_NAME = ?
          AND REFERENCED_COLUMN_NAME IS NOT NULL
        ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(|(column_name, referenced_table, referenced_column)| RawForeignKey {
            column_name,
            referenced_table,
            referenced_column,
        })
        .collect())
}
