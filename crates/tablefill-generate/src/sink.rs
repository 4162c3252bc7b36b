use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use tablefill_core::{Error, Result};

use crate::filter::{FilterOutcome, evaluate_filter};
use crate::generators::{GeneratedValue, Row};

/// Destination of generated rows.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Insert `rows` (values in `columns` order); returns the rows written.
    async fn insert_batch(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<GeneratedValue>],
    ) -> Result<u64>;

    async fn count_rows(&self, table: &str) -> Result<u64>;

    /// Delete every row of `table`.
    async fn reset_table(&self, table: &str) -> Result<()>;

    /// Distinct non-null values of `column`, restricted by an optional predicate.
    async fn fetch_values(
        &self,
        table: &str,
        column: &str,
        filter: Option<&str>,
    ) -> Result<Vec<GeneratedValue>>;

    /// Largest integer stored in `column`; `None` when it holds none.
    async fn max_integer(&self, table: &str, column: &str) -> Result<Option<i64>> {
        let values = self.fetch_values(table, column, None).await?;
        Ok(values
            .iter()
            .filter_map(|value| {
                value
                    .as_i64()
                    .or_else(|| value.to_text().and_then(|text| text.trim().parse().ok()))
            })
            .max())
    }
}

#[derive(Debug, Default, Clone)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Vec<GeneratedValue>>,
}

impl MemoryTable {
    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
    }

    fn row_map(&self, row: &[GeneratedValue]) -> Row {
        self.columns
            .iter()
            .zip(row)
            .map(|(name, value)| (name.to_lowercase(), value.clone()))
            .collect()
    }
}

/// In-process sink keeping every table in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<BTreeMap<String, MemoryTable>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, MemoryTable>>> {
        self.tables
            .lock()
            .map_err(|_| Error::Other("memory sink lock poisoned".to_string()))
    }

    /// Rows of `table` as maps keyed by lower-cased column name.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        let tables = self.lock()?;
        Ok(tables
            .get(&table.to_lowercase())
            .map(|stored| stored.rows.iter().map(|row| stored.row_map(row)).collect())
            .unwrap_or_default())
    }

    /// Names of the columns stored for `table`, in insertion order.
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        let tables = self.lock()?;
        Ok(tables
            .get(&table.to_lowercase())
            .map(|stored| stored.columns.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn insert_batch(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<GeneratedValue>],
    ) -> Result<u64> {
        let mut tables = self.lock()?;
        let stored = tables.entry(table.to_lowercase()).or_default();
        if stored.columns.is_empty() {
            stored.columns = columns.to_vec();
        }

        for row in rows {
            if row.len() != columns.len() {
                return Err(Error::InvalidSchema(format!(
                    "{table}: row has {} values for {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            let mut aligned = vec![GeneratedValue::Null; stored.columns.len()];
            for (name, value) in columns.iter().zip(row) {
                match stored.column_index(name) {
                    Some(idx) => aligned[idx] = value.clone(),
                    None => {
                        stored.columns.push(name.clone());
                        for existing in &mut stored.rows {
                            existing.push(GeneratedValue::Null);
                        }
                        aligned.push(value.clone());
                    }
                }
            }
            stored.rows.push(aligned);
        }
        Ok(rows.len() as u64)
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let tables = self.lock()?;
        Ok(tables
            .get(&table.to_lowercase())
            .map(|stored| stored.rows.len() as u64)
            .unwrap_or_default())
    }

    async fn reset_table(&self, table: &str) -> Result<()> {
        let mut tables = self.lock()?;
        if let Some(stored) = tables.get_mut(&table.to_lowercase()) {
            stored.rows.clear();
        }
        Ok(())
    }

    async fn fetch_values(
        &self,
        table: &str,
        column: &str,
        filter: Option<&str>,
    ) -> Result<Vec<GeneratedValue>> {
        let tables = self.lock()?;
        let Some(stored) = tables.get(&table.to_lowercase()) else {
            return Ok(Vec::new());
        };
        let Some(idx) = stored.column_index(column) else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for row in &stored.rows {
            if let Some(filter) = filter {
                match evaluate_filter(filter, &stored.row_map(row)) {
                    FilterOutcome::Matched => {}
                    FilterOutcome::Rejected => continue,
                    FilterOutcome::Unsupported => {
                        return Err(Error::Unsupported(format!(
                            "filter on {table}: {filter}"
                        )));
                    }
                }
            }
            let value = &row[idx];
            if let Some(key) = value.to_text() {
                if seen.insert(key) {
                    values.push(value.clone());
                }
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["id".to_string(), "active".to_string()]
    }

    #[tokio::test]
    async fn stores_counts_and_resets() {
        let sink = MemorySink::new();
        let rows = vec![
            vec![GeneratedValue::Int(1), GeneratedValue::Bool(true)],
            vec![GeneratedValue::Int(2), GeneratedValue::Bool(false)],
        ];
        assert_eq!(sink.insert_batch("Users", &columns(), &rows).await.expect("insert"), 2);
        assert_eq!(sink.count_rows("users").await.expect("count"), 2);
        sink.reset_table("USERS").await.expect("reset");
        assert_eq!(sink.count_rows("users").await.expect("count"), 0);
    }

    #[tokio::test]
    async fn fetches_distinct_filtered_values() {
        let sink = MemorySink::new();
        let rows = vec![
            vec![GeneratedValue::Int(1), GeneratedValue::Bool(true)],
            vec![GeneratedValue::Int(2), GeneratedValue::Bool(false)],
            vec![GeneratedValue::Int(1), GeneratedValue::Bool(true)],
            vec![GeneratedValue::Null, GeneratedValue::Bool(true)],
        ];
        sink.insert_batch("users", &columns(), &rows).await.expect("insert");

        let all = sink.fetch_values("users", "ID", None).await.expect("fetch");
        assert_eq!(all, vec![GeneratedValue::Int(1), GeneratedValue::Int(2)]);

        let active = sink
            .fetch_values("users", "id", Some("active = 1"))
            .await
            .expect("fetch");
        assert_eq!(active, vec![GeneratedValue::Int(1)]);

        let err = sink
            .fetch_values("users", "id", Some("active LIKE 'x%'"))
            .await
            .expect_err("unsupported");
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[tokio::test]
    async fn max_integer_reads_past_gaps() {
        let sink = MemorySink::new();
        let rows = vec![
            vec![GeneratedValue::Int(1), GeneratedValue::Bool(true)],
            vec![GeneratedValue::Int(5), GeneratedValue::Bool(true)],
            vec![GeneratedValue::Int(2), GeneratedValue::Bool(false)],
        ];
        sink.insert_batch("users", &columns(), &rows).await.expect("insert");
        assert_eq!(sink.max_integer("users", "id").await.expect("max"), Some(5));
        assert_eq!(sink.max_integer("ghost", "id").await.expect("max"), None);
    }

    #[tokio::test]
    async fn unknown_tables_have_no_values() {
        let sink = MemorySink::new();
        assert!(sink.fetch_values("ghost", "id", None).await.expect("fetch").is_empty());
        assert_eq!(sink.count_rows("ghost").await.expect("count"), 0);
    }
}
