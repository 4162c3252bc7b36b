use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use tablefill_core::{Error, Result};

use crate::generators::GeneratedValue;
use crate::sink::{MemorySink, PersistenceSink};

/// Sink that keeps rows in memory and mirrors every batch to `<dir>/<table>.csv`.
///
/// Counting, reset and candidate lookups are served by the inner `MemorySink`,
/// so foreign keys resolve against rows written earlier in the same run.
#[derive(Debug)]
pub struct CsvSink {
    dir: PathBuf,
    memory: MemorySink,
    written: Mutex<HashSet<String>>,
    bytes: Mutex<u64>,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            memory: MemorySink::new(),
            written: Mutex::new(HashSet::new()),
            bytes: Mutex::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.csv"))
    }

    pub fn memory(&self) -> &MemorySink {
        &self.memory
    }

    /// Bytes appended to CSV files so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes.lock().map(|bytes| *bytes).unwrap_or_default()
    }

    fn append(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<GeneratedValue>],
    ) -> Result<u64> {
        let mut written = self
            .written
            .lock()
            .map_err(|_| Error::Other("csv sink lock poisoned".to_string()))?;
        let first = written.insert(table.to_lowercase());

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(!first)
            .truncate(first)
            .open(self.table_path(table))?;
        let counting = CountingWriter::new(BufWriter::new(file));
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(counting);

        if first {
            writer.write_record(columns).map_err(csv_error)?;
        }
        for row in rows {
            writer
                .write_record(row.iter().map(GeneratedValue::to_csv))
                .map_err(csv_error)?;
        }
        writer.flush()?;
        let counting = writer
            .into_inner()
            .map_err(|err| Error::Io(err.into_error()))?;
        Ok(counting.bytes_written())
    }
}

fn csv_error(err: csv::Error) -> Error {
    Error::Other(format!("csv error: {err}"))
}

#[async_trait]
impl PersistenceSink for CsvSink {
    async fn insert_batch(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<GeneratedValue>],
    ) -> Result<u64> {
        let inserted = self.memory.insert_batch(table, columns, rows).await?;
        let bytes = self.append(table, columns, rows)?;
        if let Ok(mut total) = self.bytes.lock() {
            *total = total.saturating_add(bytes);
        }
        Ok(inserted)
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        self.memory.count_rows(table).await
    }

    async fn reset_table(&self, table: &str) -> Result<()> {
        self.memory.reset_table(table).await?;
        let path = self.table_path(table);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        if let Ok(mut written) = self.written.lock() {
            written.remove(&table.to_lowercase());
        }
        Ok(())
    }

    async fn fetch_values(
        &self,
        table: &str,
        column: &str,
        filter: Option<&str>,
    ) -> Result<Vec<GeneratedValue>> {
        self.memory.fetch_values(table, column, filter).await
    }
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
