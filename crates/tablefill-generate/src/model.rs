use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Options for one fill run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillOptions {
    /// Seed of the run's random source.
    pub seed: u32,
    /// Rows per `insert_batch` call.
    pub batch_size: usize,
    /// Chance of NULL for nullable columns.
    pub null_probability: f64,
    /// Consecutive collisions tolerated for a unique column.
    pub max_unique_attempts: u32,
    /// Upper default bound for temporal columns.
    pub base_date: NaiveDate,
    /// Empty every table before filling.
    pub reset: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            batch_size: 500,
            null_probability: 0.1,
            max_unique_attempts: 1000,
            base_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            reset: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableState {
    Pending,
    Filling,
    Done,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Done,
    Failed,
}

/// Progress of one table within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub state: TableState,
    /// Rows present before the table started.
    pub existing: u64,
    /// Rows this run intended to add.
    pub target: u64,
    pub inserted: u64,
    pub batches: u64,
}

impl TableReport {
    pub fn pending(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            state: TableState::Pending,
            existing: 0,
            target: 0,
            inserted: 0,
            batches: 0,
        }
    }
}

/// Summary of a fill run, written as `fill_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    pub seed: u32,
    pub state: RunState,
    pub tables: Vec<TableReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FillReport {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            state: RunState::Running,
            tables: Vec::new(),
            error: None,
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables
            .iter()
            .find(|report| report.table.eq_ignore_ascii_case(name))
    }

    pub fn inserted_total(&self) -> u64 {
        self.tables.iter().map(|report| report.inserted).sum()
    }
}
