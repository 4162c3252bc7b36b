use thiserror::Error;

/// Failure while producing a single value.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("column {column}: {reason}")]
    InvalidColumn { column: String, reason: String },
    #[error("column {column}: all {domain} distinct values are already used")]
    UniqueExhausted { column: String, domain: u64 },
    #[error("column {column}: no unused value after {attempts} attempts")]
    UniqueCollisions { column: String, attempts: u32 },
    #[error("column {column}: no candidate rows in {target}")]
    NoForeignCandidates { column: String, target: String },
}

impl GenerationError {
    pub fn invalid(column: &str, reason: impl Into<String>) -> Self {
        GenerationError::InvalidColumn {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure that halts a fill run.
#[derive(Debug, Error)]
pub enum FillError {
    #[error("table {table}: {source}")]
    Plan {
        table: String,
        source: GenerationError,
    },
    #[error("table {table}, row {row}: {source}")]
    Generation {
        table: String,
        row: u64,
        source: GenerationError,
    },
    #[error("table {table}: {source}")]
    Sink {
        table: String,
        source: tablefill_core::Error,
    },
    #[error("run aborted while filling {table}")]
    Aborted { table: String },
}

impl FillError {
    /// Table the run was working on when it stopped.
    pub fn table(&self) -> &str {
        match self {
            FillError::Plan { table, .. }
            | FillError::Generation { table, .. }
            | FillError::Sink { table, .. }
            | FillError::Aborted { table } => table,
        }
    }
}
