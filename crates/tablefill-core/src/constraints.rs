use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference from a column to the column of another (or the same) table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKeyRef {
    /// Referenced table name.
    pub table: String,
    /// Referenced column name.
    pub column: String,
    /// Optional predicate restricting the candidate parent rows.
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl ForeignKeyRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// True when the reference points back at `table` itself.
    pub fn is_self_reference(&self, table: &str) -> bool {
        self.table.eq_ignore_ascii_case(table)
    }
}
