use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constraints::ForeignKeyRef;
use crate::error::Result;
use crate::types::{GeneratorKind, Values};

/// Character cap applied to string columns when none is configured.
pub const DEFAULT_MAX_CHAR_LENGTH: u32 = 255;

fn default_max_char_length() -> u32 {
    DEFAULT_MAX_CHAR_LENGTH
}

/// Schema document: tables in fill order plus shared value pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Global cap on generated string lengths.
    #[serde(default = "default_max_char_length")]
    pub max_char_length: u32,
    /// Tables ordered so that referenced tables come first.
    #[serde(default)]
    pub tables: Vec<Table>,
    /// Named value pools referenced by pointer-style column values.
    #[serde(default)]
    pub values: BTreeMap<String, Vec<Value>>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            max_char_length: DEFAULT_MAX_CHAR_LENGTH,
            tables: Vec::new(),
            values: BTreeMap::new(),
        }
    }
}

impl Schema {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Case-insensitive table lookup.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.tables
            .iter()
            .position(|table| table.name.eq_ignore_ascii_case(name))
    }
}

/// A table to fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    /// Target total row count.
    #[serde(default)]
    pub lines: u64,
    /// Upper bound on the table's total row count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lines: Option<u64>,
    /// Insert exactly this many rows on top of the existing ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_lines: Option<u64>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>, lines: u64) -> Self {
        Self {
            name: name.into(),
            lines,
            max_lines: None,
            add_lines: None,
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Case-insensitive column lookup.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    /// Distinct tables referenced by this table's foreign-key columns.
    pub fn referenced_tables(&self) -> Vec<String> {
        let mut references: Vec<String> = Vec::new();
        for column in &self.columns {
            if let Some(fk) = &column.foreign_key {
                if !references
                    .iter()
                    .any(|existing| existing.eq_ignore_ascii_case(&fk.table))
                {
                    references.push(fk.table.clone());
                }
            }
        }
        references
    }
}

/// A column and everything needed to generate its values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub generator: GeneratorKind,
    #[serde(default)]
    pub options: ColumnOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Values>,
}

impl Column {
    pub fn new(name: impl Into<String>, generator: GeneratorKind) -> Self {
        Self {
            name: name.into(),
            generator,
            options: ColumnOptions::default(),
            foreign_key: None,
            values: None,
        }
    }

    pub fn with_options(mut self, options: ColumnOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKeyRef) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    pub fn with_values(mut self, values: Values) -> Self {
        self.values = Some(values);
        self
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Constraint-bearing options for a column.
///
/// `min`/`max` are numeric bounds for numeric kinds and length bounds for
/// strings; for bit columns `max` is the bit width and for enum/set columns
/// the candidate count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnOptions {
    #[serde(skip_serializing_if = "is_false")]
    pub nullable: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub unique: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub auto_increment: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub unsigned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Decimal places kept by the `real` generator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Lower date bound: a literal date/datetime or an earlier column name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_date: Option<String>,
    /// Upper date bound: a literal date/datetime or an earlier column name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_date: Option<String>,
}
