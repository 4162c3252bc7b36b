use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rand::RngCore;
use serde_json::Value;

use tablefill_core::{Column, ColumnOptions, GeneratorKind, Table};

use crate::errors::GenerationError;

pub mod pool;
pub mod primitives;
pub mod temporal;

pub use pool::ValuePool;

/// Generated value for a column.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
}

/// Row under construction, keyed by lower-cased column name.
pub type Row = HashMap<String, GeneratedValue>;

impl GeneratedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, GeneratedValue::Null)
    }

    /// Value as SQL-compatible text; `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        let text = match self {
            GeneratedValue::Null => return None,
            GeneratedValue::Bool(value) => if *value { "1" } else { "0" }.to_string(),
            GeneratedValue::Int(value) => value.to_string(),
            GeneratedValue::UInt(value) => value.to_string(),
            GeneratedValue::Float(value) => value.to_string(),
            GeneratedValue::Text(value) => value.clone(),
            GeneratedValue::Date(value) => value.format("%Y-%m-%d").to_string(),
            GeneratedValue::Time(value) => value.format("%H:%M:%S").to_string(),
            GeneratedValue::Timestamp(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        Some(text)
    }

    pub fn to_csv(&self) -> String {
        self.to_text().unwrap_or_default()
    }

    /// Identity used by uniqueness tracking. Text compares case-insensitively,
    /// as MySQL's default collations do.
    pub fn unique_key(&self) -> Option<String> {
        match self {
            GeneratedValue::Text(value) => Some(value.to_lowercase()),
            other => other.to_text(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GeneratedValue::Int(value) => Some(*value as f64),
            GeneratedValue::UInt(value) => Some(*value as f64),
            GeneratedValue::Float(value) => Some(*value),
            GeneratedValue::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            GeneratedValue::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GeneratedValue::Int(value) => Some(*value),
            GeneratedValue::UInt(value) => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GeneratedValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            GeneratedValue::Timestamp(value) => Some(*value),
            GeneratedValue::Date(value) => value.and_hms_opt(0, 0, 0),
            GeneratedValue::Text(value) => temporal::parse_datetime(value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        self.as_datetime().map(|value| value.date())
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            GeneratedValue::Time(value) => Some(*value),
            GeneratedValue::Timestamp(value) => Some(value.time()),
            GeneratedValue::Text(value) => temporal::parse_time(value),
            _ => None,
        }
    }

    /// Convert a JSON candidate from a value pool.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => GeneratedValue::Null,
            Value::Bool(value) => GeneratedValue::Bool(*value),
            Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    GeneratedValue::Int(value)
                } else if let Some(value) = number.as_u64() {
                    GeneratedValue::UInt(value)
                } else {
                    GeneratedValue::Float(number.as_f64().unwrap_or_default())
                }
            }
            Value::String(text) => GeneratedValue::Text(text.clone()),
            other => GeneratedValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for GeneratedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

/// Everything a generator may read while producing one value.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorContext<'a> {
    pub table: &'a Table,
    pub column: &'a Column,
    /// Values already produced for earlier columns of this row.
    pub row: &'a Row,
    /// Zero-based index of the row within this run's batch for the table.
    pub row_index: u64,
    /// Largest value already stored in an auto-increment column; new values
    /// start after it.
    pub id_offset: u64,
    pub base_date: NaiveDate,
    /// Candidates for enum and set columns.
    pub pool: Option<&'a ValuePool>,
}

impl GeneratorContext<'_> {
    pub fn options(&self) -> &ColumnOptions {
        &self.column.options
    }

    pub fn column_name(&self) -> &str {
        &self.column.name
    }

    /// Value of an earlier column of the current row.
    pub fn earlier(&self, column: &str) -> Option<&GeneratedValue> {
        self.row.get(&column.to_lowercase())
    }

    pub fn invalid(&self, reason: impl Into<String>) -> GenerationError {
        GenerationError::invalid(&self.column.name, reason)
    }
}

/// A value producer for one column kind.
///
/// Generators hold no state between calls; all randomness comes from `rng`.
pub trait Generator: Send + Sync {
    fn kind(&self) -> GeneratorKind;

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError>;
}

/// Generators indexed by column kind.
pub struct GeneratorRegistry {
    generators: BTreeMap<GeneratorKind, Box<dyn Generator>>,
}

impl GeneratorRegistry {
    /// Registry with every built-in generator.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        primitives::register(&mut registry);
        temporal::register(&mut registry);
        registry
    }

    pub fn empty() -> Self {
        Self {
            generators: BTreeMap::new(),
        }
    }

    /// Add a generator, replacing any previous one for the same kind.
    pub fn register_generator(&mut self, generator: Box<dyn Generator>) {
        self.generators.insert(generator.kind(), generator);
    }

    pub fn get(&self, kind: GeneratorKind) -> Option<&dyn Generator> {
        self.generators.get(&kind).map(|generator| generator.as_ref())
    }

    pub fn kinds(&self) -> Vec<GeneratorKind> {
        self.generators.keys().copied().collect()
    }

    pub fn generate(
        &self,
        kind: GeneratorKind,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        let generator = self
            .get(kind)
            .ok_or_else(|| ctx.invalid(format!("no generator registered for {kind}")))?;
        generator.generate(ctx, rng)
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
