use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use tablefill_core::{Column, ForeignKeyRef, GeneratorKind, Table};

use crate::errors::GenerationError;
use crate::generators::primitives::{bit_width, integer_range};
use crate::generators::temporal::parse_datetime;
use crate::generators::{GeneratedValue, ValuePool};

/// Number of symbols a generated string draws from, once case is folded.
const FOLDED_CHARSET_SIZE: u64 = 38;
/// Largest generated domain listed value by value.
const LISTABLE_DOMAIN: u64 = 1 << 16;

/// How values of one column are produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnStrategy {
    /// Pick among existing values of the referenced column.
    ForeignKey(ForeignKeyRef),
    /// Run the registry generator for `kind`; `pool` carries enum/set candidates.
    Generate {
        kind: GeneratorKind,
        pool: Option<ValuePool>,
    },
}

#[derive(Debug, Clone)]
pub struct ColumnPlan {
    pub column: Column,
    /// Lower-cased column name, the key used in rows.
    pub key: String,
    pub strategy: ColumnStrategy,
}

impl ColumnPlan {
    /// Whether this column references rows of its own table.
    pub fn self_reference(&self, table: &str) -> Option<&ForeignKeyRef> {
        match &self.strategy {
            ColumnStrategy::ForeignKey(fk) if fk.is_self_reference(table) => Some(fk),
            _ => None,
        }
    }

    /// Count of distinct non-null values the strategy can produce, when finite
    /// and known before generation. Foreign keys are sized by their candidates.
    pub fn domain_size(&self) -> Option<u64> {
        let options = &self.column.options;
        let ColumnStrategy::Generate { kind, pool } = &self.strategy else {
            return None;
        };
        if let Some(pool) = pool
            && *kind != GeneratorKind::Set
        {
            let distinct: HashSet<String> = pool
                .members()
                .iter()
                .filter_map(GeneratedValue::unique_key)
                .collect();
            return Some(distinct.len() as u64);
        }

        match kind {
            GeneratorKind::Bit => Some(pow2(bit_width(options))),
            GeneratorKind::Boolean => Some(2),
            GeneratorKind::Set => {
                let members = pool.as_ref().map(ValuePool::len).unwrap_or_default() as u32;
                let width = options
                    .max
                    .map(|max| max.clamp(1.0, 64.0) as u32)
                    .unwrap_or(members);
                Some(pow2(width.min(members)))
            }
            GeneratorKind::Numeric if options.auto_increment => None,
            GeneratorKind::Numeric | GeneratorKind::Year => {
                let (min, max) = integer_range(*kind, options);
                (max >= min).then(|| (max - min) as u64 + 1)
            }
            GeneratorKind::String => {
                let max = options.max.unwrap_or(255.0).floor().max(0.0) as u32;
                let min = options.min.unwrap_or(0.0).ceil().max(0.0) as u32;
                let mut total: u64 = 0;
                for len in min..=max {
                    if len == 0 && !options.nullable && max > 0 {
                        continue;
                    }
                    total = total.saturating_add(FOLDED_CHARSET_SIZE.saturating_pow(len));
                }
                Some(total)
            }
            GeneratorKind::Date => {
                let min = options.min_date.as_deref().and_then(parse_datetime)?;
                let max = options.max_date.as_deref().and_then(parse_datetime)?;
                let days = (max.date() - min.date()).num_days();
                (days >= 0).then(|| days as u64 + 1)
            }
            _ => None,
        }
    }

    /// Every value the strategy can produce, for domains small enough to list.
    /// Unique columns pick among the unused ones once random draws keep colliding.
    pub fn domain_values(&self) -> Option<Vec<GeneratedValue>> {
        let ColumnStrategy::Generate { kind, pool } = &self.strategy else {
            return None;
        };
        let options = &self.column.options;
        if let Some(pool) = pool
            && *kind != GeneratorKind::Set
        {
            return Some(pool.members());
        }
        if self.domain_size()? > LISTABLE_DOMAIN {
            return None;
        }
        match kind {
            GeneratorKind::Boolean => {
                Some(vec![GeneratedValue::Bool(false), GeneratedValue::Bool(true)])
            }
            GeneratorKind::Bit => Some(
                (0..1u64 << bit_width(options))
                    .map(GeneratedValue::UInt)
                    .collect(),
            ),
            GeneratorKind::Numeric | GeneratorKind::Year => {
                let (min, max) = integer_range(*kind, options);
                Some((min..=max).map(GeneratedValue::Int).collect())
            }
            _ => None,
        }
    }
}

fn pow2(bits: u32) -> u64 {
    1u64.checked_shl(bits).unwrap_or(u64::MAX)
}

/// Per-table generation plan, built once before any row.
#[derive(Debug, Clone)]
pub struct TablePlan {
    pub table: String,
    pub columns: Vec<ColumnPlan>,
}

impl TablePlan {
    pub fn column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|plan| plan.column.name.clone())
            .collect()
    }
}

/// Choose the strategy of every column of `table`.
///
/// A foreign key wins over everything; set columns keep their kind; any other
/// column with explicit `values` draws from its pool.
pub fn plan_table(
    table: &Table,
    pools: &BTreeMap<String, Vec<Value>>,
) -> Result<TablePlan, GenerationError> {
    let columns = table
        .columns
        .iter()
        .map(|column| plan_column(column, pools))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TablePlan {
        table: table.name.clone(),
        columns,
    })
}

pub fn plan_column(
    column: &Column,
    pools: &BTreeMap<String, Vec<Value>>,
) -> Result<ColumnPlan, GenerationError> {
    let strategy = if let Some(fk) = &column.foreign_key {
        ColumnStrategy::ForeignKey(fk.clone())
    } else {
        let pool = column
            .values
            .as_ref()
            .map(|values| ValuePool::resolve(values, pools, &column.name))
            .transpose()?;
        let kind = match (&pool, column.generator) {
            (_, GeneratorKind::Set) => GeneratorKind::Set,
            (Some(_), _) => GeneratorKind::Enum,
            (None, kind) => kind,
        };
        if kind.uses_candidates() && pool.is_none() {
            return Err(GenerationError::invalid(
                &column.name,
                format!("{kind} column without candidate values"),
            ));
        }
        ColumnStrategy::Generate { kind, pool }
    };

    Ok(ColumnPlan {
        column: column.clone(),
        key: column.name.to_lowercase(),
        strategy,
    })
}
