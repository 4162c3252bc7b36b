//! Merge of the user override document onto an extracted schema.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::Result;
use crate::graph::{CyclePolicy, Resolution, TableNode, resolve_fill_order};
use crate::overrides::{ColumnOverride, CustomSchema, OptionsOverride, TableOverride};
use crate::schema::{Column, ColumnOptions, DEFAULT_MAX_CHAR_LENGTH, Schema, Table};
use crate::types::GeneratorKind;
use crate::validation::validate_schema;

/// A merged schema whose tables are in fill order, plus how that order was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Customized {
    pub schema: Schema,
    pub resolution: Resolution,
}

/// Layer `overrides` onto `extracted`, normalize every column and recompute
/// the fill order from the merged foreign keys.
pub fn customize(
    extracted: &Schema,
    overrides: &CustomSchema,
    policy: CyclePolicy,
) -> Result<Customized> {
    let max_char_length = match (overrides.max_char_length, extracted.max_char_length) {
        (Some(value), _) => value,
        (None, 0) => DEFAULT_MAX_CHAR_LENGTH,
        (None, value) => value,
    };

    let mut values: BTreeMap<String, Vec<Value>> = extracted.values.clone();
    for (name, pool) in &overrides.values {
        values.insert(name.clone(), pool.clone());
    }

    let mut tables = Vec::with_capacity(extracted.tables.len());
    for table in &extracted.tables {
        if overrides.is_ignored(&table.name) {
            continue;
        }
        match overrides.table(&table.name) {
            Some(table_override) => tables.push(merge_table(table, table_override)),
            None => tables.push(table.clone()),
        }
    }

    for table_override in &overrides.tables {
        if overrides.is_ignored(&table_override.name) {
            continue;
        }
        let known = tables
            .iter()
            .any(|table: &Table| table.name.eq_ignore_ascii_case(&table_override.name));
        if !known {
            let base = Table::new(table_override.name.clone(), 0);
            tables.push(merge_table(&base, table_override));
        }
    }

    for table in &mut tables {
        for column in &mut table.columns {
            normalize_column(column, max_char_length, &values);
        }
    }

    let nodes: Vec<TableNode> = tables
        .iter()
        .map(|table| TableNode::new(table.name.clone(), table.referenced_tables()))
        .collect();
    let resolution = resolve_fill_order(&nodes, policy)?;

    let mut remaining: Vec<Option<Table>> = tables.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(remaining.len());
    for name in &resolution.order {
        let slot = remaining.iter_mut().find(|slot| {
            slot.as_ref()
                .is_some_and(|table| table.name.eq_ignore_ascii_case(name))
        });
        if let Some(table) = slot.and_then(Option::take) {
            ordered.push(table);
        }
    }

    let schema = Schema {
        max_char_length,
        tables: ordered,
        values,
    };
    validate_schema(&schema)?;

    Ok(Customized { schema, resolution })
}

/// Merge a table override. Row-count fields win when set; columns are matched
/// case-insensitively and override-only columns are appended.
pub fn merge_table(base: &Table, table_override: &TableOverride) -> Table {
    let mut table = base.clone();
    if let Some(lines) = table_override.lines {
        table.lines = lines;
    }
    if table_override.max_lines.is_some() {
        table.max_lines = table_override.max_lines;
    }
    if table_override.add_lines.is_some() {
        table.add_lines = table_override.add_lines;
    }

    for column_override in &table_override.columns {
        let existing = table
            .columns
            .iter_mut()
            .find(|column| column.name.eq_ignore_ascii_case(&column_override.name));
        match existing {
            Some(column) => *column = merge_column(column, column_override),
            None => {
                let base = Column::new(
                    column_override.name.clone(),
                    column_override.generator.unwrap_or(GeneratorKind::String),
                );
                table.columns.push(merge_column(&base, column_override));
            }
        }
    }

    table
}

/// Merge a column override. `foreignKey` and `values` replace wholesale.
pub fn merge_column(base: &Column, column_override: &ColumnOverride) -> Column {
    let mut column = base.clone();
    if let Some(generator) = column_override.generator {
        column.generator = generator;
    }
    column.options = merge_options(&base.options, &column_override.options);
    if column_override.foreign_key.is_some() {
        column.foreign_key = column_override.foreign_key.clone();
    }
    if column_override.values.is_some() {
        column.values = column_override.values.clone();
    }
    column
}

/// Shallow per-key merge; every key set in the override wins.
pub fn merge_options(base: &ColumnOptions, options: &OptionsOverride) -> ColumnOptions {
    ColumnOptions {
        nullable: options.nullable.unwrap_or(base.nullable),
        unique: options.unique.unwrap_or(base.unique),
        auto_increment: options.auto_increment.unwrap_or(base.auto_increment),
        unsigned: options.unsigned.unwrap_or(base.unsigned),
        min: options.min.or(base.min),
        max: options.max.or(base.max),
        scale: options.scale.or(base.scale),
        min_date: options.min_date.clone().or_else(|| base.min_date.clone()),
        max_date: options.max_date.clone().or_else(|| base.max_date.clone()),
    }
}

fn normalize_column(column: &mut Column, max_char_length: u32, pools: &BTreeMap<String, Vec<Value>>) {
    let cap = f64::from(max_char_length);
    match column.generator {
        GeneratorKind::String => {
            let max = column.options.max.unwrap_or(cap);
            column.options.max = Some(max.min(cap));
        }
        GeneratorKind::Bit => {
            column.options.max.get_or_insert(1.0);
        }
        GeneratorKind::Enum | GeneratorKind::Set => {
            if let Some(count) = column
                .values
                .as_ref()
                .and_then(|values| values.cardinality(pools))
            {
                column.options.max = Some(count as f64);
            }
        }
        _ => {}
    }

    if column.options.unsigned {
        let min = column.options.min.unwrap_or(0.0);
        column.options.min = Some(min.max(0.0));
    }
}
