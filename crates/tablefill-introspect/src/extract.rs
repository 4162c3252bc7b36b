use tablefill_core::{
    CustomSchema, CyclePolicy, DEFAULT_MAX_CHAR_LENGTH, Resolution, Result, Schema, Table,
    TableNode, resolve_fill_order,
};

use crate::mapper::{attach_foreign_keys, map_column};
use crate::source::MetadataSource;

/// An extracted schema, tables in fill order, plus notes for the caller to log.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub schema: Schema,
    pub resolution: Resolution,
    /// Columns whose type had no generator and fell back to `string`.
    pub warnings: Vec<String>,
}

/// Read `database` through `source` and build a schema in fill order.
///
/// Ignored tables are never listed. Foreign keys forced by `overrides` add
/// ordering edges, and an override `lines` replaces the live row count.
pub async fn extract_schema(
    source: &dyn MetadataSource,
    database: &str,
    overrides: &CustomSchema,
    policy: CyclePolicy,
) -> Result<Extraction> {
    let raw_tables = source
        .list_tables(database, &overrides.ignored_tables)
        .await?;

    let mut nodes = Vec::with_capacity(raw_tables.len());
    let mut lines = Vec::with_capacity(raw_tables.len());
    for raw in raw_tables {
        if overrides.is_ignored(&raw.name) {
            continue;
        }
        let mut references = raw.referenced_tables;
        references.extend(overrides.forced_references(&raw.name));

        let count = match overrides.table(&raw.name).and_then(|table| table.lines) {
            Some(count) => count,
            None => source.count_rows(&raw.name).await?,
        };
        lines.push(count);
        nodes.push(TableNode::new(raw.name, references));
    }

    let resolution = resolve_fill_order(&nodes, policy)?;

    let mut warnings = Vec::new();
    let mut tables = Vec::with_capacity(resolution.order.len());
    for name in &resolution.order {
        let count = nodes
            .iter()
            .position(|node| node.name.eq_ignore_ascii_case(name))
            .map(|idx| lines[idx])
            .unwrap_or_default();

        let mut table = Table::new(name.clone(), count);
        for raw in source.list_columns(name).await? {
            let (column, fallback) = map_column(&raw);
            if let Some(data_type) = fallback {
                warnings.push(format!(
                    "{name}.{}: no generator for type {data_type}, using string",
                    raw.name
                ));
            }
            table.columns.push(column);
        }
        let foreign_keys = source.list_foreign_keys(name).await?;
        attach_foreign_keys(&mut table.columns, &foreign_keys);
        tables.push(table);
    }

    Ok(Extraction {
        schema: Schema {
            max_char_length: overrides
                .max_char_length
                .unwrap_or(DEFAULT_MAX_CHAR_LENGTH),
            tables,
            values: Default::default(),
        },
        resolution,
        warnings,
    })
}
