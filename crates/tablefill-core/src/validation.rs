use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::schema::Schema;

/// Validate internal consistency of a resolved schema.
///
/// This checks:
/// - duplicate tables/columns (case-insensitive)
/// - `min` never exceeds `max`
/// - string, bit, enum and set columns carry a `max`
/// - foreign keys name a table and a column
pub fn validate_schema(schema: &Schema) -> Result<()> {
    let mut tables = BTreeSet::new();

    for table in &schema.tables {
        if !tables.insert(table.name.to_lowercase()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate table name: {}",
                table.name
            )));
        }

        let mut columns = BTreeSet::new();
        for column in &table.columns {
            if !columns.insert(column.name.to_lowercase()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate column name: {}.{}",
                    table.name, column.name
                )));
            }

            let options = &column.options;
            if let (Some(min), Some(max)) = (options.min, options.max) {
                if min > max {
                    return Err(Error::InvalidSchema(format!(
                        "min {min} exceeds max {max}: {}.{}",
                        table.name, column.name
                    )));
                }
            }

            if column.generator.requires_max() && options.max.is_none() {
                return Err(Error::InvalidSchema(format!(
                    "{} column without max: {}.{}",
                    column.generator, table.name, column.name
                )));
            }

            if let Some(fk) = &column.foreign_key {
                if fk.table.trim().is_empty() || fk.column.trim().is_empty() {
                    return Err(Error::InvalidSchema(format!(
                        "incomplete foreign key: {}.{}",
                        table.name, column.name
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnOptions, Table};
    use crate::types::GeneratorKind;

    fn schema_with(table: Table) -> Schema {
        Schema {
            tables: vec![table],
            ..Schema::default()
        }
    }

    #[test]
    fn rejects_duplicate_columns_ignoring_case() {
        let table = Table::new("users", 1)
            .with_column(Column::new("id", GeneratorKind::Numeric))
            .with_column(Column::new("ID", GeneratorKind::Numeric));
        let err = validate_schema(&schema_with(table)).expect_err("duplicate");
        assert!(err.to_string().contains("duplicate column name: users.ID"));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let table = Table::new("users", 1).with_column(
            Column::new("age", GeneratorKind::Numeric).with_options(ColumnOptions {
                min: Some(10.0),
                max: Some(1.0),
                ..ColumnOptions::default()
            }),
        );
        assert!(validate_schema(&schema_with(table)).is_err());
    }

    #[test]
    fn string_columns_need_max() {
        let table = Table::new("users", 1).with_column(Column::new("name", GeneratorKind::String));
        assert!(validate_schema(&schema_with(table)).is_err());
    }
}
