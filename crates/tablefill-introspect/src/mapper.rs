use regex::Regex;
use serde_json::Value;

use tablefill_core::{Column, ColumnOptions, ForeignKeyRef, GeneratorKind, Values};

use crate::source::{RawColumn, RawForeignKey};

/// Largest integer span the random source draws without loss.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Map raw column metadata to a column spec.
///
/// Types no generator knows fall back to `string`; the second element then
/// names the original type.
pub fn map_column(raw: &RawColumn) -> (Column, Option<String>) {
    let data_type = raw.data_type.trim().to_lowercase();
    let column_type = raw.column_type.trim().to_lowercase();
    let (kind, fallback) = match GeneratorKind::from_data_type(&data_type, &column_type) {
        Some(kind) => (kind, None),
        None => (GeneratorKind::String, Some(data_type.clone())),
    };

    let mut options = ColumnOptions {
        nullable: raw.nullable,
        unsigned: column_type.contains("unsigned"),
        auto_increment: raw.extra.to_lowercase().contains("auto_increment"),
        ..ColumnOptions::default()
    };
    let mut values = None;

    match kind {
        GeneratorKind::String => {
            options.max = raw.max_length.map(|len| len as f64);
        }
        GeneratorKind::Bit => {
            options.max = Some(raw.numeric_precision.unwrap_or(1) as f64);
        }
        GeneratorKind::Enum | GeneratorKind::Set => {
            let labels = enum_labels(&raw.column_type);
            options.max = Some(labels.len() as f64);
            values = Some(Values::List(labels.into_iter().map(Value::String).collect()));
        }
        GeneratorKind::Numeric => {
            if let Some((min, max)) = integer_bounds(&data_type, options.unsigned) {
                options.min = Some(min);
                options.max = Some(max);
            }
        }
        GeneratorKind::Real => {
            if matches!(data_type.as_str(), "decimal" | "numeric") {
                if let (Some(precision), Some(scale)) = (raw.numeric_precision, raw.numeric_scale) {
                    let integer_digits = precision.saturating_sub(scale).min(15) as i32;
                    let max = 10f64.powi(integer_digits) - 10f64.powi(-(scale as i32));
                    options.min = Some(if options.unsigned { 0.0 } else { -max });
                    options.max = Some(max);
                }
            }
            options.scale = raw.numeric_scale.map(|scale| scale as u32);
        }
        _ => {}
    }

    let column = Column {
        name: raw.name.clone(),
        generator: kind,
        options,
        foreign_key: None,
        values,
    };
    (column, fallback)
}

/// Attach foreign keys to the columns they constrain. The first key listed
/// for a column wins.
pub fn attach_foreign_keys(columns: &mut [Column], foreign_keys: &[RawForeignKey]) {
    for column in columns {
        if let Some(fk) = foreign_keys
            .iter()
            .find(|fk| fk.column_name.eq_ignore_ascii_case(&column.name))
        {
            column.foreign_key = Some(ForeignKeyRef::new(
                fk.referenced_table.clone(),
                fk.referenced_column.clone(),
            ));
        }
    }
}

fn integer_bounds(data_type: &str, unsigned: bool) -> Option<(f64, f64)> {
    let bits: i32 = match data_type {
        "tinyint" => 8,
        "smallint" => 16,
        "mediumint" => 24,
        "int" | "integer" => 32,
        "bigint" => 64,
        _ => return None,
    };
    let bounds = if unsigned {
        (0.0, (2f64.powi(bits) - 1.0).min(MAX_SAFE_INTEGER))
    } else {
        let half = 2f64.powi(bits - 1).min(2f64.powi(52));
        (-half, half - 1.0)
    };
    Some(bounds)
}

/// Candidate labels from an `enum('a','b')` or `set(...)` column type.
pub fn enum_labels(column_type: &str) -> Vec<String> {
    enum_body(column_type).map(split_labels).unwrap_or_default()
}

fn enum_body(column_type: &str) -> Option<&str> {
    let re = Regex::new(r"(?is)^\s*(?:enum|set)\s*\((.*)\)\s*$").ok()?;
    let captures = re.captures(column_type)?;
    Some(captures.get(1)?.as_str())
}

fn split_labels(inner: &str) -> Vec<String> {
    let mut labels = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        match (quoted, ch) {
            (false, '\'') => quoted = true,
            (false, ',') => labels.push(std::mem::take(&mut current)),
            (false, _) => {}
            (true, '\'') if chars.peek() == Some(&'\'') => {
                chars.next();
                current.push('\'');
            }
            (true, '\\') => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            (true, '\'') => quoted = false,
            (true, _) => current.push(ch),
        }
    }
    labels.push(current);
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_enum_labels_with_quotes() {
        assert_eq!(
            enum_labels("enum('small','it''s','a,b')"),
            vec!["small", "it's", "a,b"]
        );
        assert_eq!(enum_labels("set('r','w','x')"), vec!["r", "w", "x"]);
        assert!(enum_labels("varchar(10)").is_empty());
    }

    #[test]
    fn maps_unsigned_auto_increment_int() {
        let raw = RawColumn {
            column_type: "int(10) unsigned".to_string(),
            extra: "auto_increment".to_string(),
            ..RawColumn::new("id", "int")
        };
        let (column, fallback) = map_column(&raw);
        assert!(fallback.is_none());
        assert_eq!(column.generator, GeneratorKind::Numeric);
        assert!(column.options.unsigned);
        assert!(column.options.auto_increment);
        assert_eq!(column.options.min, Some(0.0));
        assert_eq!(column.options.max, Some(4_294_967_295.0));
    }

    #[test]
    fn maps_enum_cardinality_and_candidates() {
        let raw = RawColumn {
            column_type: "enum('open','closed')".to_string(),
            nullable: true,
            ..RawColumn::new("status", "enum")
        };
        let (column, _) = map_column(&raw);
        assert_eq!(column.options.max, Some(2.0));
        assert!(column.options.nullable);
        assert_eq!(
            column.values,
            Some(Values::List(vec![
                Value::String("open".to_string()),
                Value::String("closed".to_string())
            ]))
        );
    }

    #[test]
    fn maps_decimal_bounds_from_precision() {
        let raw = RawColumn {
            numeric_precision: Some(5),
            numeric_scale: Some(2),
            column_type: "decimal(5,2)".to_string(),
            ..RawColumn::new("price", "decimal")
        };
        let (column, _) = map_column(&raw);
        assert_eq!(column.generator, GeneratorKind::Real);
        assert_eq!(column.options.scale, Some(2));
        let max = column.options.max.expect("max");
        let min = column.options.min.expect("min");
        assert!((max - 999.99).abs() < 1e-9);
        assert!((min + 999.99).abs() < 1e-9);
    }

    #[test]
    fn unknown_types_fall_back_to_string() {
        let raw = RawColumn {
            max_length: None,
            ..RawColumn::new("payload", "json")
        };
        let (column, fallback) = map_column(&raw);
        assert_eq!(column.generator, GeneratorKind::String);
        assert_eq!(fallback.as_deref(), Some("json"));
    }

    #[test]
    fn attaches_first_matching_foreign_key() {
        let mut columns = vec![
            Column::new("id", GeneratorKind::Numeric),
            Column::new("User_Id", GeneratorKind::Numeric),
        ];
        attach_foreign_keys(
            &mut columns,
            &[RawForeignKey {
                column_name: "user_id".to_string(),
                referenced_table: "users".to_string(),
                referenced_column: "id".to_string(),
            }],
        );
        assert!(columns[0].foreign_key.is_none());
        assert_eq!(columns[1].foreign_key, Some(ForeignKeyRef::new("users", "id")));
    }
}
