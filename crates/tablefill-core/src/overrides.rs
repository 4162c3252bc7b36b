//! User override document (`custom_schema.jsonc`).
//!
//! Every field is optional; whatever is present is layered onto the
//! extracted schema by [`crate::customize`].

use std::collections::BTreeMap;

use jsonc_parser::{ParseOptions, parse_to_serde_value};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constraints::ForeignKeyRef;
use crate::error::{Error, Result};
use crate::types::{GeneratorKind, Values};

/// Partial schema supplied by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_char_length: Option<u32>,
    /// Tables excluded from extraction and filling.
    pub ignored_tables: Vec<String>,
    pub tables: Vec<TableOverride>,
    pub values: BTreeMap<String, Vec<Value>>,
}

/// Partial table override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableOverride {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lines: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_lines: Option<u64>,
    #[serde(default)]
    pub columns: Vec<ColumnOverride>,
}

/// Partial column override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnOverride {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<GeneratorKind>,
    #[serde(default)]
    pub options: OptionsOverride,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Values>,
}

/// Column options where every key is optional; a set key wins on merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionsOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_increment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsigned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_date: Option<String>,
}

impl CustomSchema {
    /// Parse a JSONC override document. Blank input yields an empty override set.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let value = parse_to_serde_value(text, &ParseOptions::default())
            .map_err(|err| Error::Jsonc(err.to_string()))?;
        Ok(serde_json::from_value(value.unwrap_or_default())?)
    }

    /// Parse, degrading to an empty override set on malformed input.
    ///
    /// The second element carries the warning the caller must surface.
    pub fn parse_lenient(text: &str) -> (Self, Option<String>) {
        match Self::parse(text) {
            Ok(schema) => (schema, None),
            Err(err) => (
                Self::default(),
                Some(format!(
                    "override document ignored, no customization applied: {err}"
                )),
            ),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn table(&self, name: &str) -> Option<&TableOverride> {
        self.tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored_tables
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(name))
    }

    /// Tables referenced by foreign keys forced through overrides of `table`.
    pub fn forced_references(&self, table: &str) -> Vec<String> {
        self.table(table)
            .map(|table| {
                table
                    .columns
                    .iter()
                    .filter_map(|column| column.foreign_key.as_ref())
                    .map(|fk| fk.table.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_jsonc_with_comments_and_trailing_commas() {
        let text = r#"{
            // cap every string
            "maxCharLength": 32,
            /* skip audit tables */
            "ignoredTables": ["audit_log",],
            "tables": [
                {
                    "name": "users",
                    "lines": 10,
                    "columns": [
                        { "name": "homepage", "values": ["http://example.com/a//b"] },
                    ],
                },
            ],
        }"#;
        let schema = CustomSchema::parse(text).expect("parse jsonc");
        assert_eq!(schema.max_char_length, Some(32));
        assert!(schema.is_ignored("AUDIT_LOG"));
        let users = schema.table("Users").expect("users override");
        assert_eq!(users.lines, Some(10));
        assert_eq!(
            users.columns[0].values,
            Some(Values::List(vec![Value::String(
                "http://example.com/a//b".to_string()
            )]))
        );
    }

    #[test]
    fn comment_markers_inside_strings_are_kept() {
        let text = r#"{
            "ignoredTables": ["a/*b*/c", "say \"//hi\""], // trailing note
        }"#;
        let schema = CustomSchema::parse(text).expect("parse jsonc");
        assert_eq!(
            schema.ignored_tables,
            vec!["a/*b*/c".to_string(), "say \"//hi\"".to_string()]
        );
    }

    #[test]
    fn unterminated_comment_is_a_jsonc_error() {
        let err = CustomSchema::parse("{ \"lines\": 3 /* open").expect_err("unterminated");
        assert!(matches!(err, Error::Jsonc(_)));
    }

    #[test]
    fn blank_document_is_empty_override() {
        assert_eq!(CustomSchema::parse("  \n").expect("blank"), CustomSchema::default());
    }

    #[test]
    fn malformed_document_falls_back_with_warning() {
        let (schema, warning) = CustomSchema::parse_lenient("{ \"tables\": [ { oops } ] }");
        assert_eq!(schema, CustomSchema::default());
        let warning = warning.expect("warning");
        assert!(warning.contains("no customization applied"));
    }

    #[test]
    fn forced_references_come_from_override_foreign_keys() {
        let text = r#"{"tables": [{"name": "orders", "columns": [
            {"name": "owner", "foreignKey": {"table": "users", "column": "id", "where": "active = 1"}}
        ]}]}"#;
        let schema = CustomSchema::parse(text).expect("parse");
        assert_eq!(schema.forced_references("ORDERS"), vec!["users".to_string()]);
        let fk = schema.tables[0].columns[0].foreign_key.as_ref().expect("fk");
        assert_eq!(fk.filter.as_deref(), Some("active = 1"));
    }
}
