use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical column kind selecting a generator.
///
/// The set is closed: an unknown tag in a schema or override document is a
/// deserialization error rather than a silent fallback at fill time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    Bit,
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "varchar", alias = "char", alias = "text")]
    String,
    #[serde(alias = "int", alias = "integer")]
    Numeric,
    #[serde(alias = "decimal", alias = "float", alias = "double")]
    Real,
    Date,
    #[serde(rename = "datetime", alias = "timestamp")]
    DateTime,
    Time,
    Year,
    Enum,
    Set,
}

impl GeneratorKind {
    pub const ALL: [GeneratorKind; 11] = [
        GeneratorKind::Bit,
        GeneratorKind::Boolean,
        GeneratorKind::String,
        GeneratorKind::Numeric,
        GeneratorKind::Real,
        GeneratorKind::Date,
        GeneratorKind::DateTime,
        GeneratorKind::Time,
        GeneratorKind::Year,
        GeneratorKind::Enum,
        GeneratorKind::Set,
    ];

    /// Map a MySQL `DATA_TYPE` (plus the full `COLUMN_TYPE`) to a kind.
    ///
    /// Returns `None` for types no generator can produce (json, spatial).
    pub fn from_data_type(data_type: &str, column_type: &str) -> Option<Self> {
        let data_type = data_type.trim().to_lowercase();
        let column_type = column_type.trim().to_lowercase();
        let kind = match data_type.as_str() {
            "bit" => GeneratorKind::Bit,
            "bool" | "boolean" => GeneratorKind::Boolean,
            "tinyint" if column_type.starts_with("tinyint(1)") => GeneratorKind::Boolean,
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" => {
                GeneratorKind::Numeric
            }
            "decimal" | "numeric" | "float" | "double" | "real" => GeneratorKind::Real,
            "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "binary"
            | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
                GeneratorKind::String
            }
            "date" => GeneratorKind::Date,
            "datetime" | "timestamp" => GeneratorKind::DateTime,
            "time" => GeneratorKind::Time,
            "year" => GeneratorKind::Year,
            "enum" => GeneratorKind::Enum,
            "set" => GeneratorKind::Set,
            _ => return None,
        };
        Some(kind)
    }

    /// Kinds whose `options.max` is a length or width and must always be set.
    pub fn requires_max(self) -> bool {
        matches!(
            self,
            GeneratorKind::Bit | GeneratorKind::String | GeneratorKind::Enum | GeneratorKind::Set
        )
    }

    /// Kinds that pick among declared candidate values.
    pub fn uses_candidates(self) -> bool {
        matches!(self, GeneratorKind::Enum | GeneratorKind::Set)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GeneratorKind::Bit => "bit",
            GeneratorKind::Boolean => "boolean",
            GeneratorKind::String => "string",
            GeneratorKind::Numeric => "numeric",
            GeneratorKind::Real => "real",
            GeneratorKind::Date => "date",
            GeneratorKind::DateTime => "datetime",
            GeneratorKind::Time => "time",
            GeneratorKind::Year => "year",
            GeneratorKind::Enum => "enum",
            GeneratorKind::Set => "set",
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate values attached to a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Values {
    /// Name of a pool declared in the schema-level `values` map.
    Pointer(String),
    /// Ordered candidates drawn uniformly.
    List(Vec<Value>),
    /// Candidate to selection weight; weights need not sum to one.
    Ratio(BTreeMap<String, f64>),
}

impl Values {
    /// Number of candidates, resolving pointers against `pools`.
    pub fn cardinality(&self, pools: &BTreeMap<String, Vec<Value>>) -> Option<usize> {
        match self {
            Values::Pointer(name) => pools.get(name).map(Vec::len),
            Values::List(values) => Some(values.len()),
            Values::Ratio(weights) => Some(weights.len()),
        }
    }

    /// Candidate values as text, resolving pointers against `pools`.
    pub fn labels(&self, pools: &BTreeMap<String, Vec<Value>>) -> Option<Vec<String>> {
        let labels = match self {
            Values::Pointer(name) => pools.get(name)?.iter().map(value_label).collect(),
            Values::List(values) => values.iter().map(value_label).collect(),
            Values::Ratio(weights) => weights.keys().cloned().collect(),
        };
        Some(labels)
    }
}

fn value_label(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_mysql_data_types() {
        assert_eq!(
            GeneratorKind::from_data_type("tinyint", "tinyint(1)"),
            Some(GeneratorKind::Boolean)
        );
        assert_eq!(
            GeneratorKind::from_data_type("tinyint", "tinyint(4) unsigned"),
            Some(GeneratorKind::Numeric)
        );
        assert_eq!(
            GeneratorKind::from_data_type("VARCHAR", "varchar(32)"),
            Some(GeneratorKind::String)
        );
        assert_eq!(
            GeneratorKind::from_data_type("timestamp", "timestamp"),
            Some(GeneratorKind::DateTime)
        );
        assert_eq!(GeneratorKind::from_data_type("json", "json"), None);
    }

    #[test]
    fn unknown_generator_tag_is_rejected() {
        let parsed: std::result::Result<GeneratorKind, _> = serde_json::from_value(json!("lorem"));
        assert!(parsed.is_err());
        let alias: GeneratorKind = serde_json::from_value(json!("varchar")).expect("alias");
        assert_eq!(alias, GeneratorKind::String);
    }

    #[test]
    fn values_deserialize_each_shape() {
        let pointer: Values = serde_json::from_value(json!("colors")).expect("pointer");
        assert_eq!(pointer, Values::Pointer("colors".to_string()));

        let list: Values = serde_json::from_value(json!(["a", 1, true])).expect("list");
        assert!(matches!(list, Values::List(ref items) if items.len() == 3));

        let ratio: Values = serde_json::from_value(json!({"red": 0.2, "blue": 0.8})).expect("ratio");
        assert!(matches!(ratio, Values::Ratio(ref weights) if weights["blue"] == 0.8));
    }

    #[test]
    fn cardinality_resolves_pointers() {
        let mut pools = BTreeMap::new();
        pools.insert("colors".to_string(), vec![json!("red"), json!("green")]);
        assert_eq!(
            Values::Pointer("colors".to_string()).cardinality(&pools),
            Some(2)
        );
        assert_eq!(Values::Pointer("missing".to_string()).cardinality(&pools), None);
        assert_eq!(
            Values::List(vec![json!(1), json!(2), json!(3)])
                .labels(&pools)
                .expect("labels"),
            vec!["1", "2", "3"]
        );
    }
}
