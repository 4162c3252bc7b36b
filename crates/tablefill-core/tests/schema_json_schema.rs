use schemars::schema_for;
use tablefill_core::{CustomSchema, Schema};

#[test]
fn schema_json_schema_names_document_fields() {
    let generated = serde_json::to_value(schema_for!(Schema)).expect("serialize json schema");
    let properties = generated["properties"].as_object().expect("properties");
    for field in ["maxCharLength", "tables", "values"] {
        assert!(properties.contains_key(field), "missing {field}");
    }
    let definitions = generated["definitions"].as_object().expect("definitions");
    for name in ["Table", "Column", "ColumnOptions", "GeneratorKind", "Values", "ForeignKeyRef"] {
        assert!(definitions.contains_key(name), "missing definition {name}");
    }
}

#[test]
fn override_json_schema_lists_ignored_tables() {
    let generated =
        serde_json::to_value(schema_for!(CustomSchema)).expect("serialize json schema");
    assert!(generated["properties"]["ignoredTables"].is_object());
}
