use tablefill_core::{Column, ColumnOptions, ForeignKeyRef, GeneratorKind, Schema, Table, Values};

#[test]
fn serializes_schema_deterministically() {
    let schema = Schema {
        tables: vec![Table::new("users", 2)
            .with_column(Column::new("id", GeneratorKind::Numeric).with_options(ColumnOptions {
                auto_increment: true,
                ..ColumnOptions::default()
            }))
            .with_column(Column::new("email", GeneratorKind::String).with_options(ColumnOptions {
                unique: true,
                max: Some(64.0),
                ..ColumnOptions::default()
            }))],
        ..Schema::default()
    };

    let json = schema.to_json_pretty().expect("serialize schema");
    let expected = r#"{
  "maxCharLength": 255,
  "tables": [
    {
      "name": "users",
      "lines": 2,
      "columns": [
        {
          "name": "id",
          "generator": "numeric",
          "options": {
            "autoIncrement": true
          }
        },
        {
          "name": "email",
          "generator": "string",
          "options": {
            "unique": true,
            "max": 64.0
          }
        }
      ]
    }
  ],
  "values": {}
}"#;
    assert_eq!(json, expected);
}

#[test]
fn reads_hand_written_schema_document() {
    let text = r#"{
        "tables": [{
            "name": "orders",
            "lines": 10,
            "addLines": 4,
            "columns": [
                {"name": "user_id", "generator": "numeric",
                 "foreignKey": {"table": "users", "column": "id", "where": "active = 1"}},
                {"name": "status", "generator": "enum", "options": {"max": 2},
                 "values": {"open": 3, "closed": 1}},
                {"name": "placed_at", "generator": "datetime",
                 "options": {"minDate": "2020-01-01", "maxDate": "shipped_at"}}
            ]
        }],
        "values": {"colors": ["red", "green"]}
    }"#;

    let schema = Schema::from_json(text).expect("parse schema");
    assert_eq!(schema.max_char_length, 255);
    let orders = schema.table("ORDERS").expect("orders");
    assert_eq!(orders.add_lines, Some(4));
    assert_eq!(orders.referenced_tables(), vec!["users".to_string()]);

    let user_id = orders.column("user_id").expect("user_id");
    assert_eq!(
        user_id.foreign_key,
        Some(ForeignKeyRef::new("users", "id").with_filter("active = 1"))
    );

    let status = orders.column("status").expect("status");
    assert!(matches!(status.values, Some(Values::Ratio(ref weights)) if weights["open"] == 3.0));

    let placed_at = orders.column("placed_at").expect("placed_at");
    assert_eq!(placed_at.generator, GeneratorKind::DateTime);
    assert_eq!(placed_at.options.max_date.as_deref(), Some("shipped_at"));
    assert_eq!(schema.values["colors"].len(), 2);
}

#[test]
fn unknown_generator_fails_to_parse() {
    let text = r#"{"tables": [{"name": "t", "columns": [{"name": "c", "generator": "uuid"}]}]}"#;
    assert!(Schema::from_json(text).is_err());
}
