use schemars::schema_for;
use tablefill_core::{CustomSchema, Schema};

fn main() {
    let which = std::env::args().nth(1).unwrap_or_else(|| "schema".to_string());
    let schema = match which.as_str() {
        "custom" => schema_for!(CustomSchema),
        _ => schema_for!(Schema),
    };
    let json = serde_json::to_string_pretty(&schema).expect("serialize json schema");
    println!("{json}");
}
