//! Core contracts and helpers for tablefill.
//!
//! This crate defines the schema document, the override document, the
//! fill-order resolver and the customizer that merges the two documents.

pub mod constraints;
pub mod customize;
pub mod error;
pub mod graph;
pub mod overrides;
pub mod redaction;
pub mod schema;
pub mod types;
pub mod validation;

pub use constraints::ForeignKeyRef;
pub use customize::{Customized, customize, merge_column, merge_options, merge_table};
pub use error::{Error, Result};
pub use graph::{CyclePolicy, Edge, Resolution, TableNode, resolve_fill_order};
pub use overrides::{ColumnOverride, CustomSchema, OptionsOverride, TableOverride};
pub use redaction::{RedactedConnection, redact_connection_string};
pub use schema::{Column, ColumnOptions, DEFAULT_MAX_CHAR_LENGTH, Schema, Table};
pub use types::{GeneratorKind, Values};
pub use validation::validate_schema;
