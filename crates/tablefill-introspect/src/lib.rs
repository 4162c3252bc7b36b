//! Schema extraction from database metadata.

pub mod extract;
pub mod mapper;
pub mod mysql;
pub mod source;

pub use extract::{Extraction, extract_schema};
pub use mysql::MySqlMetadataSource;
pub use source::{MetadataSource, RawColumn, RawForeignKey, RawTable};

pub use tablefill_core::Schema;
