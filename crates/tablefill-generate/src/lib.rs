//! Seeded row generation and the fill orchestrator for tablefill.
//!
//! This crate consumes a resolved `Schema` (tables in fill order) and writes
//! deterministic synthetic rows to a `PersistenceSink`.

pub mod engine;
pub mod errors;
pub mod filter;
pub mod generators;
pub mod model;
pub mod output;
pub mod planner;
pub mod rng;
pub mod sink;
pub mod unique;

pub use engine::{FillControl, Filler};
pub use errors::{FillError, GenerationError};
pub use generators::{GeneratedValue, Generator, GeneratorContext, GeneratorRegistry, Row};
pub use model::{FillOptions, FillReport, RunState, TableReport, TableState};
pub use output::csv::CsvSink;
pub use rng::{Draw, Mt19937};
pub use sink::{MemorySink, PersistenceSink};
