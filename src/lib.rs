// src/lib.rs
//! Carries custom line markers through an external text converter.
//!
//! Marker lines are swapped for unique placeholders, the document is run
//! through a converter that knows nothing about them, and the placeholders
//! are found again afterwards and replaced with each marker's rendered text.
//! Range assignment then turns the relocated markers into sections,
//! collector positions and removal regions.
pub mod config;
pub mod markers;
pub mod pipeline;
pub mod render;
pub mod storage;
pub mod utils;

pub use config::{PostprocessReport, RuleSet};
pub use markers::{BoundaryRole, Match, MatchKind, MatchRecord, MarkerRegistry, MarkerTemplate, TemplateKind};
pub use pipeline::{CommandConverter, Converter, MatchMap, ParsedDocument, Passthrough, Pipeline};
pub use storage::StorageManager;
pub use utils::error::{AppError, ConfigError, ConvertError, MarkerError, PipelineError, RangeError, StorageError};
