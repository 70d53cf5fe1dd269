//! Best-effort structural scanning of Move contract sources
//!
//! None of this is a parser. The extractor, validator and customizer work on
//! text with regular expressions and brace counting, and callers must treat
//! their output as a heuristic summary.

pub mod customizer;
pub mod extractor;
pub mod models;
pub mod validator;

pub use customizer::{sanitize_identifier, SourceCustomizer};
pub use extractor::SourceModelExtractor;
pub use models::{CustomizationOptions, SourceModel, ValidationReport};
pub use validator::{SourceValidator, ValidatorConfig};
