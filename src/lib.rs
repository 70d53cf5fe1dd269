//! Prompt-to-contract pipeline
//!
//! Turns a natural-language request into a customized, structurally validated
//! Move source bundle:
//! - intent classification over weighted keyword categories
//! - local + remote contract retrieval with ranking and caching
//! - best-effort source model extraction, validation and customization
//! - token-budgeted reference context and history assembly
//! - a staged async orchestrator with push-based progress reporting

pub mod aggregator;
pub mod config;
pub mod context;
pub mod error;
pub mod intent;
pub mod metrics;
pub mod pipeline;
pub mod source;
pub mod telemetry;

pub use config::Config;
pub use error::{ForgeError, Result};
pub use pipeline::{build_orchestrator, PipelineOrchestrator, PipelineRequest, PipelineResult};
