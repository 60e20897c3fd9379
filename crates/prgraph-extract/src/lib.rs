//! Knowledge-graph extraction from pull-request conversations.
//!
//! The pipeline runs in three stages:
//!
//! 1. [`entities`] finds participants, issues and solutions.
//! 2. [`relationships`] connects them, asking the [`analyzer`] first and
//!    falling back to keyword rules whenever it is unavailable. An optional
//!    critic reviews the analyzer's answers and triggers one refinement.
//! 3. [`assemble`] drops relationships whose endpoints are not nodes and
//!    builds the final graph.
//!
//! [`pipeline::ExtractionPipeline`] wires the stages together.

pub mod analyzer;
pub mod assemble;
pub mod config;
pub mod entities;
pub mod patterns;
pub mod pipeline;
pub mod prompts;
pub mod relationships;
pub mod roles;

pub use analyzer::{
  Analyzer, AnalyzerUnavailable, CallCounts, Completion, CompletionError, Critique, Unavailable,
};
pub use config::ExtractionConfig;
pub use pipeline::{AnalyzerStatus, ExtractionPipeline};
