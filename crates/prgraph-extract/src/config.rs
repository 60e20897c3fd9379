//! Tunables for extraction, deserialised from the server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
  patterns::{KeywordPattern, default_issue_patterns, default_solution_patterns},
  roles::{RoleRule, default_role_rules},
};

/// How issue and solution nodes are discovered.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TopicStrategy {
  /// Named keyword pattern tables; node ids are the pattern ids.
  #[default]
  Patterns,
  /// One node per comment containing an indicator sentence.
  Sentences,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
  /// Upper bound on each analyzer call.
  pub analyzer_timeout_secs: u64,
  /// Upper bound on one whole extraction run before falling back to
  /// keyword-only extraction.
  pub analysis_timeout_secs: u64,
  /// Trailing comments considered for breakthrough detection.
  pub breakthrough_window:   usize,
  pub topic_strategy:        TopicStrategy,
  pub issue_patterns:        Vec<KeywordPattern>,
  pub solution_patterns:     Vec<KeywordPattern>,
  pub role_rules:            Vec<RoleRule>,
}

impl Default for ExtractionConfig {
  fn default() -> Self {
    Self {
      analyzer_timeout_secs: 30,
      analysis_timeout_secs: 300,
      breakthrough_window:   10,
      topic_strategy:        TopicStrategy::Patterns,
      issue_patterns:        default_issue_patterns(),
      solution_patterns:     default_solution_patterns(),
      role_rules:            default_role_rules(),
    }
  }
}

impl ExtractionConfig {
  pub fn analyzer_timeout(&self) -> Duration { Duration::from_secs(self.analyzer_timeout_secs) }

  pub fn analysis_timeout(&self) -> Duration { Duration::from_secs(self.analysis_timeout_secs) }
}
