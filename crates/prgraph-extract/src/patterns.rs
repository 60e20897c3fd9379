//! Keyword pattern tables for issue and solution detection.

use serde::{Deserialize, Serialize};

/// A named topic recognised by case-insensitive substring keywords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordPattern {
  pub id:       String,
  pub title:    String,
  pub keywords: Vec<String>,
}

impl KeywordPattern {
  pub fn new(id: &str, title: &str, keywords: &[&str]) -> Self {
    Self {
      id:       id.to_owned(),
      title:    title.to_owned(),
      keywords: keywords.iter().map(|k| (*k).to_owned()).collect(),
    }
  }

  /// `body_lower` must already be lowercase.
  pub fn matches(&self, body_lower: &str) -> bool { contains_any(body_lower, &self.keywords) }
}

/// Whether `haystack_lower` contains any of `needles`, ignoring their case.
pub fn contains_any<S: AsRef<str>>(haystack_lower: &str, needles: &[S]) -> bool {
  needles
    .iter()
    .any(|n| haystack_lower.contains(&n.as_ref().to_lowercase()))
}

pub fn default_issue_patterns() -> Vec<KeywordPattern> {
  vec![
    KeywordPattern::new("authentication_issue", "Authentication Flow", &[
      "403",
      "401",
      "authentication",
      "auth",
      "token",
    ]),
    KeywordPattern::new("message_format_issue", "Message Format", &[
      "500",
      "malformed",
      "payload",
      "json",
    ]),
    KeywordPattern::new("duplication_issue", "Message Duplication", &[
      "duplicate",
      "duplication",
      "twice",
    ]),
    KeywordPattern::new("api_parsing_issue", "API Parsing", &[
      "parsing",
      "field",
      "uuid",
      "message_uuid",
    ]),
    KeywordPattern::new("debug_execution_issue", "Debug Execution", &[
      "debug",
      "logs",
      "not executing",
    ]),
  ]
}

pub fn default_solution_patterns() -> Vec<KeywordPattern> {
  vec![
    KeywordPattern::new("message_format_fix", "Message Format Fix", &[
      "jsonencode",
      "json.encode",
      "payload fix",
    ]),
    KeywordPattern::new("api_parsing_fix", "API Parsing Fix", &[
      "message_uuid",
      "field mapping",
      "fromtinv3json",
    ]),
    KeywordPattern::new("authentication_fix", "Authentication Fix", &[
      "auth fix",
      "token handling",
      "jwt",
    ]),
    KeywordPattern::new("duplication_fix", "Duplication Fix", &[
      "deduplication",
      "addmessagewithoutduplicates",
    ]),
  ]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn matching_ignores_keyword_case() {
    let p = KeywordPattern::new("x", "X", &["JWT"]);
    assert!(p.matches("switched to jwt tokens"));
    assert!(!p.matches("switched to sessions"));
  }

  #[test]
  fn default_ids_are_unique() {
    let mut ids: Vec<_> = default_issue_patterns()
      .into_iter()
      .chain(default_solution_patterns())
      .map(|p| p.id)
      .collect();
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total);
  }
}
