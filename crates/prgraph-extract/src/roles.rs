//! Participant role classification.
//!
//! Rules are evaluated in order and the first match wins for a comment. A
//! participant takes the role of their latest matching comment; authors whose
//! comments never match stay [`Role::Human`].

use prgraph_core::conversation::Comment;
use serde::{Deserialize, Serialize};

use crate::patterns::contains_any;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
  Human,
  AiSpecialist,
  Coordinator,
  Implementer,
  Analyst,
}

/// One classification rule. Matches when the author contains any marker or
/// the body contains any keyword (both case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRule {
  pub role:           Role,
  #[serde(default)]
  pub author_markers: Vec<String>,
  #[serde(default)]
  pub body_keywords:  Vec<String>,
}

impl RoleRule {
  pub fn new(role: Role) -> Self {
    Self { role, author_markers: vec![], body_keywords: vec![] }
  }

  pub fn author_markers(mut self, markers: &[&str]) -> Self {
    self.author_markers = markers.iter().map(|m| (*m).to_owned()).collect();
    self
  }

  pub fn body_keywords(mut self, keywords: &[&str]) -> Self {
    self.body_keywords = keywords.iter().map(|k| (*k).to_owned()).collect();
    self
  }

  fn matches(&self, author_lower: &str, body_lower: &str) -> bool {
    contains_any(author_lower, &self.author_markers)
      || contains_any(body_lower, &self.body_keywords)
  }
}

pub fn default_role_rules() -> Vec<RoleRule> {
  vec![
    RoleRule::new(Role::AiSpecialist).author_markers(&["[bot]", "-ai-", "devin-ai"]),
    RoleRule::new(Role::Implementer).body_keywords(&["implements", "fix", "solution", "resolves"]),
    RoleRule::new(Role::Analyst).body_keywords(&["analyzes", "root cause", "investigation"]),
    RoleRule::new(Role::Coordinator).body_keywords(&["coordinates", "guidance", "strategy"]),
  ]
}

/// Assigns a role to a single comment, if any rule applies.
pub trait RoleClassifier: Send + Sync {
  fn classify(&self, comment: &Comment) -> Option<Role>;
}

#[derive(Debug, Clone)]
pub struct KeywordRoleClassifier {
  rules: Vec<RoleRule>,
}

impl KeywordRoleClassifier {
  pub fn new(rules: Vec<RoleRule>) -> Self { Self { rules } }
}

impl Default for KeywordRoleClassifier {
  fn default() -> Self { Self::new(default_role_rules()) }
}

impl RoleClassifier for KeywordRoleClassifier {
  fn classify(&self, comment: &Comment) -> Option<Role> {
    let author = comment.author.to_lowercase();
    let body = comment.body.to_lowercase();
    self
      .rules
      .iter()
      .find(|rule| rule.matches(&author, &body))
      .map(|rule| rule.role)
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn comment(author: &str, body: &str) -> Comment {
    Comment {
      id:           "1".into(),
      author:       author.into(),
      created_at:   Utc::now(),
      body:         body.into(),
      comment_type: "comment".into(),
      metadata:     Default::default(),
    }
  }

  #[test]
  fn first_matching_rule_wins() {
    let c = comment("alice", "The root cause needs a fix");
    assert_eq!(KeywordRoleClassifier::default().classify(&c), Some(Role::Implementer));

    let reordered = KeywordRoleClassifier::new(vec![
      RoleRule::new(Role::Analyst).body_keywords(&["root cause"]),
      RoleRule::new(Role::Implementer).body_keywords(&["fix"]),
    ]);
    assert_eq!(reordered.classify(&c), Some(Role::Analyst));
  }

  #[test]
  fn author_markers_are_checked() {
    let c = comment("devin-ai-integration[bot]", "I will fix this");
    assert_eq!(KeywordRoleClassifier::default().classify(&c), Some(Role::AiSpecialist));
  }

  #[test]
  fn no_match_is_none() {
    let c = comment("bob", "Thanks!");
    assert_eq!(KeywordRoleClassifier::default().classify(&c), None);
  }

  #[test]
  fn role_names_are_snake_case() {
    assert_eq!(Role::AiSpecialist.to_string(), "ai_specialist");
    assert_eq!("coordinator".parse::<Role>().unwrap(), Role::Coordinator);
  }
}
