//! Entity extraction: participants, issues and solutions.
//!
//! Extraction is deterministic. Participants appear in first-comment order;
//! topics appear in the order they are first detected.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use prgraph_core::{
  conversation::{Comment, PrConversation},
  graph::{GraphNode, Properties, node_type},
};
use serde_json::{Value, json};

use crate::{
  config::{ExtractionConfig, TopicStrategy},
  patterns::{KeywordPattern, contains_any},
  roles::{KeywordRoleClassifier, Role, RoleClassifier},
};

const ISSUE_INDICATORS: &[&str] = &["error", "bug", "issue", "problem", "fails", "broken"];
const SOLUTION_INDICATORS: &[&str] = &["fix", "solution", "resolve", "implement", "patch"];
const ISSUE_NODE_KEYWORDS: &[&str] = &["error", "bug", "issue", "problem"];
const SOLUTION_NODE_KEYWORDS: &[&str] = &["fix", "solution", "resolve", "implement"];

/// Characters kept in a sentence-derived title before `...` is appended.
pub const TITLE_LIMIT: usize = 100;

// ─── Extracted records ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
  pub id:            String,
  pub role:          Role,
  pub comment_count: usize,
  pub first_comment: DateTime<Utc>,
}

impl Participant {
  pub fn to_node(&self) -> GraphNode {
    let mut properties = Properties::new();
    properties.insert("role".into(), json!(self.role));
    properties.insert("comment_count".into(), json!(self.comment_count));
    properties.insert("first_comment".into(), json!(self.first_comment));
    GraphNode {
      id: self.id.clone(),
      label: self.id.clone(),
      kind: node_type::PARTICIPANT.into(),
      properties,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
  Issue,
  Solution,
}

impl TopicKind {
  pub fn node_type(self) -> &'static str {
    match self {
      TopicKind::Issue => node_type::ISSUE,
      TopicKind::Solution => node_type::SOLUTION,
    }
  }

  fn authors_field(self) -> &'static str {
    match self {
      TopicKind::Issue => "mentioned_by",
      TopicKind::Solution => "proposed_by",
    }
  }

  fn first_seen_field(self) -> &'static str {
    match self {
      TopicKind::Issue => "first_mentioned",
      TopicKind::Solution => "first_proposed",
    }
  }
}

/// An issue or a solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
  pub id:         String,
  pub kind:       TopicKind,
  pub title:      String,
  /// Keywords used for relationship matching.
  pub keywords:   Vec<String>,
  /// Authors of every comment that mentioned this topic, repeats included.
  pub authors:    Vec<String>,
  pub first_seen: DateTime<Utc>,
  /// Strategy-specific properties.
  pub extra:      Properties,
}

impl Topic {
  /// `body_lower` must already be lowercase.
  pub fn mentioned_in(&self, body_lower: &str) -> bool { contains_any(body_lower, &self.keywords) }

  pub fn to_node(&self) -> GraphNode {
    let mut properties = self.extra.clone();
    properties.insert("title".into(), json!(self.title));
    properties.insert("keywords".into(), json!(self.keywords));
    properties.insert(self.kind.authors_field().into(), json!(self.authors));
    properties.insert(self.kind.first_seen_field().into(), json!(self.first_seen));
    GraphNode {
      id: self.id.clone(),
      label: self.title.clone(),
      kind: self.kind.node_type().into(),
      properties,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedEntities {
  pub participants: Vec<Participant>,
  pub issues:       Vec<Topic>,
  pub solutions:    Vec<Topic>,
}

impl ExtractedEntities {
  /// Participants, then issues, then solutions.
  pub fn nodes(&self) -> Vec<GraphNode> {
    self
      .participants
      .iter()
      .map(Participant::to_node)
      .chain(self.issues.iter().map(Topic::to_node))
      .chain(self.solutions.iter().map(Topic::to_node))
      .collect()
  }

  pub fn node_ids(&self) -> Vec<&str> {
    self
      .participants
      .iter()
      .map(|p| p.id.as_str())
      .chain(self.issues.iter().map(|t| t.id.as_str()))
      .chain(self.solutions.iter().map(|t| t.id.as_str()))
      .collect()
  }
}

// ─── Extractor ───────────────────────────────────────────────────────────────

pub struct EntityExtractor {
  strategy:          TopicStrategy,
  issue_patterns:    Vec<KeywordPattern>,
  solution_patterns: Vec<KeywordPattern>,
  classifier:        Arc<dyn RoleClassifier>,
}

impl EntityExtractor {
  pub fn new(config: &ExtractionConfig) -> Self {
    Self {
      strategy:          config.topic_strategy,
      issue_patterns:    config.issue_patterns.clone(),
      solution_patterns: config.solution_patterns.clone(),
      classifier:        Arc::new(KeywordRoleClassifier::new(config.role_rules.clone())),
    }
  }

  pub fn with_classifier(mut self, classifier: Arc<dyn RoleClassifier>) -> Self {
    self.classifier = classifier;
    self
  }

  pub fn extract(&self, conversation: &PrConversation) -> ExtractedEntities {
    let comments = &conversation.comments;
    let (issues, solutions) = match self.strategy {
      TopicStrategy::Patterns => (
        pattern_topics(comments, &self.issue_patterns, TopicKind::Issue),
        pattern_topics(comments, &self.solution_patterns, TopicKind::Solution),
      ),
      TopicStrategy::Sentences => (
        sentence_topics(comments, TopicKind::Issue),
        sentence_topics(comments, TopicKind::Solution),
      ),
    };

    ExtractedEntities {
      participants: self.participants(comments),
      issues,
      solutions,
    }
  }

  fn participants(&self, comments: &[Comment]) -> Vec<Participant> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut participants: Vec<Participant> = Vec::new();

    for comment in comments {
      let slot = *index.entry(comment.author.as_str()).or_insert_with(|| {
        participants.push(Participant {
          id:            comment.author.clone(),
          role:          Role::Human,
          comment_count: 0,
          first_comment: comment.created_at,
        });
        participants.len() - 1
      });

      let participant = &mut participants[slot];
      participant.comment_count += 1;
      if let Some(role) = self.classifier.classify(comment) {
        participant.role = role;
      }
    }

    participants
  }
}

// ─── Topic strategies ────────────────────────────────────────────────────────

fn pattern_topics(
  comments: &[Comment],
  patterns: &[KeywordPattern],
  kind: TopicKind,
) -> Vec<Topic> {
  let mut index: HashMap<&str, usize> = HashMap::new();
  let mut topics: Vec<Topic> = Vec::new();

  for comment in comments {
    let body = comment.body.to_lowercase();
    for pattern in patterns.iter().filter(|p| p.matches(&body)) {
      let slot = *index.entry(pattern.id.as_str()).or_insert_with(|| {
        topics.push(Topic {
          id:         pattern.id.clone(),
          kind,
          title:      pattern.title.clone(),
          keywords:   pattern.keywords.clone(),
          authors:    vec![],
          first_seen: comment.created_at,
          extra:      Properties::new(),
        });
        topics.len() - 1
      });
      topics[slot].authors.push(comment.author.clone());
    }
  }

  topics
}

fn sentence_topics(comments: &[Comment], kind: TopicKind) -> Vec<Topic> {
  let (indicators, node_keywords, id_prefix) = match kind {
    TopicKind::Issue => (ISSUE_INDICATORS, ISSUE_NODE_KEYWORDS, "issue"),
    TopicKind::Solution => (SOLUTION_INDICATORS, SOLUTION_NODE_KEYWORDS, "solution"),
  };

  let mut topics = Vec::new();
  for comment in comments {
    let body = comment.body.to_lowercase();
    let sentences: Vec<&str> = comment
      .body
      .split('.')
      .map(str::trim)
      .filter(|s| contains_any(&s.to_lowercase(), indicators))
      .collect();
    let Some(first) = sentences.first() else { continue };

    let mut extra = Properties::new();
    extra.insert("description".into(), json!(sentences.join(" ")));
    extra.insert("author".into(), json!(comment.author));
    extra.insert("comment_id".into(), json!(comment.id));
    match kind {
      TopicKind::Issue => {
        let high = contains_any(&body, &["critical", "urgent", "blocking"]);
        extra.insert("severity".into(), Value::from(if high { "high" } else { "medium" }));
      }
      TopicKind::Solution => {
        let high = contains_any(&body, &["complex", "refactor", "overhaul"]);
        extra.insert("complexity".into(), Value::from(if high { "high" } else { "medium" }));
      }
    }

    topics.push(Topic {
      id: format!("{id_prefix}_{}", topics.len() + 1),
      kind,
      title: truncate_title(first),
      keywords: node_keywords.iter().map(|k| (*k).to_owned()).collect(),
      authors: vec![comment.author.clone()],
      first_seen: comment.created_at,
      extra,
    });
  }

  topics
}

/// Keep the first [`TITLE_LIMIT`] characters, marking any cut with `...`.
pub fn truncate_title(sentence: &str) -> String {
  match sentence.char_indices().nth(TITLE_LIMIT) {
    Some((cut, _)) => format!("{}...", &sentence[..cut]),
    None => sentence.to_owned(),
  }
}
