//! Relationship extraction.
//!
//! Each comment runs through a fallback chain: analyzer relationship
//! extraction, then analyzer role analysis, then keyword rules. When a critic
//! is configured, a non-empty first extraction is reviewed and, if the review
//! has suggestions, refined once. Reply chains, solution/issue resolution and
//! breakthrough moments are added on top.

use std::collections::BTreeSet;

use prgraph_core::{
  conversation::{Comment, PrConversation},
  graph::{GraphNode, Properties, Triplet, node_type, predicate},
};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
  analyzer::{Analyzer, BreakthroughMoment, ParticipantAnalysis, RelationshipCandidate},
  entities::{ExtractedEntities, Topic},
  patterns::contains_any,
};

pub const FALLBACK_METHOD: &str = "fallback_keywords";

/// Literal target of `PROVIDES` edges found by keyword fallback.
pub const STRATEGIC_GUIDANCE: &str = "strategic_guidance";

/// Literal target of `VALIDATES_SYSTEMATICALLY` edges.
pub const METHODOLOGY_FRAMEWORK: &str = "methodology_framework";

const ANALYZES_CUES: &[&str] = &["analyzes", "analysis", "root cause"];
const IMPLEMENTS_CUES: &[&str] = &["implements", "implementing", "fix applied"];
const PROVIDES_CUES: &[&str] = &["provides", "guidance", "coordinates"];

/// How the per-comment relationships of one run were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ExtractionMethod {
  /// Every comment was handled by the analyzer.
  Llm,
  /// Some comments needed the keyword fallback.
  Mixed,
  /// No comment was handled by the analyzer.
  KeywordFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRelationships {
  pub triplets: Vec<Triplet>,
  pub moments:  Vec<GraphNode>,
  pub method:   ExtractionMethod,
}

pub struct RelationshipExtractor<'a> {
  analyzer:            &'a Analyzer,
  critic:              Option<&'a Analyzer>,
  breakthrough_window: usize,
}

impl<'a> RelationshipExtractor<'a> {
  pub fn new(analyzer: &'a Analyzer, breakthrough_window: usize) -> Self {
    Self { analyzer, critic: None, breakthrough_window }
  }

  /// Review first extractions with `critic`.
  pub fn with_critic(mut self, critic: Option<&'a Analyzer>) -> Self {
    self.critic = critic;
    self
  }

  pub async fn extract(
    &self,
    conversation: &PrConversation,
    entities: &ExtractedEntities,
  ) -> ExtractedRelationships {
    let comments = &conversation.comments;
    let (moments, mut triplets) = self.breakthroughs(comments).await;

    let entity_ids = entities.node_ids();
    let mut analyzed = 0usize;
    for comment in comments {
      match self.analyze_comment(comment, entities, &entity_ids).await {
        Some(found) => {
          analyzed += 1;
          triplets.extend(found);
        }
        None => triplets.extend(keyword_relationships(comment, entities)),
      }
    }

    triplets.extend(reply_chain(comments));
    triplets.extend(resolutions(entities));

    let method = match analyzed {
      0 => ExtractionMethod::KeywordFallback,
      n if n == comments.len() => ExtractionMethod::Llm,
      _ => ExtractionMethod::Mixed,
    };

    ExtractedRelationships { triplets, moments, method }
  }

  /// `None` when the analyzer could not handle this comment at all.
  async fn analyze_comment(
    &self,
    comment: &Comment,
    entities: &ExtractedEntities,
    entity_ids: &[&str],
  ) -> Option<Vec<Triplet>> {
    match self.analyzer.extract_relationships(comment, entity_ids).await {
      Ok(candidates) if !candidates.is_empty() => {
        let candidates = self.reviewed(comment, entity_ids, candidates).await;
        return Some(
          candidates
            .into_iter()
            .map(|c| candidate_triplet(c, comment))
            .collect(),
        );
      }
      Ok(_) => debug!(comment = %comment.id, "analyzer found no relationships"),
      Err(e) => debug!(comment = %comment.id, error = %e, "relationship extraction unavailable"),
    }

    match self.analyzer.analyze_participant(comment).await {
      Ok(analysis) => Some(role_relationships(comment, &analysis, entities)),
      Err(e) => {
        debug!(comment = %comment.id, error = %e, "role analysis unavailable");
        None
      }
    }
  }

  /// The refined extraction when the critic has suggestions and refinement
  /// succeeds, otherwise `candidates` unchanged.
  async fn reviewed(
    &self,
    comment: &Comment,
    entity_ids: &[&str],
    candidates: Vec<RelationshipCandidate>,
  ) -> Vec<RelationshipCandidate> {
    let Some(critic) = self.critic.filter(|c| c.is_available()) else {
      return candidates;
    };

    let critique = match critic.critique_relationships(comment, &candidates).await {
      Ok(critique) if critique.has_suggestions() => critique,
      Ok(_) => return candidates,
      Err(e) => {
        debug!(comment = %comment.id, error = %e, "critique unavailable");
        return candidates;
      }
    };

    match self
      .analyzer
      .refine_relationships(comment, entity_ids, &candidates, &critique)
      .await
    {
      Ok(refined) if !refined.is_empty() => {
        debug!(
          comment = %comment.id,
          before = candidates.len(),
          after = refined.len(),
          "extraction refined",
        );
        refined
          .into_iter()
          .map(|mut c| {
            c.metadata.insert("refined".into(), json!(true));
            c
          })
          .collect()
      }
      Ok(_) => candidates,
      Err(e) => {
        debug!(comment = %comment.id, error = %e, "refinement unavailable");
        candidates
      }
    }
  }

  async fn breakthroughs(&self, comments: &[Comment]) -> (Vec<GraphNode>, Vec<Triplet>) {
    if self.breakthrough_window == 0 || comments.is_empty() || !self.analyzer.is_available() {
      return (vec![], vec![]);
    }

    let start = comments.len().saturating_sub(self.breakthrough_window);
    match self.analyzer.breakthrough_moments(&comments[start..]).await {
      Ok(moments) => moments.iter().map(moment_parts).unzip(),
      Err(e) => {
        debug!(error = %e, "breakthrough detection unavailable");
        (vec![], vec![])
      }
    }
  }
}

// ─── Analyzer-backed relationships ───────────────────────────────────────────

fn candidate_triplet(candidate: RelationshipCandidate, comment: &Comment) -> Triplet {
  let mut metadata = candidate.metadata;
  metadata.insert("comment_id".into(), json!(comment.id));
  metadata.insert("extraction_method".into(), json!("llm"));
  if let Some(evidence) = candidate.evidence {
    metadata.insert("evidence".into(), json!(evidence));
  }
  Triplet {
    subject: candidate.source,
    predicate: candidate.relationship,
    object: candidate.target,
    confidence: candidate.confidence,
    metadata,
  }
}

fn role_relationships(
  comment: &Comment,
  analysis: &ParticipantAnalysis,
  entities: &ExtractedEntities,
) -> Vec<Triplet> {
  let body = comment.body.to_lowercase();
  let mut metadata = Properties::new();
  metadata.insert("comment_id".into(), json!(comment.id));
  metadata.insert("extraction_method".into(), json!("participant_role"));
  metadata.insert("insight_novelty".into(), json!(analysis.insight_novelty));
  metadata.insert("evidence".into(), json!(analysis.evidence));

  let edge = |relationship: &str, target: &str| Triplet {
    subject:    comment.author.clone(),
    predicate:  relationship.to_owned(),
    object:     target.to_owned(),
    confidence: analysis.confidence,
    metadata:   metadata.clone(),
  };

  match analysis.contribution_type.as_str() {
    "root_cause_analysis" => mentioned(&entities.issues, &body)
      .map(|issue| edge(predicate::DIAGNOSES_ROOT_CAUSE, &issue.id))
      .collect(),
    "empirical_testing" => mentioned(&entities.solutions, &body)
      .map(|solution| edge(predicate::CONFIRMS_THROUGH_TESTING, &solution.id))
      .collect(),
    "systematic_validation" => {
      vec![edge(predicate::VALIDATES_SYSTEMATICALLY, METHODOLOGY_FRAMEWORK)]
    }
    _ => vec![],
  }
}

fn moment_parts(moment: &BreakthroughMoment) -> (GraphNode, Triplet) {
  let label = if moment.description.is_empty() {
    moment.moment_id.clone()
  } else {
    moment.description.clone()
  };

  let mut properties = Properties::new();
  properties.insert("participant".into(), json!(moment.participant));
  properties.insert("insight_type".into(), json!(moment.insight_type));
  properties.insert("description".into(), json!(moment.description));
  properties.insert("evidence".into(), json!(moment.evidence));
  properties.insert("novelty".into(), json!(moment.novelty));
  properties.insert("impact".into(), json!(moment.impact));
  if let Some(ts) = &moment.timestamp {
    properties.insert("timestamp".into(), json!(ts));
  }

  let mut metadata = Properties::new();
  metadata.insert("insight_type".into(), json!(moment.insight_type));
  metadata.insert("evidence".into(), json!(moment.evidence));
  metadata.insert("impact".into(), json!(moment.impact));

  let node = GraphNode {
    id: moment.moment_id.clone(),
    label,
    kind: node_type::BREAKTHROUGH_MOMENT.into(),
    properties,
  };
  let triplet = Triplet {
    subject: moment.participant.clone(),
    predicate: predicate::PROVIDES_BREAKTHROUGH.into(),
    object: moment.moment_id.clone(),
    confidence: moment.novelty,
    metadata,
  };
  (node, triplet)
}

// ─── Keyword rules ───────────────────────────────────────────────────────────

fn mentioned<'t>(topics: &'t [Topic], body_lower: &'t str) -> impl Iterator<Item = &'t Topic> {
  topics.iter().filter(move |t| t.mentioned_in(body_lower))
}

/// Keyword-only relationships for one comment.
pub fn keyword_relationships(comment: &Comment, entities: &ExtractedEntities) -> Vec<Triplet> {
  let body = comment.body.to_lowercase();
  let mut metadata = Properties::new();
  metadata.insert("comment_id".into(), json!(comment.id));
  metadata.insert("extraction_method".into(), json!(FALLBACK_METHOD));

  let edge = |relationship: &str, target: &str, confidence: f64| Triplet {
    subject: comment.author.clone(),
    predicate: relationship.to_owned(),
    object: target.to_owned(),
    confidence,
    metadata: metadata.clone(),
  };

  let mut found = Vec::new();
  if contains_any(&body, ANALYZES_CUES) {
    found.extend(mentioned(&entities.issues, &body).map(|t| edge(predicate::ANALYZES, &t.id, 0.7)));
  }
  if contains_any(&body, IMPLEMENTS_CUES) {
    found.extend(
      mentioned(&entities.solutions, &body).map(|t| edge(predicate::IMPLEMENTS, &t.id, 0.8)),
    );
  }
  if contains_any(&body, PROVIDES_CUES) {
    found.push(edge(predicate::PROVIDES, STRATEGIC_GUIDANCE, 0.6));
  }
  found
}

/// `REPLIES_TO` from each comment's author to the previous author, when they
/// differ.
pub fn reply_chain(comments: &[Comment]) -> Vec<Triplet> {
  comments
    .windows(2)
    .enumerate()
    .filter(|(_, pair)| pair[0].author != pair[1].author)
    .map(|(i, pair)| {
      let mut metadata = Properties::new();
      metadata.insert("temporal_sequence".into(), json!(i + 1));
      metadata.insert("comment_id".into(), json!(pair[1].id));
      Triplet {
        subject: pair[1].author.clone(),
        predicate: predicate::REPLIES_TO.into(),
        object: pair[0].author.clone(),
        confidence: 1.0,
        metadata,
      }
    })
    .collect()
}

/// `RESOLVES` for every solution and issue sharing at least one keyword.
pub fn resolutions(entities: &ExtractedEntities) -> Vec<Triplet> {
  let mut found = Vec::new();
  for solution in &entities.solutions {
    let solution_keywords: BTreeSet<String> =
      solution.keywords.iter().map(|k| k.to_lowercase()).collect();
    for issue in &entities.issues {
      let shared: Vec<Value> = issue
        .keywords
        .iter()
        .map(|k| k.to_lowercase())
        .filter(|k| solution_keywords.contains(k))
        .map(Value::from)
        .collect();
      if shared.is_empty() {
        continue;
      }

      let mut metadata = Properties::new();
      metadata.insert("shared_keywords".into(), Value::Array(shared));
      found.push(Triplet {
        subject: solution.id.clone(),
        predicate: predicate::RESOLVES.into(),
        object: issue.id.clone(),
        confidence: 0.8,
        metadata,
      });
    }
  }
  found
}
