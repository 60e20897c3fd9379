//! Prompt templates for the analyzer.
//!
//! Every template asks for a single JSON document whose shape matches the
//! response types in [`crate::analyzer`].

use prgraph_core::conversation::Comment;

use crate::analyzer::{Critique, RelationshipCandidate};

/// Comment bodies are cut to this many characters in single-comment prompts.
pub const COMMENT_BODY_LIMIT: usize = 1000;

/// Per-comment cut inside the breakthrough transcript.
pub const TRANSCRIPT_BODY_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PromptKind {
  RelationshipExtraction,
  ParticipantRole,
  BreakthroughMoments,
  CritiqueReview,
  Refinement,
}

impl PromptKind {
  pub fn system(self) -> &'static str {
    match self {
      PromptKind::RelationshipExtraction => {
        "You are an expert at identifying semantic relationships in collaborative \
         conversations. Focus on asymmetric patterns and nuanced insights. Respond with \
         structured JSON only."
      }
      PromptKind::ParticipantRole => {
        "You are an expert at analyzing collaborative conversations and identifying \
         participant roles and contribution types. Respond with structured JSON only."
      }
      PromptKind::BreakthroughMoments => {
        "You are an expert at identifying breakthrough moments, novel insights, and \
         problem-solving patterns in collaborative conversations. Respond with structured \
         JSON only."
      }
      PromptKind::CritiqueReview => {
        "You are a careful reviewer of relationship extractions. Point out inaccurate or \
         missing relationships and nothing else. Respond with structured JSON only."
      }
      PromptKind::Refinement => {
        "You are an expert at identifying semantic relationships in collaborative \
         conversations. Revise your earlier extraction using the reviewer's feedback. \
         Respond with structured JSON only."
      }
    }
  }
}

/// The first `limit` characters of `s`.
pub fn truncate_chars(s: &str, limit: usize) -> &str {
  match s.char_indices().nth(limit) {
    Some((cut, _)) => &s[..cut],
    None => s,
  }
}

pub fn relationship_extraction(comment: &Comment, entity_ids: &[&str]) -> String {
  format!(
    r#"Identify relationships expressed by this PR comment between known entities.

Author: {author}
Created: {created_at}
Comment: {body}

Known entity ids: {entities}

Only use ids from the list above as "source" and "target". Prefer asymmetric
relationships such as DIAGNOSES_ROOT_CAUSE, PROVIDES_BREAKTHROUGH,
CONFIRMS_THROUGH_TESTING, VALIDATES_SYSTEMATICALLY, IMPLEMENTS, ANALYZES.

Respond with JSON:
{{
  "relationships": [
    {{
      "source": "entity_id",
      "relationship": "DIAGNOSES_ROOT_CAUSE",
      "target": "entity_id",
      "confidence": 0.9,
      "evidence": "specific quote supporting the relationship"
    }}
  ]
}}
"#,
    author = comment.author,
    created_at = comment.created_at.to_rfc3339(),
    body = truncate_chars(&comment.body, COMMENT_BODY_LIMIT),
    entities = entity_ids.join(", "),
  )
}

pub fn participant_role(comment: &Comment) -> String {
  format!(
    r#"Analyze this PR comment and identify the participant's role and contribution type.

Author: {author}
Created: {created_at}
Comment: {body}

Identify:
1. Role (strategic_analyst, implementation_specialist, coordinator, domain_expert)
2. Contribution type (root_cause_analysis, empirical_testing, process_innovation, architectural_insight, systematic_validation)
3. Expertise domain (backend_architecture, frontend_development, system_integration, project_management)
4. Insight novelty (0.0-1.0 based on breakthrough potential and uniqueness)
5. Evidence quotes (specific phrases that support the analysis)

Respond with JSON:
{{
  "role": "strategic_analyst",
  "contribution_type": "root_cause_analysis",
  "expertise": "backend_architecture",
  "insight_novelty": 0.85,
  "evidence": ["specific quote from comment"],
  "confidence": 0.90
}}
"#,
    author = comment.author,
    created_at = comment.created_at.to_rfc3339(),
    body = truncate_chars(&comment.body, COMMENT_BODY_LIMIT),
  )
}

pub fn breakthrough_moments(window: &[Comment]) -> String {
  let transcript = window
    .iter()
    .map(|c| {
      format!(
        "[{} at {}]: {}",
        c.author,
        c.created_at.to_rfc3339(),
        truncate_chars(&c.body, TRANSCRIPT_BODY_LIMIT)
      )
    })
    .collect::<Vec<_>>()
    .join("\n\n");

  format!(
    r#"Analyze this conversation and identify breakthrough moments: insights that changed
the direction of the conversation.

Conversation:
{transcript}

Focus on asymmetric contributions where one participant provided significantly more
strategic value than others. "participant" must be a comment author.

Respond with JSON:
{{
  "breakthrough_moments": [
    {{
      "moment_id": "format_discovery",
      "participant": "author_name",
      "insight_type": "root_cause_analysis",
      "description": "Identified exact JSON payload format issue",
      "evidence": "quote from the comment",
      "novelty": 0.95,
      "impact": 0.90,
      "timestamp": "ISO timestamp of the comment"
    }}
  ]
}}
"#
  )
}

fn render_candidates(candidates: &[RelationshipCandidate]) -> String {
  serde_json::to_string_pretty(candidates).unwrap_or_default()
}

fn bullets(items: &[String]) -> String {
  if items.is_empty() {
    return "- none".into();
  }
  items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
}

pub fn critique_review(comment: &Comment, candidates: &[RelationshipCandidate]) -> String {
  format!(
    r#"Review these relationships extracted from a PR comment.

Author: {author}
Comment: {body}

Extracted relationships:
{extracted}

List relationships whose type, direction or confidence looks wrong, and
relationships the comment clearly expresses that are missing. Leave both lists
empty when the extraction is accurate.

Respond with JSON:
{{
  "accuracy_concerns": ["alice does not diagnose auth_issue, she only reports it"],
  "missing_elements": ["bob IMPLEMENTS token_fix"],
  "confidence_adjustments": ["lower DIAGNOSES_ROOT_CAUSE to 0.5"]
}}
"#,
    author = comment.author,
    body = truncate_chars(&comment.body, COMMENT_BODY_LIMIT),
    extracted = render_candidates(candidates),
  )
}

pub fn refinement(
  comment: &Comment,
  entity_ids: &[&str],
  candidates: &[RelationshipCandidate],
  critique: &Critique,
) -> String {
  format!(
    r#"Revise the relationships extracted from this PR comment.

Author: {author}
Created: {created_at}
Comment: {body}

Known entity ids: {entities}

Original analysis:
{extracted}

Reviewer concerns:
{concerns}

Missing relationships:
{missing}

Confidence adjustments:
{adjustments}

Only use ids from the list above as "source" and "target". Respond with the
complete revised list in the same JSON shape:
{{
  "relationships": [
    {{
      "source": "entity_id",
      "relationship": "DIAGNOSES_ROOT_CAUSE",
      "target": "entity_id",
      "confidence": 0.9,
      "evidence": "specific quote supporting the relationship"
    }}
  ]
}}
"#,
    author = comment.author,
    created_at = comment.created_at.to_rfc3339(),
    body = truncate_chars(&comment.body, COMMENT_BODY_LIMIT),
    entities = entity_ids.join(", "),
    extracted = render_candidates(candidates),
    concerns = bullets(&critique.accuracy_concerns),
    missing = bullets(&critique.missing_elements),
    adjustments = bullets(&critique.confidence_adjustments),
  )
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn comment(body: String) -> Comment {
    Comment {
      id:           "7".into(),
      author:       "alice".into(),
      created_at:   Utc::now(),
      body,
      comment_type: "comment".into(),
      metadata:     Default::default(),
    }
  }

  #[test]
  fn bodies_are_truncated() {
    let prompt = participant_role(&comment("a".repeat(5000)));
    assert!(prompt.contains(&"a".repeat(COMMENT_BODY_LIMIT)));
    assert!(!prompt.contains(&"a".repeat(COMMENT_BODY_LIMIT + 1)));
  }

  #[test]
  fn relationship_prompt_lists_entities() {
    let prompt = relationship_extraction(&comment("hi".into()), &["alice", "auth_issue"]);
    assert!(prompt.contains("Known entity ids: alice, auth_issue"));
  }

  #[test]
  fn transcript_joins_window() {
    let prompt = breakthrough_moments(&[comment("first".into()), comment("second".into())]);
    assert!(prompt.contains("]: first\n\n[alice at "));
  }

  #[test]
  fn refinement_carries_the_critique() {
    let candidate = RelationshipCandidate {
      source:       "alice".into(),
      relationship: "ANALYZES".into(),
      target:       "auth_issue".into(),
      confidence:   0.4,
      evidence:     None,
      metadata:     Default::default(),
    };
    let critique = Critique {
      accuracy_concerns: vec!["alice diagnoses the root cause".into()],
      ..Critique::default()
    };
    let prompt = refinement(&comment("hi".into()), &["alice", "auth_issue"], &[candidate], &critique);
    assert!(prompt.contains("\"relationship\": \"ANALYZES\""));
    assert!(prompt.contains("Reviewer concerns:\n- alice diagnoses the root cause"));
    assert!(prompt.contains("Missing relationships:\n- none"));
  }
}
