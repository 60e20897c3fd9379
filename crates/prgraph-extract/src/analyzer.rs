//! The LLM-backed analyzer.
//!
//! [`Completion`] is the pluggable text-generation backend. [`Analyzer`]
//! renders prompts, bounds every call with a timeout and decodes the reply
//! strictly into typed responses. Anything that goes wrong surfaces as
//! [`AnalyzerUnavailable`], which callers treat as "use the next fallback".

use std::{
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use prgraph_core::{
  conversation::Comment,
  graph::Properties,
  triple::validate_confidence,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;

use crate::prompts::{self, PromptKind};

// ─── Completion backend ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CompletionError {
  #[error("network error: {0}")]
  Network(String),

  #[error("completion API error {status}: {body}")]
  Api { status: u16, body: String },

  #[error("malformed completion response: {0}")]
  Parse(String),

  #[error("no completion backend configured")]
  NotConfigured,
}

/// Text generation: `(prompt, system) -> text`.
#[async_trait]
pub trait Completion: Send + Sync {
  fn name(&self) -> &str;

  /// `false` lets callers skip the call entirely.
  fn is_available(&self) -> bool { true }

  async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String, CompletionError>;
}

/// The absent backend. Every call fails, so extraction is keyword-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

#[async_trait]
impl Completion for Unavailable {
  fn name(&self) -> &str { "unavailable" }

  fn is_available(&self) -> bool { false }

  async fn complete(&self, _prompt: &str, _system: Option<&str>) -> Result<String, CompletionError> {
    Err(CompletionError::NotConfigured)
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AnalyzerUnavailable {
  #[error("analyzer disabled")]
  Disabled,

  #[error(transparent)]
  Completion(#[from] CompletionError),

  #[error("analyzer call timed out after {0:?}")]
  Timeout(Duration),

  #[error("analyzer output is not valid JSON for {kind}: {source}")]
  Decode {
    kind:   PromptKind,
    source: serde_json::Error,
  },

  #[error("analyzer output out of range: {field} = {value}")]
  OutOfRange { field: &'static str, value: f64 },
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), AnalyzerUnavailable> {
  validate_confidence(value).map_err(|_| AnalyzerUnavailable::OutOfRange { field, value })
}

// ─── Responses ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipCandidate {
  pub source:       String,
  pub relationship: String,
  pub target:       String,
  pub confidence:   f64,
  #[serde(default)]
  pub evidence:     Option<String>,
  #[serde(default)]
  pub metadata:     Properties,
}

#[derive(Debug, Deserialize)]
struct RelationshipResponse {
  relationships: Vec<RelationshipCandidate>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParticipantAnalysis {
  pub role:              String,
  pub contribution_type: String,
  #[serde(default)]
  pub expertise:         Option<String>,
  #[serde(default)]
  pub insight_novelty:   Option<f64>,
  #[serde(default)]
  pub evidence:          Vec<String>,
  pub confidence:        f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BreakthroughMoment {
  pub moment_id:    String,
  pub participant:  String,
  pub insight_type: String,
  #[serde(default)]
  pub description:  String,
  #[serde(default)]
  pub evidence:     String,
  pub novelty:      f64,
  pub impact:       f64,
  #[serde(default)]
  pub timestamp:    Option<String>,
}

#[derive(Debug, Deserialize)]
struct BreakthroughResponse {
  breakthrough_moments: Vec<BreakthroughMoment>,
}

/// A reviewer's verdict on a relationship extraction.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Critique {
  pub accuracy_concerns:      Vec<String>,
  pub missing_elements:       Vec<String>,
  pub confidence_adjustments: Vec<String>,
}

impl Critique {
  /// Whether a refinement pass has anything to act on.
  pub fn has_suggestions(&self) -> bool {
    [&self.accuracy_concerns, &self.missing_elements, &self.confidence_adjustments]
      .iter()
      .any(|items| items.iter().any(|i| !i.trim().is_empty()))
  }
}

// ─── Call counts ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Counters {
  requests:    AtomicU64,
  fallbacks:   AtomicU64,
  refinements: AtomicU64,
}

/// Calls made by one analyzer since it was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallCounts {
  /// Calls that reached the backend.
  pub requests:    u64,
  /// Calls whose result was unusable, so a fallback took over.
  pub fallbacks:   u64,
  /// Refined extractions that replaced a first answer.
  pub refinements: u64,
}

// ─── Analyzer ────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Analyzer {
  completion: Arc<dyn Completion>,
  timeout:    Duration,
  counters:   Arc<Counters>,
}

impl Analyzer {
  pub fn new(completion: Arc<dyn Completion>, timeout: Duration) -> Self {
    Self { completion, timeout, counters: Arc::default() }
  }

  /// An analyzer that never calls out; extraction falls back to keywords.
  pub fn offline() -> Self { Self::new(Arc::new(Unavailable), Duration::ZERO) }

  pub fn is_available(&self) -> bool { self.completion.is_available() }

  pub fn backend(&self) -> &str { self.completion.name() }

  pub fn counts(&self) -> CallCounts {
    CallCounts {
      requests:    self.counters.requests.load(Ordering::Relaxed),
      fallbacks:   self.counters.fallbacks.load(Ordering::Relaxed),
      refinements: self.counters.refinements.load(Ordering::Relaxed),
    }
  }

  pub async fn extract_relationships(
    &self,
    comment: &Comment,
    entity_ids: &[&str],
  ) -> Result<Vec<RelationshipCandidate>, AnalyzerUnavailable> {
    let prompt = prompts::relationship_extraction(comment, entity_ids);
    self.relationships(PromptKind::RelationshipExtraction, &prompt).await
  }

  /// Review `candidates` extracted from `comment`.
  pub async fn critique_relationships(
    &self,
    comment: &Comment,
    candidates: &[RelationshipCandidate],
  ) -> Result<Critique, AnalyzerUnavailable> {
    let prompt = prompts::critique_review(comment, candidates);
    self.run(PromptKind::CritiqueReview, &prompt).await
  }

  /// Re-extract relationships from `comment` given a first answer and its
  /// critique.
  pub async fn refine_relationships(
    &self,
    comment: &Comment,
    entity_ids: &[&str],
    candidates: &[RelationshipCandidate],
    critique: &Critique,
  ) -> Result<Vec<RelationshipCandidate>, AnalyzerUnavailable> {
    let prompt = prompts::refinement(comment, entity_ids, candidates, critique);
    let refined = self.relationships(PromptKind::Refinement, &prompt).await?;
    if !refined.is_empty() {
      self.counters.refinements.fetch_add(1, Ordering::Relaxed);
    }
    Ok(refined)
  }

  async fn relationships(
    &self,
    kind: PromptKind,
    prompt: &str,
  ) -> Result<Vec<RelationshipCandidate>, AnalyzerUnavailable> {
    let response: RelationshipResponse = self.run(kind, prompt).await?;
    for candidate in &response.relationships {
      self.checked(unit_interval("confidence", candidate.confidence))?;
    }
    Ok(response.relationships)
  }

  pub async fn analyze_participant(
    &self,
    comment: &Comment,
  ) -> Result<ParticipantAnalysis, AnalyzerUnavailable> {
    let prompt = prompts::participant_role(comment);
    let analysis: ParticipantAnalysis = self.run(PromptKind::ParticipantRole, &prompt).await?;

    self.checked(unit_interval("confidence", analysis.confidence))?;
    if let Some(novelty) = analysis.insight_novelty {
      self.checked(unit_interval("insight_novelty", novelty))?;
    }
    Ok(analysis)
  }

  pub async fn breakthrough_moments(
    &self,
    window: &[Comment],
  ) -> Result<Vec<BreakthroughMoment>, AnalyzerUnavailable> {
    let prompt = prompts::breakthrough_moments(window);
    let response: BreakthroughResponse =
      self.run(PromptKind::BreakthroughMoments, &prompt).await?;

    for moment in &response.breakthrough_moments {
      self.checked(unit_interval("novelty", moment.novelty))?;
      self.checked(unit_interval("impact", moment.impact))?;
    }
    Ok(response.breakthrough_moments)
  }

  async fn run<T: DeserializeOwned>(
    &self,
    kind: PromptKind,
    prompt: &str,
  ) -> Result<T, AnalyzerUnavailable> {
    if !self.is_available() {
      return Err(AnalyzerUnavailable::Disabled);
    }

    debug!(%kind, backend = self.backend(), "calling analyzer");
    self.counters.requests.fetch_add(1, Ordering::Relaxed);
    let decoded = match tokio::time::timeout(
      self.timeout,
      self.completion.complete(prompt, Some(kind.system())),
    )
    .await
    {
      Err(_) => Err(AnalyzerUnavailable::Timeout(self.timeout)),
      Ok(Err(e)) => Err(e.into()),
      Ok(Ok(text)) => serde_json::from_str(text.trim())
        .map_err(|source| AnalyzerUnavailable::Decode { kind, source }),
    };
    self.checked(decoded)
  }

  /// Count a failed call as a fallback.
  fn checked<T>(&self, result: Result<T, AnalyzerUnavailable>) -> Result<T, AnalyzerUnavailable> {
    if result.is_err() {
      self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
    }
    result
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use chrono::Utc;

  use super::*;

  /// Replies with a fixed string to every prompt.
  pub(crate) struct Canned {
    pub reply: String,
    pub calls: AtomicUsize,
  }

  impl Canned {
    pub fn new(reply: impl Into<String>) -> Self {
      Self { reply: reply.into(), calls: AtomicUsize::new(0) }
    }
  }

  #[async_trait]
  impl Completion for Canned {
    fn name(&self) -> &str { "canned" }

    async fn complete(&self, _prompt: &str, _system: Option<&str>) -> Result<String, CompletionError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok(self.reply.clone())
    }
  }

  /// Answers according to the prompt kind; any other kind is an API error.
  pub(crate) struct ByKind(pub Vec<(PromptKind, &'static str)>);

  #[async_trait]
  impl Completion for ByKind {
    fn name(&self) -> &str { "by-kind" }

    async fn complete(&self, _prompt: &str, system: Option<&str>) -> Result<String, CompletionError> {
      self
        .0
        .iter()
        .find(|(kind, _)| Some(kind.system()) == system)
        .map(|(_, reply)| (*reply).to_owned())
        .ok_or(CompletionError::Api { status: 500, body: "unexpected prompt".into() })
    }
  }

  /// Never answers within any reasonable timeout.
  pub(crate) struct Slow(pub Duration);

  #[async_trait]
  impl Completion for Slow {
    fn name(&self) -> &str { "slow" }

    async fn complete(&self, _prompt: &str, _system: Option<&str>) -> Result<String, CompletionError> {
      tokio::time::sleep(self.0).await;
      Ok("{}".into())
    }
  }

  fn comment(body: &str) -> Comment {
    Comment {
      id:           "1".into(),
      author:       "alice".into(),
      created_at:   Utc::now(),
      body:         body.into(),
      comment_type: "comment".into(),
      metadata:     Default::default(),
    }
  }

  fn analyzer(completion: impl Completion + 'static) -> Analyzer {
    Analyzer::new(Arc::new(completion), Duration::from_secs(5))
  }

  #[tokio::test]
  async fn decodes_participant_analysis() {
    let a = analyzer(Canned::new(
      r#"{"role":"strategic_analyst","contribution_type":"root_cause_analysis",
          "insight_novelty":0.8,"evidence":["the token expires"],"confidence":0.9}"#,
    ));
    let analysis = a.analyze_participant(&comment("x")).await.unwrap();
    assert_eq!(analysis.contribution_type, "root_cause_analysis");
    assert_eq!(analysis.confidence, 0.9);
    assert_eq!(analysis.evidence, vec!["the token expires"]);
  }

  #[tokio::test]
  async fn malformed_output_is_unavailable() {
    let a = analyzer(Canned::new("Sure! Here is the JSON: ```{\"role\": 1}```"));
    let err = a.analyze_participant(&comment("x")).await.unwrap_err();
    assert!(matches!(err, AnalyzerUnavailable::Decode { .. }));
  }

  #[tokio::test]
  async fn out_of_range_confidence_is_unavailable() {
    let a = analyzer(Canned::new(
      r#"{"relationships":[{"source":"a","relationship":"R","target":"b","confidence":1.5}]}"#,
    ));
    let err = a.extract_relationships(&comment("x"), &["a", "b"]).await.unwrap_err();
    assert!(matches!(err, AnalyzerUnavailable::OutOfRange { field: "confidence", .. }));
  }

  #[tokio::test(start_paused = true)]
  async fn slow_backend_times_out() {
    let a = Analyzer::new(Arc::new(Slow(Duration::from_secs(60))), Duration::from_secs(1));
    let err = a.breakthrough_moments(&[comment("x")]).await.unwrap_err();
    assert!(matches!(err, AnalyzerUnavailable::Timeout(_)));
  }

  #[tokio::test]
  async fn offline_analyzer_never_calls() {
    let a = Analyzer::offline();
    assert!(!a.is_available());
    let err = a.analyze_participant(&comment("x")).await.unwrap_err();
    assert!(matches!(err, AnalyzerUnavailable::Disabled));
  }

  #[tokio::test]
  async fn critique_without_lists_has_no_suggestions() {
    let a = analyzer(Canned::new(r#"{"accuracy_concerns":[],"missing_elements":[" "]}"#));
    let critique = a.critique_relationships(&comment("x"), &[]).await.unwrap();
    assert!(!critique.has_suggestions());

    let a = analyzer(Canned::new(r#"{"missing_elements":["bob IMPLEMENTS token_fix"]}"#));
    let critique = a.critique_relationships(&comment("x"), &[]).await.unwrap();
    assert!(critique.has_suggestions());
    assert!(critique.accuracy_concerns.is_empty());
  }

  #[tokio::test]
  async fn counts_track_requests_and_fallbacks() {
    let a = analyzer(ByKind(vec![(
      PromptKind::ParticipantRole,
      r#"{"role":"coordinator","contribution_type":"process_innovation","confidence":0.5}"#,
    )]));
    a.analyze_participant(&comment("x")).await.unwrap();
    a.extract_relationships(&comment("x"), &[]).await.unwrap_err();

    let counts = a.counts();
    assert_eq!(counts.requests, 2);
    assert_eq!(counts.fallbacks, 1);
    assert_eq!(counts.refinements, 0);

    // Clones share counters.
    let b = a.clone();
    b.analyze_participant(&comment("y")).await.unwrap();
    assert_eq!(a.counts().requests, 3);
    assert_eq!(Analyzer::offline().counts(), CallCounts::default());
  }
}
