//! The end-to-end extraction pipeline.

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

use chrono::Utc;
use prgraph_core::{
  conversation::PrConversation,
  graph::{Analysis, GraphMetadata, GraphStatistics},
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  analyzer::{Analyzer, CallCounts, Completion},
  assemble::{Assembly, assemble},
  config::ExtractionConfig,
  entities::EntityExtractor,
  relationships::RelationshipExtractor,
  roles::RoleClassifier,
};

/// What the analyzer behind a pipeline has been doing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzerStatus {
  pub backend:       String,
  pub available:     bool,
  pub critic:        Option<String>,
  #[serde(flatten)]
  pub calls:         CallCounts,
  pub critiques:     u64,
  /// Share of backend calls that ended in a fallback.
  pub fallback_rate: f64,
  /// Runs that hit the whole-run timeout and were redone offline.
  pub run_timeouts:  u64,
}

pub struct ExtractionPipeline {
  config:       ExtractionConfig,
  entities:     EntityExtractor,
  analyzer:     Analyzer,
  critic:       Option<Analyzer>,
  run_timeouts: AtomicU64,
}

impl ExtractionPipeline {
  pub fn new(config: ExtractionConfig, completion: Arc<dyn Completion>) -> Self {
    let analyzer = Analyzer::new(completion, config.analyzer_timeout());
    Self::with_analyzer(config, analyzer)
  }

  /// A pipeline that never calls an analyzer.
  pub fn offline(config: ExtractionConfig) -> Self {
    Self::with_analyzer(config, Analyzer::offline())
  }

  fn with_analyzer(config: ExtractionConfig, analyzer: Analyzer) -> Self {
    Self {
      entities: EntityExtractor::new(&config),
      config,
      analyzer,
      critic: None,
      run_timeouts: AtomicU64::new(0),
    }
  }

  /// Review each first relationship extraction with a second backend.
  pub fn with_critic(mut self, completion: Arc<dyn Completion>) -> Self {
    self.critic = Some(Analyzer::new(completion, self.config.analyzer_timeout()));
    self
  }

  pub fn with_classifier(mut self, classifier: Arc<dyn RoleClassifier>) -> Self {
    self.entities = self.entities.with_classifier(classifier);
    self
  }

  pub fn config(&self) -> &ExtractionConfig { &self.config }

  pub fn status(&self) -> AnalyzerStatus {
    let calls = self.analyzer.counts();
    let critic = self.critic.as_ref().map(Analyzer::counts).unwrap_or_default();
    let requests = calls.requests + critic.requests;
    let fallbacks = calls.fallbacks + critic.fallbacks;
    AnalyzerStatus {
      backend: self.analyzer.backend().to_owned(),
      available: self.analyzer.is_available(),
      critic: self.critic.as_ref().map(|c| c.backend().to_owned()),
      calls,
      critiques: critic.requests,
      fallback_rate: if requests == 0 { 0.0 } else { fallbacks as f64 / requests as f64 },
      run_timeouts: self.run_timeouts.load(Ordering::Relaxed),
    }
  }

  /// Run extraction and wrap the result as a new [`Analysis`].
  pub async fn analyze(&self, conversation: PrConversation) -> Analysis {
    let assembly = self.extract(&conversation).await;
    let statistics = GraphStatistics::compute(&assembly.graph);
    let analysis = Analysis {
      analysis_id: Uuid::new_v4(),
      conversation,
      knowledge_graph: assembly.graph,
      created_at: Utc::now(),
      statistics,
    };
    info!(
      analysis_id = %analysis.analysis_id,
      nodes = analysis.statistics.node_count,
      edges = analysis.statistics.edge_count,
      dropped = assembly.dropped.len(),
      "analysis created",
    );
    analysis
  }

  /// Extract a graph, bounded by the whole-run timeout. On expiry the run is
  /// repeated without the analyzer.
  pub async fn extract(&self, conversation: &PrConversation) -> Assembly {
    let limit = self.config.analysis_timeout();
    let online = self.run(conversation, &self.analyzer, self.critic.as_ref());
    match tokio::time::timeout(limit, online).await {
      Ok(assembly) => assembly,
      Err(_) => {
        self.run_timeouts.fetch_add(1, Ordering::Relaxed);
        warn!(?limit, "extraction timed out; rerunning with keyword rules only");
        self.run(conversation, &Analyzer::offline(), None).await
      }
    }
  }

  async fn run(
    &self,
    conversation: &PrConversation,
    analyzer: &Analyzer,
    critic: Option<&Analyzer>,
  ) -> Assembly {
    let entities = self.entities.extract(conversation);
    let relationships = RelationshipExtractor::new(analyzer, self.config.breakthrough_window)
      .with_critic(critic)
      .extract(conversation, &entities)
      .await;

    let metadata = GraphMetadata {
      extraction_method:  relationships.method.to_string(),
      participant_count:  entities.participants.len(),
      issue_count:        entities.issues.len(),
      solution_count:     entities.solutions.len(),
      breakthrough_count: relationships.moments.len(),
      dropped_edge_count: 0,
    };

    let mut nodes = entities.nodes();
    nodes.extend(relationships.moments);
    assemble(nodes, relationships.triplets, metadata)
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use async_trait::async_trait;
  use chrono::TimeZone;
  use prgraph_core::{
    conversation::Comment,
    graph::{Properties, predicate},
  };

  use super::*;
  use crate::{
    analyzer::{
      CompletionError,
      tests::{ByKind, Canned},
    },
    prompts::PromptKind,
  };

  fn conversation() -> PrConversation {
    let start = Utc.with_ymd_and_hms(2025, 7, 21, 18, 0, 0).unwrap();
    let bodies = [
      ("jack", "Seeing 401 errors on the auth endpoint"),
      ("devin-ai-integration[bot]", "Implementing JWT token handling as the fix"),
      ("jack", "Root cause analysis: the token expired. Provides guidance for next steps"),
    ];
    PrConversation {
      pr_number: 42,
      repository: "o/r".into(),
      title: "Fix auth".into(),
      description: String::new(),
      comments: bodies
        .iter()
        .enumerate()
        .map(|(i, (author, body))| Comment {
          id:           i.to_string(),
          author:       (*author).into(),
          created_at:   start + chrono::Duration::minutes(i as i64),
          body:         (*body).into(),
          comment_type: "comment".into(),
          metadata:     Properties::new(),
        })
        .collect(),
      participants: vec![],
      created_at: start,
      metadata: Properties::new(),
    }
  }

  /// Each call takes ten seconds.
  struct Sluggish;

  #[async_trait]
  impl Completion for Sluggish {
    fn name(&self) -> &str { "sluggish" }

    async fn complete(&self, _prompt: &str, _system: Option<&str>) -> Result<String, CompletionError> {
      tokio::time::sleep(Duration::from_secs(10)).await;
      Ok("{}".into())
    }
  }

  #[tokio::test]
  async fn offline_pipeline_builds_a_consistent_graph() {
    let pipeline = ExtractionPipeline::offline(ExtractionConfig::default());
    let analysis = pipeline.analyze(conversation()).await;
    let graph = &analysis.knowledge_graph;

    assert_eq!(graph.metadata.extraction_method, "keyword_fallback");
    assert_eq!(graph.metadata.participant_count, 2);
    assert_eq!(graph.metadata.issue_count, 1);
    assert_eq!(graph.metadata.solution_count, 1);

    // PROVIDES targets a literal that is not a node.
    assert_eq!(graph.metadata.dropped_edge_count, 1);

    let ids = graph.node_ids();
    for edge in &graph.edges {
      assert!(ids.contains(edge.source.as_str()) && ids.contains(edge.target.as_str()));
    }
    let relationships: Vec<_> = graph.edges.iter().map(|e| e.relationship.as_str()).collect();
    assert!(relationships.contains(&predicate::IMPLEMENTS));
    assert!(relationships.contains(&predicate::ANALYZES));
    assert!(relationships.contains(&predicate::REPLIES_TO));

    assert_eq!(analysis.statistics.edge_count, graph.edges.len());
    assert_eq!(analysis.conversation.pr_number, 42);
  }

  #[tokio::test]
  async fn malformed_analyzer_output_falls_back() {
    let pipeline =
      ExtractionPipeline::new(ExtractionConfig::default(), Arc::new(Canned::new("not json")));
    let online = pipeline.extract(&conversation()).await;
    let offline = ExtractionPipeline::offline(ExtractionConfig::default())
      .extract(&conversation())
      .await;

    assert_eq!(online.graph.triplets, offline.graph.triplets);
    assert_eq!(online.graph.metadata.extraction_method, "keyword_fallback");
  }

  #[tokio::test(start_paused = true)]
  async fn whole_run_timeout_reruns_offline() {
    let config = ExtractionConfig {
      analyzer_timeout_secs: 30,
      analysis_timeout_secs: 5,
      ..ExtractionConfig::default()
    };
    let pipeline = ExtractionPipeline::new(config, Arc::new(Sluggish));
    let assembly = pipeline.extract(&conversation()).await;

    assert_eq!(assembly.graph.metadata.extraction_method, "keyword_fallback");
    assert!(!assembly.graph.edges.is_empty());
  }

  #[tokio::test]
  async fn critic_refines_and_status_reports_it() {
    let primary = ByKind(vec![
      (
        PromptKind::RelationshipExtraction,
        r#"{"relationships":[{"source":"jack","relationship":"ANALYZES",
            "target":"authentication_issue","confidence":0.5}]}"#,
      ),
      (
        PromptKind::Refinement,
        r#"{"relationships":[{"source":"jack","relationship":"DIAGNOSES_ROOT_CAUSE",
            "target":"authentication_issue","confidence":0.9}]}"#,
      ),
    ]);
    let critic = ByKind(vec![(
      PromptKind::CritiqueReview,
      r#"{"confidence_adjustments":["jack diagnosed it; raise confidence"]}"#,
    )]);
    let config = ExtractionConfig { breakthrough_window: 0, ..ExtractionConfig::default() };
    let pipeline = ExtractionPipeline::new(config, Arc::new(primary)).with_critic(Arc::new(critic));

    let assembly = pipeline.extract(&conversation()).await;
    assert_eq!(assembly.graph.metadata.extraction_method, "llm");
    assert!(assembly.graph.edges.iter().any(|e| e.relationship == predicate::DIAGNOSES_ROOT_CAUSE));

    let status = pipeline.status();
    assert_eq!(status.backend, "by-kind");
    assert_eq!(status.critic.as_deref(), Some("by-kind"));
    // Three comments: extraction and refinement each, one critique each.
    assert_eq!(status.calls.requests, 6);
    assert_eq!(status.calls.refinements, 3);
    assert_eq!(status.critiques, 3);
    assert_eq!(status.fallback_rate, 0.0);
  }

  #[tokio::test(start_paused = true)]
  async fn status_counts_run_timeouts() {
    let config = ExtractionConfig {
      analyzer_timeout_secs: 30,
      analysis_timeout_secs: 5,
      ..ExtractionConfig::default()
    };
    let pipeline = ExtractionPipeline::new(config, Arc::new(Sluggish));
    pipeline.extract(&conversation()).await;

    let status = pipeline.status();
    assert_eq!(status.run_timeouts, 1);
    assert!(status.critic.is_none());
    assert!(status.available);

    let offline = ExtractionPipeline::offline(ExtractionConfig::default()).status();
    assert!(!offline.available);
    assert_eq!(offline.calls, CallCounts::default());
  }
}
