//! The knowledge-graph model produced by extraction.
//!
//! A [`KnowledgeGraph`] is built once per [`Analysis`] and never mutated
//! afterwards. Every edge references node ids that exist in the same graph;
//! the assembler guarantees this before a graph is constructed.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::PrConversation;

/// Open property map attached to nodes, edges and triplets.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Node type names produced by extraction. The set is open; other crates may
/// introduce further types.
pub mod node_type {
  pub const PARTICIPANT: &str = "participant";
  pub const ISSUE: &str = "issue";
  pub const SOLUTION: &str = "solution";
  pub const BREAKTHROUGH_MOMENT: &str = "breakthrough_moment";
}

/// Relationship names produced by extraction. The vocabulary is open; an
/// analyzer may return predicates not listed here.
pub mod predicate {
  pub const DIAGNOSES_ROOT_CAUSE: &str = "DIAGNOSES_ROOT_CAUSE";
  pub const CONFIRMS_THROUGH_TESTING: &str = "CONFIRMS_THROUGH_TESTING";
  pub const VALIDATES_SYSTEMATICALLY: &str = "VALIDATES_SYSTEMATICALLY";
  pub const PROVIDES_BREAKTHROUGH: &str = "PROVIDES_BREAKTHROUGH";
  pub const ANALYZES: &str = "ANALYZES";
  pub const IMPLEMENTS: &str = "IMPLEMENTS";
  pub const PROVIDES: &str = "PROVIDES";
  pub const RESOLVES: &str = "RESOLVES";
  pub const REPLIES_TO: &str = "REPLIES_TO";
}

// ─── Nodes and edges ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
  pub id:         String,
  pub label:      String,
  #[serde(rename = "type")]
  pub kind:       String,
  #[serde(default)]
  pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
  /// `source-relationship-target`.
  pub id:           String,
  pub source:       String,
  pub target:       String,
  pub relationship: String,
  #[serde(default)]
  pub properties:   Properties,
}

impl GraphEdge {
  pub fn from_triplet(triplet: &Triplet) -> Self {
    Self {
      id:           edge_id(&triplet.subject, &triplet.predicate, &triplet.object),
      source:       triplet.subject.clone(),
      target:       triplet.object.clone(),
      relationship: triplet.predicate.clone(),
      properties:   triplet.metadata.clone(),
    }
  }
}

/// Deterministic edge identifier.
pub fn edge_id(source: &str, relationship: &str, target: &str) -> String {
  format!("{source}-{relationship}-{target}")
}

/// A subject-predicate-object statement between two node ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triplet {
  pub subject:    String,
  pub predicate:  String,
  pub object:     String,
  pub confidence: f64,
  #[serde(default)]
  pub metadata:   Properties,
}

// ─── Graph ───────────────────────────────────────────────────────────────────

/// Summary of how a graph was extracted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphMetadata {
  pub extraction_method:  String,
  pub participant_count:  usize,
  pub issue_count:        usize,
  pub solution_count:     usize,
  pub breakthrough_count: usize,
  /// Candidate relationships discarded because an endpoint was not a node.
  pub dropped_edge_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
  pub nodes:    Vec<GraphNode>,
  pub edges:    Vec<GraphEdge>,
  pub triplets: Vec<Triplet>,
  pub metadata: GraphMetadata,
}

impl KnowledgeGraph {
  /// Rebuild a graph whose edges mirror `triplets` one-to-one.
  pub fn from_triplets(
    nodes: Vec<GraphNode>,
    triplets: Vec<Triplet>,
    metadata: GraphMetadata,
  ) -> Self {
    let edges = triplets.iter().map(GraphEdge::from_triplet).collect();
    Self { nodes, edges, triplets, metadata }
  }

  pub fn node_ids(&self) -> BTreeSet<&str> {
    self.nodes.iter().map(|n| n.id.as_str()).collect()
  }

  /// The generic `{nodes, links, metadata}` shape consumed by renderers.
  pub fn to_visualization(
    &self,
    analysis_id: impl Into<String>,
    created_at: DateTime<Utc>,
  ) -> VisualizationGraph {
    VisualizationGraph {
      nodes:    self
        .nodes
        .iter()
        .map(|n| VisualNode {
          id:         n.id.clone(),
          label:      n.label.clone(),
          kind:       n.kind.clone(),
          properties: n.properties.clone(),
        })
        .collect(),
      links:    self
        .triplets
        .iter()
        .map(|t| VisualLink {
          source:       t.subject.clone(),
          target:       t.object.clone(),
          relationship: t.predicate.clone(),
          confidence:   t.confidence,
          properties:   t.metadata.clone(),
        })
        .collect(),
      metadata: VisualizationMetadata {
        analysis_id: analysis_id.into(),
        created_at,
        node_count: self.nodes.len(),
        relationship_count: self.triplets.len(),
      },
    }
  }
}

// ─── Statistics ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
  pub node_count:         usize,
  pub edge_count:         usize,
  pub triplet_count:      usize,
  /// Distinct node types, sorted.
  pub node_types:         Vec<String>,
  /// Distinct relationship names, sorted.
  pub relationship_types: Vec<String>,
  /// Mean triplet confidence; 0 when there are no triplets.
  pub avg_confidence:     f64,
}

impl GraphStatistics {
  pub fn compute(graph: &KnowledgeGraph) -> Self {
    let node_types: BTreeSet<&str> = graph.nodes.iter().map(|n| n.kind.as_str()).collect();
    let relationship_types: BTreeSet<&str> =
      graph.edges.iter().map(|e| e.relationship.as_str()).collect();

    let avg_confidence = if graph.triplets.is_empty() {
      0.0
    } else {
      let total: f64 = graph.triplets.iter().map(|t| t.confidence).sum();
      total / graph.triplets.len() as f64
    };

    Self {
      node_count: graph.nodes.len(),
      edge_count: graph.edges.len(),
      triplet_count: graph.triplets.len(),
      node_types: node_types.into_iter().map(str::to_owned).collect(),
      relationship_types: relationship_types.into_iter().map(str::to_owned).collect(),
      avg_confidence,
    }
  }
}

// ─── Analysis ────────────────────────────────────────────────────────────────

/// One extraction run over one conversation. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
  pub analysis_id:     Uuid,
  pub conversation:    PrConversation,
  pub knowledge_graph: KnowledgeGraph,
  pub created_at:      DateTime<Utc>,
  pub statistics:      GraphStatistics,
}

// ─── Visualization shape ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationGraph {
  pub nodes:    Vec<VisualNode>,
  pub links:    Vec<VisualLink>,
  pub metadata: VisualizationMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualNode {
  pub id:         String,
  pub label:      String,
  #[serde(rename = "type")]
  pub kind:       String,
  pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualLink {
  pub source:       String,
  pub target:       String,
  pub relationship: String,
  pub confidence:   f64,
  pub properties:   Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationMetadata {
  pub analysis_id:        String,
  pub created_at:         DateTime<Utc>,
  pub node_count:         usize,
  pub relationship_count: usize,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn node(id: &str, kind: &str) -> GraphNode {
    GraphNode {
      id:         id.into(),
      label:      id.into(),
      kind:       kind.into(),
      properties: Properties::new(),
    }
  }

  fn triplet(s: &str, p: &str, o: &str, confidence: f64) -> Triplet {
    Triplet {
      subject: s.into(),
      predicate: p.into(),
      object: o.into(),
      confidence,
      metadata: Properties::new(),
    }
  }

  #[test]
  fn average_confidence_over_triplets() {
    let graph = KnowledgeGraph::from_triplets(
      vec![node("a", "participant"), node("b", "participant"), node("i", "issue")],
      vec![
        triplet("a", "REPLIES_TO", "b", 0.5),
        triplet("b", "REPLIES_TO", "a", 1.0),
        triplet("a", "ANALYZES", "i", 0.75),
      ],
      GraphMetadata::default(),
    );

    let stats = GraphStatistics::compute(&graph);
    assert_eq!(stats.avg_confidence, 0.75);
    assert_eq!(stats.node_count, 3);
    assert_eq!(stats.edge_count, 3);
    assert_eq!(stats.triplet_count, 3);
    assert_eq!(stats.node_types, vec!["issue", "participant"]);
    assert_eq!(stats.relationship_types, vec!["ANALYZES", "REPLIES_TO"]);
  }

  #[test]
  fn empty_graph_has_zero_confidence() {
    let stats = GraphStatistics::compute(&KnowledgeGraph::default());
    assert_eq!(stats.avg_confidence, 0.0);
    assert_eq!(stats.triplet_count, 0);
    assert!(stats.node_types.is_empty());
  }

  #[test]
  fn edges_mirror_triplets() {
    let graph = KnowledgeGraph::from_triplets(
      vec![node("a", "participant"), node("b", "participant")],
      vec![triplet("a", "REPLIES_TO", "b", 1.0)],
      GraphMetadata::default(),
    );
    assert_eq!(graph.edges[0].id, "a-REPLIES_TO-b");
    assert_eq!(graph.edges[0].source, "a");
    assert_eq!(graph.edges[0].target, "b");
  }

  #[test]
  fn visualization_uses_links_shape() {
    let graph = KnowledgeGraph::from_triplets(
      vec![node("a", "participant"), node("b", "participant")],
      vec![triplet("a", "REPLIES_TO", "b", 1.0)],
      GraphMetadata::default(),
    );
    let viz = graph.to_visualization("analysis_x", Utc::now());
    let json = serde_json::to_value(&viz).unwrap();
    assert_eq!(json["nodes"][0]["type"], "participant");
    assert_eq!(json["links"][0]["relationship"], "REPLIES_TO");
    assert_eq!(json["metadata"]["relationship_count"], 1);
  }
}
