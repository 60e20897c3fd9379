//! Graph assembly: the edge-validity gate.
//!
//! Relationships are kept only when both endpoints are node ids of the same
//! graph. Everything else becomes a [`DroppedEdge`], which is logged and
//! counted but never fails the run.

use std::collections::{HashMap, HashSet};

use prgraph_core::graph::{GraphMetadata, GraphNode, KnowledgeGraph, Triplet, edge_id};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

/// A candidate relationship rejected because an endpoint is not a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedEdge {
  pub source:       String,
  pub relationship: String,
  pub target:       String,
  /// The endpoints that were not found.
  pub missing:      Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Assembly {
  pub graph:   KnowledgeGraph,
  pub dropped: Vec<DroppedEdge>,
}

/// Build a graph from candidate nodes and relationships.
///
/// Nodes with a repeated id keep the first occurrence. Relationships with a
/// repeated edge id also keep the first occurrence, and the kept triplet
/// records how often it was seen as `occurrences`.
pub fn assemble(nodes: Vec<GraphNode>, candidates: Vec<Triplet>, metadata: GraphMetadata) -> Assembly {
  let mut seen_nodes = HashSet::new();
  let nodes: Vec<GraphNode> = nodes
    .into_iter()
    .filter(|n| seen_nodes.insert(n.id.clone()))
    .collect();

  let mut dropped = Vec::new();
  let mut kept: Vec<Triplet> = Vec::new();
  let mut kept_index: HashMap<String, usize> = HashMap::new();

  for candidate in candidates {
    let missing: Vec<String> = [&candidate.subject, &candidate.object]
      .into_iter()
      .filter(|id| !seen_nodes.contains(id.as_str()))
      .cloned()
      .collect();
    if !missing.is_empty() {
      debug!(
        source = %candidate.subject,
        relationship = %candidate.predicate,
        target = %candidate.object,
        ?missing,
        "dropping relationship with unknown endpoint",
      );
      dropped.push(DroppedEdge {
        source: candidate.subject,
        relationship: candidate.predicate,
        target: candidate.object,
        missing,
      });
      continue;
    }

    let id = edge_id(&candidate.subject, &candidate.predicate, &candidate.object);
    match kept_index.get(&id) {
      Some(&slot) => {
        let metadata = &mut kept[slot].metadata;
        let seen = metadata
          .get("occurrences")
          .and_then(|v| v.as_u64())
          .unwrap_or(1);
        metadata.insert("occurrences".into(), json!(seen + 1));
      }
      None => {
        kept_index.insert(id, kept.len());
        kept.push(candidate);
      }
    }
  }

  if !dropped.is_empty() {
    warn!(count = dropped.len(), "dropped relationships with unknown endpoints");
  }

  let metadata = GraphMetadata { dropped_edge_count: dropped.len(), ..metadata };
  Assembly {
    graph: KnowledgeGraph::from_triplets(nodes, kept, metadata),
    dropped,
  }
}

#[cfg(test)]
mod tests {
  use prgraph_core::graph::Properties;

  use super::*;

  fn node(id: &str) -> GraphNode {
    GraphNode {
      id:         id.into(),
      label:      id.into(),
      kind:       "participant".into(),
      properties: Properties::new(),
    }
  }

  fn triplet(s: &str, p: &str, o: &str) -> Triplet {
    Triplet {
      subject:    s.into(),
      predicate:  p.into(),
      object:     o.into(),
      confidence: 1.0,
      metadata:   Properties::new(),
    }
  }

  #[test]
  fn edges_need_both_endpoints() {
    let out = assemble(
      vec![node("A"), node("B")],
      vec![triplet("A", "REPLIES_TO", "B"), triplet("A", "REPLIES_TO", "Z")],
      GraphMetadata::default(),
    );

    assert_eq!(out.graph.edges.len(), 1);
    assert_eq!(out.graph.edges[0].id, "A-REPLIES_TO-B");
    assert_eq!(out.graph.triplets.len(), 1);
    assert_eq!(out.dropped, vec![DroppedEdge {
      source:       "A".into(),
      relationship: "REPLIES_TO".into(),
      target:       "Z".into(),
      missing:      vec!["Z".into()],
    }]);
    assert_eq!(out.graph.metadata.dropped_edge_count, 1);
  }

  #[test]
  fn every_edge_references_existing_nodes() {
    let out = assemble(
      vec![node("A"), node("B"), node("C")],
      vec![
        triplet("A", "R", "B"),
        triplet("Q", "R", "C"),
        triplet("C", "R", "A"),
        triplet("X", "R", "Y"),
      ],
      GraphMetadata::default(),
    );
    let ids = out.graph.node_ids();
    for edge in &out.graph.edges {
      assert!(ids.contains(edge.source.as_str()));
      assert!(ids.contains(edge.target.as_str()));
    }
    assert_eq!(out.dropped.len(), 2);
    assert_eq!(out.dropped[1].missing, vec!["X", "Y"]);
  }

  #[test]
  fn repeated_edges_keep_the_first() {
    let mut second = triplet("A", "R", "B");
    second.confidence = 0.2;
    let out = assemble(
      vec![node("A"), node("B")],
      vec![triplet("A", "R", "B"), second, triplet("A", "R", "B")],
      GraphMetadata::default(),
    );
    assert_eq!(out.graph.edges.len(), 1);
    assert_eq!(out.graph.triplets[0].confidence, 1.0);
    assert_eq!(out.graph.triplets[0].metadata["occurrences"], 3);
  }

  #[test]
  fn repeated_node_ids_keep_the_first() {
    let mut dup = node("A");
    dup.label = "second".into();
    let out = assemble(vec![node("A"), dup], vec![], GraphMetadata::default());
    assert_eq!(out.graph.nodes.len(), 1);
    assert_eq!(out.graph.nodes[0].label, "A");
  }
}
