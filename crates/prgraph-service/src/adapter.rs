//! The graph adapter: persists analyses into a shared [`FactStore`] and
//! rebuilds them.
//!
//! Every analysis is namespaced under its persistent id `analysis_{uuid}`:
//!
//! | Stored as | Shape |
//! |-----------|-------|
//! | node entity | `(node.type, "{pid}:node:{id}")`, metadata [`NodeRecord`] |
//! | node membership | `(pid, contains_node, node key)` |
//! | relationship | `(subject key, predicate, object key)`, `source = ("analysis", pid)` |
//! | relationship properties | `("relationship", composite key)`, metadata [`RelationshipRecord`] |
//! | relationship membership | `(pid, contains_relationship, composite key)` |
//! | analysis entity | `("analysis", pid)`, metadata [`AnalysisRecord`] |
//!
//! The analysis entity is written last. Readers start from it, so an analysis
//! whose write was interrupted is never visible.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use prgraph_core::{
  conversation::PrConversation,
  entity::NewEntity,
  graph::{
    Analysis, GraphMetadata, GraphNode, GraphStatistics, KnowledgeGraph, Properties, Triplet,
    VisualizationGraph,
  },
  key::{node_key, node_key_prefix, persistent_analysis_id, relationship_key, strip_node_key},
  store::{FactStore, TripleQuery},
  triple::NewTriple,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub const ANALYSIS_ENTITY: &str = "analysis";
pub const RELATIONSHIP_ENTITY: &str = "relationship";
pub const CONTAINS_NODE: &str = "contains_node";
pub const CONTAINS_RELATIONSHIP: &str = "contains_relationship";

/// `source_type` of every triple the adapter writes.
pub const ANALYSIS_SOURCE: &str = "analysis";

#[derive(Debug, Error)]
pub enum AdapterError {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("stored record is not valid: {0}")]
  Decode(#[from] serde_json::Error),
}

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> AdapterError {
  AdapterError::Store(Box::new(e))
}

// ─── Stored records ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
  pub label:       String,
  #[serde(default)]
  pub properties:  Properties,
  pub analysis_id: String,
  /// Position in the original node list.
  pub index:       usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRecord {
  #[serde(default)]
  pub properties: Properties,
  /// Position in the original relationship list.
  pub index:      usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
  pub original_id:        String,
  pub created_at:         DateTime<Utc>,
  pub title:              String,
  pub node_count:         usize,
  pub relationship_count: usize,
  #[serde(default)]
  pub analysis_metadata:  GraphMetadata,
  #[serde(default)]
  pub conversation:       Option<PrConversation>,
}

// ─── Inputs and outputs ──────────────────────────────────────────────────────

/// Everything the adapter persists for one analysis.
#[derive(Debug, Clone)]
pub struct AdapterInput<'a> {
  pub analysis_id:   String,
  pub created_at:    DateTime<Utc>,
  pub title:         &'a str,
  pub nodes:         &'a [GraphNode],
  pub relationships: &'a [Triplet],
  pub metadata:      &'a GraphMetadata,
  pub conversation:  Option<&'a PrConversation>,
}

impl<'a> AdapterInput<'a> {
  pub fn from_analysis(analysis: &'a Analysis) -> Self {
    Self {
      analysis_id:   analysis.analysis_id.to_string(),
      created_at:    analysis.created_at,
      title:         &analysis.conversation.title,
      nodes:         &analysis.knowledge_graph.nodes,
      relationships: &analysis.knowledge_graph.triplets,
      metadata:      &analysis.knowledge_graph.metadata,
      conversation:  Some(&analysis.conversation),
    }
  }
}

/// An analysis read back from the store.
#[derive(Debug, Clone)]
pub struct StoredAnalysis {
  pub persistent_id: String,
  pub original_id:   String,
  pub created_at:    DateTime<Utc>,
  pub title:         String,
  pub graph:         KnowledgeGraph,
  pub conversation:  Option<PrConversation>,
}

impl StoredAnalysis {
  /// `None` when the stored record lacks the conversation or a UUID id.
  pub fn into_analysis(self) -> Option<Analysis> {
    let analysis_id = Uuid::parse_str(&self.original_id).ok()?;
    let conversation = self.conversation?;
    let statistics = GraphStatistics::compute(&self.graph);
    Some(Analysis {
      analysis_id,
      conversation,
      knowledge_graph: self.graph,
      created_at: self.created_at,
      statistics,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
  pub analysis_id:        String,
  pub original_id:        String,
  pub title:              String,
  pub created_at:         DateTime<Utc>,
  pub node_count:         usize,
  pub relationship_count: usize,
}

// ─── Adapter ─────────────────────────────────────────────────────────────────

pub struct GraphAdapter<S> {
  store: Arc<S>,
}

impl<S> Clone for GraphAdapter<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: FactStore> GraphAdapter<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &S { &self.store }

  /// Persist `input`, returning its persistent id.
  pub async fn store_analysis(&self, input: AdapterInput<'_>) -> Result<String, AdapterError> {
    let pid = persistent_analysis_id(&input.analysis_id);

    for (index, node) in input.nodes.iter().enumerate() {
      let key = node_key(&pid, &node.id);
      let record = NodeRecord {
        label: node.label.clone(),
        properties: node.properties.clone(),
        analysis_id: pid.clone(),
        index,
      };
      self
        .store
        .add_entity(
          NewEntity::new(&node.kind, &key)
            .with_metadata(serde_json::to_value(&record)?)
            .first_seen_in(&pid),
        )
        .await
        .map_err(store_err)?;
      self
        .store
        .add_triple(NewTriple::new(&pid, CONTAINS_NODE, &key).with_source(ANALYSIS_SOURCE, &pid))
        .await
        .map_err(store_err)?;
    }

    for (index, rel) in input.relationships.iter().enumerate() {
      let subject = node_key(&pid, &rel.subject);
      let object = node_key(&pid, &rel.object);
      self
        .store
        .add_triple(
          NewTriple::new(&subject, &rel.predicate, &object)
            .with_confidence(rel.confidence)
            .with_source(ANALYSIS_SOURCE, &pid),
        )
        .await
        .map_err(store_err)?;

      let composite = relationship_key(&subject, &rel.predicate, &object);
      let record = RelationshipRecord { properties: rel.metadata.clone(), index };
      self
        .store
        .add_entity(
          NewEntity::new(RELATIONSHIP_ENTITY, &composite)
            .with_metadata(serde_json::to_value(&record)?)
            .first_seen_in(&pid),
        )
        .await
        .map_err(store_err)?;
      self
        .store
        .add_triple(
          NewTriple::new(&pid, CONTAINS_RELATIONSHIP, &composite)
            .with_source(ANALYSIS_SOURCE, &pid),
        )
        .await
        .map_err(store_err)?;
    }

    let record = AnalysisRecord {
      original_id:        input.analysis_id.clone(),
      created_at:         input.created_at,
      title:              input.title.to_owned(),
      node_count:         input.nodes.len(),
      relationship_count: input.relationships.len(),
      analysis_metadata:  input.metadata.clone(),
      conversation:       input.conversation.cloned(),
    };
    self
      .store
      .add_entity(
        NewEntity::new(ANALYSIS_ENTITY, &pid).with_metadata(serde_json::to_value(&record)?),
      )
      .await
      .map_err(store_err)?;

    debug!(
      analysis = %pid,
      nodes = input.nodes.len(),
      relationships = input.relationships.len(),
      "analysis persisted",
    );
    Ok(pid)
  }

  /// Rebuild an analysis by raw or persistent id. `None` when no complete
  /// analysis is stored under it.
  pub async fn retrieve(&self, analysis_id: &str) -> Result<Option<StoredAnalysis>, AdapterError> {
    let pid = persistent_analysis_id(analysis_id);
    let Some(entity) = self
      .store
      .get_entity(ANALYSIS_ENTITY, &pid)
      .await
      .map_err(store_err)?
    else {
      return Ok(None);
    };
    let Some(metadata) = entity.metadata else {
      return Ok(None);
    };
    let record: AnalysisRecord = serde_json::from_value(metadata)?;

    let nodes = self.nodes(&pid).await?;
    let triplets = self.relationships(&pid).await?;

    Ok(Some(StoredAnalysis {
      persistent_id: pid,
      original_id:   record.original_id,
      created_at:    record.created_at,
      title:         record.title,
      graph:         KnowledgeGraph::from_triplets(nodes, triplets, record.analysis_metadata),
      conversation:  record.conversation,
    }))
  }

  async fn nodes(&self, pid: &str) -> Result<Vec<GraphNode>, AdapterError> {
    let query = TripleQuery::subject(pid).with_predicate(CONTAINS_NODE);
    let memberships = self.store.get_triples(&query).await.map_err(store_err)?;

    let mut indexed = Vec::with_capacity(memberships.len());
    for membership in memberships {
      let Some(node_id) = strip_node_key(pid, &membership.object) else {
        continue;
      };
      let entity = self
        .store
        .find_entities(&membership.object, 1)
        .await
        .map_err(store_err)?
        .into_iter()
        .next();
      let Some(record) = entity
        .as_ref()
        .and_then(|e| e.metadata.clone())
        .and_then(|m| serde_json::from_value::<NodeRecord>(m).ok())
      else {
        warn!(key = %membership.object, "skipping node without a readable record");
        continue;
      };
      let kind = entity.map(|e| e.kind).unwrap_or_default();

      indexed.push((record.index, GraphNode {
        id: node_id.to_owned(),
        label: record.label,
        kind,
        properties: record.properties,
      }));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, node)| node).collect())
  }

  async fn relationships(&self, pid: &str) -> Result<Vec<Triplet>, AdapterError> {
    let query = TripleQuery {
      subject_prefix: Some(node_key_prefix(pid)),
      exclude_predicates: vec![CONTAINS_NODE.into(), CONTAINS_RELATIONSHIP.into()],
      ..TripleQuery::default()
    };
    let mut stored = self.store.get_triples(&query).await.map_err(store_err)?;
    // Oldest first, so relationships without a record keep write order.
    stored.reverse();

    let mut indexed = Vec::with_capacity(stored.len());
    for triple in stored {
      let (Some(subject), Some(object)) =
        (strip_node_key(pid, &triple.subject), strip_node_key(pid, &triple.object))
      else {
        continue;
      };

      let composite = relationship_key(&triple.subject, &triple.predicate, &triple.object);
      let record = self
        .store
        .get_entity(RELATIONSHIP_ENTITY, &composite)
        .await
        .map_err(store_err)?
        .and_then(|e| e.metadata)
        .and_then(|m| serde_json::from_value::<RelationshipRecord>(m).ok());
      let (index, metadata) = match record {
        Some(r) => (r.index, r.properties),
        None => (usize::MAX, Properties::new()),
      };

      indexed.push((index, Triplet {
        subject: subject.to_owned(),
        predicate: triple.predicate,
        object: object.to_owned(),
        confidence: triple.confidence,
        metadata,
      }));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, t)| t).collect())
  }

  /// Persisted analyses, newest first. Records that cannot be decoded are
  /// skipped.
  pub async fn list_analyses(&self, limit: usize) -> Result<Vec<AnalysisSummary>, AdapterError> {
    let entities = self
      .store
      .get_entities_by_type(ANALYSIS_ENTITY, limit)
      .await
      .map_err(store_err)?;

    Ok(
      entities
        .into_iter()
        .filter_map(|entity| {
          let record = entity
            .metadata
            .and_then(|m| serde_json::from_value::<AnalysisRecord>(m).ok());
          let Some(record) = record else {
            warn!(analysis = %entity.value, "skipping undecodable analysis record");
            return None;
          };
          Some(AnalysisSummary {
            analysis_id:        entity.value,
            original_id:        record.original_id,
            title:              record.title,
            created_at:         record.created_at,
            node_count:         record.node_count,
            relationship_count: record.relationship_count,
          })
        })
        .collect(),
    )
  }

  /// The `{nodes, links, metadata}` rendering of a stored analysis.
  pub async fn export_for_visualization(
    &self,
    analysis_id: &str,
  ) -> Result<Option<VisualizationGraph>, AdapterError> {
    Ok(
      self
        .retrieve(analysis_id)
        .await?
        .map(|stored| stored.graph.to_visualization(stored.persistent_id, stored.created_at)),
    )
  }
}
