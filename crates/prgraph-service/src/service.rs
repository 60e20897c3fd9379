//! The analysis service: the one place that runs extraction, caches results
//! and talks to the persistent store.
//!
//! Persistence is best-effort. A store failure while saving is logged and the
//! analysis stays available from memory. A store failure while reading, for
//! analyses and store views alike, is logged and reported as "not found".

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use prgraph_core::{
  connections::{EntityConnections, entity_connections},
  conversation::{PrConversation, RawConversation},
  entity::Entity,
  graph::{Analysis, VisualizationGraph},
  key::{EntityKey, parse_analysis_id, persistent_analysis_id},
  store::{FactStore, StoreStatistics, TripleQuery},
  triple::Triple,
};
use prgraph_extract::ExtractionPipeline;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapter::{AdapterInput, GraphAdapter};

#[derive(Debug, Error)]
pub enum ServiceError {
  /// Names what was missing, e.g. `analysis <id>`.
  #[error("{0} not found")]
  NotFound(String),

  #[error("invalid input: {0}")]
  Validation(String),

  #[error("no persistent store is configured")]
  StoreUnavailable,
}

impl From<prgraph_core::Error> for ServiceError {
  fn from(e: prgraph_core::Error) -> Self {
    match e {
      prgraph_core::Error::NotFound(what) => Self::NotFound(what),
      prgraph_core::Error::Validation(msg) => Self::Validation(msg),
      other => Self::Validation(other.to_string()),
    }
  }
}

/// Log a failed store read and report `what` as missing.
fn read_failed<E: std::error::Error>(what: String) -> impl FnOnce(E) -> ServiceError {
  move |e| {
    warn!(%what, error = %e, "store read failed");
    ServiceError::NotFound(what)
  }
}

// ─── Listings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingSource {
  Memory,
  Persistent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisListing {
  pub analysis_id:        String,
  pub title:              String,
  pub created_at:         DateTime<Utc>,
  pub node_count:         usize,
  pub relationship_count: usize,
  pub source:             ListingSource,
}

impl AnalysisListing {
  fn from_memory(analysis: &Analysis) -> Self {
    Self {
      analysis_id:        analysis.analysis_id.to_string(),
      title:              analysis.conversation.title.clone(),
      created_at:         analysis.created_at,
      node_count:         analysis.statistics.node_count,
      relationship_count: analysis.statistics.triplet_count,
      source:             ListingSource::Memory,
    }
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct AnalysisService<S> {
  pipeline: ExtractionPipeline,
  adapter:  Option<GraphAdapter<S>>,
  cache:    RwLock<HashMap<Uuid, Arc<Analysis>>>,
}

impl<S: FactStore> AnalysisService<S> {
  /// A service that keeps analyses in memory only.
  pub fn new(pipeline: ExtractionPipeline) -> Self {
    Self { pipeline, adapter: None, cache: RwLock::new(HashMap::new()) }
  }

  /// Also persist analyses into `store`.
  pub fn with_store(mut self, store: Arc<S>) -> Self {
    self.adapter = Some(GraphAdapter::new(store));
    self
  }

  pub fn pipeline(&self) -> &ExtractionPipeline { &self.pipeline }

  pub fn has_store(&self) -> bool { self.adapter.is_some() }

  fn adapter(&self) -> Result<&GraphAdapter<S>, ServiceError> {
    self.adapter.as_ref().ok_or(ServiceError::StoreUnavailable)
  }

  // ── Analyses ──────────────────────────────────────────────────────────

  /// Run extraction over `conversation`. Never fails: persistence errors are
  /// logged and the analysis is kept in memory.
  pub async fn create_analysis(&self, conversation: PrConversation) -> Arc<Analysis> {
    let analysis = Arc::new(self.pipeline.analyze(conversation).await);
    self
      .cache
      .write()
      .await
      .insert(analysis.analysis_id, Arc::clone(&analysis));

    if let Some(adapter) = &self.adapter {
      match adapter.store_analysis(AdapterInput::from_analysis(&analysis)).await {
        Ok(pid) => info!(analysis = %pid, "analysis stored"),
        Err(e) => warn!(
          analysis_id = %analysis.analysis_id,
          error = %e,
          "failed to persist analysis; keeping it in memory only",
        ),
      }
    }
    analysis
  }

  /// Validate a wire-format conversation, then analyze it.
  pub async fn create_from_raw(&self, raw: RawConversation) -> Result<Arc<Analysis>, ServiceError> {
    let conversation = PrConversation::try_from(raw)?;
    Ok(self.create_analysis(conversation).await)
  }

  /// Look up an analysis by UUID or persistent id, memory first.
  pub async fn get_analysis(&self, id: &str) -> Result<Arc<Analysis>, ServiceError> {
    if let Some(uuid) = parse_analysis_id(id) {
      let cached = self.cache.read().await.get(&uuid).cloned();
      if let Some(found) = cached {
        return Ok(found);
      }
    }

    let Some(adapter) = &self.adapter else {
      return Err(ServiceError::NotFound(format!("analysis {id}")));
    };
    let stored = match adapter.retrieve(id).await {
      Ok(stored) => stored,
      Err(e) => {
        warn!(analysis = id, error = %e, "store read failed");
        None
      }
    };
    let analysis = stored
      .and_then(|s| s.into_analysis())
      .map(Arc::new)
      .ok_or_else(|| ServiceError::NotFound(format!("analysis {id}")))?;

    debug!(analysis = id, "analysis loaded from store");
    self
      .cache
      .write()
      .await
      .insert(analysis.analysis_id, Arc::clone(&analysis));
    Ok(analysis)
  }

  /// In-memory and persisted analyses, newest first. An analysis present in
  /// both is listed once, from memory.
  pub async fn list_analyses(&self, limit: usize) -> Vec<AnalysisListing> {
    let mut listings: Vec<AnalysisListing> = self
      .cache
      .read()
      .await
      .values()
      .map(|a| AnalysisListing::from_memory(a))
      .collect();

    if let Some(adapter) = &self.adapter {
      match adapter.list_analyses(limit).await {
        Ok(persisted) => {
          for summary in persisted {
            if listings.iter().any(|l| l.analysis_id == summary.original_id) {
              continue;
            }
            listings.push(AnalysisListing {
              analysis_id:        summary.original_id,
              title:              summary.title,
              created_at:         summary.created_at,
              node_count:         summary.node_count,
              relationship_count: summary.relationship_count,
              source:             ListingSource::Persistent,
            });
          }
        }
        Err(e) => warn!(error = %e, "could not list persisted analyses"),
      }
    }

    listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    listings.truncate(limit);
    listings
  }

  pub async fn export_visualization(&self, id: &str) -> Result<VisualizationGraph, ServiceError> {
    let analysis = self.get_analysis(id).await?;
    Ok(analysis.knowledge_graph.to_visualization(
      persistent_analysis_id(&analysis.analysis_id.to_string()),
      analysis.created_at,
    ))
  }

  // ── Store passthroughs ────────────────────────────────────────────────

  pub async fn entities_by_type(&self, kind: &str, limit: usize) -> Result<Vec<Entity>, ServiceError> {
    self
      .adapter()?
      .store()
      .get_entities_by_type(kind, limit)
      .await
      .map_err(read_failed(format!("entities of type {kind}")))
  }

  pub async fn search_entities(&self, needle: &str, limit: usize) -> Result<Vec<Entity>, ServiceError> {
    self
      .adapter()?
      .store()
      .search_entities(needle, limit)
      .await
      .map_err(read_failed(format!("entities matching {needle:?}")))
  }

  pub async fn triples(&self, query: &TripleQuery) -> Result<Vec<Triple>, ServiceError> {
    self
      .adapter()?
      .store()
      .get_triples(query)
      .await
      .map_err(read_failed("triples".into()))
  }

  pub async fn connections(
    &self,
    key: &EntityKey,
    depth: usize,
  ) -> Result<EntityConnections, ServiceError> {
    entity_connections(self.adapter()?.store(), key, depth)
      .await
      .map_err(read_failed(format!("connections of {key}")))
  }

  pub async fn statistics(&self) -> Result<StoreStatistics, ServiceError> {
    self
      .adapter()?
      .store()
      .get_statistics()
      .await
      .map_err(read_failed("store statistics".into()))
  }
}
