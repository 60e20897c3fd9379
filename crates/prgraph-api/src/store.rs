//! Read-only views over the persistent fact store.
//!
//! Every endpoint answers 503 when the server runs without a store.

use axum::{
  Json,
  extract::{Query, State},
};
use prgraph_core::{
  connections::{EntityConnections, MAX_CONNECTION_DEPTH},
  entity::Entity,
  key::EntityKey,
  store::{FactStore, StoreStatistics, TripleQuery},
  triple::Triple,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

const DEFAULT_LIMIT: usize = 100;

fn default_limit() -> usize { DEFAULT_LIMIT }

fn default_depth() -> usize { 2 }

// ─── Entities ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EntitiesParams {
  #[serde(rename = "type")]
  pub kind:  String,
  #[serde(default = "default_limit")]
  pub limit: usize,
}

/// `GET /store/entities?type=<type>[&limit=<n>]`
pub async fn entities<S: FactStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<EntitiesParams>,
) -> Result<Json<Vec<Entity>>, ApiError> {
  Ok(Json(state.service.entities_by_type(&params.kind, params.limit).await?))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  pub q:     String,
  #[serde(default = "default_limit")]
  pub limit: usize,
}

/// `GET /store/entities/search?q=<needle>[&limit=<n>]`, case-sensitive.
pub async fn search<S: FactStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Entity>>, ApiError> {
  if params.q.is_empty() {
    return Err(ApiError::BadRequest("q must not be empty".into()));
  }
  Ok(Json(state.service.search_entities(&params.q, params.limit).await?))
}

// ─── Triples ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct TriplesParams {
  pub subject:   Option<String>,
  pub predicate: Option<String>,
  pub object:    Option<String>,
  pub limit:     Option<usize>,
}

/// `GET /store/triples[?subject=..][&predicate=..][&object=..][&limit=..]`
pub async fn triples<S: FactStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<TriplesParams>,
) -> Result<Json<Vec<Triple>>, ApiError> {
  let query = TripleQuery {
    subject: params.subject,
    predicate: params.predicate,
    object: params.object,
    limit: Some(params.limit.unwrap_or(DEFAULT_LIMIT)),
    ..TripleQuery::default()
  };
  Ok(Json(state.service.triples(&query).await?))
}

// ─── Connections ──────────────────────────────────────────────────────────────

/// The entity is named either by `key=<type>:<value>` or by `type` and
/// `value` separately.
#[derive(Debug, Deserialize)]
pub struct ConnectionsParams {
  pub key:   Option<String>,
  #[serde(rename = "type")]
  pub kind:  Option<String>,
  pub value: Option<String>,
  #[serde(default = "default_depth")]
  pub depth: usize,
}

impl ConnectionsParams {
  fn entity_key(&self) -> Result<EntityKey, ApiError> {
    match (&self.key, &self.kind, &self.value) {
      (Some(key), None, None) => {
        EntityKey::parse(key).map_err(|e| ApiError::BadRequest(e.to_string()))
      }
      (None, Some(kind), Some(value)) => Ok(EntityKey::new(kind.as_str(), value.as_str())),
      _ => Err(ApiError::BadRequest(
        "give either key=<type>:<value> or both type and value".into(),
      )),
    }
  }
}

/// `GET /store/connections?(key=<type>:<value> | type=<type>&value=<value>)[&depth=<1..=5>]`
pub async fn connections<S: FactStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<ConnectionsParams>,
) -> Result<Json<EntityConnections>, ApiError> {
  if params.depth == 0 || params.depth > MAX_CONNECTION_DEPTH {
    return Err(ApiError::BadRequest(format!(
      "depth must be between 1 and {MAX_CONNECTION_DEPTH}"
    )));
  }
  let key = params.entity_key()?;
  Ok(Json(state.service.connections(&key, params.depth).await?))
}

// ─── Statistics ───────────────────────────────────────────────────────────────

/// `GET /store/statistics`
pub async fn statistics<S: FactStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<StoreStatistics>, ApiError> {
  Ok(Json(state.service.statistics().await?))
}
