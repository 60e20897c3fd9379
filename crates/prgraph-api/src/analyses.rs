//! Handlers for `/analyses` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/analyses` | Body: a raw conversation; 201 on success |
//! | `GET`  | `/analyses` | Optional `?limit=` (default 50) |
//! | `GET`  | `/analyses/{id}` | UUID or `analysis_<uuid>`; 404 if not found |
//! | `GET`  | `/analyses/{id}/visualization` | `{nodes, links, metadata}` |

use axum::{
  Json,
  extract::{Path, Query, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use prgraph_core::{
  conversation::RawConversation,
  graph::{Analysis, VisualizationGraph},
  store::FactStore,
};
use prgraph_service::service::AnalysisListing;
use serde::Deserialize;

use crate::{AppState, error::ApiError};

const DEFAULT_LIST_LIMIT: usize = 50;

/// `POST /analyses`
pub async fn create<S: FactStore>(
  State(state): State<AppState<S>>,
  body: Result<Json<RawConversation>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(raw) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let analysis = state.service.create_from_raw(raw).await?;
  Ok((StatusCode::CREATED, Json(Analysis::clone(&analysis))))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub limit: Option<usize>,
}

/// `GET /analyses[?limit=<n>]`
pub async fn list<S: FactStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Json<Vec<AnalysisListing>> {
  let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
  Json(state.service.list_analyses(limit).await)
}

/// `GET /analyses/{id}`
pub async fn get_one<S: FactStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<Json<Analysis>, ApiError> {
  let analysis = state.service.get_analysis(&id).await?;
  Ok(Json(Analysis::clone(&analysis)))
}

/// `GET /analyses/{id}/visualization`
pub async fn visualization<S: FactStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<Json<VisualizationGraph>, ApiError> {
  Ok(Json(state.service.export_visualization(&id).await?))
}
