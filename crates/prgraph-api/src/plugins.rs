//! Handlers for `/plugins` endpoints.

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
};
use prgraph_core::store::FactStore;
use prgraph_service::plugin::{PluginInfo, PluginResult};
use serde_json::Value;
use tracing::info;

use crate::{AppState, error::ApiError};

/// `GET /plugins`
pub async fn list<S: FactStore>(State(state): State<AppState<S>>) -> Json<Vec<PluginInfo>> {
  Json(state.plugins.list())
}

/// `POST /plugins/{name}/execute`, body is the plugin input.
///
/// A plugin that runs but fails still answers 200 with `success: false`.
pub async fn execute<S: FactStore>(
  State(state): State<AppState<S>>,
  Path(name): Path<String>,
  body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PluginResult>, ApiError> {
  let Json(input) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let plugin = state
    .plugins
    .get(&name)
    .ok_or_else(|| ApiError::NotFound(format!("plugin {name} not found")))?;
  if !plugin.is_enabled() {
    return Err(ApiError::BadRequest(format!("plugin {name} is disabled")));
  }

  let result = plugin.execute(input).await;
  info!(plugin = %name, success = result.success, "plugin executed");
  Ok(Json(result))
}
