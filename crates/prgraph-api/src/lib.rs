//! JSON REST API for prgraph.
//!
//! Exposes an axum [`Router`] over an [`AnalysisService`] and a
//! [`PluginRegistry`]. Tracing, TLS and transport are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = prgraph_api::api_router(AppState::new(service, plugins));
//! ```

pub mod analyses;
pub mod error;
pub mod plugins;
pub mod store;

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::State,
  routing::{get, post},
};
use prgraph_core::store::FactStore;
use prgraph_service::{AnalysisService, PluginRegistry};
use serde_json::{Value, json};

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub service: Arc<AnalysisService<S>>,
  pub plugins: Arc<PluginRegistry>,
}

impl<S> AppState<S> {
  pub fn new(service: Arc<AnalysisService<S>>, plugins: Arc<PluginRegistry>) -> Self {
    Self { service, plugins }
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { service: Arc::clone(&self.service), plugins: Arc::clone(&self.plugins) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
pub fn api_router<S: FactStore + 'static>(state: AppState<S>) -> Router<()> {
  Router::new()
    .route("/health", get(health::<S>))
    // Analyses
    .route("/analyses", get(analyses::list::<S>).post(analyses::create::<S>))
    .route("/analyses/{id}", get(analyses::get_one::<S>))
    .route("/analyses/{id}/visualization", get(analyses::visualization::<S>))
    // Store
    .route("/store/entities", get(store::entities::<S>))
    .route("/store/entities/search", get(store::search::<S>))
    .route("/store/triples", get(store::triples::<S>))
    .route("/store/connections", get(store::connections::<S>))
    .route("/store/statistics", get(store::statistics::<S>))
    // Plugins
    .route("/plugins", get(plugins::list::<S>))
    .route("/plugins/{name}/execute", post(plugins::execute::<S>))
    .with_state(state)
}

/// `GET /health`
async fn health<S: FactStore>(State(state): State<AppState<S>>) -> Json<Value> {
  Json(json!({
    "status": "healthy",
    "persistent_store": state.service.has_store(),
    "plugins": state.plugins.enabled().count(),
    "analyzer": state.service.pipeline().status(),
  }))
}

#[cfg(test)]
mod tests;
