//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use prgraph_core::{
  entity::{Entity, NewEntity},
  store::{FactStore, StoreStatistics, TripleQuery},
  triple::{NewTriple, Triple},
};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use prgraph_extract::{ExtractionConfig, ExtractionPipeline};
use prgraph_service::{AnalysisService, PluginRegistry, plugin::RepoToGraphPlugin};
use prgraph_store_sqlite::{Error as StoreError, SqliteStore};
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{AppState, api_router};

fn pipeline() -> ExtractionPipeline { ExtractionPipeline::offline(ExtractionConfig::default()) }

fn app_for<S: FactStore + 'static>(service: AnalysisService<S>) -> Router {
  let service = Arc::new(service);
  let plugins = PluginRegistry::builder()
    .register(Arc::new(RepoToGraphPlugin::new(Arc::clone(&service))))
    .build();
  api_router(AppState::new(service, Arc::new(plugins)))
}

async fn app() -> Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  app_for(AnalysisService::new(pipeline()).with_store(Arc::new(store)))
}

/// Fails every call, like a database that went away after startup.
struct Offline;

fn offline<T>() -> Result<T, StoreError> { Err(StoreError::DateParse("database is locked".into())) }

impl FactStore for Offline {
  type Error = StoreError;

  async fn add_entity(&self, _: NewEntity) -> Result<Uuid, StoreError> { offline() }

  async fn add_triple(&self, _: NewTriple) -> Result<Uuid, StoreError> { offline() }

  async fn get_triples<'a>(&'a self, _: &'a TripleQuery) -> Result<Vec<Triple>, StoreError> { offline() }

  async fn get_entity<'a>(&'a self, _: &'a str, _: &'a str) -> Result<Option<Entity>, StoreError> {
    offline()
  }

  async fn get_entities_by_type<'a>(&'a self, _: &'a str, _: usize) -> Result<Vec<Entity>, StoreError> {
    offline()
  }

  async fn find_entities<'a>(&'a self, _: &'a str, _: usize) -> Result<Vec<Entity>, StoreError> {
    offline()
  }

  async fn search_entities<'a>(&'a self, _: &'a str, _: usize) -> Result<Vec<Entity>, StoreError> {
    offline()
  }

  async fn get_statistics(&self) -> Result<StoreStatistics, StoreError> { offline() }
}

fn conversation() -> Value {
  json!({
    "pr_number": 3,
    "title": "Fix auth",
    "comments": [
      { "author": "jack", "created_at": "2025-07-21T18:00:00Z",
        "body": "Seeing 401 errors on the auth endpoint" },
      { "author": "devin-ai-integration[bot]", "created_at": "2025-07-21T18:05:00Z",
        "body": "Implementing JWT token handling as the fix" },
    ],
  })
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> Response {
  let builder = Request::builder().method(method).uri(uri);
  let req = match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string())),
    None => builder.body(Body::empty()),
  }
  .unwrap();
  app.oneshot(req).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

// ─── Health ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_store_and_plugins() {
  let resp = send(app().await, "GET", "/health", None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["status"], "healthy");
  assert_eq!(body["persistent_store"], true);
  assert_eq!(body["plugins"], 1);
  assert_eq!(body["analyzer"]["available"], false);
  assert_eq!(body["analyzer"]["requests"], 0);
  assert_eq!(body["analyzer"]["critic"], Value::Null);
}

// ─── Analyses ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_fetch_analysis() {
  let app = app().await;
  let resp = send(app.clone(), "POST", "/analyses", Some(conversation())).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let created = json_body(resp).await;
  let id = created["analysis_id"].as_str().unwrap().to_owned();
  assert_eq!(created["conversation"]["pr_number"], 3);
  assert!(!created["knowledge_graph"]["nodes"].as_array().unwrap().is_empty());

  let resp = send(app.clone(), "GET", &format!("/analyses/analysis_{id}"), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["analysis_id"], id.as_str());

  let resp = send(app.clone(), "GET", &format!("/analyses/{id}/visualization"), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let viz = json_body(resp).await;
  assert_eq!(viz["metadata"]["analysis_id"], format!("analysis_{id}"));

  let resp = send(app, "GET", "/analyses?limit=10", None).await;
  let listed = json_body(resp).await;
  assert_eq!(listed.as_array().unwrap().len(), 1);
  assert_eq!(listed[0]["source"], "memory");
}

#[tokio::test]
async fn missing_analysis_is_404() {
  let resp = send(
    app().await,
    "GET",
    "/analyses/6f1c2b1e-0000-4000-8000-000000000000",
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  assert!(json_body(resp).await["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn malformed_body_is_400() {
  let app = app().await;
  let req = Request::builder()
    .method("POST")
    .uri("/analyses")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from("{not json"))
    .unwrap();
  let resp = app.clone().oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  // Well-formed JSON without a comments array fails validation.
  let resp = send(app, "POST", "/analyses", Some(json!({ "title": "x" }))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ─── Store ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn store_views_read_persisted_facts() {
  let app = app().await;
  send(app.clone(), "POST", "/analyses", Some(conversation())).await;

  let resp = send(app.clone(), "GET", "/store/entities?type=analysis", None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);

  let resp = send(app.clone(), "GET", "/store/entities/search?q=jack", None).await;
  assert!(!json_body(resp).await.as_array().unwrap().is_empty());

  let resp = send(app.clone(), "GET", "/store/triples?predicate=contains_node&limit=2", None).await;
  assert_eq!(json_body(resp).await.as_array().unwrap().len(), 2);

  let resp = send(app.clone(), "GET", "/store/statistics", None).await;
  let stats = json_body(resp).await;
  assert_eq!(stats["entity_types"]["analysis"], 1);

  let resp = send(app, "GET", "/store/connections?type=participant&value=jack&depth=9", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn store_views_without_store_are_503() {
  let app = app_for(AnalysisService::<SqliteStore>::new(pipeline()));
  let resp = send(app.clone(), "GET", "/store/statistics", None).await;
  assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
  assert!(json_body(resp).await["error"].is_string());

  let resp = send(app, "GET", "/store/entities?type=participant", None).await;
  assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn failed_store_reads_are_404_like_analyses() {
  let app = app_for(AnalysisService::new(pipeline()).with_store(Arc::new(Offline)));

  for uri in [
    "/store/statistics",
    "/store/entities?type=participant",
    "/store/entities/search?q=jack",
    "/store/triples",
    "/store/connections?type=participant&value=jack",
    "/analyses/6f1c2b1e-0000-4000-8000-000000000000",
  ] {
    let resp = send(app.clone(), "GET", uri, None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    assert!(json_body(resp).await["error"].as_str().unwrap().ends_with("not found"));
  }

  // Creation still succeeds from memory.
  let resp = send(app, "POST", "/analyses", Some(conversation())).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn connections_accept_a_composite_key() {
  let app = app().await;
  send(app.clone(), "POST", "/analyses", Some(conversation())).await;

  let by_parts = send(app.clone(), "GET", "/store/connections?type=participant&value=jack", None).await;
  assert_eq!(by_parts.status(), StatusCode::OK);
  let by_parts = json_body(by_parts).await;

  let by_key = send(app.clone(), "GET", "/store/connections?key=participant:jack", None).await;
  assert_eq!(by_key.status(), StatusCode::OK);
  assert_eq!(json_body(by_key).await, by_parts);

  for uri in [
    "/store/connections?key=participant",
    "/store/connections?key=:jack",
    "/store/connections?key=participant:jack&type=participant",
    "/store/connections?type=participant",
  ] {
    let resp = send(app.clone(), "GET", uri, None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
  }
}

// ─── Plugins ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn plugins_are_listed_and_executed() {
  let app = app().await;
  let resp = send(app.clone(), "GET", "/plugins", None).await;
  let listed = json_body(resp).await;
  assert_eq!(listed[0]["name"], "repo-to-graph");

  let resp = send(
    app.clone(),
    "POST",
    "/plugins/repo-to-graph/execute",
    Some(json!({ "pr_data": conversation() })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let result = json_body(resp).await;
  assert_eq!(result["success"], true);
  assert_eq!(result["data"]["conversation_summary"]["comment_count"], 2);

  let resp = send(app.clone(), "POST", "/plugins/repo-to-graph/execute", Some(json!({}))).await;
  assert_eq!(json_body(resp).await["success"], false);

  let resp = send(app, "POST", "/plugins/nope/execute", Some(json!({}))).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
