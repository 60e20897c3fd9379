//! The prgraph composition root.
//!
//! [`ServerConfig`] is read from an optional TOML file layered with
//! `PRGRAPH_*` environment variables. [`build_service`] and [`build_app`]
//! wire the store, the analyzer backend, the GitHub source and the plugins
//! together; nothing else in the workspace constructs collaborators.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::Router;
use prgraph_api::{AppState, api_router};
use prgraph_clients::{GitHubClient, GitHubSettings, OllamaClient, OllamaSettings};
use prgraph_extract::{ExtractionConfig, ExtractionPipeline};
use prgraph_service::{AnalysisService, PluginRegistry, plugin::RepoToGraphPlugin};
use prgraph_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Server configuration, deserialised from `config.toml` and the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  /// SQLite database for persisted analyses. Analyses live in memory only
  /// when unset.
  pub store_path: Option<PathBuf>,
  pub ollama:     OllamaSettings,
  pub github:     GitHubSettings,
  pub extraction: ExtractionConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".into(),
      port:       8000,
      store_path: None,
      ollama:     OllamaSettings::default(),
      github:     GitHubSettings::default(),
      extraction: ExtractionConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Layer `path` (if it exists) under `PRGRAPH_*` variables. Nested keys use
  /// `__`, e.g. `PRGRAPH_OLLAMA__MODEL`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("PRGRAPH")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read configuration")?;

    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Wiring ───────────────────────────────────────────────────────────────────

/// Build the analysis service. With `offline` the analyzer is never called;
/// with `persist == false` the configured store is ignored. A store that
/// cannot be opened is logged and the service runs memory-only.
pub async fn build_service(
  cfg: &ServerConfig,
  offline: bool,
  persist: bool,
) -> anyhow::Result<Arc<AnalysisService<SqliteStore>>> {
  let pipeline = if offline || !cfg.ollama.enabled {
    info!("analyzer disabled; using keyword extraction only");
    ExtractionPipeline::offline(cfg.extraction.clone())
  } else {
    let client = OllamaClient::new(&cfg.ollama).context("failed to build Ollama client")?;
    info!(model = client.model(), base_url = %cfg.ollama.base_url, "using Ollama analyzer");
    let pipeline = ExtractionPipeline::new(cfg.extraction.clone(), Arc::new(client));
    match &cfg.ollama.critic_model {
      Some(model) => {
        let settings = OllamaSettings { model: model.clone(), ..cfg.ollama.clone() };
        let critic = OllamaClient::new(&settings).context("failed to build Ollama critic")?;
        info!(model = critic.model(), "using Ollama critic");
        pipeline.with_critic(Arc::new(critic))
      }
      None => pipeline,
    }
  };

  let mut service = AnalysisService::new(pipeline);
  match (&cfg.store_path, persist) {
    (Some(path), true) => match open_store(&expand_tilde(path)).await {
      Ok(store) => service = service.with_store(Arc::new(store)),
      Err(e) => {
        let error = format!("{e:#}");
        warn!(%error, "store unavailable; analyses are kept in memory only");
      }
    },
    (None, true) => warn!("no store_path configured; analyses are kept in memory only"),
    (_, false) => {}
  }
  Ok(Arc::new(service))
}

/// Open the store at `path`, creating its parent directory first.
async fn open_store(path: &Path) -> anyhow::Result<SqliteStore> {
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(path)
    .await
    .with_context(|| format!("failed to open store at {path:?}"))?;
  info!(path = %path.display(), "persistent store opened");
  Ok(store)
}

/// The plugin registry shipped with the server.
pub fn build_plugins(
  cfg: &ServerConfig,
  service: Arc<AnalysisService<SqliteStore>>,
) -> anyhow::Result<PluginRegistry> {
  let github = GitHubClient::new(&cfg.github).context("failed to build GitHub client")?;
  Ok(
    PluginRegistry::builder()
      .register(Arc::new(RepoToGraphPlugin::new(service).with_source(Arc::new(github))))
      .build(),
  )
}

/// The full HTTP application, request tracing included.
pub async fn build_app(cfg: &ServerConfig) -> anyhow::Result<Router> {
  let service = build_service(cfg, false, true).await?;
  let plugins = build_plugins(cfg, Arc::clone(&service))?;
  Ok(api_router(AppState::new(service, Arc::new(plugins))).layer(TraceLayer::new_for_http()))
}
