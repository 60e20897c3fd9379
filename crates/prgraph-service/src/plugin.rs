//! Named, schema-described entry points into the service.
//!
//! A [`PluginRegistry`] is assembled once at startup and never changes
//! afterwards; callers share it behind an `Arc`.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use prgraph_core::{
  conversation::{PrConversation, RawConversation},
  graph::Properties,
  source::ConversationSource,
  store::FactStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::service::AnalysisService;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
  pub name:        String,
  pub version:     String,
  pub description: String,
  #[serde(default = "enabled_by_default")]
  pub enabled:     bool,
}

fn enabled_by_default() -> bool { true }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginResult {
  pub success:  bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data:     Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:    Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub metadata: Option<Properties>,
}

impl PluginResult {
  pub fn ok(data: Value) -> Self {
    Self { success: true, data: Some(data), error: None, metadata: None }
  }

  pub fn failed(error: impl Into<String>) -> Self {
    Self { success: false, data: None, error: Some(error.into()), metadata: None }
  }

  pub fn with_metadata(mut self, metadata: Properties) -> Self {
    self.metadata = Some(metadata);
    self
  }
}

/// A capability exposed through the plugin surface.
#[async_trait]
pub trait Plugin: Send + Sync {
  fn config(&self) -> &PluginConfig;

  /// JSON description of the accepted input and produced output.
  fn schema(&self) -> Value;

  fn is_enabled(&self) -> bool { self.config().enabled }

  /// Failures are reported in the returned result, never as a panic or error.
  async fn execute(&self, input: Value) -> PluginResult;
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginInfo {
  pub name:        String,
  pub version:     String,
  pub description: String,
  pub enabled:     bool,
  pub schema:      Value,
}

#[derive(Default)]
pub struct PluginRegistry {
  plugins: BTreeMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
  pub fn builder() -> PluginRegistryBuilder { PluginRegistryBuilder::default() }

  pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> { self.plugins.get(name) }

  /// Every registered plugin, sorted by name.
  pub fn list(&self) -> Vec<PluginInfo> {
    self
      .plugins
      .values()
      .map(|p| {
        let config = p.config();
        PluginInfo {
          name:        config.name.clone(),
          version:     config.version.clone(),
          description: config.description.clone(),
          enabled:     p.is_enabled(),
          schema:      p.schema(),
        }
      })
      .collect()
  }

  pub fn enabled(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
    self.plugins.values().filter(|p| p.is_enabled())
  }
}

#[derive(Default)]
pub struct PluginRegistryBuilder {
  plugins: BTreeMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistryBuilder {
  /// Register `plugin` under its configured name. A later plugin with the
  /// same name replaces the earlier one.
  pub fn register(mut self, plugin: Arc<dyn Plugin>) -> Self {
    let name = plugin.config().name.clone();
    if self.plugins.insert(name.clone(), plugin).is_some() {
      warn!(plugin = %name, "plugin registered twice; keeping the latest");
    }
    self
  }

  pub fn build(self) -> PluginRegistry {
    info!(count = self.plugins.len(), "plugin registry built");
    PluginRegistry { plugins: self.plugins }
  }
}

// ─── repo-to-graph ───────────────────────────────────────────────────────────

pub const REPO_TO_GRAPH: &str = "repo-to-graph";

/// Turns a pull-request conversation, inline or fetched by URL, into an
/// analysis.
pub struct RepoToGraphPlugin<S> {
  config:  PluginConfig,
  service: Arc<AnalysisService<S>>,
  source:  Option<Arc<dyn ConversationSource>>,
}

impl<S: FactStore> RepoToGraphPlugin<S> {
  pub fn new(service: Arc<AnalysisService<S>>) -> Self {
    Self {
      config: PluginConfig {
        name:        REPO_TO_GRAPH.into(),
        version:     "1.0.0".into(),
        description: "Converts repository PR conversations to knowledge graphs showing \
                      multi-agent collaboration patterns"
          .into(),
        enabled:     true,
      },
      service,
      source: None,
    }
  }

  /// Enable the `github_url` input.
  pub fn with_source(mut self, source: Arc<dyn ConversationSource>) -> Self {
    self.source = Some(source);
    self
  }

  async fn conversation(&self, input: Value) -> Result<PrConversation, String> {
    let Value::Object(mut input) = input else {
      return Err("Plugin input must be a JSON object".into());
    };

    if let Some(pr_data) = input.remove("pr_data") {
      let raw: RawConversation =
        serde_json::from_value(pr_data).map_err(|e| format!("Invalid pr_data: {e}"))?;
      return PrConversation::try_from(raw).map_err(|e| format!("Invalid pr_data: {e}"));
    }

    if let Some(url) = input.remove("github_url") {
      let Value::String(url) = url else {
        return Err("'github_url' must be a string".into());
      };
      let Some(source) = &self.source else {
        return Err("Fetching from GitHub is not configured".into());
      };
      return source.fetch(&url).await.map_err(|e| e.to_string());
    }

    Err("Missing required input: 'pr_data' or 'github_url'".into())
  }
}

#[async_trait]
impl<S: FactStore + 'static> Plugin for RepoToGraphPlugin<S> {
  fn config(&self) -> &PluginConfig { &self.config }

  fn schema(&self) -> Value {
    json!({
      "input": {
        "type": "object",
        "properties": {
          "pr_data": { "type": "object", "description": "Raw PR conversation data" },
          "github_url": { "type": "string", "description": "GitHub PR URL to fetch data from" },
        },
        "oneOf": [
          { "required": ["pr_data"] },
          { "required": ["github_url"] },
        ],
      },
      "output": {
        "type": "object",
        "properties": {
          "success": { "type": "boolean" },
          "data": {
            "type": "object",
            "properties": {
              "analysis_id": { "type": "string" },
              "knowledge_graph": { "type": "object" },
              "statistics": { "type": "object" },
              "conversation_summary": { "type": "object" },
            },
          },
          "error": { "type": "string" },
        },
      },
    })
  }

  async fn execute(&self, input: Value) -> PluginResult {
    let conversation = match self.conversation(input).await {
      Ok(c) => c,
      Err(msg) => return PluginResult::failed(msg),
    };

    let analysis = self.service.create_analysis(conversation).await;
    let conv = &analysis.conversation;
    let data = json!({
      "analysis_id": analysis.analysis_id.to_string(),
      "knowledge_graph": analysis.knowledge_graph,
      "statistics": analysis.statistics,
      "conversation_summary": {
        "pr_number": conv.pr_number,
        "repository": conv.repository,
        "participant_count": conv.participants.len(),
        "comment_count": conv.comments.len(),
      },
    });

    let mut metadata = Properties::new();
    metadata.insert(
      "extraction_method".into(),
      Value::String(analysis.knowledge_graph.metadata.extraction_method.clone()),
    );
    PluginResult::ok(data).with_metadata(metadata)
  }
}
